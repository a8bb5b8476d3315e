use crate::client::Person;

/// Grade/group selections and search text applied to the collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub grade: Option<String>,
    pub group: Option<String>,
    pub search: String,
}

impl FilterState {
    pub fn is_active(&self) -> bool {
        selected(&self.grade).is_some()
            || selected(&self.group).is_some()
            || !self.search.trim().is_empty()
    }

    /// All predicates must hold; unset ones always do
    pub fn matches(&self, person: &Person) -> bool {
        let grade_ok = selected(&self.grade).map_or(true, |grade| person.grade.as_deref() == Some(grade));
        let group_ok = selected(&self.group).map_or(true, |group| person.group.as_deref() == Some(group));
        grade_ok && group_ok && matches_search(person, &self.search)
    }

    pub fn apply<'a>(&self, people: &'a [Person]) -> Vec<&'a Person> {
        people.iter().filter(|person| self.matches(person)).collect()
    }
}

fn selected(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

/// Case-insensitive substring match on full name or email
fn matches_search(person: &Person, search: &str) -> bool {
    let needle = search.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    person.full_name.to_lowercase().contains(&needle)
        || person
            .email
            .as_deref()
            .map_or(false, |email| email.to_lowercase().contains(&needle))
}

/// Distinct non-empty grades, in first-seen order
pub fn distinct_grades(people: &[Person]) -> Vec<String> {
    distinct(people, |person| person.grade.as_deref())
}

/// Distinct non-empty groups, in first-seen order
pub fn distinct_groups(people: &[Person]) -> Vec<String> {
    distinct(people, |person| person.group.as_deref())
}

fn distinct(people: &[Person], field: impl Fn(&Person) -> Option<&str>) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for value in people.iter().filter_map(|person| field(person)) {
        if !value.is_empty() && !values.iter().any(|seen| seen == value) {
            values.push(value.to_string());
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn person(id: &str, name: &str, email: Option<&str>, grade: &str, group: &str) -> Person {
        let optional = |value: &str| (!value.is_empty()).then(|| value.to_string());
        Person {
            id: id.to_string(),
            full_name: name.to_string(),
            email: email.map(str::to_string),
            grade: optional(grade),
            group: optional(group),
            created_at: Utc::now(),
            updated_at: None,
            has_photo: false,
            photo_url: None,
        }
    }

    fn roster() -> Vec<Person> {
        vec![
            person("1", "Ana Pérez", Some("ana@school.example"), "5", "A"),
            person("2", "Luis Gómez", None, "6", "B"),
            person("3", "Marta Ruiz", Some("marta@school.example"), "5", "B"),
            person("4", "Pablo Díaz", Some("PABLO@SCHOOL.EXAMPLE"), "", ""),
        ]
    }

    fn ids(people: Vec<&Person>) -> Vec<&str> {
        people.into_iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_distinct_values_keep_first_seen_order() {
        let people = roster();
        assert_eq!(distinct_grades(&people), vec!["5", "6"]);
        assert_eq!(distinct_groups(&people), vec!["A", "B"]);
        assert!(distinct_grades(&[]).is_empty());
    }

    #[test]
    fn test_unset_filter_matches_everything() {
        let people = roster();
        let filter = FilterState::default();
        assert!(!filter.is_active());
        assert_eq!(filter.apply(&people).len(), 4);

        let blank = FilterState {
            grade: Some(String::new()),
            group: None,
            search: "   ".to_string(),
        };
        assert!(!blank.is_active());
        assert_eq!(blank.apply(&people).len(), 4);
    }

    #[test]
    fn test_predicates_are_combined() {
        let people = roster();

        let grade = FilterState {
            grade: Some("5".to_string()),
            ..FilterState::default()
        };
        assert_eq!(ids(grade.apply(&people)), vec!["1", "3"]);

        let grade_and_group = FilterState {
            grade: Some("5".to_string()),
            group: Some("B".to_string()),
            ..FilterState::default()
        };
        assert_eq!(ids(grade_and_group.apply(&people)), vec!["3"]);

        let none = FilterState {
            grade: Some("6".to_string()),
            group: Some("A".to_string()),
            ..FilterState::default()
        };
        assert!(none.apply(&people).is_empty());
    }

    #[test]
    fn test_search_is_case_insensitive_on_name_and_email() {
        let people = roster();

        let by_name = FilterState {
            search: "gómez".to_string(),
            ..FilterState::default()
        };
        assert_eq!(ids(by_name.apply(&people)), vec!["2"]);

        let by_email = FilterState {
            search: "pablo@school".to_string(),
            ..FilterState::default()
        };
        assert_eq!(ids(by_email.apply(&people)), vec!["4"]);

        let shared = FilterState {
            search: "SCHOOL.example".to_string(),
            grade: Some("5".to_string()),
            ..FilterState::default()
        };
        assert_eq!(ids(shared.apply(&people)), vec!["1", "3"]);
    }
}
