//! The fetched collection, its filters and the delete flow.

mod controller;
mod filter;

#[cfg(test)]
mod tests;

pub use controller::CollectionView;
pub use filter::{distinct_grades, distinct_groups, FilterState};
