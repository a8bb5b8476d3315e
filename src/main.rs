use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rollcall::notify::drain;
use rollcall::{
    photo_url_for, CaptureController, CollectionView, FilterState, HttpPeopleClient, Invalidation,
    NotificationBus, NotificationLevel, PeopleApi, Person, RecordEditor, RollcallConfig,
    SyntheticCamera,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(name = "rollcall")]
#[command(about = "Manage a roster of people and their photos over the people API")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "rollcall.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List people, optionally filtered
    List {
        #[arg(long)]
        grade: Option<String>,
        #[arg(long)]
        group: Option<String>,
        /// Case-insensitive match on name or email
        #[arg(long)]
        search: Option<String>,
    },
    /// Show one person
    Show { id: String },
    /// Register a new person
    Create {
        #[arg(long)]
        full_name: String,
        #[command(flatten)]
        fields: OptionalFields,
        /// Image file to use as the photo
        #[arg(long)]
        photo: Option<PathBuf>,
    },
    /// Update fields and optionally the photo of a person
    Update {
        id: String,
        #[arg(long)]
        full_name: Option<String>,
        #[command(flatten)]
        fields: OptionalFields,
        #[arg(long)]
        photo: Option<PathBuf>,
    },
    /// Replace a person's photo
    SetPhoto { id: String, file: PathBuf },
    /// Remove a person's stored photo
    DeletePhoto { id: String },
    /// Delete a person
    Delete { id: String },
}

#[derive(clap::Args, Debug)]
struct OptionalFields {
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    grade: Option<String>,
    #[arg(long)]
    group: Option<String>,
}

/// Controllers wired to one API client and one notification bus
struct Session {
    config: RollcallConfig,
    api: Arc<dyn PeopleApi>,
    notifications: NotificationBus,
    invalidation: Invalidation,
}

impl Session {
    fn new(config: RollcallConfig) -> rollcall::Result<Self> {
        let api = HttpPeopleClient::new(&config.api)?;
        Ok(Self {
            config,
            api: Arc::new(api),
            notifications: NotificationBus::default(),
            invalidation: Invalidation::new(),
        })
    }

    fn editor(&self) -> RecordEditor {
        RecordEditor::new(
            Arc::clone(&self.api),
            self.notifications.clone(),
            self.invalidation.clone(),
        )
    }

    fn view(&self) -> CollectionView {
        CollectionView::new(
            Arc::clone(&self.api),
            self.notifications.clone(),
            self.invalidation.clone(),
        )
    }

    /// Files are imported through the capture controller so the same size and
    /// format rules apply as in the interactive flow
    async fn import_photo(&self, path: &Path) -> Result<rollcall::EncodedImage> {
        let capture = CaptureController::new(
            self.config.capture.clone(),
            Arc::new(SyntheticCamera::new()),
            self.notifications.clone(),
        );
        let image = capture
            .import_file(path)
            .await
            .with_context(|| format!("Cannot use {} as a photo", path.display()))?;
        Ok(image)
    }

    async fn fetch_person(&self, id: &str) -> Result<Person> {
        let person = self.api.get(id).await.with_context(|| format!("Cannot load person {}", id))?;
        Ok(person)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting rollcall v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match RollcallConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    config.validate().context("Invalid configuration")?;

    let Some(command) = args.command else {
        eprintln!("No command given; see --help");
        return Ok(());
    };

    let session = Session::new(config).context("Failed to create API client")?;
    let mut notifications = session.notifications.subscribe();

    let result = run(&session, command).await;
    print_notifications(&mut notifications);
    result
}

async fn run(session: &Session, command: Command) -> Result<()> {
    debug!("Running command {:?}", command);

    match command {
        Command::List {
            grade,
            group,
            search,
        } => {
            let view = session.view();
            view.fetch().await.context("Failed to list people")?;
            view.set_filter(FilterState {
                grade,
                group,
                search: search.unwrap_or_default(),
            });
            print_people(&view.filtered(), &session.config.api.base_url);
            println!();
            println!("grades: {}", view.grades().join(", "));
            println!("groups: {}", view.groups().join(", "));
        }

        Command::Show { id } => {
            let person = session.fetch_person(&id).await?;
            println!("{}", serde_json::to_string_pretty(&person)?);
            if let Some(url) = photo_url_for(&session.config.api.base_url, &person) {
                println!("photo: {}", url);
            }
        }

        Command::Create {
            full_name,
            fields,
            photo,
        } => {
            let editor = session.editor();
            editor.edit(|draft| {
                draft.full_name = full_name;
                fields.apply(draft);
            });
            if let Some(path) = photo {
                editor.stage_photo(session.import_photo(&path).await?);
            }
            let outcome = editor.submit().await?;
            println!("{}", outcome.person().id);
        }

        Command::Update {
            id,
            full_name,
            fields,
            photo,
        } => {
            let editor = session.editor();
            editor.bind(Some(session.fetch_person(&id).await?));
            editor.edit(|draft| {
                if let Some(full_name) = full_name {
                    draft.full_name = full_name;
                }
                fields.apply(draft);
            });
            if let Some(path) = photo {
                editor.stage_photo(session.import_photo(&path).await?);
            }
            editor.submit().await?;
        }

        Command::SetPhoto { id, file } => {
            let editor = session.editor();
            editor.bind(Some(session.fetch_person(&id).await?));
            editor.stage_photo(session.import_photo(&file).await?);
            editor.submit().await?;
        }

        Command::DeletePhoto { id } => {
            let editor = session.editor();
            editor.bind(Some(session.fetch_person(&id).await?));
            editor.delete_photo().await?;
        }

        Command::Delete { id } => {
            let view = session.view();
            view.request_delete(session.fetch_person(&id).await?);
            view.confirm_delete().await?;
        }
    }

    Ok(())
}

impl OptionalFields {
    fn apply(self, draft: &mut rollcall::DraftRecord) {
        if let Some(email) = self.email {
            draft.email = email;
        }
        if let Some(grade) = self.grade {
            draft.grade = grade;
        }
        if let Some(group) = self.group {
            draft.group = group;
        }
    }
}

fn print_people(people: &[Person], base_url: &str) {
    println!(
        "{:<34} {:<28} {:<30} {:<6} {:<6} PHOTO",
        "ID", "NAME", "EMAIL", "GRADE", "GROUP"
    );
    for person in people {
        println!(
            "{:<34} {:<28} {:<30} {:<6} {:<6} {}",
            person.id,
            person.full_name,
            person.email.as_deref().unwrap_or("-"),
            person.grade.as_deref().unwrap_or("-"),
            person.group.as_deref().unwrap_or("-"),
            photo_url_for(base_url, person).unwrap_or_else(|| "-".to_string())
        );
    }
    println!(
        "{} {}",
        people.len(),
        if people.len() == 1 { "person" } else { "people" }
    );
}

fn print_notifications(receiver: &mut broadcast::Receiver<rollcall::Notification>) {
    for notification in drain(receiver) {
        let marker = match notification.level {
            NotificationLevel::Success => "✓",
            NotificationLevel::Info => "i",
            NotificationLevel::Warning => "!",
            NotificationLevel::Error => "✗",
        };
        eprintln!("{} {}", marker, notification.describe());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Json,
    Compact,
    Pretty,
    Plain,
}

impl LogFormat {
    fn from_arg(arg: Option<&str>) -> Self {
        match arg {
            Some("json") => LogFormat::Json,
            Some("compact") => LogFormat::Compact,
            Some("pretty") | None => LogFormat::Pretty,
            Some(other) => {
                eprintln!("Warning: Unknown log format '{}', using default", other);
                LogFormat::Plain
            }
        }
    }

    /// Json always carries source locations, compact never does
    fn locations(self, debug: bool) -> bool {
        match self {
            LogFormat::Json => true,
            LogFormat::Compact => false,
            LogFormat::Pretty | LogFormat::Plain => debug,
        }
    }
}

/// Stderr layer in `format`; stdout is reserved for command output.
/// `locations` adds thread ids, file and line to each event.
fn stderr_layer<S>(
    format: LogFormat,
    locations: bool,
) -> Box<dyn tracing_subscriber::Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    use tracing_subscriber::{fmt, Layer};

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(format != LogFormat::Compact)
        .with_thread_ids(locations)
        .with_file(locations)
        .with_line_number(locations);

    match format {
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Plain => layer.boxed(),
    }
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("rollcall={}", log_level)));

    let format = LogFormat::from_arg(args.log_format.as_deref());
    tracing_subscriber::registry()
        .with(stderr_layer(format, format.locations(args.debug)))
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Rollcall Configuration File");
    println!("# Every key can be overridden with ROLLCALL_<SECTION>__<KEY>, e.g. ROLLCALL_API__BASE_URL");
    println!();
    println!("{}", RollcallConfig::default().to_toml()?);
    Ok(())
}
