use clap::{Args, Parser, Subcommand};
use status_registry::config::{LoggingSettings, Settings};
use status_registry::core::{RegistrationState, RegistrationWorkflow, SearchState, SearchWorkflow};
use status_registry::models::FieldPath;
use status_registry::services::{ApiClient, ApiErrorKind, ClientError, SystemBrowser};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "status-registry",
    about = "Search the STATUS relationship registry or register a relationship",
    version
)]
struct Cli {
    /// Configuration file to load instead of config/default + config/local
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured API base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check whether a name appears in a registered relationship
    Search {
        /// First or last name
        name: Vec<String>,
    },
    /// Register a relationship and open the payment page
    Register(RegisterArgs),
}

#[derive(Args, Debug)]
struct RegisterArgs {
    #[arg(long)]
    person1_name: Option<String>,
    #[arg(long)]
    person1_email: Option<String>,
    #[arg(long)]
    person1_city: Option<String>,
    #[arg(long)]
    person1_state: Option<String>,
    #[arg(long)]
    person2_name: Option<String>,
    #[arg(long)]
    person2_email: Option<String>,
    #[arg(long)]
    person2_city: Option<String>,
    #[arg(long)]
    person2_state: Option<String>,
    /// Anniversary date, YYYY-MM-DD
    #[arg(long)]
    start_date: Option<String>,
}

impl RegisterArgs {
    fn fields(&self) -> [(FieldPath, &Option<String>); 9] {
        [
            (FieldPath::Person1Name, &self.person1_name),
            (FieldPath::Person1Email, &self.person1_email),
            (FieldPath::Person1City, &self.person1_city),
            (FieldPath::Person1State, &self.person1_state),
            (FieldPath::Person2Name, &self.person2_name),
            (FieldPath::Person2Email, &self.person2_email),
            (FieldPath::Person2City, &self.person2_city),
            (FieldPath::Person2State, &self.person2_state),
            (FieldPath::RelationshipStartDate, &self.start_date),
        ]
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("logging error: {0}")]
    Logging(String),

    #[error("{0}")]
    Client(#[from] ClientError),
}

fn init_logging(settings: &LoggingSettings) -> Result<(), CliError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.level)
            .map_err(|e| CliError::Logging(format!("invalid log level '{}': {}", settings.level, e)))?,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let result = if settings.format == "pretty" {
        subscriber.pretty().try_init()
    } else {
        subscriber.compact().try_init()
    };

    result.map_err(|e| CliError::Logging(e.to_string()))
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenv::dotenv().ok();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    if let Some(url) = cli.api_url {
        settings.api.base_url = url;
    }

    init_logging(&settings.logging)?;

    info!("Using registry API at {}", settings.api.base_url);

    let api = Arc::new(ApiClient::from_settings(&settings.api)?);

    let code = match cli.command {
        Command::Search { name } => search(api, &name.join(" ")).await,
        Command::Register(args) => register(api, &args).await,
    };

    Ok(code)
}

async fn search(api: Arc<ApiClient>, name: &str) -> ExitCode {
    let workflow = SearchWorkflow::new(api);

    match workflow.submit_query(name).await {
        SearchState::Success { results, .. } => {
            for result in &results {
                println!("{}", result.couple_label());
                println!("  {}", result.location_label());
                println!("  Together since {}", result.formatted_start_date());
            }
            ExitCode::SUCCESS
        }
        SearchState::Empty { query } => {
            println!("No relationships found for \"{}\"", query);
            ExitCode::SUCCESS
        }
        SearchState::Rejected { message } => {
            eprintln!("{}", message);
            ExitCode::from(2)
        }
        SearchState::Failed { error, .. } => {
            match error.kind {
                ApiErrorKind::Network => eprintln!("Search failed. Please check your internet connection."),
                ApiErrorKind::Server | ApiErrorKind::Parse => eprintln!("Search failed: {}", error.message),
            }
            ExitCode::FAILURE
        }
        state => {
            error!("Search ended in unexpected state {:?}", state);
            ExitCode::FAILURE
        }
    }
}

async fn register(api: Arc<ApiClient>, args: &RegisterArgs) -> ExitCode {
    let workflow = RegistrationWorkflow::new(api, Arc::new(SystemBrowser));

    for (path, value) in args.fields() {
        if let Some(value) = value {
            workflow.update_field(path, value.as_str());
        }
    }

    let state = workflow.submit().await;
    if let Some(notice) = state.notice() {
        println!("{}", notice);
    }

    match state {
        RegistrationState::AwaitingExternalPayment { checkout_url } => {
            println!("Payment page: {}", checkout_url);
            ExitCode::SUCCESS
        }
        RegistrationState::ValidationFailed(_) => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}
