#![allow(non_snake_case)]

use clap::Parser;
use tracing_subscriber::EnvFilter;

use calendarBot::config::AppConfig;
use calendarBot::runtime;
use calendarBot::store::CalendarStore;

#[derive(Parser)]
#[command(
    name = "calendarBot",
    about = "Conversational monthly calendar and reminder bot"
)]
struct Cli {
    /// KEY=VALUE config file; CONFIG_FILE env var works too.
    #[arg(long)]
    config: Option<String>,

    /// SQLite database path; overrides the config file.
    #[arg(long)]
    db: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match cli.config.or_else(|| std::env::var("CONFIG_FILE").ok()) {
        Some(path) => match AppConfig::from_file(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("failed to load config: {err}");
                std::process::exit(1);
            }
        },
        None => AppConfig::default(),
    };

    let db_path = cli.db.unwrap_or_else(|| config.db_path());
    let store = match CalendarStore::open(&db_path).await {
        Ok(store) => store,
        Err(err) => {
            eprintln!("failed to open database {db_path}: {err}");
            std::process::exit(1);
        }
    };

    runtime::run_console(config, store).await;
}
