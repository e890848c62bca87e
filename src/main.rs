use std::sync::Arc;

use colored::Colorize;
use huddle_collab::{Collab, DatabaseError, SqliteDatabase};
use huddle_core::Config;
use huddle_server::{ConfigError, ServerConfig};
use log::{error, info};
use thiserror::Error;
use tokio::runtime::{self, Runtime};

mod logging;

pub struct Huddle {
    collab: Arc<Collab>,
    config: ServerConfig,
    runtime: Runtime,
}

#[derive(Debug, Error)]
enum HuddleError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Could not initialize database: {0}")]
    Database(#[from] DatabaseError),

    #[error("Server stopped unexpectedly: {0}")]
    Server(std::io::Error),

    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl Huddle {
    fn new() -> Result<Self, HuddleError> {
        let config = ServerConfig::from_env()?;

        info!("Building async runtime...");
        let runtime = runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("huddle-async")
            .build()
            .map_err(|e| HuddleError::Fatal(e.to_string()))?;

        info!("Connecting to database...");
        let database = runtime.block_on(SqliteDatabase::new(&config.database_url))?;

        let collab = Collab::new(Config::default(), database, config.upload_dir.clone());

        Ok(Self {
            collab: collab.into(),
            config,
            runtime,
        })
    }

    fn run(&self) -> Result<(), HuddleError> {
        self.runtime
            .block_on(huddle_server::run_server(self.collab.clone(), &self.config))
            .map_err(HuddleError::Server)
    }
}

impl HuddleError {
    fn hint(&self) -> String {
        match self {
            HuddleError::Config(_) => "Check the HUDDLE_* environment variables and try again.".to_string(),
            HuddleError::Database(_) => "This is a database error. Make sure HUDDLE_DATABASE_URL points to a writable sqlite database, then try again.".to_string(),
            HuddleError::Server(_) => "Make sure HUDDLE_SERVER_PORT is not in use by another process.".to_string(),
            HuddleError::Fatal(_) => "This error is fatal, and should not happen.".to_string(),
        }
    }
}

fn report(error: HuddleError) {
    error!("{} Read the error below to troubleshoot the issue. If you think this might be a bug, please report it by making a GitHub issue.", "huddle failed!".bold().red());
    error!("{}", error);
    error!("{}", format!("Hint: {}", error.hint()).dimmed().italic());
}

fn main() {
    logging::init_logger();

    match Huddle::new() {
        Ok(huddle) => {
            info!("Initialized successfully.");

            if let Err(error) = huddle.run() {
                report(error)
            }
        }
        Err(error) => report(error),
    }
}
