mod cli;
mod commands;
mod config;
mod desired;
mod progress;
mod state;
mod ui;

use airflow::HttpDirectory;
use anyhow::{Context as _, Result};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use config::Config;
use state::StateFile;
use std::io;
use std::path::PathBuf;
use userkit::Reconciler;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub config: Config,
    pub state_path: PathBuf,
}

impl Context {
    /// Reconciler talking to the configured Airflow instance
    pub fn reconciler(&self) -> Result<Reconciler<HttpDirectory>> {
        let url = self.config.url()?;
        let directory =
            HttpDirectory::new(url, self.config.credentials(), self.config.timeout())
                .with_context(|| format!("Invalid Airflow URL {url}"))?;
        log::debug!("Using Airflow API at {}", directory.base_url());
        Ok(Reconciler::new(directory))
    }

    pub fn load_state(&self) -> Result<StateFile> {
        let state = StateFile::load(&self.state_path)?;
        log::debug!("Using state file {}", state.path().display());
        Ok(state)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    if let Command::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "airflow-users", &mut io::stdout());
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?.merge(&cli.connection);
    let state_path = config.state_path(cli.state.as_deref())?;

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config,
        state_path,
    };

    commands::user::run(&ctx, cli.command)
}
