use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "airflow-users")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Manage Airflow users declaratively, keyed on e-mail", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ~/.config/airflow-users/config.toml)
    #[arg(long, global = true, env = "AIRFLOW_USERS_CONFIG")]
    pub config: Option<PathBuf>,

    /// State file (default: ~/.local/state/airflow-users/state.toml)
    #[arg(long, global = true, env = "AIRFLOW_USERS_STATE")]
    pub state: Option<PathBuf>,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Overrides for the connection settings in the config file
#[derive(Args, Default)]
pub struct ConnectionArgs {
    /// Airflow API base URL, e.g. http://localhost:8080/api/v1
    #[arg(long, global = true, env = "AIRFLOW_URL")]
    pub url: Option<String>,

    /// Username for basic auth
    #[arg(long, global = true, env = "AIRFLOW_USERNAME")]
    pub username: Option<String>,

    /// Password for basic auth
    #[arg(long, global = true, env = "AIRFLOW_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Bearer token (takes precedence over basic auth)
    #[arg(long, global = true, env = "AIRFLOW_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a declared user in Airflow and start managing it
    Create(DeclaredArgs),

    /// Refresh managed users from Airflow
    Read(ReadArgs),

    /// Update a managed user from its declaration
    Update(DeclaredArgs),

    /// Delete a managed user from Airflow
    Delete {
        /// E-mail of the user to delete
        email: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Start managing an existing Airflow user
    Import {
        /// E-mail of the existing user
        email: String,
    },

    /// List every user in Airflow
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct DeclaredArgs {
    /// E-mail of the declared user
    pub email: String,

    /// Declared users file
    #[arg(short, long, default_value = "users.toml")]
    pub file: PathBuf,
}

#[derive(Args)]
pub struct ReadArgs {
    /// E-mails to read (default: every managed user)
    pub emails: Vec<String>,

    /// Number of parallel reads
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,

    /// Print JSON instead of a summary
    #[arg(long)]
    pub json: bool,
}
