pub mod commands;
pub mod utils;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use tracing::debug;

use crate::{commands::run::RunCmd, utils::logger::init_logger};
use sandbox_config::Config;
use sandbox_executor::ResponseEnvelope;

#[derive(Parser)]
#[command(name = "sandbox")]
#[command(version)]
#[command(about = "Run untrusted scripts with a host controlled console")]
#[command(
    long_about = "Evaluates a JavaScript module in an isolated context that has no host APIs \
except a `console` object. Console calls are printed by the host and the module's default \
export is reported as a JSON envelope."
)]
#[command(after_help = "EXAMPLES:\n  \
    sandbox run script.js\n  \
    sandbox run script.js --scope evaluation -v\n  \
    sandbox run script.js --json\n\
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path, defaults to ./sandbox.json
    #[arg(long, short = 'c', global = true, default_value_t = Config::default_path())]
    pub config: Utf8PathBuf,

    /// No logging except for warnings and errors
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Verbose logging (-v) or trace logging (-vv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

impl Cli {
    /// Runs the selected command and returns the evaluation envelope
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be loaded, the script cannot be
    /// read or the isolated context cannot be created
    pub async fn handle(&self) -> anyhow::Result<ResponseEnvelope> {
        let cfg = Config::load_or_default(&self.config)?;
        init_logger(&cfg.logger, self.verbose, self.quiet);
        debug!(config = %cfg.path(), "Loaded config");

        match &self.command {
            Commands::Run(cmd) => cmd.handle(cfg).await,
        }
    }
}

#[derive(Debug, Subcommand)]
#[command(styles=utils::styles::get_styles())]
pub enum Commands {
    /// Evaluate a script in a fresh sandbox
    #[command(
        long_about = "Evaluate a JavaScript module in a fresh sandbox, printing its console \
output and then its result envelope. Exits non-zero when the evaluation fails."
    )]
    Run(RunCmd),
}
