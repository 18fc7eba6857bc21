use clap::Parser;
use tracing::error;

use sandbox::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    match cli.handle().await {
        Ok(envelope) if envelope.is_ok() => {}
        Ok(_) => std::process::exit(1),
        Err(e) => {
            error!("{e:#}");
            eprintln!("sandbox: {e:#}");
            std::process::exit(2);
        }
    }
}
