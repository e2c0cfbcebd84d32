//! Entry point.

use tracecollector::cli::Cli;
use tracecollector::core::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    let config = cli.load_config()?;
    cli.init_logging(&config)?;

    tracecollector::run(config).await
}
