use clap::Parser;
use snafu::{ResultExt, Snafu};

use crate::cli::{Cli, Command};

mod cli;
mod logging;

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to initialize logging"))]
    InitializeLogging { source: logging::Error },

    #[snafu(display("failed to compute values"))]
    Values { source: cli::Error },
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), Error> {
    logging::initialize_logging("KYMA_LOG", "kyma").context(InitializeLoggingSnafu)?;

    match Cli::parse().command {
        Command::Values(arguments) => arguments.run().await.context(ValuesSnafu),
    }
}
