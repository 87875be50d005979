//! mongowire command-line tool
//!
//! Encodes and decodes BSON, generates ObjectIds, frames wire-protocol
//! requests and sends simple queries.
//!
//! # Usage
//!
//! ```bash
//! # Generate ids
//! mongowire oid -n 3
//!
//! # Print the OP_QUERY frame for a filter
//! echo '{"Name": "DBTest"}' | mongowire frame query --ns benchmark.dbinfo
//!
//! # Query a server
//! mongowire --host 127.0.0.1 query --ns benchmark.dbinfo '{"Name": "DBTest"}'
//! ```

use clap::CommandFactory;

use mongowire::bson::ObjectIdGenerator;
use mongowire::bson::oid::install_default_generator;
use mongowire::cli::{CliArgs, CliInterface};
use mongowire::error::Result;

/// Application entry point
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Main application logic
///
/// 1. Parse command-line arguments
/// 2. Load configuration
/// 3. Initialize logging
/// 4. Install the ObjectId generator
/// 5. Handle the subcommand
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;

    initialize_logging(&cli);

    install_default_generator(ObjectIdGenerator::from_config(&cli.config().identity))?;

    if !cli.handle_subcommand().await? {
        CliArgs::command().print_help()?;
    }

    Ok(())
}

/// Initialize logging system based on the effective log level
///
/// # Arguments
/// * `cli` - CLI interface holding the merged configuration
fn initialize_logging(cli: &CliInterface) {
    let level = cli.config().logging.level.to_tracing_level();

    // Logs go to stderr so piped output stays clean
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
