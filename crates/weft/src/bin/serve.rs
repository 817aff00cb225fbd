//! weft-serve - entry point
//!
//! Serves a directory through the static-file pipeline.

use std::process::ExitCode;

use tracing::{error, info};

use weft::cli::{self, CliError, Command, ServeArgs};
use weft_server::Server;

#[tokio::main]
async fn main() -> ExitCode {
    let command = match cli::parse_args(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("Use --help for usage information");
            return ExitCode::FAILURE;
        }
    };

    let args = match command {
        Command::Help => {
            print!("{}", cli::HELP);
            return ExitCode::SUCCESS;
        }
        Command::Version => {
            println!("weft-serve {}", cli::VERSION);
            return ExitCode::SUCCESS;
        }
        Command::Serve(args) => args,
    };

    match serve(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e @ CliError::Server(_)) => {
            error!("server error: {e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn serve(args: &ServeArgs) -> Result<(), CliError> {
    let config = args.load_config()?;
    weft_telemetry::init_logging(&config.logging.to_log_config())?;

    let pipeline = cli::pipeline(&config)?;
    info!(
        service = %config.logging.service_name,
        version = cli::VERSION,
        addr = %config.server.http_addr,
        root = ?config.static_files.root,
        spa = config.static_files.spa_file.is_some(),
        stages = ?pipeline.stage_names(),
        "starting weft-serve"
    );

    Server::builder()
        .config(cli::server_config(&config.server))
        .pipeline(pipeline)
        .build()
        .run()
        .await?;

    info!("weft-serve stopped");
    Ok(())
}
