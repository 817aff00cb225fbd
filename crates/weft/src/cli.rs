//! Argument handling and wiring for the `weft-serve` binary.
//!
//! Configuration is resolved in this order, later sources winning:
//! built-in defaults, the `--config` file, `WEFT__*` environment variables,
//! then command-line flags.

use std::path::PathBuf;

use thiserror::Error;
use weft_config::{ConfigError, ConfigLoader, ServerSettings, WeftConfig};
use weft_middleware::stages::{BodyParser, RequestIdStage, RequestLogger};
use weft_middleware::Pipeline;
use weft_server::{ServerConfig, ServerError, StaticFiles};
use weft_telemetry::TelemetryError;

/// Version reported by `--version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "WEFT";

/// Usage text printed by `--help`.
pub const HELP: &str = r"weft-serve - serve a directory over HTTP

USAGE:
    weft-serve [OPTIONS] <DIR>

ARGS:
    <DIR>                  Directory to serve (or static_files.root in the config)

OPTIONS:
    -p, --port <PORT>      Port to listen on (default: 8080)
        --host <HOST>      Address to bind (default: 0.0.0.0)
    -c, --config <PATH>    Configuration file (TOML or JSON)
        --spa              Serve index.html for paths that do not resolve
        --json-logs        Emit JSON log lines
    -h, --help             Print help information
    -V, --version          Print version information

ENVIRONMENT VARIABLES:
    WEFT__SERVER__HTTP_ADDR            Bind address (e.g. 0.0.0.0:8080)
    WEFT__SERVER__REQUEST_TIMEOUT_MS   Request timeout in milliseconds
    WEFT__LOGGING__LEVEL               trace, debug, info, warn or error
    WEFT__STATIC_FILES__SHOW_HIDDEN    Serve dotfiles (true/false)
";

/// Errors that stop the binary.
#[derive(Error, Debug)]
pub enum CliError {
    /// A flag that needs a value was last on the command line.
    #[error("missing value for {0}")]
    MissingValue(String),

    /// The port is not a number in 1..=65535.
    #[error("invalid port: {0}")]
    InvalidPort(String),

    /// An unrecognised flag.
    #[error("unknown argument: {0}")]
    UnknownArgument(String),

    /// More than one directory was given.
    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),

    /// Neither the command line nor the configuration names a directory.
    #[error("no directory to serve")]
    MissingDirectory,

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Logging could not be initialised.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// The server failed to bind or serve.
    #[error(transparent)]
    Server(#[from] ServerError),
}

/// What the command line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Serve a directory.
    Serve(ServeArgs),
    /// Print usage.
    Help,
    /// Print the version.
    Version,
}

/// Options for [`Command::Serve`]. Unset options leave configuration alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServeArgs {
    /// Directory to serve.
    pub dir: Option<PathBuf>,
    /// Port to listen on.
    pub port: Option<u16>,
    /// Address to bind.
    pub host: Option<String>,
    /// Configuration file.
    pub config: Option<PathBuf>,
    /// SPA fallback mode.
    pub spa: bool,
    /// JSON log output.
    pub json_logs: bool,
}

/// Parses arguments, program name excluded.
pub fn parse_args<I>(args: I) -> Result<Command, CliError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut serve = ServeArgs::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-p" | "--port" => {
                let value = args.next().ok_or_else(|| CliError::MissingValue(arg.clone()))?;
                serve.port = Some(parse_port(&value)?);
            }
            "--host" => {
                serve.host = Some(args.next().ok_or(CliError::MissingValue(arg))?);
            }
            "-c" | "--config" => {
                serve.config = Some(
                    args.next()
                        .map(PathBuf::from)
                        .ok_or(CliError::MissingValue(arg))?,
                );
            }
            "--spa" => serve.spa = true,
            "--json-logs" => serve.json_logs = true,
            "-h" | "--help" => return Ok(Command::Help),
            "-V" | "--version" => return Ok(Command::Version),
            flag if flag.starts_with('-') && flag.len() > 1 => {
                return Err(CliError::UnknownArgument(arg));
            }
            _ if serve.dir.is_some() => return Err(CliError::UnexpectedArgument(arg)),
            _ => serve.dir = Some(PathBuf::from(arg)),
        }
    }

    Ok(Command::Serve(serve))
}

fn parse_port(value: &str) -> Result<u16, CliError> {
    match value.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(CliError::InvalidPort(value.to_string())),
    }
}

impl ServeArgs {
    /// Loads configuration and applies these flags on top.
    pub fn load_config(&self) -> Result<WeftConfig, CliError> {
        let mut loader = ConfigLoader::new();
        if let Some(path) = &self.config {
            loader = loader.with_file(path)?;
        }
        let mut config = loader.with_env_prefix(ENV_PREFIX).load()?;
        self.apply(&mut config)?;
        Ok(config)
    }

    /// Applies the flags to `config` and re-validates it.
    pub fn apply(&self, config: &mut WeftConfig) -> Result<(), CliError> {
        if self.host.is_some() || self.port.is_some() {
            let (current_host, current_port) = split_addr(&config.server.http_addr);
            let host = self.host.as_deref().unwrap_or(current_host);
            let port = self.port.map_or_else(|| current_port.to_string(), |p| p.to_string());
            config.server.http_addr = join_addr(host, &port);
        }
        if let Some(dir) = &self.dir {
            config.static_files.root = Some(dir.clone());
        }
        if self.spa {
            let index = config
                .static_files
                .index_file
                .clone()
                .unwrap_or_else(|| weft_server::static_files::DEFAULT_INDEX_FILE.to_string());
            config.static_files.spa_file = Some(index);
        }
        if self.json_logs {
            config.logging.json_format = true;
        }
        if config.static_files.root.is_none() {
            return Err(CliError::MissingDirectory);
        }
        config.validate()?;
        Ok(())
    }
}

fn split_addr(addr: &str) -> (&str, &str) {
    addr.rsplit_once(':').unwrap_or((addr, "8080"))
}

fn join_addr(host: &str, port: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Converts loaded settings into the transport's configuration.
pub fn server_config(settings: &ServerSettings) -> ServerConfig {
    ServerConfig::builder()
        .http_addr(settings.http_addr.clone())
        .shutdown_timeout(settings.shutdown_timeout())
        .request_timeout(settings.request_timeout())
        .keep_alive(settings.keep_alive)
        .build()
}

/// Builds the static-file pipeline: request id, request logger, body parser,
/// then static files.
pub fn pipeline(config: &WeftConfig) -> Result<Pipeline, CliError> {
    let settings = &config.static_files;
    let root = settings.root.clone().ok_or(CliError::MissingDirectory)?;
    let files = StaticFiles::new(root)
        .index_file(settings.index_file.as_deref())
        .spa_file(settings.spa_file.as_deref())
        .show_hidden(settings.show_hidden);

    Ok(Pipeline::builder()
        .register(RequestIdStage::new(), 100)
        .register(RequestLogger::new(), 90)
        .register(BodyParser::new().limit(config.server.body_limit_bytes), 50)
        .register(files, 0)
        .build())
}
