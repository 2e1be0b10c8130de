use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use kernelwire_client::{Client, ClientConfig, ConnectionInfo};

use crate::exit::{client_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod complete;
pub mod execute;
pub mod history;
pub mod info;
pub mod inspect;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run code and stream its output.
    Execute(ExecuteArgs),
    /// Ask the kernel about the object at the cursor.
    Inspect(InspectArgs),
    /// List completions at the cursor.
    Complete(CompleteArgs),
    /// Query the kernel's input history.
    History(HistoryArgs),
    /// Summarize a connection file, optionally probing the kernel.
    Info(InfoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Execute(args) => execute::run(args, format),
        Command::Inspect(args) => inspect::run(args, format),
        Command::Complete(args) => complete::run(args, format),
        Command::History(args) => history::run(args, format),
        Command::Info(args) => info::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ConnectionArgs {
    /// Kernel connection file (kernel-*.json).
    #[arg(
        long = "connection-file",
        short = 'f',
        env = "JUPYTER_CONNECTION_FILE",
        value_name = "FILE"
    )]
    pub connection_file: PathBuf,
    /// Connect and handshake timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct ExecuteArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
    /// Code to run; `-` reads it from stdin.
    pub code: String,
    /// Run without broadcasting output or storing history.
    #[arg(long)]
    pub silent: bool,
    /// Do not add the code to the kernel's history.
    #[arg(long)]
    pub no_store_history: bool,
    /// Keep queued executions running if this one raises.
    #[arg(long)]
    pub no_stop_on_error: bool,
    /// Stop waiting for output after this long (e.g. 30s).
    #[arg(long, value_name = "DURATION")]
    pub output_timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
    pub code: String,
    /// Cursor offset in characters. Default: end of code.
    #[arg(long)]
    pub cursor: Option<usize>,
    /// 0 for a summary, 1 to include source.
    #[arg(long, default_value = "0", value_parser = clap::value_parser!(u8).range(0..=1))]
    pub detail_level: u8,
}

#[derive(Args, Debug)]
pub struct CompleteArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
    pub code: String,
    /// Cursor offset in characters. Default: end of code.
    #[arg(long)]
    pub cursor: Option<usize>,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
    /// Number of entries for tail and search queries.
    #[arg(long, short = 'n', default_value = "10")]
    pub limit: u64,
    /// Glob pattern to search for.
    #[arg(long, conflicts_with = "range")]
    pub search: Option<String>,
    /// Line range START:STOP of --session.
    #[arg(long, value_name = "START:STOP")]
    pub range: Option<String>,
    /// Session for --range; 0 is the current one, negative counts back.
    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    pub session: i64,
    /// Drop duplicate search results.
    #[arg(long, requires = "search")]
    pub unique: bool,
    /// Include output next to each input.
    #[arg(long)]
    pub output: bool,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Kernel connection file (kernel-*.json).
    #[arg(
        long = "connection-file",
        short = 'f',
        env = "JUPYTER_CONNECTION_FILE",
        value_name = "FILE"
    )]
    pub connection_file: PathBuf,
    /// Also connect and ask the kernel for its info.
    #[arg(long)]
    pub probe: bool,
    /// Connect and handshake timeout for --probe.
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn load_connection(path: &std::path::Path) -> CliResult<ConnectionInfo> {
    ConnectionInfo::from_file(path).map_err(|err| client_error("cannot read connection file", err))
}

pub fn connect(args: &ConnectionArgs) -> CliResult<Client> {
    let info = load_connection(&args.connection_file)?;
    connect_to(&info, &args.timeout)
}

pub fn connect_to(info: &ConnectionInfo, timeout: &str) -> CliResult<Client> {
    let config = ClientConfig {
        connect_timeout: parse_duration(timeout)?,
        ..ClientConfig::default()
    };
    Client::connect_with_config(info, config).map_err(|err| client_error("connect failed", err))
}

/// Cursor default: end of `code`, counted in characters.
pub fn cursor_or_end(cursor: Option<usize>, code: &str) -> usize {
    cursor.unwrap_or_else(|| code.chars().count())
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
