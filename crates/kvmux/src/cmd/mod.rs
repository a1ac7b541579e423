use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use kvmux_client::{Client, ClientConfig};

use crate::exit::{client_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod batch;
pub mod ping;
pub mod send;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one command and print the reply.
    Send(SendArgs),
    /// Run several commands as one transaction.
    Batch(BatchArgs),
    /// Measure round-trip latency to a peer.
    Ping(PingArgs),
    /// Run the in-memory stub peer.
    Serve(ServeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub async fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format).await,
        Command::Batch(args) => batch::run(args, format).await,
        Command::Ping(args) => ping::run(args, format).await,
        Command::Serve(args) => serve::run(args).await,
        Command::Version(args) => version::run(args),
    }
}

/// Connection options shared by commands that talk to a peer.
#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Socket path of the peer.
    pub path: PathBuf,
    /// Bound on connecting and on each request (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Client name announced in the connection request.
    #[arg(long, env = "KVMUX_CLIENT_NAME")]
    pub client_name: Option<String>,
    /// Logical database to select.
    #[arg(long, default_value_t = 0)]
    pub db: u32,
}

impl ConnectArgs {
    pub async fn connect(&self) -> CliResult<(Client, Duration)> {
        let timeout = parse_duration(&self.timeout)?;
        let config = ClientConfig {
            client_name: self.client_name.clone(),
            database_id: self.db,
            request_timeout: Some(timeout),
            client_creation_timeout: timeout,
            ..ClientConfig::default()
        };
        let client = Client::connect_with_config(&self.path, &config)
            .await
            .map_err(|err| client_error("connect failed", err))?;
        Ok((client, timeout))
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Command and arguments, e.g. `SET key value`.
    #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// One command per flag, arguments separated by spaces (e.g. --cmd "SET a 1").
    #[arg(long = "cmd", value_name = "COMMAND", required = true)]
    pub commands: Vec<String>,
}

#[derive(Args, Debug)]
pub struct PingArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Number of pings to send.
    #[arg(long, short = 'n', default_value_t = 1)]
    pub count: usize,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Socket path to bind.
    pub path: PathBuf,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(num) => (num, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
