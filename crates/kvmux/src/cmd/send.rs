use kvmux_client::{Client, ClientError, Command};
use tracing::debug;

use crate::cmd::SendArgs;
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_value, OutputFormat};

pub async fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let (client, timeout) = args.connect.connect().await?;
    debug!(command = ?args.args.first(), "sending command");

    let result = tokio::time::timeout(timeout, client.custom_command(args.args))
        .await
        .unwrap_or(Err(ClientError::Timeout(timeout)));
    close(&client).await;

    let value = result.map_err(|err| client_error("send failed", err))?;
    print_value(&value, format);
    Ok(SUCCESS)
}

pub(crate) async fn close(client: &Client) {
    if let Err(err) = client.close().await {
        debug!(error = %err, "close after command failed");
    }
}

/// Split a command line on whitespace into a custom command.
pub(crate) fn parse_command(line: &str) -> Option<Command> {
    let args: Vec<&str> = line.split_whitespace().collect();
    if args.is_empty() {
        return None;
    }
    Some(Command::custom(args))
}
