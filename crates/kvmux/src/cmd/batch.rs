use kvmux_client::{ClientError, Transaction};

use crate::cmd::send::{close, parse_command};
use crate::cmd::BatchArgs;
use crate::exit::{client_error, CliError, CliResult, FAILURE, SUCCESS, USAGE};
use crate::output::{print_batch, OutputFormat};

pub async fn run(args: BatchArgs, format: OutputFormat) -> CliResult<i32> {
    let mut tx = Transaction::new();
    for line in &args.commands {
        let command = parse_command(line)
            .ok_or_else(|| CliError::new(USAGE, "--cmd must not be empty"))?;
        tx.push(command);
    }

    let (client, timeout) = args.connect.connect().await?;
    let result = tokio::time::timeout(timeout, client.exec(&tx))
        .await
        .unwrap_or(Err(ClientError::Timeout(timeout)));
    close(&client).await;

    let values = result.map_err(|err| client_error("batch failed", err))?;
    print_batch(values.as_deref(), format);
    Ok(if values.is_some() { SUCCESS } else { FAILURE })
}
