use std::time::Instant;

use kvmux_client::ClientError;
use tracing::debug;

use crate::cmd::send::close;
use crate::cmd::PingArgs;
use crate::exit::{client_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_ping, OutputFormat};

pub async fn run(args: PingArgs, format: OutputFormat) -> CliResult<i32> {
    if args.count == 0 {
        return Err(CliError::new(USAGE, "--count must be greater than zero"));
    }
    let (client, timeout) = args.connect.connect().await?;

    let mut samples = Vec::with_capacity(args.count);
    let mut failure = None;
    for seq in 0..args.count {
        let start = Instant::now();
        match tokio::time::timeout(timeout, client.ping()).await {
            Ok(Ok(_)) => {
                let rtt = start.elapsed();
                debug!(seq, ?rtt, "pong");
                samples.push(rtt);
            }
            Ok(Err(err)) => {
                failure = Some(err);
                break;
            }
            Err(_) => {
                failure = Some(ClientError::Timeout(timeout));
                break;
            }
        }
    }
    close(&client).await;

    if let Some(err) = failure {
        return Err(client_error("ping failed", err));
    }
    print_ping(&samples, format);
    Ok(SUCCESS)
}
