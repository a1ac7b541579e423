use std::sync::Arc;

use kvmux_transport::UnixDomainSocket;
use tracing::{info, warn};

use crate::cmd::ServeArgs;
use crate::exit::{io_error, transport_error, CliResult, SUCCESS};
use crate::stub::{serve_connection, Store};

pub async fn run(args: ServeArgs) -> CliResult<i32> {
    let listener =
        UnixDomainSocket::bind(&args.path).map_err(|err| transport_error("bind failed", err))?;
    let store = Arc::new(Store::default());
    info!(path = %listener.path().display(), "stub peer listening");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                signal.map_err(|err| io_error("signal handler setup failed", err))?;
                info!("stub peer shutting down");
                return Ok(SUCCESS);
            }
            accepted = listener.accept() => {
                let stream = match accepted {
                    Ok(stream) => stream,
                    Err(err) => return Err(transport_error("accept failed", err)),
                };
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    if let Err(err) = serve_connection(stream, store).await {
                        warn!(error = %err, "stub connection ended with error");
                    }
                });
            }
        }
    }
}
