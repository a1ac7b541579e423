//! In-memory stand-in for the storage peer.
//!
//! Speaks the channel protocol from the peer side: answers the connection
//! request, then executes a handful of string commands against a map shared
//! by every connection. Enough for demos and CLI tests; not a storage engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use kvmux_client::{
    ClientError, Command, ConnectionRequest, Request, RequestBody, RequestType, Response, Value,
    HANDSHAKE_ID,
};
use kvmux_frame::VarintCodec;
use kvmux_transport::IpcStream;
use parking_lot::Mutex;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

const NOT_AN_INTEGER: &str = "ERR value is not an integer or out of range";

/// Result of executing one command.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Reply {
    Ok,
    Nil,
    Value(Value),
    Error(String),
    /// Answer, then close the connection.
    Shutdown,
}

/// Key space shared by all stub connections.
#[derive(Debug, Default)]
pub struct Store {
    data: Mutex<HashMap<String, String>>,
    next_client_id: AtomicU64,
}

impl Store {
    fn execute(&self, session: &Session, command: &Command) -> Reply {
        let (name, args) = match command.request_type {
            RequestType::CustomCommand => {
                let Some((first, rest)) = command.args.split_first() else {
                    return Reply::Error("ERR empty command".to_string());
                };
                let first = first.to_ascii_uppercase();
                match rest.split_first() {
                    Some((sub, tail)) if first == "CLIENT" || first == "CONFIG" => {
                        (format!("{first} {}", sub.to_ascii_uppercase()), tail)
                    }
                    _ => (first, rest),
                }
            }
            typed => (command_name(typed).to_string(), command.args.as_slice()),
        };
        debug!(command = %name, args = args.len(), "executing");

        match (name.as_str(), args) {
            ("PING", []) => Reply::Value(Value::String("PONG".to_string())),
            ("PING" | "ECHO", [message]) => Reply::Value(Value::String(message.clone())),
            ("SET", [key, value]) => {
                self.data.lock().insert(key.clone(), value.clone());
                Reply::Ok
            }
            ("GET", [key]) => match self.data.lock().get(key) {
                Some(value) => Reply::Value(Value::String(value.clone())),
                None => Reply::Nil,
            },
            ("DEL", keys) if !keys.is_empty() => {
                let mut data = self.data.lock();
                let removed = keys.iter().filter(|k| data.remove(*k).is_some()).count();
                Reply::Value(Value::Int(removed as i64))
            }
            ("INCR", [key]) => self.add(key, 1),
            ("DECR", [key]) => self.add(key, -1),
            ("INCRBY", [key, by]) => match by.parse::<i64>() {
                Ok(by) => self.add(key, by),
                Err(_) => Reply::Error(NOT_AN_INTEGER.to_string()),
            },
            ("DECRBY", [key, by]) => match by.parse::<i64>().ok().and_then(i64::checked_neg) {
                Some(by) => self.add(key, by),
                None => Reply::Error(NOT_AN_INTEGER.to_string()),
            },
            ("MGET", keys) if !keys.is_empty() => {
                let data = self.data.lock();
                let values = keys
                    .iter()
                    .map(|k| data.get(k).cloned().map_or(Value::Nil, Value::String))
                    .collect();
                Reply::Value(Value::Array(values))
            }
            ("MSET", pairs) if !pairs.is_empty() && pairs.len() % 2 == 0 => {
                let mut data = self.data.lock();
                for pair in pairs.chunks_exact(2) {
                    data.insert(pair[0].clone(), pair[1].clone());
                }
                Reply::Ok
            }
            ("SELECT", [db]) if db.parse::<u32>().is_ok() => Reply::Ok,
            ("CLIENT ID", []) => Reply::Value(Value::Int(session.client_id as i64)),
            ("CLIENT GETNAME", []) => match &session.name {
                Some(name) => Reply::Value(Value::String(name.clone())),
                None => Reply::Nil,
            },
            ("INFO", _) => Reply::Value(Value::String(format!(
                "# Server\r\nkvmux_stub_version:{}\r\nkeys:{}\r\n",
                env!("CARGO_PKG_VERSION"),
                self.data.lock().len()
            ))),
            ("SHUTDOWN", []) => Reply::Shutdown,
            (
                "PING" | "ECHO" | "SET" | "GET" | "DEL" | "INCR" | "DECR" | "INCRBY" | "DECRBY"
                | "MGET" | "MSET" | "SELECT" | "CLIENT ID" | "CLIENT GETNAME" | "SHUTDOWN",
                _,
            ) => Reply::Error(format!(
                "ERR wrong number of arguments for '{}' command",
                name.to_ascii_lowercase()
            )),
            _ => Reply::Error(format!("ERR unknown command '{name}'")),
        }
    }

    fn add(&self, key: &str, by: i64) -> Reply {
        let mut data = self.data.lock();
        let current = match data.get(key).map(|v| v.parse::<i64>()) {
            None => 0,
            Some(Ok(n)) => n,
            Some(Err(_)) => return Reply::Error(NOT_AN_INTEGER.to_string()),
        };
        match current.checked_add(by) {
            Some(next) => {
                data.insert(key.to_string(), next.to_string());
                Reply::Value(Value::Int(next))
            }
            None => Reply::Error("ERR increment or decrement would overflow".to_string()),
        }
    }

    /// Run a transaction. Any failing command aborts the whole batch.
    fn execute_all(&self, session: &Session, commands: &[Command]) -> Reply {
        let mut values = Vec::with_capacity(commands.len());
        for command in commands {
            match self.execute(session, command) {
                Reply::Ok => values.push(Value::Okay),
                Reply::Nil => values.push(Value::Nil),
                Reply::Value(value) => values.push(value),
                Reply::Error(message) => {
                    return Reply::Error(format!("EXECABORT transaction discarded: {message}"))
                }
                Reply::Shutdown => {
                    return Reply::Error("ERR SHUTDOWN is not allowed in a transaction".to_string())
                }
            }
        }
        Reply::Value(Value::Array(values))
    }
}

fn command_name(request_type: RequestType) -> &'static str {
    match request_type {
        RequestType::CustomCommand => "",
        RequestType::GetString => "GET",
        RequestType::SetString => "SET",
        RequestType::Ping => "PING",
        RequestType::Info => "INFO",
        RequestType::Del => "DEL",
        RequestType::Select => "SELECT",
        RequestType::ConfigGet => "CONFIG GET",
        RequestType::ConfigSet => "CONFIG SET",
        RequestType::ConfigResetStat => "CONFIG RESETSTAT",
        RequestType::ConfigRewrite => "CONFIG REWRITE",
        RequestType::ClientGetName => "CLIENT GETNAME",
        RequestType::ClientId => "CLIENT ID",
        RequestType::Incr => "INCR",
        RequestType::IncrBy => "INCRBY",
        RequestType::IncrByFloat => "INCRBYFLOAT",
        RequestType::Decr => "DECR",
        RequestType::DecrBy => "DECRBY",
        RequestType::Mget => "MGET",
        RequestType::Mset => "MSET",
        RequestType::HashSet => "HSET",
        RequestType::HashGet => "HGET",
    }
}

/// Per-connection facts learned from the connection request.
#[derive(Debug)]
struct Session {
    client_id: u64,
    name: Option<String>,
}

fn response_for(callback_idx: u32, reply: Reply) -> Response {
    match reply {
        Reply::Ok => Response::ok(callback_idx),
        Reply::Nil => Response::empty(callback_idx),
        Reply::Value(value) => Response::value(callback_idx, value),
        Reply::Error(message) => Response::request_error(callback_idx, message),
        Reply::Shutdown => Response::closing_error(callback_idx, "stub peer shutting down"),
    }
}

async fn send(
    framed: &mut Framed<IpcStream, VarintCodec>,
    response: &Response,
) -> Result<(), ClientError> {
    let payload = serde_json::to_vec(response)?;
    framed.send(Bytes::from(payload)).await?;
    Ok(())
}

/// Serve one client until it disconnects.
pub async fn serve_connection(stream: IpcStream, store: Arc<Store>) -> Result<(), ClientError> {
    let mut framed = Framed::new(stream, VarintCodec::new());

    let Some(first) = framed.next().await.transpose()? else {
        debug!("client left before the handshake");
        return Ok(());
    };
    let request: ConnectionRequest = match serde_json::from_slice(&first) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "malformed connection request");
            let reply = Response::request_error(
                HANDSHAKE_ID,
                format!("malformed connection request: {err}"),
            );
            return send(&mut framed, &reply).await;
        }
    };
    let session = Session {
        client_id: store.next_client_id.fetch_add(1, Ordering::Relaxed) + 1,
        name: request.client_name.clone(),
    };
    info!(
        client_id = session.client_id,
        client_name = ?session.name,
        addresses = request.addresses.len(),
        "accepted connection request"
    );
    send(&mut framed, &Response::empty(HANDSHAKE_ID)).await?;

    while let Some(frame) = framed.next().await {
        let frame = frame?;
        let request: Request = match serde_json::from_slice(&frame) {
            Ok(request) => request,
            Err(err) => {
                // Without a correlation id there is nobody to answer.
                warn!(error = %err, "malformed request; closing connection");
                return Ok(());
            }
        };
        let reply = match &request.command {
            RequestBody::SingleCommand(command) => store.execute(&session, command),
            RequestBody::Transaction(commands) => store.execute_all(&session, commands),
        };
        let closing = reply == Reply::Shutdown;
        send(&mut framed, &response_for(request.callback_idx, reply)).await?;
        if closing {
            info!(client_id = session.client_id, "client requested shutdown");
            return Ok(());
        }
    }
    debug!(client_id = session.client_id, "client disconnected");
    Ok(())
}
