mod common;

use std::time::Duration;

use futures_util::future::join_all;
use kvmux_client::{
    Client, ClientConfig, ClientError, Command, Connection, Executor, LifecycleState,
    NodeAddress, RequestBody, RequestType, Response, Transaction, Value,
};
use kvmux_transport::{bootstrap_fn, IpcStream, StaticEndpoint, TransportError, UnixDomainSocket};

use common::{connected, temp_socket_path, ScriptedPeer};

#[tokio::test]
async fn handshake_sends_connection_request() {
    let config = ClientConfig {
        addresses: vec![NodeAddress::new("cache.local", 7001)],
        database_id: 2,
        client_name: Some("tests".to_string()),
        ..ClientConfig::default()
    };
    let (client_io, peer_io) = IpcStream::pair().unwrap();
    let mut peer = ScriptedPeer::new(peer_io);

    let (conn, request) = tokio::join!(
        Connection::connect_stream(client_io, &config),
        peer.accept_handshake()
    );
    let conn = conn.unwrap();

    assert_eq!(conn.state(), LifecycleState::Ready);
    assert_eq!(request.addresses, vec![NodeAddress::new("cache.local", 7001)]);
    assert_eq!(request.database_id, 2);
    assert_eq!(request.client_name.as_deref(), Some("tests"));
}

#[tokio::test]
async fn set_answered_with_constant_response_yields_ok() {
    let (conn, mut peer) = connected(ClientConfig::default()).await;
    let client = Client::new(conn);

    let (value, ()) = tokio::join!(client.set("key", "value"), async {
        let request = peer.recv_request().await;
        assert_eq!(
            request.command,
            RequestBody::SingleCommand(Command::new(RequestType::SetString, ["key", "value"]))
        );
        peer.send(&Response::ok(request.callback_idx)).await;
    });
    assert_eq!(value.unwrap(), Value::Okay);
}

#[tokio::test]
async fn get_answered_with_empty_response_yields_nil() {
    let (conn, mut peer) = connected(ClientConfig::default()).await;
    let client = Client::new(conn);

    let (value, ()) = tokio::join!(client.get("missing"), async {
        let request = peer.recv_request().await;
        peer.send(&Response::empty(request.callback_idx)).await;
    });
    assert_eq!(value.unwrap(), Value::Nil);
}

#[tokio::test]
async fn transaction_yields_ordered_values() {
    let (conn, mut peer) = connected(ClientConfig::default()).await;
    let client = Client::new(conn);
    let mut tx = Transaction::new();
    tx.set("a", "1").get("a");

    let (values, ()) = tokio::join!(client.exec(&tx), async {
        let request = peer.recv_request().await;
        let RequestBody::Transaction(commands) = request.command else {
            panic!("expected a transaction");
        };
        assert_eq!(commands.len(), 2);
        let reply = Value::Array(vec![Value::Okay, Value::String("1".to_string())]);
        peer.send(&Response::value(request.callback_idx, reply)).await;
    });
    assert_eq!(
        values.unwrap(),
        Some(vec![Value::Okay, Value::String("1".to_string())])
    );
}

#[tokio::test]
async fn aborted_transaction_yields_none() {
    let (conn, mut peer) = connected(ClientConfig::default()).await;

    let (values, ()) = tokio::join!(conn.send_batch(vec![Command::custom(["GET", "a"])]), async {
        let request = peer.recv_request().await;
        peer.send(&Response::value(request.callback_idx, Value::Nil))
            .await;
    });
    assert_eq!(values.unwrap(), None);
}

#[tokio::test]
async fn responses_complete_out_of_order() {
    let (conn, mut peer) = connected(ClientConfig::default()).await;

    let requests = (0..3).map(|i| conn.send(Command::custom(["ECHO".to_string(), i.to_string()])));
    let (values, ()) = tokio::join!(join_all(requests), async {
        let mut received = Vec::new();
        for _ in 0..3 {
            received.push(peer.recv_request().await);
        }
        for request in received.into_iter().rev() {
            let RequestBody::SingleCommand(command) = request.command else {
                panic!("expected a single command");
            };
            let echoed = Value::String(command.args[1].clone());
            peer.send(&Response::value(request.callback_idx, echoed)).await;
        }
    });

    let values: Vec<_> = values.into_iter().map(Result::unwrap).collect();
    assert_eq!(
        values,
        vec![
            Value::String("0".into()),
            Value::String("1".into()),
            Value::String("2".into()),
        ]
    );
    assert_eq!(conn.in_flight(), 0);
}

#[tokio::test]
async fn pending_ids_are_unique_and_reused_after_resolution() {
    let (conn, mut peer) = connected(ClientConfig::default()).await;

    let requests = (0..4).map(|_| conn.send(Command::custom(["PING"])));
    let (_, ids) = tokio::join!(join_all(requests), async {
        let mut ids = Vec::new();
        for _ in 0..4 {
            ids.push(peer.recv_request().await.callback_idx);
        }
        for id in &ids {
            peer.send(&Response::ok(*id)).await;
        }
        ids
    });
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), 4);
    assert!(!ids.contains(&kvmux_client::HANDSHAKE_ID));

    for _ in 0..3 {
        let (_, id) = tokio::join!(conn.send(Command::custom(["PING"])), async {
            let request = peer.recv_request().await;
            peer.send(&Response::ok(request.callback_idx)).await;
            request.callback_idx
        });
        assert_eq!(id, 1, "smallest released id is reused");
    }
}

#[tokio::test]
async fn request_error_fails_only_that_request() {
    let (conn, mut peer) = connected(ClientConfig::default()).await;

    let (result, ()) = tokio::join!(conn.send(Command::custom(["BOGUS"])), async {
        let request = peer.recv_request().await;
        peer.send(&Response::request_error(request.callback_idx, "ERR unknown command"))
            .await;
    });
    let err = result.unwrap_err();
    assert!(err.is_recoverable());
    assert!(matches!(err, ClientError::Request(msg) if msg == "ERR unknown command"));
    assert_eq!(conn.state(), LifecycleState::Ready);

    let (value, ()) = tokio::join!(conn.send(Command::custom(["PING"])), async {
        let request = peer.recv_request().await;
        peer.send(&Response::ok(request.callback_idx)).await;
    });
    assert_eq!(value.unwrap(), Value::Okay);
}

#[tokio::test]
async fn peer_close_fails_pending_request() {
    let (conn, mut peer) = connected(ClientConfig::default()).await;

    let (result, ()) = tokio::join!(conn.send(Command::custom(["GET", "a"])), async move {
        peer.recv_request().await;
        drop(peer);
    });
    let err = result.unwrap_err();
    assert!(err.is_closed(), "{err}");
    assert_eq!(conn.state(), LifecycleState::Closed);
}

#[tokio::test]
async fn closing_error_fans_out_to_every_pending_request() {
    let (conn, mut peer) = connected(ClientConfig::default()).await;

    let requests = (0..5).map(|_| conn.send(Command::custom(["BLPOP", "q", "0"])));
    let (results, ()) = tokio::join!(join_all(requests), async {
        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(peer.recv_request().await.callback_idx);
        }
        peer.send(&Response::closing_error(ids[2], "peer shutting down"))
            .await;
    });

    for result in results {
        let err = result.unwrap_err();
        assert!(err.is_closed(), "{err}");
    }
    assert_eq!(conn.state(), LifecycleState::Closed);
    assert_eq!(conn.in_flight(), 0);
    assert_eq!(conn.closed_reason().as_deref(), Some("peer shutting down"));
}

#[tokio::test]
async fn closed_connection_fails_fast_without_io() {
    let (conn, mut peer) = connected(ClientConfig::default()).await;

    let (result, ()) = tokio::join!(conn.send(Command::custom(["GET", "a"])), async {
        let request = peer.recv_request().await;
        peer.send(&Response::closing_error(request.callback_idx, "gone"))
            .await;
    });
    assert!(result.unwrap_err().is_closed());

    let writes = conn.physical_writes();
    for _ in 0..3 {
        let err = conn.send(Command::custom(["PING"])).await.unwrap_err();
        assert!(matches!(err, ClientError::Closed(reason) if reason == "gone"));
    }
    assert_eq!(conn.physical_writes(), writes);
}

#[tokio::test]
async fn unknown_correlation_id_closes_connection() {
    let (conn, mut peer) = connected(ClientConfig::default()).await;

    let (result, ()) = tokio::join!(conn.send(Command::custom(["GET", "a"])), async {
        let request = peer.recv_request().await;
        peer.send(&Response::ok(request.callback_idx + 100)).await;
    });
    assert!(result.unwrap_err().is_closed());
    assert_eq!(conn.state(), LifecycleState::Closed);
}

#[tokio::test]
async fn malformed_response_closes_connection() {
    let (conn, mut peer) = connected(ClientConfig::default()).await;

    let (result, ()) = tokio::join!(conn.send(Command::custom(["GET", "a"])), async {
        peer.recv_request().await;
        peer.send_raw(&b"{not json"[..]).await;
    });
    assert!(result.unwrap_err().is_closed());
    assert_eq!(conn.state(), LifecycleState::Closed);
}

#[tokio::test]
async fn explicit_close_fails_pending_and_is_idempotent() {
    let (conn, mut peer) = connected(ClientConfig::default()).await;

    let (result, ()) = tokio::join!(conn.send(Command::custom(["BLPOP", "q", "0"])), async {
        peer.recv_request().await;
        conn.close().await.unwrap();
    });
    assert!(result.unwrap_err().is_closed());
    assert_eq!(conn.state(), LifecycleState::Closed);
    conn.close().await.unwrap();

    // The write side was shut down.
    assert!(peer.recv_frame().await.is_none());
}

/// Larger than any socket buffer, so the write stalls on a peer that never reads.
fn oversized_set() -> Command {
    Command::custom(["SET".to_string(), "k".to_string(), "x".repeat(8 * 1024 * 1024)])
}

#[tokio::test]
async fn close_interrupts_write_stalled_on_peer() {
    let (conn, _peer) = connected(ClientConfig::default()).await;

    let closer = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(conn.physical_writes(), 1, "only the handshake went out");
        tokio::time::timeout(Duration::from_secs(2), conn.close()).await
    };
    let (result, closed) = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(conn.send(oversized_set()), closer)
    })
    .await
    .expect("stalled write should be interrupted by close");

    closed
        .expect("close should not wait for the stalled write")
        .unwrap();
    assert!(result.unwrap_err().is_closed());
    assert_eq!(conn.state(), LifecycleState::Closed);
    assert_eq!(
        conn.closed_reason().as_deref(),
        Some("connection closed by client")
    );
}

#[tokio::test]
async fn request_dropped_mid_write_closes_connection() {
    let (conn, _peer) = connected(ClientConfig::default()).await;

    let abandoned =
        tokio::time::timeout(Duration::from_millis(200), conn.send(oversized_set())).await;
    assert!(abandoned.is_err(), "write should still be stalled");
    assert_eq!(conn.state(), LifecycleState::Closed);

    let writes = conn.physical_writes();
    let err = conn.send(Command::custom(["PING"])).await.unwrap_err();
    assert!(
        matches!(&err, ClientError::Closed(reason) if reason == "request dropped during a physical write"),
        "{err}"
    );
    assert_eq!(conn.physical_writes(), writes);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_senders_coalesce_writes() {
    const SENDERS: usize = 64;
    let (conn, mut peer) = connected(ClientConfig::default()).await;
    let conn = std::sync::Arc::new(conn);
    let writes_before = conn.physical_writes();

    let mut tasks = Vec::new();
    for i in 0..SENDERS {
        let conn = std::sync::Arc::clone(&conn);
        tasks.push(tokio::spawn(async move {
            conn.send(Command::custom(["ECHO".to_string(), i.to_string()]))
                .await
        }));
    }

    let mut ids = Vec::new();
    for _ in 0..SENDERS {
        let request = peer.recv_request().await;
        ids.push(request.callback_idx);
        let RequestBody::SingleCommand(command) = request.command else {
            panic!("expected a single command");
        };
        peer.send(&Response::value(
            request.callback_idx,
            Value::String(command.args[1].clone()),
        ))
        .await;
    }

    for (i, task) in tasks.into_iter().enumerate() {
        let value = task.await.unwrap().unwrap();
        assert_eq!(value, Value::String(i.to_string()));
    }
    let writes = conn.physical_writes() - writes_before;
    assert!(writes >= 1 && writes <= SENDERS as u64, "writes = {writes}");
}

#[tokio::test]
async fn handshake_rejected_by_value() {
    let (client_io, peer_io) = IpcStream::pair().unwrap();
    let mut peer = ScriptedPeer::new(peer_io);
    let config = ClientConfig::default();

    let (conn, ()) = tokio::join!(
        Connection::connect_stream(client_io, &config),
        async {
            peer.recv_connection_request().await;
            peer.send(&Response::ok(kvmux_client::HANDSHAKE_ID)).await;
        }
    );
    assert!(matches!(conn.unwrap_err(), ClientError::HandshakeFailed(_)));
}

#[tokio::test]
async fn handshake_rejected_by_error() {
    let (client_io, peer_io) = IpcStream::pair().unwrap();
    let mut peer = ScriptedPeer::new(peer_io);
    let config = ClientConfig::default();

    let (conn, ()) = tokio::join!(
        Connection::connect_stream(client_io, &config),
        async {
            peer.recv_connection_request().await;
            peer.send(&Response::request_error(
                kvmux_client::HANDSHAKE_ID,
                "NOAUTH authentication required",
            ))
            .await;
        }
    );
    let err = conn.unwrap_err();
    assert!(
        matches!(&err, ClientError::HandshakeFailed(msg) if msg.contains("NOAUTH")),
        "{err}"
    );
}

#[tokio::test]
async fn silent_peer_times_out_creation() {
    let (client_io, _peer_io) = IpcStream::pair().unwrap();
    let config = ClientConfig {
        client_creation_timeout: Duration::from_millis(50),
        ..ClientConfig::default()
    };
    let err = Connection::connect_stream(client_io, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Timeout(_)));
}

#[tokio::test]
async fn connect_through_socket_path() {
    let (dir, path) = temp_socket_path("connect");
    let listener = UnixDomainSocket::bind(&path).unwrap();

    let server = tokio::spawn(async move {
        let mut peer = ScriptedPeer::new(listener.accept().await.unwrap());
        peer.accept_handshake().await;
        let request = peer.recv_request().await;
        peer.send(&Response::value(request.callback_idx, Value::Int(42)))
            .await;
        listener
    });

    let client = Client::connect_with(&StaticEndpoint::new(&path), &ClientConfig::default())
        .await
        .unwrap();
    assert_eq!(client.incr("n").await.unwrap(), Value::Int(42));
    assert!(client.executor().peer_credentials().is_some());
    client.close().await.unwrap();
    assert_eq!(client.state(), LifecycleState::Closed);

    drop(server.await.unwrap());
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn bootstrap_failure_produces_no_connection() {
    let bootstrap =
        bootstrap_fn(|| async { Err(TransportError::Bootstrap("peer did not start".to_string())) });
    let err = Client::connect_with(&bootstrap, &ClientConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Transport(TransportError::Bootstrap(_))
    ));
}

#[tokio::test]
async fn missing_socket_is_a_transport_error() {
    let (dir, path) = temp_socket_path("missing");
    let err = Client::connect(&path).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Transport(TransportError::Connect { .. })
    ));
    let _ = std::fs::remove_dir_all(&dir);
}
