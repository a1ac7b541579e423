#![allow(dead_code)]

use std::path::PathBuf;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use kvmux_client::{ClientConfig, Connection, ConnectionRequest, Request, Response};
use kvmux_frame::VarintCodec;
use kvmux_transport::IpcStream;
use tokio_util::codec::Framed;

/// The peer end of a channel, driven step by step from a test.
pub struct ScriptedPeer {
    framed: Framed<IpcStream, VarintCodec>,
}

impl ScriptedPeer {
    pub fn new(stream: IpcStream) -> Self {
        Self {
            framed: Framed::new(stream, VarintCodec::new()),
        }
    }

    pub async fn recv_frame(&mut self) -> Option<Bytes> {
        self.framed
            .next()
            .await
            .map(|frame| frame.expect("peer should decode frame"))
    }

    pub async fn recv_connection_request(&mut self) -> ConnectionRequest {
        let frame = self.recv_frame().await.expect("connection request frame");
        serde_json::from_slice(&frame).expect("connection request should parse")
    }

    pub async fn recv_request(&mut self) -> Request {
        let frame = self.recv_frame().await.expect("request frame");
        serde_json::from_slice(&frame).expect("request should parse")
    }

    pub async fn send(&mut self, response: &Response) {
        let payload = serde_json::to_vec(response).expect("response should serialize");
        self.send_raw(payload).await;
    }

    pub async fn send_raw(&mut self, payload: impl Into<Bytes>) {
        self.framed
            .send(payload.into())
            .await
            .expect("peer should write frame");
    }

    /// Accept the handshake with an empty response.
    pub async fn accept_handshake(&mut self) -> ConnectionRequest {
        let request = self.recv_connection_request().await;
        self.send(&Response::empty(kvmux_client::HANDSHAKE_ID)).await;
        request
    }
}

/// A ready connection and the peer on the other end of it.
pub async fn connected(config: ClientConfig) -> (Connection, ScriptedPeer) {
    let (client_io, peer_io) = IpcStream::pair().expect("socket pair");
    let mut peer = ScriptedPeer::new(peer_io);
    let (conn, _) = tokio::join!(
        Connection::connect_stream(client_io, &config),
        peer.accept_handshake()
    );
    (conn.expect("handshake should succeed"), peer)
}

pub fn temp_socket_path(tag: &str) -> (PathBuf, PathBuf) {
    let dir = std::env::temp_dir().join(format!(
        "kvmux-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    let path = dir.join("peer.sock");
    (dir, path)
}
