use std::fmt;
use std::time::Duration;

use kvmux_frame::FrameConfig;

use crate::message::{
    AuthenticationInfo, ConnectionRequest, ConnectionRetryStrategy, NodeAddress, ReadFrom, TlsMode,
};

/// Default bound on bootstrap, connect, and handshake together.
pub const DEFAULT_CLIENT_CREATION_TIMEOUT: Duration = Duration::from_millis(2500);

/// Credentials forwarded to the peer in the connection request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: Option<String>,
    /// This is transported as plaintext within local IPC and should not be logged.
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field(
                "password",
                &format_args!("<redacted:{} bytes>", self.password.len()),
            )
            .finish()
    }
}

/// Configuration for one client connection.
///
/// Everything except `client_creation_timeout` and `frame` is forwarded to
/// the peer in the connection request.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Storage nodes the peer should reach. Empty means `localhost:6379`.
    pub addresses: Vec<NodeAddress>,
    pub tls_mode: TlsMode,
    pub cluster_mode_enabled: bool,
    /// Per-request timeout applied by the peer.
    pub request_timeout: Option<Duration>,
    pub read_from: ReadFrom,
    pub retry_strategy: Option<ConnectionRetryStrategy>,
    pub credentials: Option<Credentials>,
    pub database_id: u32,
    pub client_name: Option<String>,
    /// Bound on bootstrap, connect, and handshake together. Default: 2.5 s.
    pub client_creation_timeout: Duration,
    /// Frame limits for the channel.
    pub frame: FrameConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            addresses: Vec::new(),
            tls_mode: TlsMode::default(),
            cluster_mode_enabled: false,
            request_timeout: None,
            read_from: ReadFrom::default(),
            retry_strategy: None,
            credentials: None,
            database_id: 0,
            client_name: None,
            client_creation_timeout: DEFAULT_CLIENT_CREATION_TIMEOUT,
            frame: FrameConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Build the handshake payload sent under the reserved correlation id.
    pub fn to_connection_request(&self) -> ConnectionRequest {
        let addresses = if self.addresses.is_empty() {
            vec![NodeAddress::default()]
        } else {
            self.addresses.clone()
        };
        ConnectionRequest {
            addresses,
            tls_mode: self.tls_mode,
            cluster_mode_enabled: self.cluster_mode_enabled,
            request_timeout_ms: self
                .request_timeout
                .map(|t| u32::try_from(t.as_millis()).unwrap_or(u32::MAX)),
            read_from: self.read_from,
            connection_retry_strategy: self.retry_strategy,
            authentication_info: self.credentials.as_ref().map(|c| AuthenticationInfo {
                username: c.username.clone(),
                password: c.password.clone(),
            }),
            database_id: self.database_id,
            client_name: self.client_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_addresses_default_to_localhost() {
        let req = ClientConfig::default().to_connection_request();
        assert_eq!(req.addresses, vec![NodeAddress::new("localhost", 6379)]);
        assert_eq!(req.request_timeout_ms, None);
        assert!(req.authentication_info.is_none());
    }

    #[test]
    fn overrides_are_forwarded() {
        let config = ClientConfig {
            addresses: vec![NodeAddress::new("10.0.0.5", 7000)],
            cluster_mode_enabled: true,
            request_timeout: Some(Duration::from_millis(250)),
            read_from: ReadFrom::PreferReplica,
            credentials: Some(Credentials {
                username: None,
                password: "secret".to_string(),
            }),
            database_id: 3,
            client_name: Some("worker-1".to_string()),
            ..ClientConfig::default()
        };
        let req = config.to_connection_request();
        assert_eq!(req.addresses[0].port, 7000);
        assert!(req.cluster_mode_enabled);
        assert_eq!(req.request_timeout_ms, Some(250));
        assert_eq!(req.read_from, ReadFrom::PreferReplica);
        assert_eq!(req.authentication_info.unwrap().password, "secret");
        assert_eq!(req.database_id, 3);
        assert_eq!(req.client_name.as_deref(), Some("worker-1"));
    }

    #[test]
    fn debug_redacts_password() {
        let config = ClientConfig {
            credentials: Some(Credentials {
                username: Some("app".to_string()),
                password: "hunter2".to_string(),
            }),
            ..ClientConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn default_creation_timeout() {
        assert_eq!(
            ClientConfig::default().client_creation_timeout,
            Duration::from_millis(2500)
        );
    }
}
