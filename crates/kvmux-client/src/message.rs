//! JSON messages exchanged with the peer, one document per frame.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Host and port of one storage node the peer should connect to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeAddress {
    pub host: String,
    pub port: u16,
}

impl NodeAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for NodeAddress {
    fn default() -> Self {
        Self::new("localhost", 6379)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TlsMode {
    #[default]
    NoTls,
    SecureTls,
    InsecureTls,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReadFrom {
    #[default]
    Primary,
    PreferReplica,
}

/// Reconnect backoff the peer applies between attempts:
/// `factor * exponent_base^attempt` milliseconds, for at most
/// `number_of_retries` attempts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionRetryStrategy {
    pub number_of_retries: u32,
    pub factor: u32,
    pub exponent_base: u32,
}

/// Credentials the peer presents to the storage nodes.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthenticationInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Treated as opaque credential material and redacted in debug output.
    pub password: String,
}

impl fmt::Debug for AuthenticationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationInfo")
            .field("username", &self.username)
            .field(
                "password",
                &format_args!("<redacted:{} bytes>", self.password.len()),
            )
            .finish()
    }
}

/// First frame on every channel, sent under the reserved correlation id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionRequest {
    pub addresses: Vec<NodeAddress>,
    #[serde(default)]
    pub tls_mode: TlsMode,
    #[serde(default)]
    pub cluster_mode_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u32>,
    #[serde(default)]
    pub read_from: ReadFrom,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_retry_strategy: Option<ConnectionRetryStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication_info: Option<AuthenticationInfo>,
    #[serde(default)]
    pub database_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
}

/// Command kinds the peer understands. Anything else goes through
/// [`RequestType::CustomCommand`] with the command name as the first argument.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    CustomCommand,
    GetString,
    SetString,
    Ping,
    Info,
    Del,
    Select,
    ConfigGet,
    ConfigSet,
    ConfigResetStat,
    ConfigRewrite,
    ClientGetName,
    ClientId,
    Incr,
    IncrBy,
    IncrByFloat,
    Decr,
    DecrBy,
    Mget,
    Mset,
    HashSet,
    HashGet,
}

/// One command: its kind and its string arguments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Command {
    pub request_type: RequestType,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Command {
    pub fn new<I, S>(request_type: RequestType, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            request_type,
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// A command the core passes through without knowing its kind.
    pub fn custom<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(RequestType::CustomCommand, args)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestBody {
    SingleCommand(Command),
    Transaction(Vec<Command>),
}

/// Client to peer frame after the handshake.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Request {
    pub callback_idx: u32,
    pub command: RequestBody,
}

/// A value returned by the peer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Nil,
    /// The OK acknowledgement. Every constant response maps to this one value.
    Okay,
    Int(i64),
    String(String),
    Array(Vec<Value>),
}

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<Vec<Value>> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => f.write_str("(nil)"),
            Self::Okay => f.write_str("OK"),
            Self::Int(n) => write!(f, "(integer) {n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Array(items) if items.is_empty() => f.write_str("(empty array)"),
            Self::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\n")?;
                    }
                    write!(f, "{}) {item}", i + 1)?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConstantResponse {
    Ok,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseValue {
    RespValue(Value),
    RequestError(String),
    ClosingError(String),
    ConstantResponse(ConstantResponse),
}

/// Peer to client frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Response {
    pub callback_idx: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ResponseValue>,
}

impl Response {
    pub fn value(callback_idx: u32, value: Value) -> Self {
        Self {
            callback_idx,
            value: Some(ResponseValue::RespValue(value)),
        }
    }

    pub fn ok(callback_idx: u32) -> Self {
        Self {
            callback_idx,
            value: Some(ResponseValue::ConstantResponse(ConstantResponse::Ok)),
        }
    }

    pub fn empty(callback_idx: u32) -> Self {
        Self {
            callback_idx,
            value: None,
        }
    }

    pub fn request_error(callback_idx: u32, message: impl Into<String>) -> Self {
        Self {
            callback_idx,
            value: Some(ResponseValue::RequestError(message.into())),
        }
    }

    pub fn closing_error(callback_idx: u32, message: impl Into<String>) -> Self {
        Self {
            callback_idx,
            value: Some(ResponseValue::ClosingError(message.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_wire_shape() {
        let req = Request {
            callback_idx: 5,
            command: RequestBody::SingleCommand(Command::new(
                RequestType::SetString,
                ["key", "value"],
            )),
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "callback_idx": 5,
                "command": {
                    "single_command": { "request_type": "set_string", "args": ["key", "value"] }
                }
            })
        );
    }

    #[test]
    fn transaction_wire_shape() {
        let req = Request {
            callback_idx: 9,
            command: RequestBody::Transaction(vec![
                Command::custom(["SET", "a", "1"]),
                Command::new(RequestType::GetString, ["a"]),
            ]),
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["command"]["transaction"].as_array().unwrap().len(), 2);
        assert_eq!(
            value["command"]["transaction"][1]["request_type"],
            "get_string"
        );
    }

    #[test]
    fn response_variants_parse() {
        let ok: Response =
            serde_json::from_str(r#"{"callback_idx":5,"value":{"constant_response":"ok"}}"#)
                .unwrap();
        assert_eq!(ok, Response::ok(5));

        let empty: Response = serde_json::from_str(r#"{"callback_idx":7}"#).unwrap();
        assert_eq!(empty.value, None);

        let list: Response = serde_json::from_str(
            r#"{"callback_idx":9,"value":{"resp_value":{"array":["okay",{"string":"1"},"nil"]}}}"#,
        )
        .unwrap();
        assert_eq!(
            list,
            Response::value(
                9,
                Value::Array(vec![Value::Okay, Value::String("1".into()), Value::Nil])
            )
        );

        let err: Response =
            serde_json::from_str(r#"{"callback_idx":3,"value":{"request_error":"WRONGTYPE"}}"#)
                .unwrap();
        assert_eq!(err, Response::request_error(3, "WRONGTYPE"));
    }

    #[test]
    fn connection_request_omits_unset_fields() {
        let req = ConnectionRequest {
            addresses: vec![NodeAddress::default()],
            tls_mode: TlsMode::NoTls,
            cluster_mode_enabled: false,
            request_timeout_ms: None,
            read_from: ReadFrom::Primary,
            connection_retry_strategy: None,
            authentication_info: None,
            database_id: 0,
            client_name: None,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            json!({
                "addresses": [{ "host": "localhost", "port": 6379 }],
                "tls_mode": "no_tls",
                "cluster_mode_enabled": false,
                "read_from": "primary",
                "database_id": 0
            })
        );
    }

    #[test]
    fn password_redacted_in_debug() {
        let auth = AuthenticationInfo {
            username: Some("app".to_string()),
            password: "hunter2".to_string(),
        };
        let debug = format!("{auth:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted:7 bytes>"));
    }

    #[test]
    fn value_display() {
        assert_eq!(Value::Okay.to_string(), "OK");
        assert_eq!(Value::Nil.to_string(), "(nil)");
        assert_eq!(Value::Int(3).to_string(), "(integer) 3");
        assert_eq!(
            Value::Array(vec![Value::String("a".into()), Value::Int(1)]).to_string(),
            "1) \"a\"\n2) (integer) 1"
        );
    }
}
