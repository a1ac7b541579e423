use std::future::Future;
use std::path::Path;

use kvmux_transport::Bootstrap;

use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::{ClientError, Result};
use crate::message::{Command, RequestBody, RequestType, Value};
use crate::state::LifecycleState;
use crate::transaction::Transaction;

/// Something that can carry commands to the peer.
///
/// [`Connection`] is the direct implementation; routing layers can wrap one
/// or more connections and implement this trait themselves.
pub trait Executor: Send + Sync {
    /// Send one command and return the peer's value.
    fn send(&self, command: Command) -> impl Future<Output = Result<Value>> + Send;

    /// Send an atomic batch. `None` means the peer aborted it (a watched key
    /// changed); otherwise one value per command, in order.
    fn send_batch(
        &self,
        commands: Vec<Command>,
    ) -> impl Future<Output = Result<Option<Vec<Value>>>> + Send;
}

impl Executor for Connection {
    async fn send(&self, command: Command) -> Result<Value> {
        self.request(RequestBody::SingleCommand(command)).await
    }

    async fn send_batch(&self, commands: Vec<Command>) -> Result<Option<Vec<Value>>> {
        match self.request(RequestBody::Transaction(commands)).await? {
            Value::Nil => Ok(None),
            Value::Array(values) => Ok(Some(values)),
            other => Err(ClientError::UnexpectedResponse(format!(
                "transaction answered with {other:?}"
            ))),
        }
    }
}

/// High-level client: command helpers over an [`Executor`].
#[derive(Debug)]
pub struct Client<E = Connection> {
    executor: E,
}

impl Client<Connection> {
    /// Connect to a peer listening at `path` with default configuration.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        Self::connect_with_config(path, &ClientConfig::default()).await
    }

    /// Connect to a peer listening at `path`.
    pub async fn connect_with_config(
        path: impl AsRef<Path>,
        config: &ClientConfig,
    ) -> Result<Self> {
        Ok(Self::new(Connection::connect(path, config).await?))
    }

    /// Locate the peer through `bootstrap`, then connect.
    pub async fn connect_with<B: Bootstrap>(bootstrap: &B, config: &ClientConfig) -> Result<Self> {
        Ok(Self::new(Connection::connect_with(bootstrap, config).await?))
    }

    pub async fn close(&self) -> Result<()> {
        self.executor.close().await
    }

    pub fn state(&self) -> LifecycleState {
        self.executor.state()
    }
}

impl<E: Executor> Client<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn into_executor(self) -> E {
        self.executor
    }

    /// Send a command the core knows nothing about, e.g. `["CLIENT", "LIST"]`.
    pub async fn custom_command<I, S>(&self, args: I) -> Result<Value>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.executor.send(Command::custom(args)).await
    }

    pub async fn set(&self, key: impl Into<String>, value: impl Into<String>) -> Result<Value> {
        self.run(RequestType::SetString, [key.into(), value.into()])
            .await
    }

    pub async fn get(&self, key: impl Into<String>) -> Result<Value> {
        self.run(RequestType::GetString, [key.into()]).await
    }

    pub async fn del<I, S>(&self, keys: I) -> Result<Value>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run(RequestType::Del, keys).await
    }

    pub async fn ping(&self) -> Result<Value> {
        self.run(RequestType::Ping, Vec::<String>::new()).await
    }

    pub async fn info<I, S>(&self, sections: I) -> Result<Value>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run(RequestType::Info, sections).await
    }

    pub async fn incr(&self, key: impl Into<String>) -> Result<Value> {
        self.run(RequestType::Incr, [key.into()]).await
    }

    pub async fn incr_by(&self, key: impl Into<String>, amount: i64) -> Result<Value> {
        self.run(RequestType::IncrBy, [key.into(), amount.to_string()])
            .await
    }

    pub async fn mget<I, S>(&self, keys: I) -> Result<Value>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run(RequestType::Mget, keys).await
    }

    pub async fn mset<I, K, V>(&self, pairs: I) -> Result<Value>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let args = pairs
            .into_iter()
            .flat_map(|(k, v)| [k.into(), v.into()]);
        self.run(RequestType::Mset, args).await
    }

    pub async fn select(&self, database_id: u32) -> Result<Value> {
        self.run(RequestType::Select, [database_id.to_string()])
            .await
    }

    pub async fn config_get<I, S>(&self, parameters: I) -> Result<Value>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run(RequestType::ConfigGet, parameters).await
    }

    pub async fn config_set<I, K, V>(&self, pairs: I) -> Result<Value>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let args = pairs
            .into_iter()
            .flat_map(|(k, v)| [k.into(), v.into()]);
        self.run(RequestType::ConfigSet, args).await
    }

    pub async fn client_id(&self) -> Result<Value> {
        self.run(RequestType::ClientId, Vec::<String>::new()).await
    }

    pub async fn client_getname(&self) -> Result<Value> {
        self.run(RequestType::ClientGetName, Vec::<String>::new())
            .await
    }

    /// Execute a transaction. `None` means the peer aborted it.
    pub async fn exec(&self, transaction: &Transaction) -> Result<Option<Vec<Value>>> {
        self.executor
            .send_batch(transaction.commands().to_vec())
            .await
    }

    async fn run<I, S>(&self, request_type: RequestType, args: I) -> Result<Value>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.executor.send(Command::new(request_type, args)).await
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    /// Records every command and answers from a script.
    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<Command>>,
        batch_reply: Option<Vec<Value>>,
    }

    impl Executor for Recorder {
        async fn send(&self, command: Command) -> Result<Value> {
            self.sent.lock().push(command);
            Ok(Value::Okay)
        }

        async fn send_batch(&self, commands: Vec<Command>) -> Result<Option<Vec<Value>>> {
            self.sent.lock().extend(commands);
            Ok(self.batch_reply.clone())
        }
    }

    #[tokio::test]
    async fn helpers_build_typed_commands() {
        let client = Client::new(Recorder::default());
        client.set("k", "v").await.unwrap();
        client.get("k").await.unwrap();
        client.incr_by("n", -3).await.unwrap();
        client.mset([("a", "1"), ("b", "2")]).await.unwrap();
        client.select(2).await.unwrap();
        client.custom_command(["CLIENT", "LIST"]).await.unwrap();

        let sent = client.executor().sent.lock().clone();
        assert_eq!(sent[0], Command::new(RequestType::SetString, ["k", "v"]));
        assert_eq!(sent[1], Command::new(RequestType::GetString, ["k"]));
        assert_eq!(sent[2], Command::new(RequestType::IncrBy, ["n", "-3"]));
        assert_eq!(
            sent[3],
            Command::new(RequestType::Mset, ["a", "1", "b", "2"])
        );
        assert_eq!(sent[4], Command::new(RequestType::Select, ["2"]));
        assert_eq!(
            sent[5],
            Command::new(RequestType::CustomCommand, ["CLIENT", "LIST"])
        );
    }

    #[tokio::test]
    async fn exec_passes_abort_through() {
        let client = Client::new(Recorder::default());
        let mut tx = Transaction::new();
        tx.set("a", "1").get("a");
        assert_eq!(client.exec(&tx).await.unwrap(), None);
        assert_eq!(client.executor().sent.lock().len(), 2);
    }

    #[tokio::test]
    async fn exec_returns_values_in_order() {
        let client = Client::new(Recorder {
            batch_reply: Some(vec![Value::Okay, Value::String("1".into())]),
            ..Recorder::default()
        });
        let mut tx = Transaction::new();
        tx.set("a", "1").get("a");
        assert_eq!(
            client.exec(&tx).await.unwrap(),
            Some(vec![Value::Okay, Value::String("1".into())])
        );
    }
}
