use crate::message::{Command, RequestType};

/// An ordered batch of commands executed atomically by the peer.
///
/// ```
/// use kvmux_client::Transaction;
///
/// let mut tx = Transaction::new();
/// tx.set("counter", "1").incr("counter").get("counter");
/// assert_eq!(tx.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    commands: Vec<Command>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an arbitrary command.
    pub fn push(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }

    pub fn custom_command<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Command::custom(args))
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.push(Command::new(
            RequestType::SetString,
            [key.into(), value.into()],
        ))
    }

    pub fn get(&mut self, key: impl Into<String>) -> &mut Self {
        self.push(Command::new(RequestType::GetString, [key.into()]))
    }

    pub fn del<I, S>(&mut self, keys: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Command::new(RequestType::Del, keys))
    }

    pub fn incr(&mut self, key: impl Into<String>) -> &mut Self {
        self.push(Command::new(RequestType::Incr, [key.into()]))
    }

    pub fn incr_by(&mut self, key: impl Into<String>, amount: i64) -> &mut Self {
        self.push(Command::new(
            RequestType::IncrBy,
            [key.into(), amount.to_string()],
        ))
    }

    pub fn ping(&mut self) -> &mut Self {
        self.push(Command::new(RequestType::Ping, Vec::<String>::new()))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }
}
