//! Command Parsing and Dispatch
//!
//! Turns request arguments into a [`Command`] and runs it against the store.

use thiserror::Error;

use crate::cache::StringCache;
use crate::protocol::Reply;

/// A parsed client command. Names are matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ping,
    Set { key: String, value: String },
    Get { key: String },
    Del { keys: Vec<String> },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("no command provided")]
    Empty,

    #[error("unknown command '{0}'")]
    Unknown(String),

    #[error("wrong number of arguments for '{0}'")]
    WrongArity(String),
}

impl From<CommandError> for Reply {
    fn from(err: CommandError) -> Self {
        Reply::err(err)
    }
}

impl Command {
    pub fn parse(args: Vec<String>) -> Result<Self, CommandError> {
        let mut args = args.into_iter();
        let name = args.next().ok_or(CommandError::Empty)?.to_uppercase();
        let rest: Vec<String> = args.collect();

        match name.as_str() {
            "PING" => match rest.len() {
                0 => Ok(Command::Ping),
                _ => Err(CommandError::WrongArity(name)),
            },
            "SET" => match <[String; 2]>::try_from(rest) {
                Ok([key, value]) => Ok(Command::Set { key, value }),
                Err(_) => Err(CommandError::WrongArity(name)),
            },
            "GET" => match <[String; 1]>::try_from(rest) {
                Ok([key]) => Ok(Command::Get { key }),
                Err(_) => Err(CommandError::WrongArity(name)),
            },
            "DEL" if rest.is_empty() => Err(CommandError::WrongArity(name)),
            "DEL" => Ok(Command::Del { keys: rest }),
            _ => Err(CommandError::Unknown(name)),
        }
    }

    /// Runs the command. Core errors become `-ERR` replies.
    pub fn execute(self, store: &StringCache) -> Reply {
        match self {
            Command::Ping => Reply::Simple("PONG".to_string()),
            Command::Set { key, value } => match store.put(key, value) {
                Ok(_) => Reply::ok(),
                Err(e) => Reply::err(e),
            },
            Command::Get { key } => Reply::Bulk(store.get(&key)),
            Command::Del { keys } => {
                let removed = keys
                    .iter()
                    .filter(|key| store.remove(key).is_some())
                    .count();
                Reply::Integer(removed as i64)
            }
        }
    }
}

/// Parses and executes one request.
pub fn dispatch(args: Vec<String>, store: &StringCache) -> Reply {
    match Command::parse(args) {
        Ok(command) => command.execute(store),
        Err(e) => e.into(),
    }
}
