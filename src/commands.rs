//! `BBF.*` command surface.
//!
//! Arguments are fully parsed and validated before any key is opened, so a
//! malformed command never reaches the store.
use crate::bbloom::{BucketFilterOps, BucketFilterStats};
use crate::error::{BucketError, Result};
use crate::store::{KeyedStore, OpenMode};
use serde::Serialize;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `BBF.ADD <key> <item>`
    Add { key: Vec<u8>, item: Vec<u8> },
    /// `BBF.EXISTS <key> <item>`
    Exists { key: Vec<u8>, item: Vec<u8> },
    /// `BBF.INCTIME <key>`
    IncTime { key: Vec<u8> },
    /// `BBF.SETTIME <key> <time>`
    SetTime { key: Vec<u8>, time: i64 },
    /// `BBF.CLRTIME <key> <bucket>`
    ClearTime { key: Vec<u8>, bucket: i64 },
    /// `BBF.INFO <key>`
    Info { key: Vec<u8> },
    /// `BBF.DEL <key>`
    Del { key: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
#[serde(untagged)]
pub enum Reply {
    Integer(i64),
    Text(String),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Integer(n) => write!(f, "(integer) {n}"),
            Reply::Text(s) => write!(f, "\"{s}\""),
        }
    }
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Add { .. } => "BBF.ADD",
            Command::Exists { .. } => "BBF.EXISTS",
            Command::IncTime { .. } => "BBF.INCTIME",
            Command::SetTime { .. } => "BBF.SETTIME",
            Command::ClearTime { .. } => "BBF.CLRTIME",
            Command::Info { .. } => "BBF.INFO",
            Command::Del { .. } => "BBF.DEL",
        }
    }

    pub fn key(&self) -> &[u8] {
        match self {
            Command::Add { key, .. }
            | Command::Exists { key, .. }
            | Command::IncTime { key }
            | Command::SetTime { key, .. }
            | Command::ClearTime { key, .. }
            | Command::Info { key }
            | Command::Del { key } => key,
        }
    }

    /// Whether running the command can change stored state.
    pub fn is_write(&self) -> bool {
        !matches!(self, Command::Exists { .. } | Command::Info { .. })
    }

    /// Parses a full argv, command name first. Names are case-insensitive.
    pub fn parse<A: AsRef<[u8]>>(args: &[A]) -> Result<Self> {
        let Some(name) = args.first() else {
            return Err(BucketError::UnknownCommand(String::new()));
        };
        let name = String::from_utf8_lossy(name.as_ref()).to_ascii_uppercase();
        let arg = |i: usize| args[i].as_ref().to_vec();

        let command = match name.as_str() {
            "BBF.ADD" => {
                expect_args(&name, args.len(), 3)?;
                Command::Add {
                    key: arg(1),
                    item: arg(2),
                }
            }
            "BBF.EXISTS" => {
                expect_args(&name, args.len(), 3)?;
                Command::Exists {
                    key: arg(1),
                    item: arg(2),
                }
            }
            "BBF.INCTIME" => {
                expect_args(&name, args.len(), 2)?;
                Command::IncTime { key: arg(1) }
            }
            "BBF.SETTIME" => {
                expect_args(&name, args.len(), 3)?;
                Command::SetTime {
                    key: arg(1),
                    time: parse_integer("time", args[2].as_ref())?,
                }
            }
            "BBF.CLRTIME" => {
                expect_args(&name, args.len(), 3)?;
                Command::ClearTime {
                    key: arg(1),
                    bucket: parse_integer("bucket", args[2].as_ref())?,
                }
            }
            "BBF.INFO" => {
                expect_args(&name, args.len(), 2)?;
                Command::Info { key: arg(1) }
            }
            "BBF.DEL" => {
                expect_args(&name, args.len(), 2)?;
                Command::Del { key: arg(1) }
            }
            _ => return Err(BucketError::UnknownCommand(name)),
        };
        Ok(command)
    }
}

fn expect_args(command: &str, actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(BucketError::ArgumentCountMismatch {
            command: command.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// Strict decimal parse: no whitespace, no trailing garbage.
pub fn parse_integer(argument: &str, raw: &[u8]) -> Result<i64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| BucketError::ParseError {
            argument: argument.to_string(),
            value: String::from_utf8_lossy(raw).into_owned(),
        })
}

/// Runs one command against the store. Absent keys answer `0` for every
/// command except `BBF.ADD`, which creates the filter.
pub fn execute<S: KeyedStore>(store: &S, command: &Command) -> Result<Reply> {
    debug!(command = command.name(), key = %String::from_utf8_lossy(command.key()), "executing");

    match command {
        Command::Add { key, item } => {
            store.open(key, OpenMode::OpenOrCreate, |handle| {
                handle.filter_or_create()?.insert(item);
                Ok(Reply::Integer(1))
            })
        }
        Command::Exists { key, item } => store.open(key, OpenMode::Read, |handle| {
            Ok(Reply::Integer(match handle.filter()? {
                Some(filter) => filter.contains(item) as i64,
                None => 0,
            }))
        }),
        Command::IncTime { key } => store.open(key, OpenMode::Read, |handle| {
            Ok(Reply::Integer(match handle.filter_mut()? {
                Some(filter) => {
                    filter.advance_time();
                    1
                }
                None => 0,
            }))
        }),
        Command::SetTime { key, time } => {
            store.open(key, OpenMode::Read, |handle| {
                Ok(Reply::Integer(match handle.filter_mut()? {
                    Some(filter) => {
                        filter.set_time(*time)?;
                        1
                    }
                    None => 0,
                }))
            })
        }
        Command::ClearTime { key, bucket } => {
            store.open(key, OpenMode::Read, |handle| {
                Ok(Reply::Integer(match handle.filter_mut()? {
                    Some(filter) => {
                        filter.clear_bucket(*bucket)?;
                        1
                    }
                    None => 0,
                }))
            })
        }
        Command::Info { key } => store.open(key, OpenMode::Read, |handle| {
            Ok(match handle.filter()? {
                Some(filter) => Reply::Text(filter.info()),
                None => Reply::Integer(0),
            })
        }),
        Command::Del { key } => Ok(Reply::Integer(store.delete(key)? as i64)),
    }
}

/// Parses and runs an argv in one go.
pub fn execute_args<S: KeyedStore, A: AsRef<[u8]>>(
    store: &S,
    args: &[A],
) -> Result<Reply> {
    let command = Command::parse(args)?;
    execute(store, &command)
}

/// Summary of a stored filter for info surfaces beyond `BBF.INFO`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
pub struct FilterStats {
    pub clock: u64,
    pub table_size: usize,
    pub occupied_slots: usize,
    pub hash_a: u64,
    pub hash_b: u64,
}

pub fn stats<S: KeyedStore>(store: &S, key: &[u8]) -> Result<Option<FilterStats>> {
    store.open(key, OpenMode::Read, |handle| {
        Ok(handle.filter()?.map(|filter| {
            let (hash_a, hash_b) = filter.hash_params();
            FilterStats {
                clock: filter.clock(),
                table_size: filter.table_size(),
                occupied_slots: filter.occupied_slots(),
                hash_a,
                hash_b,
            }
        }))
    })
}
