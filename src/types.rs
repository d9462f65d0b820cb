use crate::bbloom::BucketFilterConfig;
use crate::commands::{FilterStats, Reply};
use crate::error::{BucketError, Result};
use crate::hash::HashKind;
use crate::persistence::RedbSnapshotStore;
use crate::store::FilterStore;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CommandRequest {
    /// Full argv, command name first, e.g. `["BBF.ADD", "k", "apple"]`
    pub args: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InsertRequest {
    pub value: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SetTimeRequest {
    pub time: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReplyResponse {
    pub reply: Reply,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    pub stats: FilterStats,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SnapshotResponse {
    pub filters: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

pub struct AppState {
    pub store: FilterStore,
    pub snapshots: Option<RedbSnapshotStore>,
}

#[derive(Builder, Clone, Debug)]
#[builder(pattern = "owned")]
pub struct ServerConfig {
    #[builder(default = "\"127.0.0.1\".to_string()")]
    pub server_host: String,
    #[builder(default = "3000")]
    pub server_port: u16,
    #[builder(default = "crate::bbloom::DEFAULT_TABLE_SIZE")]
    pub table_size: usize,
    #[builder(default = "1")]
    pub hash_a: u64,
    #[builder(default = "0")]
    pub hash_b: u64,
    #[builder(default)]
    pub hash_kind: HashKind,
    #[builder(default = "None")]
    pub snapshot_path: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server_host: std::env::var("SERVER_HOST")
                .unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: env_or("SERVER_PORT", "3000")?,
            table_size: env_or("BBF_TABLE_SIZE", "1000000")?,
            hash_a: env_or("BBF_HASH_A", "1")?,
            hash_b: env_or("BBF_HASH_B", "0")?,
            hash_kind: env_or("BBF_HASH_KIND", "positional")?,
            snapshot_path: std::env::var("BBF_SNAPSHOT_PATH").ok(),
        })
    }

    pub fn filter_config(&self) -> BucketFilterConfig {
        BucketFilterConfig {
            table_size: self.table_size,
            hash_a: self.hash_a,
            hash_b: self.hash_b,
            hash_kind: self.hash_kind,
        }
    }
}

fn env_or<T>(var_name: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let value = std::env::var(var_name).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e: T::Err| BucketError::EnvParseError {
        var_name: var_name.to_string(),
        value: value.clone(),
        error: e.to_string(),
    })
}
