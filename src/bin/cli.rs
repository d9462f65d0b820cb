use bucket_bloom_rs::{
    BucketFilterConfigBuilder, Command, HashKind, RedbSnapshotStore, commands,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the snapshot database
    #[arg(short, long, default_value = "bbf.redb")]
    db_path: PathBuf,

    /// Table size for filters created by this invocation
    #[arg(long, default_value = "1000000")]
    table_size: usize,

    /// Hash multiplier for new filters
    #[arg(long, default_value = "1")]
    hash_a: u64,

    /// Hash offset for new filters
    #[arg(long, default_value = "0")]
    hash_b: u64,

    /// Hash kind for new filters (positional or murmur3)
    #[arg(long, default_value = "positional")]
    hash_kind: HashKind,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert an item, creating the filter if needed
    Add { key: String, item: String },

    /// Check whether an item was seen
    Exists { key: String, item: String },

    /// Advance the filter clock by one
    IncTime { key: String },

    /// Set the filter clock
    SetTime {
        key: String,
        #[arg(allow_hyphen_values = true)]
        time: String,
    },

    /// Clear every slot stamped with a bucket id
    ClearTime {
        key: String,
        #[arg(allow_hyphen_values = true)]
        bucket: String,
    },

    /// Show the current clock of a filter
    Info { key: String },

    /// Show table statistics of a filter
    Stats { key: String },

    /// Delete a filter
    Del { key: String },

    /// Run a raw command, e.g. `exec BBF.ADD k apple`
    Exec {
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

impl Commands {
    fn to_args(&self) -> Option<Vec<String>> {
        let args: Vec<&str> = match self {
            Commands::Add { key, item } => vec!["BBF.ADD", key.as_str(), item.as_str()],
            Commands::Exists { key, item } => {
                vec!["BBF.EXISTS", key.as_str(), item.as_str()]
            }
            Commands::IncTime { key } => vec!["BBF.INCTIME", key.as_str()],
            Commands::SetTime { key, time } => {
                vec!["BBF.SETTIME", key.as_str(), time.as_str()]
            }
            Commands::ClearTime { key, bucket } => {
                vec!["BBF.CLRTIME", key.as_str(), bucket.as_str()]
            }
            Commands::Info { key } => vec!["BBF.INFO", key.as_str()],
            Commands::Del { key } => vec!["BBF.DEL", key.as_str()],
            Commands::Exec { args } => args.iter().map(String::as_str).collect(),
            Commands::Stats { .. } => return None,
        };
        Some(args.into_iter().map(str::to_string).collect())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = BucketFilterConfigBuilder::default()
        .table_size(cli.table_size)
        .hash_a(cli.hash_a)
        .hash_b(cli.hash_b)
        .hash_kind(cli.hash_kind)
        .build()?;

    let snapshots = RedbSnapshotStore::open(&cli.db_path)?;
    let store = snapshots.load(config)?;

    if let Commands::Stats { key } = &cli.command {
        match commands::stats(&store, key.as_bytes())? {
            Some(stats) => {
                println!("Filter '{key}':");
                println!("  Clock: {}", stats.clock);
                println!("  Table size: {}", stats.table_size);
                println!("  Occupied slots: {}", stats.occupied_slots);
                println!("  Hash params: a={}, b={}", stats.hash_a, stats.hash_b);
            }
            None => println!("No filter under key '{key}'"),
        }
        return Ok(());
    }

    let Some(args) = cli.command.to_args() else {
        return Ok(());
    };
    let command = Command::parse(&args)?;
    let reply = commands::execute(&store, &command)?;
    println!("{reply}");

    if command.is_write() {
        snapshots.save(&store)?;
    }

    Ok(())
}
