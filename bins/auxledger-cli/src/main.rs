//! auxledger-cli: offline inspection of a receipt ledger database.
//!
//! Opens the RocksDB receipt database read-only and prints store statistics,
//! individual receipts and per-height indexes as JSON, or walks the receipt
//! list to check its integrity.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use auxledger_core::bloom::LogsBloom;
use auxledger_core::receipt_store::ReceiptStore;
use auxledger_node_lib::logging::init_logging;
use auxledger_node_lib::rpc::{ReceiptJson, StatsJson};
use auxledger_node_lib::{NodeConfig, RocksKvStore};

/// Receipt ledger inspection tool.
#[derive(Parser, Debug)]
#[command(name = "auxledger-cli", version, about = "Inspect an auxledger receipt database")]
struct Cli {
    /// Config file (TOML); AUXLEDGER_* environment variables also apply.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Receipt database directory (default: <data_dir>/receipts).
    #[arg(long)]
    db: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to the config value.
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show receipt count, cap, head and tail.
    Stats,
    /// Show the receipt for a transaction hash (hex, optional 0x prefix).
    Receipt { tx_hash: String },
    /// Show the successful transactions and logs bloom recorded at a height.
    Height {
        height: u64,
        /// Report whether this topic (hex) may be in the height's bloom.
        #[arg(long)]
        topic: Option<String>,
    },
    /// Walk the receipt list and check it against the stored metadata.
    Verify,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = NodeConfig::load(cli.config.as_deref()).context("loading configuration")?;

    let level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    init_logging(&level, &cli.log_format).context("initializing logging")?;

    let db_path = cli.db.clone().unwrap_or_else(|| config.db_path());
    debug!(db_path = %db_path.display(), "opening receipt database read-only");
    let db = RocksKvStore::open_read_only(&db_path)
        .with_context(|| format!("opening receipt database at {}", db_path.display()))?;
    let store = ReceiptStore::new(db, config.receipt_store_config());

    match cli.command {
        Commands::Stats => stats(&store),
        Commands::Receipt { tx_hash } => receipt(&store, &tx_hash),
        Commands::Height { height, topic } => height_info(&store, height, topic.as_deref()),
        Commands::Verify => verify(&store),
    }
}

fn stats(store: &ReceiptStore<RocksKvStore>) -> Result<()> {
    let meta = store.metadata().context("reading receipt metadata")?;
    let json = StatsJson {
        size: meta.size,
        max_receipts: store.max_receipts(),
        head: hex::encode(&meta.head),
        tail: hex::encode(&meta.tail),
    };
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

fn receipt(store: &ReceiptStore<RocksKvStore>, tx_hash: &str) -> Result<()> {
    let hash = decode_hex(tx_hash).context("parsing transaction hash")?;
    match store.get_receipt(&hash) {
        Ok(receipt) => {
            println!("{}", serde_json::to_string_pretty(&ReceiptJson::from(&receipt))?);
            Ok(())
        }
        Err(e) if e.is_not_found() => bail!("no receipt for {} (unknown or evicted)", hex::encode(&hash)),
        Err(e) => Err(e).context("reading receipt"),
    }
}

fn height_info(store: &ReceiptStore<RocksKvStore>, height: u64, topic: Option<&str>) -> Result<()> {
    let tx_hashes = store.tx_hash_list(height).context("reading tx hash list")?;
    let bloom = store.bloom_filter(height).context("reading bloom filter")?;

    let mut json = serde_json::json!({
        "height": height,
        "transactions": tx_hashes.iter().map(hex::encode).collect::<Vec<_>>(),
        "logs_bloom": bloom.as_ref().map(hex::encode),
    });

    if let Some(topic) = topic {
        let topic = decode_hex(topic).context("parsing topic")?;
        let may_contain = match &bloom {
            Some(bytes) => LogsBloom::from_bytes(bytes)
                .context("decoding bloom filter")?
                .may_contain(&topic),
            None => false,
        };
        json["topic_may_be_present"] = serde_json::Value::Bool(may_contain);
    }

    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

fn verify(store: &ReceiptStore<RocksKvStore>) -> Result<()> {
    let visited = store.verify_integrity().context("verifying receipt list")?;
    info!(visited, "receipt list verified");
    println!("ok: {visited} receipts linked from head to tail");
    Ok(())
}

fn decode_hex(s: &str) -> Result<Vec<u8>> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.is_empty() {
        bail!("empty hex string");
    }
    hex::decode(digits).with_context(|| format!("invalid hex: {s}"))
}
