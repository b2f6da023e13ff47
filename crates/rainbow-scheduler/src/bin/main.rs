//! rainbow-scheduler binary: keyspace search scheduler

use std::path::PathBuf;

use clap::Parser;
use rainbow_core::SearchConfig;
use rainbow_scheduler::{metrics, ServerBuilder};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rainbow-scheduler")]
#[command(about = "Schedule a brute-force keyspace search across WebSocket workers")]
struct Args {
    /// JSON search configuration; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen port
    #[arg(long, default_value = "3000")]
    port: u16,

    /// Symbols to search over, in digit order
    #[arg(long)]
    alphabet: Option<String>,

    #[arg(long)]
    max_string_length: Option<u32>,

    /// Plaintexts per block
    #[arg(long)]
    block_size: Option<u32>,

    /// Blocks per work unit
    #[arg(long)]
    work_size: Option<u32>,

    /// Work units kept in flight per worker
    #[arg(long)]
    messages_buffered: Option<usize>,

    /// Serve Prometheus metrics on /metrics
    #[arg(long)]
    metrics: bool,
}

impl Args {
    fn search_config(&self) -> anyhow::Result<SearchConfig> {
        let mut config = match &self.config {
            Some(path) => SearchConfig::load(path)?,
            None => SearchConfig::default(),
        };
        if let Some(alphabet) = &self.alphabet {
            config = config.with_alphabet(alphabet.clone());
        }
        if let Some(max_string_length) = self.max_string_length {
            config = config.with_max_string_length(max_string_length);
        }
        if let Some(block_size) = self.block_size {
            config = config.with_block_size(block_size);
        }
        if let Some(work_size) = self.work_size {
            config = config.with_work_size(work_size);
        }
        if let Some(messages_buffered) = self.messages_buffered {
            config = config.with_messages_buffered(messages_buffered);
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("rainbow_scheduler=info".parse()?))
        .init();

    let args = Args::parse();
    let config = args.search_config()?;

    tracing::info!(
        alphabet = %config.alphabet,
        max_string_length = config.max_string_length,
        block_size = config.block_size,
        "Loaded search configuration"
    );

    let mut builder = ServerBuilder::new(config).port(args.port);
    if args.metrics {
        builder = builder.metrics(metrics::init_prometheus_recorder()?);
    }
    let server = builder.build()?;

    server
        .run_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
            }
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
