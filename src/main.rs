use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use vk_group_harvester::client::{DEFAULT_API_BASE, DEFAULT_API_VERSION};
use vk_group_harvester::harvest::DEFAULT_GROUPS;
use vk_group_harvester::profiles::DEFAULT_PROFILE_FIELDS;
use vk_group_harvester::{run_harvest, HarvestConfig, HarvestStats};

#[derive(Parser)]
#[command(name = "vk_group_harvester")]
#[command(about = "VK community member profile harvester")]
struct Cli {
    /// Service or user access token
    #[arg(short = 't', long, env = "VK_ACCESS_TOKEN", hide_env_values = true)]
    access_token: String,

    /// Groups to harvest (comma-separated ids or screen names)
    #[arg(short, long, default_value_t = DEFAULT_GROUPS.join(","))]
    groups: String,

    /// Profile fields requested from users.get (comma-separated)
    #[arg(short, long, default_value_t = DEFAULT_PROFILE_FIELDS.join(","))]
    fields: String,

    /// Output directory for the group<N>.json files
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Members requested per groups.getMembers page
    #[arg(short, long, default_value = "1000")]
    page_size: usize,

    /// Users per users.get request
    #[arg(short, long, default_value = "100")]
    batch_size: usize,

    /// Concurrent friends/subscriptions lookups (1 = sequential)
    #[arg(short, long, default_value = "1")]
    workers: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout_secs: u64,

    /// API version sent with every call
    #[arg(long, default_value = DEFAULT_API_VERSION)]
    api_version: String,

    /// Base URL of the method endpoints
    #[arg(long, default_value = DEFAULT_API_BASE)]
    api_base: String,

    /// Hide progress bars
    #[arg(short, long)]
    quiet: bool,
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

impl Cli {
    fn into_config(self) -> HarvestConfig {
        HarvestConfig {
            groups: split_list(&self.groups),
            access_token: self.access_token,
            api_base: self.api_base,
            api_version: self.api_version,
            fields: split_list(&self.fields),
            output_dir: self.output_dir,
            page_size: self.page_size,
            batch_size: self.batch_size,
            workers: self.workers,
            timeout: Duration::from_secs(self.timeout_secs),
            show_progress: !self.quiet,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = Cli::parse().into_config();
    config.validate()?;

    if config.workers > 1 {
        warn!("Using {} concurrent enrichment workers; VK may throttle", config.workers);
    }
    info!(
        "Page size: {}, batch size: {}, API version: {}",
        config.page_size, config.batch_size, config.api_version
    );

    let client = config.build_client()?;
    let stats = HarvestStats::new();

    let written = run_harvest(&client, &config, &stats).await?;

    stats.log_summary();
    info!("Harvest finished, {} group files in: {}", written.len(), config.output_dir.display());

    Ok(())
}
