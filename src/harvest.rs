use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::client::{ApiTransport, VkClient, DEFAULT_API_BASE, DEFAULT_API_VERSION};
use crate::enrich::{fetch_friends, fetch_subscriptions};
use crate::error::ApiError;
use crate::members::{fetch_group_members, MAX_PAGE_SIZE};
use crate::profiles::{fetch_profiles, flatten_profile, DEFAULT_PROFILE_FIELDS, MAX_BATCH_SIZE};
use crate::types::{FinalProfile, GroupResultSet, Identifier, RawProfile};

pub const DEFAULT_GROUPS: [&str; 5] = [
    "21585301",
    "197213300",
    "rebyata_1580",
    "itbda2022",
    "podslushano2006",
];

/// Keys copied from a flattened profile into the output.
pub const OUTPUT_FIELDS: [&str; 14] = [
    "id",
    "bdate",
    "city",
    "career",
    "university",
    "faculty",
    "schools",
    "sex",
    "position",
    "class",
    "year_from",
    "can_send_friend_request",
    "can_write_private_message",
    "followers_count",
];

// ====== CONFIGURATION ======
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub groups: Vec<String>,
    pub access_token: String,
    pub api_base: String,
    pub api_version: String,
    pub fields: Vec<String>,
    pub output_dir: PathBuf,
    pub page_size: usize,
    pub batch_size: usize,
    /// Concurrent friends/subscriptions lookups per group; 1 keeps the run sequential.
    pub workers: usize,
    pub timeout: Duration,
    pub show_progress: bool,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            groups: DEFAULT_GROUPS.iter().map(|g| g.to_string()).collect(),
            access_token: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            fields: DEFAULT_PROFILE_FIELDS.iter().map(|f| f.to_string()).collect(),
            output_dir: PathBuf::from("."),
            page_size: MAX_PAGE_SIZE,
            batch_size: MAX_BATCH_SIZE,
            workers: 1,
            timeout: Duration::from_secs(30),
            show_progress: true,
        }
    }
}

impl HarvestConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.page_size > 0, "page size must be positive");
        ensure!(self.batch_size > 0, "batch size must be positive");
        ensure!(self.workers > 0, "at least one worker is required");
        ensure!(!self.timeout.is_zero(), "request timeout must be positive");
        Ok(())
    }

    pub fn build_client(&self) -> Result<VkClient, ApiError> {
        VkClient::new(
            &self.api_base,
            &self.access_token,
            &self.api_version,
            self.timeout,
        )
    }

    /// `group<N>.json`, N counted from 1 in group order.
    pub fn output_path(&self, group_index: usize) -> PathBuf {
        self.output_dir.join(format!("group{}.json", group_index + 1))
    }
}

// ====== STATISTICS ======
#[derive(Debug, Default)]
pub struct HarvestStats {
    pub groups_processed: AtomicU64,
    pub members_listed: AtomicU64,
    pub profiles_fetched: AtomicU64,
    pub profiles_skipped: AtomicU64,
    pub files_written: AtomicU64,
}

impl HarvestStats {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn log_summary(&self) {
        info!("Final Harvest Statistics:");
        info!("  Groups processed: {}", self.groups_processed.load(Ordering::Relaxed));
        info!("  Members listed: {}", self.members_listed.load(Ordering::Relaxed));
        info!("  Profiles fetched: {}", self.profiles_fetched.load(Ordering::Relaxed));
        info!("  Profiles skipped: {}", self.profiles_skipped.load(Ordering::Relaxed));
        info!("  Files written: {}", self.files_written.load(Ordering::Relaxed));
    }
}

// ====== PIPELINE ======

/// Copies the whitelisted keys of a flattened profile, keeping their order.
pub fn project_profile(profile: &RawProfile) -> Map<String, Value> {
    profile
        .iter()
        .filter(|(key, _)| OUTPUT_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn progress_bar(config: &HarvestConfig, group: &str, len: usize) -> Result<ProgressBar> {
    if !config.show_progress {
        return Ok(ProgressBar::hidden());
    }
    let progress = ProgressBar::new(len as u64);
    progress.set_style(ProgressStyle::with_template(
        "[{elapsed_precise}] {bar:50.cyan/blue} {pos:>7}/{len:7} users | {msg}",
    )?);
    progress.set_message(format!("Enriching group {}...", group));
    Ok(progress)
}

/// Lists, looks up, flattens and enriches the members of one group.
pub async fn harvest_group<T: ApiTransport + ?Sized>(
    transport: &T,
    group: &str,
    config: &HarvestConfig,
    stats: &HarvestStats,
) -> Result<GroupResultSet> {
    let members = fetch_group_members(transport, group, config.page_size).await;
    stats
        .members_listed
        .fetch_add(members.len() as u64, Ordering::Relaxed);
    info!("Group {}: {} members", group, members.len());

    let profiles = fetch_profiles(transport, &members, &config.fields, config.batch_size).await;
    stats
        .profiles_fetched
        .fetch_add(profiles.len() as u64, Ordering::Relaxed);
    info!("Group {}: {} profiles", group, profiles.len());

    let mut prepared = Vec::with_capacity(profiles.len());
    for mut profile in profiles {
        flatten_profile(&mut profile);
        match profile.get("id").and_then(Identifier::from_value) {
            Some(id) => prepared.push((id, project_profile(&profile))),
            None => {
                stats.profiles_skipped.fetch_add(1, Ordering::Relaxed);
                warn!("Skipping profile without an id in group {}", group);
            }
        }
    }

    let progress = progress_bar(config, group, prepared.len())?;
    let progress_ref = &progress;

    let results: GroupResultSet = stream::iter(prepared)
        .map(|(id, fields)| async move {
            let user = id.to_string();
            let friends = fetch_friends(transport, &user).await;
            let subscriptions = fetch_subscriptions(transport, &user).await;
            progress_ref.inc(1);
            FinalProfile {
                fields,
                friends,
                subscriptions,
            }
        })
        .buffered(config.workers.max(1))
        .collect()
        .await;

    progress.finish_with_message(format!("Group {} done", group));
    stats.groups_processed.fetch_add(1, Ordering::Relaxed);
    Ok(results)
}

/// Overwrites `path` with the group's profiles as one JSON array.
pub fn write_group_file(path: &Path, profiles: &GroupResultSet) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, profiles)?;
    writer.flush()?;
    Ok(())
}

/// Harvests every configured group in order, writing one file per group.
/// Returns the written paths in group order.
pub async fn run_harvest<T: ApiTransport + ?Sized>(
    transport: &T,
    config: &HarvestConfig,
    stats: &HarvestStats,
) -> Result<Vec<PathBuf>> {
    config.validate()?;
    create_dir_all(&config.output_dir)
        .with_context(|| format!("creating {}", config.output_dir.display()))?;
    info!("Output directory: {}", config.output_dir.display());
    info!("Harvesting groups: {:?}", config.groups);

    let mut written = Vec::with_capacity(config.groups.len());
    for (index, group) in config.groups.iter().enumerate() {
        let profiles = harvest_group(transport, group, config, stats).await?;

        let path = config.output_path(index);
        write_group_file(&path, &profiles)?;
        stats.files_written.fetch_add(1, Ordering::Relaxed);
        info!("Wrote {} profiles of group {} to {}", profiles.len(), group, path.display());

        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::{FRIENDS_METHOD, SUBSCRIPTIONS_METHOD};
    use crate::fake::{api_error, param, ScriptedTransport};
    use crate::members::MEMBERS_METHOD;
    use crate::profiles::USERS_METHOD;
    use serde_json::json;

    fn quiet_config(dir: &Path) -> HarvestConfig {
        HarvestConfig {
            groups: vec!["g".to_string()],
            output_dir: dir.to_path_buf(),
            show_progress: false,
            ..HarvestConfig::default()
        }
    }

    #[test]
    fn projection_keeps_whitelist_in_record_order() {
        let profile: RawProfile = match json!({
            "id": 1,
            "first_name": "Ivan",
            "sex": 2,
            "is_closed": false,
            "followers_count": 40,
            "university": 5
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let projected = project_profile(&profile);
        let keys: Vec<&str> = projected.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "sex", "followers_count", "university"]);
    }

    #[test]
    fn output_paths_count_from_one() {
        let config = quiet_config(Path::new("/tmp/out"));
        assert_eq!(config.output_path(0), PathBuf::from("/tmp/out/group1.json"));
        assert_eq!(config.output_path(4), PathBuf::from("/tmp/out/group5.json"));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let config = HarvestConfig {
            workers: 0,
            ..HarvestConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = HarvestConfig {
            timeout: Duration::ZERO,
            ..HarvestConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("timeout"));
        assert!(HarvestConfig::default().validate().is_ok());
    }

    #[tokio::test]
    async fn profiles_without_id_are_skipped() {
        let transport = ScriptedTransport::new(|method, _| match method {
            MEMBERS_METHOD => Ok(json!({"items": [1, 2]})),
            USERS_METHOD => Ok(json!([{"first_name": "nobody"}, {"id": 2, "sex": 1}])),
            _ => Ok(json!({"items": []})),
        });
        let dir = tempfile::tempdir().unwrap();
        let stats = HarvestStats::new();

        let results = harvest_group(&transport, "g", &quiet_config(dir.path()), &stats)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].fields["id"], json!(2));
        assert_eq!(stats.profiles_skipped.load(Ordering::Relaxed), 1);
        assert_eq!(transport.calls_to(FRIENDS_METHOD).len(), 1);
    }

    #[tokio::test]
    async fn concurrent_enrichment_preserves_profile_order() {
        let transport = ScriptedTransport::new(|method, params| match method {
            MEMBERS_METHOD => Ok(json!({"items": (1..=20).collect::<Vec<i64>>()})),
            USERS_METHOD => {
                let ids: Vec<Value> = param(params, "user_ids")
                    .unwrap()
                    .split(',')
                    .map(|id| json!({"id": id.parse::<i64>().unwrap()}))
                    .collect();
                Ok(Value::Array(ids))
            }
            FRIENDS_METHOD => Ok(json!({"items": [param(params, "user_id").unwrap()]})),
            SUBSCRIPTIONS_METHOD => Err(api_error(30, "This profile is private")),
            _ => unreachable!(),
        });
        let dir = tempfile::tempdir().unwrap();
        let config = HarvestConfig {
            workers: 4,
            ..quiet_config(dir.path())
        };

        let results = harvest_group(&transport, "g", &config, &HarvestStats::new())
            .await
            .unwrap();

        let friends: Vec<String> = results.iter().map(|p| p.friends[0].clone()).collect();
        let expected: Vec<String> = (1..=20).map(|n| n.to_string()).collect();
        assert_eq!(friends, expected);
        assert!(results.iter().all(|p| p.subscriptions.is_empty()));
    }

    #[tokio::test]
    async fn writes_one_file_per_group_in_order() {
        let transport = ScriptedTransport::new(|method, params| match method {
            MEMBERS_METHOD => {
                let group = param(params, "group_id").unwrap();
                Ok(json!({"items": [group.len()]}))
            }
            USERS_METHOD => Ok(json!([{"id": param(params, "user_ids").unwrap().parse::<i64>().unwrap()}])),
            _ => Ok(json!({"items": []})),
        });
        let dir = tempfile::tempdir().unwrap();
        let config = HarvestConfig {
            groups: vec!["a".into(), "bbb".into()],
            ..quiet_config(&dir.path().join("nested"))
        };
        let stats = HarvestStats::new();

        let written = run_harvest(&transport, &config, &stats).await.unwrap();

        assert_eq!(written.len(), 2);
        let second = std::fs::read_to_string(&written[1]).unwrap();
        assert_eq!(second, r#"[{"id":3,"friends":[],"subscriptions":[]}]"#);
        assert_eq!(stats.files_written.load(Ordering::Relaxed), 2);
    }
}
