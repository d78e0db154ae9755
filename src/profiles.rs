use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::client::{ApiTransport, Params};
use crate::error::ApiError;
use crate::types::{Identifier, RawProfile};

pub const USERS_METHOD: &str = "users.get";

/// Most ids `users.get` accepts per request.
pub const MAX_BATCH_SIZE: usize = 100;

/// Profile fields requested for every member.
pub const DEFAULT_PROFILE_FIELDS: [&str; 9] = [
    "sex",
    "bdate",
    "city",
    "education",
    "career",
    "schools",
    "can_send_friend_request",
    "can_write_private_message",
    "followers_count",
];

// ====== BATCHED LOOKUP ======

/// Looks up `ids` in contiguous batches of at most `batch_size`, one request per
/// batch, and concatenates the returned profiles in batch order.
///
/// A batch that fails contributes nothing and is logged.
pub async fn fetch_profiles<T: ApiTransport + ?Sized>(
    transport: &T,
    ids: &[Identifier],
    fields: &[String],
    batch_size: usize,
) -> Vec<RawProfile> {
    let batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
    let fields = fields.join(",");
    let mut profiles = Vec::with_capacity(ids.len());

    for (index, batch) in ids.chunks(batch_size).enumerate() {
        let params: Params = vec![("user_ids", join_ids(batch)), ("fields", fields.clone())];

        match transport
            .call(USERS_METHOD, params)
            .await
            .and_then(batch_profiles)
        {
            Ok(batch_profiles) => {
                debug!("Batch {}: {} profiles", index, batch_profiles.len());
                profiles.extend(batch_profiles);
            }
            Err(e) => warn!(
                "Dropping profile batch {} ({} ids starting at {}): {}",
                index,
                batch.len(),
                batch[0],
                e
            ),
        }
    }

    profiles
}

fn join_ids(batch: &[Identifier]) -> String {
    batch
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn batch_profiles(payload: Value) -> Result<Vec<RawProfile>, ApiError> {
    Ok(serde_json::from_value(payload)?)
}

// ====== FLATTENING ======

/// Rewrites the nested `city`, `education`, `career` and `schools` structures
/// into top-level scalars. Fields that are absent or not of the nested shape
/// are left alone, so flattening twice changes nothing.
pub fn flatten_profile(profile: &mut RawProfile) -> &mut RawProfile {
    if let Some(Value::Object(city)) = profile.get("city") {
        let id = field_or(city, "id", Value::Null);
        profile.insert("city".into(), id);
    }

    if let Some(Value::Object(education)) = profile.get("education") {
        let university = field_or(education, "university", Value::from(0));
        let faculty = field_or(education, "faculty", Value::from(0));
        profile.insert("university".into(), university);
        profile.insert("faculty".into(), faculty);
        profile.shift_remove("education");
    }

    if let Some(Value::Array(career)) = profile.get("career") {
        if let Some(Value::Object(first)) = career.first() {
            let employer = first
                .get("group_id")
                .cloned()
                .unwrap_or_else(|| field_or(first, "company", Value::from("")));
            let position = field_or(first, "position", Value::from(""));
            profile.insert("career".into(), employer);
            profile.insert("position".into(), position);
        }
    }

    if let Some(Value::Array(schools)) = profile.get("schools") {
        if let Some(Value::Object(first)) = schools.first() {
            let id = field_or(first, "id", Value::Null);
            let class = field_or(first, "class", Value::from(""));
            let year_from = field_or(first, "year_from", Value::from(""));
            profile.insert("schools".into(), id);
            profile.insert("class".into(), class);
            profile.insert("year_from".into(), year_from);
        }
    }

    profile
}

fn field_or(object: &Map<String, Value>, key: &str, default: Value) -> Value {
    object.get(key).cloned().unwrap_or(default)
}
