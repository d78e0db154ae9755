use serde_json::Value;
use tracing::warn;

use crate::client::{ApiTransport, Params};
use crate::error::ApiError;
use crate::types::Identifier;

pub const FRIENDS_METHOD: &str = "friends.get";
pub const SUBSCRIPTIONS_METHOD: &str = "users.getSubscriptions";

/// Friend ids of `user`, as strings. Empty when the lookup fails.
pub async fn fetch_friends<T: ApiTransport + ?Sized>(transport: &T, user: &str) -> Vec<String> {
    let params: Params = vec![("user_id", user.to_string()), ("fields", "id".to_string())];

    match transport
        .call(FRIENDS_METHOD, params)
        .await
        .and_then(|payload| item_ids(&payload, "friends", user))
    {
        Ok(ids) => ids.iter().map(Identifier::to_string).collect(),
        Err(e) => {
            log_failure("friends", user, &e);
            Vec::new()
        }
    }
}

/// Ids of the users and communities `user` follows. Empty when the lookup fails.
pub async fn fetch_subscriptions<T: ApiTransport + ?Sized>(
    transport: &T,
    user: &str,
) -> Vec<Identifier> {
    let params: Params = vec![("user_id", user.to_string()), ("extended", "1".to_string())];

    match transport
        .call(SUBSCRIPTIONS_METHOD, params)
        .await
        .and_then(|payload| item_ids(&payload, "subscriptions", user))
    {
        Ok(ids) => ids,
        Err(e) => {
            log_failure("subscriptions", user, &e);
            Vec::new()
        }
    }
}

fn log_failure(list: &str, user: &str, error: &ApiError) {
    if error.is_api_reported() {
        warn!("VK API refused {} of user {}: {}", list, user, error);
    } else {
        warn!("Could not fetch {} of user {}: {}", list, user, error);
    }
}

/// Ids out of a `{items: [...]}` payload. Items are either bare ids or objects
/// carrying an `id`; anything else is skipped.
fn item_ids(payload: &Value, list: &str, user: &str) -> Result<Vec<Identifier>, ApiError> {
    let items = payload
        .get("items")
        .and_then(Value::as_array)
        .ok_or(ApiError::MissingField("items"))?;

    let mut ids = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let id = match item {
            Value::Object(fields) => fields.get("id").and_then(Identifier::from_value),
            other => Identifier::from_value(other),
        };
        match id {
            Some(id) => ids.push(id),
            None => warn!("Skipping {} item {} of user {} without an id", list, index, user),
        }
    }
    Ok(ids)
}
