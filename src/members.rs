use serde_json::Value;
use tracing::{debug, warn};

use crate::client::{ApiTransport, Params};
use crate::error::ApiError;
use crate::types::Identifier;

pub const MEMBERS_METHOD: &str = "groups.getMembers";

/// Largest page `groups.getMembers` serves.
pub const MAX_PAGE_SIZE: usize = 1000;

/// Collects every member id of `group`, one page at a time.
///
/// Starts at offset 0 and advances by `page_size` until a page comes back
/// shorter than requested. A failed page ends pagination; whatever was
/// collected before it is returned.
pub async fn fetch_group_members<T: ApiTransport + ?Sized>(
    transport: &T,
    group: &str,
    page_size: usize,
) -> Vec<Identifier> {
    let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
    let mut members = Vec::new();
    let mut offset = 0usize;

    loop {
        let params: Params = vec![
            ("group_id", group.to_string()),
            ("offset", offset.to_string()),
            ("count", page_size.to_string()),
        ];

        // end of data is judged on the raw page, skipped entries included
        let (fetched, ids) = match transport
            .call(MEMBERS_METHOD, params)
            .await
            .and_then(|payload| page_items(&payload, group))
        {
            Ok(page) => page,
            Err(e) => {
                warn!("Stopping member listing of group {} at offset {}: {}", group, offset, e);
                break;
            }
        };

        members.extend(ids);
        debug!("Group {}: {} members at offset {}", group, fetched, offset);

        if fetched < page_size {
            break;
        }
        offset += page_size;
    }

    members
}

/// Raw item count of a page and the member ids it holds.
fn page_items(payload: &Value, group: &str) -> Result<(usize, Vec<Identifier>), ApiError> {
    let items = payload
        .get("items")
        .and_then(Value::as_array)
        .ok_or(ApiError::MissingField("items"))?;

    let mut ids = Vec::with_capacity(items.len());
    for item in items {
        match Identifier::from_value(item) {
            Some(id) => ids.push(id),
            None => warn!("Skipping malformed member {} of group {}", item, group),
        }
    }
    Ok((items.len(), ids))
}
