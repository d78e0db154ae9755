//! Harvests VK community members into flat per-group JSON files.
//!
//! Members of each group are listed page by page, their profiles are looked up
//! in batches and flattened, and every profile is extended with the user's
//! friends and subscriptions before the group is written out.

pub mod client;
pub mod enrich;
pub mod error;
pub mod harvest;
pub mod members;
pub mod profiles;
pub mod types;

#[cfg(test)]
mod fake;

pub use client::{ApiTransport, Params, VkClient};
pub use error::ApiError;
pub use harvest::{run_harvest, HarvestConfig, HarvestStats};
pub use types::{FinalProfile, Identifier, RawProfile};
