use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A user, group or page id as the API hands it out: numeric ids for users,
/// numeric ids or screen names for groups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    Numeric(i64),
    Name(String),
}

impl Identifier {
    /// Reads an id out of an arbitrary JSON value. Strings and integers only.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Identifier::Numeric),
            Value::String(s) => Some(Identifier::Name(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Numeric(n) => write!(f, "{}", n),
            Identifier::Name(s) => f.write_str(s),
        }
    }
}

/// Profile object exactly as `users.get` returned it.
pub type RawProfile = Map<String, Value>;

/// Output row: whitelisted profile fields followed by the two enrichment lists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalProfile {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    pub friends: Vec<String>,
    pub subscriptions: Vec<Identifier>,
}

/// Everything harvested for one group, in member order.
pub type GroupResultSet = Vec<FinalProfile>;
