pub mod comment_service;
pub mod live_service;
pub mod post_service;
pub mod stats_service;
pub mod upload_service;
pub mod user_service;

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Decodes the children of a node, skipping records that do not match
/// the expected shape.
pub(crate) fn parse_children<T: DeserializeOwned>(
    children: impl IntoIterator<Item = (String, Value)>,
) -> Vec<(String, T)> {
    children
        .into_iter()
        .filter_map(|(key, value)| match serde_json::from_value(value) {
            Ok(record) => Some((key, record)),
            Err(e) => {
                tracing::warn!("Skipping malformed record {}: {}", key, e);
                None
            }
        })
        .collect()
}

/// Children of an object node in key order.
pub(crate) fn object_children(node: Option<Value>) -> Vec<(String, Value)> {
    match node {
        Some(Value::Object(map)) => map.into_iter().collect(),
        _ => Vec::new(),
    }
}

pub(crate) fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
