//! Instance tag helpers

use std::collections::BTreeMap;

use aws_sdk_ec2::types::Tag;

/// Collapse the SDK's tag list into a key → value map.
///
/// Tags missing a key or a value are skipped. If a key appears more than
/// once, the later entry wins.
pub fn to_map(tags: &[Tag]) -> BTreeMap<String, String> {
    tags.iter()
        .filter_map(|tag| Some((tag.key()?.to_string(), tag.value()?.to_string())))
        .collect()
}

/// Look up a single tag value by key.
pub fn get<'a>(tags: &'a [Tag], key: &str) -> Option<&'a str> {
    tags.iter()
        .rev()
        .find(|tag| tag.key() == Some(key))
        .and_then(|tag| tag.value())
}
