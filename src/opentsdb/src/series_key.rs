use std::collections::HashMap;

use crate::types::TagValue;

/// 0xff cannot occur in valid UTF-8, so it can never be part of a tag key or value
pub const SEPARATOR: u8 = 0xff;

/// Identity of a series within one read call, derived from its tag set only
pub type SeriesKey = Vec<u8>;

/// Encode a tag set as `k1 0xff v1 0xff k2 0xff v2 ...`, pairs sorted by tag key
///
/// Identical tag sets always yield identical keys regardless of map iteration order.
pub fn series_key(tags: &HashMap<String, TagValue>) -> SeriesKey {
    let mut pairs: Vec<(&str, &str)> = tags
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    pairs.sort_unstable();

    let capacity = pairs.iter().map(|(k, v)| k.len() + v.len() + 2).sum();
    let mut key = Vec::with_capacity(capacity);
    for (i, (k, v)) in pairs.into_iter().enumerate() {
        if i > 0 {
            key.push(SEPARATOR);
        }
        key.extend_from_slice(k.as_bytes());
        key.push(SEPARATOR);
        key.extend_from_slice(v.as_bytes());
    }
    key
}
