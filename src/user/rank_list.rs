//! JSON encoding of a ranking's placement list.
//!
//! Stored rank lists are read leniently: they may come from older writers or
//! manual edits. The rules are
//! - `score`: integers as-is, floats truncated, numeric strings parsed,
//!   anything else (missing, null, bool, garbage) becomes 0;
//! - `song`: same coercion, but a placement whose song cannot be read is dropped;
//! - `tier`: kept only when it is exactly one of S, A, B, C, D;
//! - a value that is not a JSON array decodes to an empty list.

use super::user_models::Placement;
use super::user_models::Tier;
use serde_json::{json, Value};
use tracing::debug;

/// Reads `value` as an integer, returning `None` when it cannot be coerced.
pub fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => coerce_str_i64(s),
        _ => None,
    }
}

/// Parses an integer or a float (truncated) out of `s`, ignoring surrounding whitespace.
pub fn coerce_str_i64(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>().ok().or_else(|| {
        s.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f.trunc() as i64)
    })
}

/// Like [`coerce_i64`], falling back to `default` on missing or malformed values.
pub fn lenient_i64(value: Option<&Value>, default: i64) -> i64 {
    value.and_then(coerce_i64).unwrap_or(default)
}

pub fn encode_rank_list(rank_list: &[Placement]) -> String {
    Value::Array(
        rank_list
            .iter()
            .map(|p| {
                json!({
                    "song": p.song,
                    "tier": p.tier.map(Tier::as_str),
                    "score": p.score,
                })
            })
            .collect(),
    )
    .to_string()
}

pub fn decode_rank_list(raw: &str) -> Vec<Placement> {
    decode_rank_list_with_count(raw).0
}

/// Decodes a stored rank list, also returning how many entries the stored
/// array holds, unreadable ones included.
pub fn decode_rank_list_with_count(raw: &str) -> (Vec<Placement>, usize) {
    let entries = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(entries)) => entries,
        Ok(_) | Err(_) => {
            debug!("Ignoring unreadable rank list: {:.64}", raw);
            return (Vec::new(), 0);
        }
    };

    let placements = entries
        .iter()
        .filter_map(|entry| {
            let song = entry.get("song").and_then(coerce_i64)?;
            Some(Placement {
                song,
                tier: entry.get("tier").and_then(Value::as_str).and_then(Tier::from_name),
                score: lenient_i64(entry.get("score"), 0),
            })
        })
        .collect();
    (placements, entries.len())
}
