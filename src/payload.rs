//! Defensive lookups in the loosely-structured upstream JSON.
//!
//! The Sol-Ark Cloud API has no published schema: the same quantity shows up under different
//! names, casings, and nesting depths depending on the account and the firmware. Instead of
//! deserializing into fixed structures, the sensors describe every known location of a value
//! as a [`KeyPath`] and let [`extract`] pick the first one that holds a number.

use std::borrow::Cow;

use serde_json::Value;

/// Key names to descend through, outermost first.
pub type KeyPath<'a> = &'a [&'a str];

/// Return the first numeric value reachable via any of the candidate paths, in order.
///
/// A miss is the routine outcome for an unknown payload shape, hence [`None`] rather than an error.
#[must_use]
pub fn extract(payload: &Value, candidates: &[KeyPath<'_>]) -> Option<f64> {
    find(payload, candidates, Value::as_f64)
}

/// Generalization of [`extract`] for any kind of leaf: the first candidate whose value is accepted
/// by `leaf` wins.
pub fn find<'a, T>(
    payload: &'a Value,
    candidates: &[KeyPath<'_>],
    leaf: impl Fn(&'a Value) -> Option<T>,
) -> Option<T> {
    candidates.iter().find_map(|path| resolve(payload, path).and_then(&leaf))
}

/// Descend through the path, matching each key case-insensitively (see [`lookup`]).
#[must_use]
pub fn resolve<'a>(payload: &'a Value, path: KeyPath<'_>) -> Option<&'a Value> {
    path.iter().try_fold(payload, |node, key| lookup(node, key))
}

/// Look the key up in a JSON object, trying the literal, lowercase, uppercase, and capitalized
/// spellings in that order.
///
/// Anything other than an object has no keys, so the lookup misses.
#[must_use]
pub fn lookup<'a>(node: &'a Value, key: &str) -> Option<&'a Value> {
    let Value::Object(object) = node else {
        return None;
    };
    spellings(key).find_map(|spelling| object.get(spelling.as_ref()))
}

/// Strip one optional `data` envelope layer.
#[must_use]
pub fn unwrap_data(payload: &Value) -> &Value {
    payload.get("data").unwrap_or(payload)
}

fn spellings(key: &str) -> impl Iterator<Item = Cow<'_, str>> {
    [
        Cow::Borrowed(key),
        Cow::Owned(key.to_lowercase()),
        Cow::Owned(key.to_uppercase()),
        Cow::Owned(capitalize(key)),
    ]
    .into_iter()
}

/// First character uppercased, the rest lowercased.
fn capitalize(key: &str) -> String {
    let mut chars = key.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
    })
}
