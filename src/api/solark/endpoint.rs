//! Known endpoint shapes of the Sol-Ark Cloud API, in priority order.
//!
//! The upstream API is undocumented and versionless, so every operation has several candidate
//! endpoints. The client tries them in order and the first one that answers wins.

use chrono::NaiveDate;
use reqwest::Url;
use serde_json::{Number, Value};

use crate::{payload, payload::KeyPath, prelude::*};

pub enum Segment {
    Fixed(&'static str),
    AccountId,
}

pub enum Param {
    Fixed(&'static str),

    /// Current local date as `YYYY-MM-DD`.
    Today,
}

pub struct Endpoint {
    pub segments: &'static [Segment],
    pub query: &'static [(&'static str, Param)],
}

impl Endpoint {
    pub fn url(&self, base_url: &Url, account_id: &str, today: NaiveDate) -> Result<Url> {
        let mut url = base_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("`{base_url}` cannot be a base URL"))?
            .pop_if_empty()
            .extend(self.segments.iter().map(|segment| match segment {
                Segment::Fixed(segment) => *segment,
                Segment::AccountId => account_id,
            }));
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in self.query {
                match value {
                    Param::Fixed(value) => pairs.append_pair(key, value),
                    Param::Today => pairs.append_pair(key, &today.format("%Y-%m-%d").to_string()),
                };
            }
        }
        Ok(url)
    }
}

pub const PLANTS: &[Endpoint] = &[
    Endpoint {
        segments: &[Segment::Fixed("api"), Segment::Fixed("v1"), Segment::Fixed("plants")],
        query: &[("page", Param::Fixed("1")), ("limit", Param::Fixed("10"))],
    },
    Endpoint {
        segments: &[
            Segment::Fixed("api"),
            Segment::Fixed("v1"),
            Segment::Fixed("user"),
            Segment::Fixed("plants"),
        ],
        query: &[],
    },
];

pub const FLOW: &[Endpoint] = &[
    Endpoint {
        segments: &[
            Segment::Fixed("api"),
            Segment::Fixed("v1"),
            Segment::Fixed("plant"),
            Segment::Fixed("energy"),
            Segment::AccountId,
            Segment::Fixed("flow"),
        ],
        query: &[],
    },
    Endpoint {
        segments: &[
            Segment::Fixed("api"),
            Segment::Fixed("v1"),
            Segment::Fixed("plant"),
            Segment::AccountId,
            Segment::Fixed("flow"),
        ],
        query: &[],
    },
    Endpoint {
        segments: &[
            Segment::Fixed("api"),
            Segment::Fixed("v1"),
            Segment::Fixed("plants"),
            Segment::AccountId,
            Segment::Fixed("flow"),
        ],
        query: &[],
    },
];

pub const DAY: &[Endpoint] = &[
    Endpoint {
        segments: &[
            Segment::Fixed("api"),
            Segment::Fixed("v1"),
            Segment::Fixed("plant"),
            Segment::Fixed("energy"),
            Segment::AccountId,
            Segment::Fixed("day"),
        ],
        query: &[("date", Param::Today), ("lan", Param::Fixed("en"))],
    },
    Endpoint {
        segments: &[
            Segment::Fixed("api"),
            Segment::Fixed("v1"),
            Segment::Fixed("plant"),
            Segment::AccountId,
            Segment::Fixed("energy"),
            Segment::Fixed("day"),
        ],
        query: &[],
    },
    Endpoint {
        segments: &[
            Segment::Fixed("api"),
            Segment::Fixed("v1"),
            Segment::Fixed("plant"),
            Segment::AccountId,
            Segment::Fixed("realtime"),
        ],
        query: &[],
    },
];

/// Where the plant list may sit in the listing response.
const PLANT_LISTS: &[KeyPath] =
    &[&["data", "infos"], &["data", "plants"], &["data", "list"], &["data"], &["plants"], &["infos"]];

/// Plant identifier field names.
const PLANT_IDS: &[KeyPath] = &[&["id"], &["plantId"], &["plant_id"]];

/// Locate the plant records in a listing response.
pub fn plants(body: &Value) -> Option<&Vec<Value>> {
    body.as_array().or_else(|| payload::find(body, PLANT_LISTS, Value::as_array))
}

/// Extract the plant identifier from a plant record.
pub fn plant_id(plant: &Value) -> Option<String> {
    payload::find(plant, PLANT_IDS, |value| match value {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => integral(id),
        _ => None,
    })
}

/// Render a numeric identifier without the fractional part, so that `4321.0` becomes `4321`.
fn integral(id: &Number) -> Option<String> {
    if let Some(id) = id.as_u64() {
        return Some(id.to_string());
    }
    if let Some(id) = id.as_i64() {
        return Some(id.to_string());
    }
    id.as_f64().filter(|id| id.is_finite() && id.fract().abs() < f64::EPSILON).map(|id| format!("{id:.0}"))
}
