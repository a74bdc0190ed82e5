//! Record normalization
//!
//! Graph rows come back in several shapes depending on which query (or which
//! generation of the schema) produced them: `name` vs `id`, `alias` vs
//! `title`, a plain `description` vs the `en_description` pulled from a
//! DESCRIPTION node, tags stored as a single string or as a list. This module
//! folds all of them into a [`Topic`], filling defaults instead of failing.

use super::models::{Topic, SHORT_DESCRIPTION_MAX};
use crate::neo4j::RawRecord;
use serde_json::Value;

const ID_FIELDS: &[&str] = &["id", "name"];
const TITLE_FIELDS: &[&str] = &["title", "alias"];
const DESCRIPTION_FIELDS: &[&str] = &["description", "en_description"];
const PARENT_FIELDS: &[&str] = &["parent", "parent_id"];

/// Map a raw graph record onto the canonical topic shape.
pub fn normalize(raw: &RawRecord) -> Topic {
    let id = first_string(raw, ID_FIELDS).unwrap_or_default();
    let title = first_string(raw, TITLE_FIELDS).unwrap_or_else(|| id.clone());
    let description = first_string(raw, DESCRIPTION_FIELDS).unwrap_or_default();
    let level = raw.get("level").map(coerce_level).unwrap_or(0);
    let parent = first_string(raw, PARENT_FIELDS);
    let tags = raw.get("tags").map(coerce_tags).unwrap_or_default();

    Topic {
        short_description: short_description(&description),
        is_root: level == 0,
        has_children: false,
        id,
        title,
        description,
        level,
        parent,
        tags,
    }
}

/// Re-serialize a topic into a flat record (the inverse direction of `normalize`).
pub fn to_record(topic: &Topic) -> RawRecord {
    match serde_json::to_value(topic) {
        Ok(Value::Object(map)) => map,
        _ => RawRecord::new(),
    }
}

/// Truncate to [`SHORT_DESCRIPTION_MAX`] characters, ellipsis included.
pub fn short_description(description: &str) -> String {
    if description.chars().count() > SHORT_DESCRIPTION_MAX {
        let head: String = description.chars().take(SHORT_DESCRIPTION_MAX - 3).collect();
        format!("{}...", head)
    } else {
        description.to_string()
    }
}

/// First non-empty scalar among `fields`, rendered as a string.
fn first_string(raw: &RawRecord, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|field| raw.get(*field))
        .find_map(scalar_to_string)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn coerce_level(value: &Value) -> u32 {
    match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                u32::try_from(u).unwrap_or(u32::MAX)
            } else if let Some(f) = n.as_f64() {
                if f.is_finite() && f > 0.0 {
                    f as u32
                } else {
                    0
                }
            } else {
                0
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(|l| u32::try_from(l.max(0)).unwrap_or(u32::MAX))
            .unwrap_or(0),
        _ => 0,
    }
}

fn coerce_tags(value: &Value) -> Vec<String> {
    let candidates: Vec<String> = match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items.iter().filter_map(scalar_to_string).collect(),
        _ => Vec::new(),
    };

    let mut tags: Vec<String> = Vec::with_capacity(candidates.len());
    for tag in candidates {
        if !tag.trim().is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}
