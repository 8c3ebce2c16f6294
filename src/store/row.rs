use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::bubble::{BubbleId, BubbleRecord};

pub(super) const UNPLACED: i32 = -1;

/// One persisted bubble. Links and context tags are kept as JSON text and
/// parsed leniently on read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(super) struct StoredRow {
    pub(super) id: BubbleId,
    #[serde(default)]
    pub(super) title: String,
    #[serde(default)]
    pub(super) style: String,
    #[serde(default)]
    pub(super) contents: String,
    #[serde(default)]
    pub(super) priority: i32,
    #[serde(default)]
    pub(super) title_image_url: String,
    #[serde(default)]
    pub(super) links: String,
    #[serde(default, rename = "type")]
    pub(super) kind: String,
    #[serde(default)]
    pub(super) debug_id: String,
    #[serde(default)]
    pub(super) contents_image_url: String,
    #[serde(default)]
    pub(super) latitude: i64,
    #[serde(default)]
    pub(super) longitude: i64,
    #[serde(default = "unplaced")]
    pub(super) position_x: i32,
    #[serde(default = "unplaced")]
    pub(super) position_y: i32,
    #[serde(default)]
    pub(super) context: String,
    #[serde(default)]
    pub(super) diameter: Option<f32>,
}

fn unplaced() -> i32 {
    UNPLACED
}

impl StoredRow {
    pub(super) fn from_record(record: &BubbleRecord) -> Self {
        let (position_x, position_y) = record.position.unwrap_or((UNPLACED, UNPLACED));
        Self {
            id: record.id,
            title: record.title.clone(),
            style: record.style.clone(),
            contents: record.contents.clone(),
            priority: record.priority,
            title_image_url: record.title_image_url.clone(),
            links: Value::from(record.links.clone()).to_string(),
            kind: record.kind.clone(),
            debug_id: record.debug_id.clone(),
            contents_image_url: record.contents_image_url.clone(),
            latitude: record.latitude,
            longitude: record.longitude,
            position_x,
            position_y,
            context: Value::from(record.context.clone()).to_string(),
            diameter: record.diameter,
        }
    }

    pub(super) fn to_record(&self) -> BubbleRecord {
        let placed = self.position_x != UNPLACED && self.position_y != UNPLACED;
        BubbleRecord {
            id: self.id,
            title: self.title.clone(),
            style: self.style.clone(),
            contents: self.contents.clone(),
            priority: self.priority,
            title_image_url: self.title_image_url.clone(),
            contents_image_url: self.contents_image_url.clone(),
            links: parse_links(self.id, &self.links),
            kind: self.kind.clone(),
            debug_id: self.debug_id.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            context: parse_contexts(self.id, &self.context),
            diameter: self.diameter,
            position: placed.then_some((self.position_x, self.position_y)),
        }
    }

    pub(super) fn is_placed(&self) -> bool {
        self.position_x != UNPLACED && self.position_y != UNPLACED
    }
}

fn parse_array(id: BubbleId, column: &str, raw: &str) -> Vec<Value> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => items,
        Ok(other) => {
            warn!(id, column, value = %other, "stored column is not a JSON array; using empty list");
            Vec::new()
        }
        Err(error) => {
            warn!(id, column, %error, "malformed stored column; using empty list");
            Vec::new()
        }
    }
}

pub(super) fn parse_links(id: BubbleId, raw: &str) -> Vec<BubbleId> {
    let mut links = Vec::new();
    for item in parse_array(id, "links", raw) {
        match item.as_i64() {
            Some(link) if !links.contains(&link) => links.push(link),
            Some(_) => {}
            None => warn!(id, value = %item, "skipping non-integer link"),
        }
    }
    links
}

pub(super) fn parse_contexts(id: BubbleId, raw: &str) -> Vec<String> {
    let mut contexts = Vec::new();
    for item in parse_array(id, "context", raw) {
        match item {
            Value::String(tag) if !contexts.contains(&tag) => contexts.push(tag),
            Value::String(_) => {}
            other => warn!(id, value = %other, "skipping non-string context tag"),
        }
    }
    contexts
}
