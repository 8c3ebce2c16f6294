use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::bubble::BubbleId;

use super::JsonStore;
use super::row::{StoredRow, UNPLACED};

const DEFAULT_CONTEXT: &str = "cms";

impl JsonStore {
    pub fn import_cms_file(&self, path: &Path) -> Result<usize> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read CMS document {}", path.display()))?;
        self.import_cms_json(&raw)
            .with_context(|| format!("failed to import {}", path.display()))
    }

    /// Merges a CMS document (`{"add": [...]}`) into the store. Existing rows
    /// are updated by id; a placement already stored for them is kept.
    pub fn import_cms_json(&self, raw: &str) -> Result<usize> {
        let rows = parse_cms_document(raw)?;
        let written = self.apply_batch(rows, |existing, mut incoming| {
            if existing.is_placed() {
                incoming.position_x = existing.position_x;
                incoming.position_y = existing.position_y;
            }
            incoming
        })?;
        info!(rows = written, "imported CMS bubbles");
        Ok(written)
    }
}

fn parse_cms_document(raw: &str) -> Result<Vec<StoredRow>> {
    let parsed: Value = serde_json::from_str(raw).context("invalid CMS JSON")?;
    let entries = parsed
        .get("add")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("CMS JSON has no \"add\" array"))?;

    let mut rows = Vec::with_capacity(entries.len());
    for (position, entry) in entries.iter().enumerate() {
        let Some(object) = entry.as_object() else {
            warn!(position, "skipping CMS entry that is not an object");
            continue;
        };
        let Some(id) = int_field(object, "id") else {
            warn!(position, "skipping CMS entry without a usable id");
            continue;
        };
        rows.push(cms_row(id, object));
    }
    Ok(rows)
}

fn cms_row(id: BubbleId, object: &Map<String, Value>) -> StoredRow {
    let priority = if object.contains_key("priority") {
        int_field(object, "priority").unwrap_or(-1)
    } else if object.contains_key("size") {
        int_field(object, "size").unwrap_or(-1)
    } else {
        0
    };

    StoredRow {
        id,
        title: string_field(object, "title"),
        style: string_field(object, "style"),
        contents: string_field(object, "contents"),
        priority: i32::try_from(priority).unwrap_or(-1),
        title_image_url: string_field(object, "titleImageUrl"),
        links: array_field(object, "links").unwrap_or_else(|| "[]".to_owned()),
        kind: string_field(object, "type"),
        debug_id: string_field(object, "debugId"),
        contents_image_url: string_field(object, "contentsImageUrl"),
        latitude: 0,
        longitude: 0,
        position_x: UNPLACED,
        position_y: UNPLACED,
        context: array_field(object, "context")
            .unwrap_or_else(|| Value::from(vec![DEFAULT_CONTEXT]).to_string()),
        diameter: None,
    }
}

fn int_field(object: &Map<String, Value>, key: &str) -> Option<i64> {
    match object.get(key)? {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> String {
    match object.get(key) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn array_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .filter(|value| value.is_array())
        .map(Value::to_string)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::bubble::BubbleRecord;
    use crate::store::{BubbleStore, ContentProvider, QueryFilter};

    const DOCUMENT: &str = r#"{
        "add": [
            { "id": 1, "title": "Root", "priority": 3, "links": [2, 3] },
            { "id": "2", "title": "Child", "size": 1, "context": ["people"], "debugId": "c-2" },
            { "id": 3, "title": "Leaf", "type": "note" },
            "garbage"
        ]
    }"#;

    #[test]
    fn import_applies_defaults() {
        let store = JsonStore::in_memory();
        assert_eq!(store.import_cms_json(DOCUMENT).unwrap(), 3);

        let rows = store.fetch_bubbles(&BTreeSet::from([1, 2, 3])).unwrap();
        let by_id = |id| rows.iter().find(|r| r.id == id).unwrap();

        assert_eq!(by_id(1).links, vec![2, 3]);
        assert_eq!(by_id(1).context, vec!["cms".to_owned()]);
        assert_eq!(by_id(2).priority, 1);
        assert_eq!(by_id(2).context, vec!["people".to_owned()]);
        assert_eq!(by_id(2).debug_id, "c-2");
        assert_eq!(by_id(3).priority, 0);
        assert_eq!(by_id(3).kind, "note");
        assert!(rows.iter().all(|r| r.position.is_none()));
    }

    #[test]
    fn entries_without_id_are_skipped() {
        let store = JsonStore::in_memory();
        let written = store
            .import_cms_json(
                r#"{ "add": [
                    { "title": "no id" },
                    { "id": "abc", "title": "bad id" },
                    { "id": null, "title": "null id" },
                    { "id": 5, "title": "kept" }
                ] }"#,
            )
            .unwrap();
        assert_eq!(written, 1);
        assert_eq!(store.len(), 1);
        assert!(store.fetch_bubbles(&BTreeSet::from([-1])).unwrap().is_empty());
    }

    #[test]
    fn reimport_keeps_stored_placement() {
        let store = JsonStore::in_memory();
        store
            .upsert(&[BubbleRecord::new(1, "Old").with_position(40, 50)])
            .unwrap();
        store.import_cms_json(DOCUMENT).unwrap();

        let rows = store.query(&QueryFilter::Ids(BTreeSet::from([1]))).unwrap();
        assert_eq!(rows[0].title, "Root");
        assert_eq!(rows[0].position, Some((40, 50)));
    }

    #[test]
    fn import_rejects_documents_without_add() {
        let store = JsonStore::in_memory();
        assert!(store.import_cms_json(r#"{ "remove": [] }"#).is_err());
        assert!(store.import_cms_json("not json").is_err());
        assert!(store.is_empty());
    }
}
