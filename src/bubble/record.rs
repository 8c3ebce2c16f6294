use serde::{Deserialize, Serialize};

use super::BubbleId;

/// Flat, storage-facing shape of a bubble: everything a content provider
/// returns and everything a store needs to round-trip a placed bubble.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BubbleRecord {
    pub id: BubbleId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub contents: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub title_image_url: String,
    #[serde(default)]
    pub contents_image_url: String,
    #[serde(default)]
    pub links: Vec<BubbleId>,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub debug_id: String,
    #[serde(default)]
    pub latitude: i64,
    #[serde(default)]
    pub longitude: i64,
    #[serde(default)]
    pub context: Vec<String>,
    #[serde(default)]
    pub diameter: Option<f32>,
    #[serde(default)]
    pub position: Option<(i32, i32)>,
}

impl BubbleRecord {
    pub fn new(id: BubbleId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_links(mut self, links: impl IntoIterator<Item = BubbleId>) -> Self {
        self.links = links.into_iter().collect();
        self
    }

    pub fn with_position(mut self, x: i32, y: i32) -> Self {
        self.position = Some((x, y));
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}
