use std::collections::BTreeSet;

use eframe::egui::{Pos2, pos2};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{BubbleError, BubbleId, BubbleRecord};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Movement {
    /// Neither dragged nor pushed.
    #[default]
    Inert,
    /// Held by a pointer.
    Moving,
    /// Displaced by push resolution from another bubble.
    Automatic,
}

/// Fields the engine never interprets; carried for rendering and persistence.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BubbleContent {
    pub title: String,
    pub contents: String,
    pub style: String,
    pub kind: String,
    pub title_image_url: String,
    pub contents_image_url: String,
    pub priority: i32,
    pub debug_id: String,
    pub latitude: i64,
    pub longitude: i64,
    pub contexts: BTreeSet<String>,
}

#[derive(Clone, Debug)]
pub struct Bubble {
    id: BubbleId,
    center: Pos2,
    base_radius: f32,
    zoom: f32,
    links: Vec<BubbleId>,
    placed: bool,
    pub movement: Movement,
    pub moved: f32,
    pub content: BubbleContent,
}

impl PartialEq for Bubble {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Bubble {
    pub fn new(id: BubbleId, radius: f32) -> Result<Self, BubbleError> {
        check_radius(id, radius)?;
        Ok(Self {
            id,
            center: Pos2::ZERO,
            base_radius: radius,
            zoom: 1.0,
            links: Vec::new(),
            placed: false,
            movement: Movement::Inert,
            moved: 0.0,
            content: BubbleContent::default(),
        })
    }

    pub fn with_center(mut self, center: Pos2) -> Self {
        self.place(center);
        self
    }

    pub fn with_links(
        mut self,
        links: impl IntoIterator<Item = BubbleId>,
    ) -> Result<Self, BubbleError> {
        for link in links {
            self.add_link(link)?;
        }
        Ok(self)
    }

    /// Builds a bubble from a provider/store record. Self-links in stored data
    /// are dropped rather than rejected so that one bad row cannot hide a node.
    pub fn from_record(record: &BubbleRecord, default_diameter: f32) -> Result<Self, BubbleError> {
        let diameter = record.diameter.unwrap_or(default_diameter);
        let mut bubble = Self::new(record.id, diameter / 2.0)?;

        for &link in &record.links {
            if link == record.id {
                warn!(id = record.id, "dropping self-referential link from record");
                continue;
            }
            bubble.add_link(link)?;
        }

        if let Some((x, y)) = record.position
            && x >= 0
            && y >= 0
        {
            bubble.place(pos2(x as f32, y as f32));
        }

        bubble.content = BubbleContent {
            title: record.title.clone(),
            contents: record.contents.clone(),
            style: record.style.clone(),
            kind: record.kind.clone(),
            title_image_url: record.title_image_url.clone(),
            contents_image_url: record.contents_image_url.clone(),
            priority: record.priority,
            debug_id: record.debug_id.clone(),
            latitude: record.latitude,
            longitude: record.longitude,
            contexts: record.context.iter().cloned().collect(),
        };
        Ok(bubble)
    }

    pub fn to_record(&self) -> BubbleRecord {
        BubbleRecord {
            id: self.id,
            title: self.content.title.clone(),
            style: self.content.style.clone(),
            contents: self.content.contents.clone(),
            priority: self.content.priority,
            title_image_url: self.content.title_image_url.clone(),
            contents_image_url: self.content.contents_image_url.clone(),
            links: self.links.clone(),
            kind: self.content.kind.clone(),
            debug_id: self.content.debug_id.clone(),
            latitude: self.content.latitude,
            longitude: self.content.longitude,
            context: self.content.contexts.iter().cloned().collect(),
            diameter: Some(self.base_radius * 2.0),
            position: self
                .placed
                .then(|| (self.center.x.round() as i32, self.center.y.round() as i32)),
        }
    }

    pub fn id(&self) -> BubbleId {
        self.id
    }

    pub fn center(&self) -> Pos2 {
        self.center
    }

    /// Whether the bubble has ever been given a position.
    pub fn is_placed(&self) -> bool {
        self.placed
    }

    pub fn radius(&self) -> f32 {
        self.base_radius * self.zoom
    }

    pub fn links(&self) -> &[BubbleId] {
        &self.links
    }

    /// Returns `Ok(false)` when the link was already present.
    pub fn add_link(&mut self, link: BubbleId) -> Result<bool, BubbleError> {
        if link == self.id {
            return Err(BubbleError::SelfLink { id: self.id });
        }
        if self.links.contains(&link) {
            return Ok(false);
        }
        self.links.push(link);
        Ok(true)
    }

    pub fn contains_point(&self, point: Pos2) -> bool {
        self.center.distance(point) < self.radius()
    }

    /// Pointer-driven move; accumulates the travelled distance used for tap detection.
    pub fn drag_to(&mut self, center: Pos2) -> f32 {
        let step = self.center.distance(center);
        self.moved += step;
        self.center = center;
        self.placed = true;
        step
    }

    /// Programmatic placement (loading, auto-placement, push resolution).
    pub fn place(&mut self, center: Pos2) {
        self.center = center;
        self.placed = true;
    }

    pub fn zoom(&mut self, ratio: f32) {
        if ratio.is_finite() && ratio > 0.0 {
            self.zoom = ratio;
        }
    }

    pub fn is_zooming(&self) -> bool {
        (self.zoom - 1.0).abs() > f32::EPSILON
    }

    /// Commits the live zoom into the base radius.
    pub fn end_zoom(&mut self, min_radius: f32, max_radius: f32) {
        self.base_radius = (self.base_radius * self.zoom).clamp(min_radius, max_radius);
        self.zoom = 1.0;
    }
}

fn check_radius(id: BubbleId, radius: f32) -> Result<(), BubbleError> {
    if radius.is_finite() && radius > 0.0 {
        Ok(())
    } else {
        Err(BubbleError::NonPositiveRadius { id, radius })
    }
}
