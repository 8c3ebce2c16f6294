use std::collections::HashMap;

use eframe::egui::Pos2;

use crate::bubble::{Bubble, BubbleId, Movement};

/// Line between the centers of two visible bubbles where `to` is a link of `from`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Connection {
    pub from: BubbleId,
    pub to: BubbleId,
    pub start: Pos2,
    pub end: Pos2,
}

/// The visible subset of the bubble graph, in insertion order. The last
/// bubble inserted is the front-most one for hit-testing and drawing.
#[derive(Clone, Debug, Default)]
pub struct GraphIndex {
    bubbles: Vec<Bubble>,
    slots: HashMap<BubbleId, usize>,
}

impl GraphIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bubbles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bubbles.is_empty()
    }

    pub fn contains(&self, id: BubbleId) -> bool {
        self.slots.contains_key(&id)
    }

    pub fn slot_of(&self, id: BubbleId) -> Option<usize> {
        self.slots.get(&id).copied()
    }

    pub fn get(&self, id: BubbleId) -> Option<&Bubble> {
        self.slot_of(id).map(|slot| &self.bubbles[slot])
    }

    pub fn get_mut(&mut self, id: BubbleId) -> Option<&mut Bubble> {
        self.slot_of(id).map(|slot| &mut self.bubbles[slot])
    }

    pub fn bubbles(&self) -> &[Bubble] {
        &self.bubbles
    }

    pub fn ids(&self) -> Vec<BubbleId> {
        self.bubbles.iter().map(Bubble::id).collect()
    }

    /// Returns `false` (and leaves the index untouched) when the id is already visible.
    pub fn insert(&mut self, bubble: Bubble) -> bool {
        if self.slots.contains_key(&bubble.id()) {
            return false;
        }
        self.slots.insert(bubble.id(), self.bubbles.len());
        self.bubbles.push(bubble);
        true
    }

    pub fn remove(&mut self, id: BubbleId) -> Option<Bubble> {
        let slot = self.slots.remove(&id)?;
        let bubble = self.bubbles.remove(slot);
        for (offset, later) in self.bubbles[slot..].iter().enumerate() {
            self.slots.insert(later.id(), slot + offset);
        }
        Some(bubble)
    }

    pub fn hit_test(&self, point: Pos2) -> Option<BubbleId> {
        self.bubbles
            .iter()
            .rev()
            .find(|bubble| bubble.contains_point(point))
            .map(Bubble::id)
    }

    /// Linked ids of `id`, excluding `id` itself.
    pub fn children_of(&self, id: BubbleId) -> Vec<BubbleId> {
        self.get(id)
            .map(|bubble| {
                bubble
                    .links()
                    .iter()
                    .copied()
                    .filter(|&link| link != id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// True iff every link of `id` other than `id` itself is visible.
    /// An absent parent has nothing visible.
    pub fn has_children_visible(&self, id: BubbleId) -> bool {
        let Some(parent) = self.get(id) else {
            return false;
        };
        parent
            .links()
            .iter()
            .filter(|&&link| link != id)
            .all(|link| self.slots.contains_key(link))
    }

    pub fn connections(&self) -> Vec<Connection> {
        let mut connections = Vec::new();
        for bubble in &self.bubbles {
            for &link in bubble.links() {
                if let Some(target) = self.get(link) {
                    connections.push(Connection {
                        from: bubble.id(),
                        to: link,
                        start: bubble.center(),
                        end: target.center(),
                    });
                }
            }
        }
        connections
    }

    pub fn settle_all(&mut self) {
        for bubble in &mut self.bubbles {
            bubble.movement = Movement::Inert;
        }
    }
}
