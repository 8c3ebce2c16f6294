mod import;
mod json_store;
mod row;

use std::collections::BTreeSet;

use anyhow::Result;

use crate::bubble::{BubbleId, BubbleRecord};

pub use json_store::JsonStore;

/// Source of bubble definitions.
pub trait ContentProvider: Send + Sync {
    fn fetch_bubbles(&self, ids: &BTreeSet<BubbleId>) -> Result<Vec<BubbleRecord>>;
    fn fetch_top_level(&self, min_priority: i32) -> Result<Vec<BubbleRecord>>;
    fn search(&self, text: &str) -> Result<Vec<BubbleRecord>>;
}

/// Persistence for bubbles, positions included.
pub trait BubbleStore: Send + Sync {
    /// Writes the whole batch or nothing. Returns the number of rows written.
    fn upsert(&self, records: &[BubbleRecord]) -> Result<usize>;
    fn query(&self, filter: &QueryFilter) -> Result<Vec<BubbleRecord>>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryFilter {
    Ids(BTreeSet<BubbleId>),
    /// Rows with `priority > threshold`.
    MinPriority(i32),
    /// Rows whose context tags contain this substring.
    Context(String),
    /// Free text over title, contents and context.
    Search(String),
}
