use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fuzzy_matcher::skim::SkimMatcherV2;
use parking_lot::Mutex;
use tracing::debug;

use crate::bubble::{BubbleId, BubbleRecord};
use crate::util::text_matches;

use super::row::StoredRow;
use super::{BubbleStore, ContentProvider, QueryFilter};

/// Bubble table kept in memory and mirrored to a JSON file after every batch.
pub struct JsonStore {
    path: Option<PathBuf>,
    rows: Mutex<BTreeMap<BubbleId, StoredRow>>,
}

impl JsonStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            rows: Mutex::new(BTreeMap::new()),
        }
    }

    /// Opens `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let rows = if path.exists() {
            load_rows(&path)?
        } else {
            debug!(path = %path.display(), "store file missing; starting empty");
            BTreeMap::new()
        };
        Ok(Self {
            path: Some(path),
            rows: Mutex::new(rows),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }

    /// Applies `rows` to a staged copy of the table, writes it out, and only
    /// then makes it visible. Any failure leaves the store untouched.
    pub(super) fn apply_batch(
        &self,
        rows: Vec<StoredRow>,
        merge: impl Fn(&StoredRow, StoredRow) -> StoredRow,
    ) -> Result<usize> {
        let mut table = self.rows.lock();
        let mut staged = table.clone();
        let written = rows.len();

        for row in rows {
            match staged.remove(&row.id) {
                None => {
                    staged.insert(row.id, row);
                }
                Some(existing) => {
                    debug!(id = row.id, "row exists; updating by id");
                    staged.insert(row.id, merge(&existing, row));
                }
            }
        }

        if let Some(path) = &self.path {
            save_rows(path, &staged)?;
        }
        *table = staged;
        Ok(written)
    }
}

fn load_rows(path: &Path) -> Result<BTreeMap<BubbleId, StoredRow>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read bubble store {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    let rows: Vec<StoredRow> = serde_json::from_str(&raw)
        .with_context(|| format!("invalid bubble store JSON in {}", path.display()))?;
    Ok(rows.into_iter().map(|row| (row.id, row)).collect())
}

fn save_rows(path: &Path, rows: &BTreeMap<BubbleId, StoredRow>) -> Result<()> {
    let rows = rows.values().collect::<Vec<_>>();
    let json = serde_json::to_string_pretty(&rows).context("failed to encode bubble store")?;

    let staging = path.with_extension("tmp");
    fs::write(&staging, json)
        .with_context(|| format!("failed to write bubble store {}", staging.display()))?;
    fs::rename(&staging, path)
        .with_context(|| format!("failed to replace bubble store {}", path.display()))?;
    Ok(())
}

fn row_matches(row: &StoredRow, filter: &QueryFilter, matcher: &SkimMatcherV2) -> bool {
    match filter {
        QueryFilter::Ids(ids) => ids.contains(&row.id),
        QueryFilter::MinPriority(threshold) => row.priority > *threshold,
        QueryFilter::Context(tag) => row.context.contains(tag.as_str()),
        QueryFilter::Search(text) => {
            let text = text.trim();
            text_matches(matcher, &row.title, text)
                || text_matches(matcher, &row.contents, text)
                || text_matches(matcher, &row.context, text)
        }
    }
}

impl BubbleStore for JsonStore {
    fn upsert(&self, records: &[BubbleRecord]) -> Result<usize> {
        let rows = records.iter().map(StoredRow::from_record).collect();
        self.apply_batch(rows, |_, incoming| incoming)
    }

    fn query(&self, filter: &QueryFilter) -> Result<Vec<BubbleRecord>> {
        let matcher = SkimMatcherV2::default();
        let mut hits = self
            .rows
            .lock()
            .values()
            .filter(|row| row_matches(row, filter, &matcher))
            .map(StoredRow::to_record)
            .collect::<Vec<_>>();
        hits.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(hits)
    }
}

impl ContentProvider for JsonStore {
    fn fetch_bubbles(&self, ids: &BTreeSet<BubbleId>) -> Result<Vec<BubbleRecord>> {
        self.query(&QueryFilter::Ids(ids.clone()))
    }

    fn fetch_top_level(&self, min_priority: i32) -> Result<Vec<BubbleRecord>> {
        self.query(&QueryFilter::MinPriority(min_priority))
    }

    fn search(&self, text: &str) -> Result<Vec<BubbleRecord>> {
        self.query(&QueryFilter::Search(text.to_owned()))
    }
}
