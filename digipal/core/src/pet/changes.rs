//! Chat-driven stat changes
//!
//! The backend describes well-being adjustments with a loose vocabulary
//! ("food", "water", "energy", "happiness", ...). [`ChangeApplier`] maps those
//! names onto [`StatKind`]s, applies each recognized change to the
//! [`StatStore`] in order, and keeps an append-only log of what was applied.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::store::StatStore;
use super::StatKind;

/// One adjustment requested by the backend
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatChange {
    /// Stat name, in the backend's vocabulary
    pub attribute: String,
    /// Signed delta
    pub value: f64,
}

impl StatChange {
    /// Create a change
    pub fn new(attribute: impl Into<String>, value: f64) -> Self {
        Self {
            attribute: attribute.into(),
            value,
        }
    }
}

/// Log bucket for an applied change
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogCategory {
    /// Hunger changes
    Food,
    /// Hydration changes
    Water,
    /// Activity changes
    Activity,
    /// Mood changes
    Mood,
}

/// An applied change, kept for diagnostics
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatsLogEntry {
    /// When the change was applied
    pub timestamp: DateTime<Utc>,
    /// Which stat bucket it touched
    pub category: LogCategory,
    /// The requested delta
    pub value: f64,
    /// Free-form note (the attribute name as the backend sent it)
    pub note: Option<String>,
}

/// Map a backend attribute name onto a primary stat
///
/// Matching is case-insensitive and ignores surrounding whitespace. Anything
/// outside the table (including "health") is `None`.
#[must_use]
pub fn normalize_attribute(attribute: &str) -> Option<StatKind> {
    match attribute.trim().to_lowercase().as_str() {
        "food" | "hunger" => Some(StatKind::Hunger),
        "water" | "hydration" => Some(StatKind::Hydration),
        "energy" | "activity" => Some(StatKind::Activity),
        "happiness" | "mood" => Some(StatKind::Mood),
        _ => None,
    }
}

/// Applies backend stat changes to the store
pub struct ChangeApplier {
    store: Arc<StatStore>,
    log: Mutex<Vec<StatsLogEntry>>,
}

impl ChangeApplier {
    /// Create an applier writing to `store`
    pub fn new(store: Arc<StatStore>) -> Self {
        Self {
            store,
            log: Mutex::new(Vec::new()),
        }
    }

    /// Apply `changes` in order
    ///
    /// Each recognized change is clamped as it is applied, so several changes
    /// to the same stat interact through intermediate clamping. Unknown
    /// attributes and non-finite values are skipped. Returns how many changes
    /// were applied.
    pub fn apply(&self, changes: &[StatChange]) -> usize {
        let mut applied = 0;

        for change in changes {
            let Some(stat) = normalize_attribute(&change.attribute) else {
                tracing::debug!(attribute = %change.attribute, "Ignoring unknown stat attribute");
                continue;
            };
            if !change.value.is_finite() {
                tracing::debug!(attribute = %change.attribute, "Ignoring non-finite stat value");
                continue;
            }

            self.store.apply_interaction(stat, change.value);
            self.log.lock().push(StatsLogEntry {
                timestamp: self.store.last_interaction_at(),
                category: stat.category(),
                value: change.value,
                note: Some(change.attribute.clone()),
            });
            applied += 1;
        }

        if applied > 0 {
            tracing::info!(applied, total = changes.len(), "Applied stat changes");
        }
        applied
    }

    /// Copy of the log so far
    pub fn log(&self) -> Vec<StatsLogEntry> {
        self.log.lock().clone()
    }

    /// Number of log entries
    pub fn log_len(&self) -> usize {
        self.log.lock().len()
    }
}
