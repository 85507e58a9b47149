//! Sparse state-action value table and its persisted document form.

use crate::error::{QLearnError, Result};
use moodtune_core::{enumerate_actions, RecommendationAction, RecommendationState, TableStats};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Format version written by this crate. Newer documents are read best-effort.
pub const TABLE_FORMAT_VERSION: u32 = 1;

const KEY_SEPARATOR: &str = "::";

/// Canonical `{state}::{action}` key.
#[must_use]
pub fn entry_key(state: &RecommendationState, action: &RecommendationAction) -> String {
    format!("{state}{KEY_SEPARATOR}{action}")
}

pub fn parse_entry_key(key: &str) -> Result<(RecommendationState, RecommendationAction)> {
    let invalid = || QLearnError::InvalidKey(key.to_string());
    let (state, action) = key.split_once(KEY_SEPARATOR).ok_or_else(invalid)?;
    let state = state.parse().map_err(|_| invalid())?;
    let action = action.parse().map_err(|_| invalid())?;
    Ok((state, action))
}

/// Bookkeeping persisted alongside the values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableMeta {
    /// Exploration rate at the end of the last run.
    pub epsilon: Option<f64>,
    /// Completed training runs.
    pub runs: u64,
    pub updated_at: Option<String>,
}

/// Mapping `(state, action) -> value`; unseen pairs read as `0.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueTable {
    bins: u8,
    values: HashMap<(RecommendationState, RecommendationAction), f64>,
    pub meta: TableMeta,
}

impl ValueTable {
    #[must_use]
    pub fn new(bins: u8) -> Self {
        Self {
            bins,
            values: HashMap::new(),
            meta: TableMeta::default(),
        }
    }

    #[must_use]
    pub fn bins(&self) -> u8 {
        self.bins
    }

    #[must_use]
    pub fn get(&self, state: &RecommendationState, action: &RecommendationAction) -> f64 {
        self.get_or(state, action, 0.0)
    }

    #[must_use]
    pub fn get_or(
        &self,
        state: &RecommendationState,
        action: &RecommendationAction,
        default: f64,
    ) -> f64 {
        self.values
            .get(&(*state, *action))
            .copied()
            .unwrap_or(default)
    }

    /// Non-finite values are ignored so a single bad update cannot poison
    /// every later comparison.
    pub fn set(&mut self, state: RecommendationState, action: RecommendationAction, value: f64) {
        if value.is_finite() {
            self.values.insert((state, action), value);
        }
    }

    #[must_use]
    pub fn contains(&self, state: &RecommendationState, action: &RecommendationAction) -> bool {
        self.values.contains_key(&(*state, *action))
    }

    /// Whether any action has been learned for `state`.
    #[must_use]
    pub fn knows_state(&self, state: &RecommendationState) -> bool {
        enumerate_actions().iter().any(|a| self.contains(state, a))
    }

    /// Highest-valued candidate; on ties the earliest candidate wins.
    #[must_use]
    pub fn best_action(
        &self,
        state: &RecommendationState,
        candidates: &[RecommendationAction],
    ) -> Option<(RecommendationAction, f64)> {
        let mut best: Option<(RecommendationAction, f64)> = None;
        for action in candidates {
            let value = self.get(state, action);
            match best {
                Some((_, v)) if value <= v => {}
                _ => best = Some((*action, value)),
            }
        }
        best
    }

    /// `max_a Q(state, a)` over the full action space.
    #[must_use]
    pub fn max_value(&self, state: &RecommendationState) -> f64 {
        self.best_action(state, &enumerate_actions())
            .map_or(0.0, |(_, v)| v)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn state_count(&self) -> usize {
        self.values
            .keys()
            .map(|(s, _)| s)
            .collect::<HashSet<_>>()
            .len()
    }

    #[must_use]
    pub fn stats(&self, epsilon: f64) -> TableStats {
        TableStats {
            entries: self.len(),
            states: self.state_count(),
            epsilon,
        }
    }

    /// Entries sorted by descending value, then by canonical key.
    #[must_use]
    pub fn top(&self, n: usize) -> Vec<(RecommendationState, RecommendationAction, f64)> {
        let mut entries: Vec<_> = self.values.iter().map(|((s, a), v)| (*s, *a, *v)).collect();
        entries.sort_by(|x, y| {
            y.2.total_cmp(&x.2)
                .then_with(|| x.0.cmp(&y.0))
                .then_with(|| x.1.index().cmp(&y.1.index()))
        });
        entries.truncate(n);
        entries
    }

    #[must_use]
    pub fn to_document(&self) -> TableDocument {
        TableDocument {
            version: TABLE_FORMAT_VERSION,
            bins: self.bins,
            epsilon: self.meta.epsilon,
            runs: self.meta.runs,
            updated_at: self.meta.updated_at.clone(),
            entries: self
                .values
                .iter()
                .map(|((s, a), v)| (entry_key(s, a), Value::from(*v)))
                .collect(),
        }
    }

    /// Rebuilds a table, skipping entries that do not parse.
    ///
    /// Fails only when the document was trained with a different bin count,
    /// since none of its keys would mean the same thing.
    pub fn from_document(doc: TableDocument, expected_bins: u8) -> Result<Self> {
        if doc.bins != expected_bins {
            return Err(QLearnError::BinMismatch {
                expected: expected_bins,
                found: doc.bins,
            });
        }
        if doc.version > TABLE_FORMAT_VERSION {
            warn_event!(
                "value table format v{} is newer than v{}; reading known entries only",
                doc.version,
                TABLE_FORMAT_VERSION
            );
        }
        let mut table = Self::new(expected_bins);
        let mut ignored = 0usize;
        for (key, value) in doc.entries {
            let parsed = parse_entry_key(&key)
                .ok()
                .filter(|(s, _)| s.trait_bins.iter().all(|b| *b < expected_bins));
            match (parsed, value.as_f64()) {
                (Some((state, action)), Some(v)) if v.is_finite() => table.set(state, action, v),
                _ => ignored += 1,
            }
        }
        if ignored > 0 {
            info_event!("ignored {} unrecognised value table entries", ignored);
        }
        table.meta = TableMeta {
            epsilon: doc.epsilon.filter(|e| e.is_finite()),
            runs: doc.runs,
            updated_at: doc.updated_at,
        };
        Ok(table)
    }
}

/// On-disk JSON shape. Unknown fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDocument {
    #[serde(default = "default_version")]
    pub version: u32,
    pub bins: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epsilon: Option<f64>,
    #[serde(default)]
    pub runs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub entries: BTreeMap<String, Value>,
}

fn default_version() -> u32 {
    TABLE_FORMAT_VERSION
}
