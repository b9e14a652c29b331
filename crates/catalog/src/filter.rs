use std::collections::BTreeSet;

use foundation::TimeWindow;
use serde::{Deserialize, Serialize};

use crate::signal::Signal;
use crate::taxonomy::Category;

/// Host-side filter selection, applied before aggregation.
///
/// An empty category set means "all categories". Category matching is
/// composite-aware: a signal matches if any category it implies is selected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SignalFilter {
    pub categories: BTreeSet<Category>,
    /// Case-insensitive substring of the disease name or title.
    pub disease_text: Option<String>,
    pub window: TimeWindow,
}

impl SignalFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn category(category: Category) -> Self {
        Self {
            categories: BTreeSet::from([category]),
            ..Self::default()
        }
    }

    pub fn with_disease_text(mut self, text: impl Into<String>) -> Self {
        self.disease_text = Some(text.into());
        self
    }

    pub fn is_unfiltered(&self) -> bool {
        self.categories.is_empty()
            && self.disease_text.as_deref().is_none_or(|t| t.trim().is_empty())
            && self.window == TimeWindow::forever()
    }

    pub fn matches(&self, signal: &Signal) -> bool {
        if !self.categories.is_empty()
            && !signal.categories.iter().any(|c| self.categories.contains(c))
        {
            return false;
        }

        if let Some(text) = self.disease_text.as_deref() {
            let needle = text.trim().to_lowercase();
            if !needle.is_empty() {
                let in_disease = signal.disease.to_lowercase().contains(&needle);
                let in_title = signal
                    .title
                    .as_deref()
                    .is_some_and(|t| t.to_lowercase().contains(&needle));
                if !in_disease && !in_title {
                    return false;
                }
            }
        }

        self.window.contains(signal.timestamp)
    }

    /// Matching signals, in input order.
    pub fn apply<'a>(&self, signals: &'a [Signal]) -> Vec<&'a Signal> {
        signals.iter().filter(|s| self.matches(s)).collect()
    }
}
