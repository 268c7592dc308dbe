use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::config::Config;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    Completed,
    InProgress,
    Open,
    Other,
}

impl StatusClass {
    pub fn progress_percent(self) -> u8 {
        match self {
            StatusClass::Completed => 100,
            StatusClass::InProgress => 50,
            StatusClass::Open | StatusClass::Other => 0,
        }
    }
}

/// Synonym table mapping free-text status labels to a class. Backlog spaces
/// run in Japanese or English, so each class carries labels for both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusVocabulary {
    completed: BTreeSet<String>,
    in_progress: BTreeSet<String>,
    open: BTreeSet<String>,
}

impl Default for StatusVocabulary {
    fn default() -> Self {
        Self {
            completed: labels(&["完了", "Closed"]),
            in_progress: labels(&["処理中", "In Progress"]),
            open: labels(&["未対応", "Open"]),
        }
    }
}

impl StatusVocabulary {
    pub fn from_config(cfg: &Config) -> Self {
        let mut vocab = Self::default();
        if let Some(raw) = cfg.get("status.completed") {
            vocab.completed = split_labels(&raw);
        }
        if let Some(raw) = cfg.get("status.in_progress") {
            vocab.in_progress = split_labels(&raw);
        }
        if let Some(raw) = cfg.get("status.open") {
            vocab.open = split_labels(&raw);
        }
        vocab
    }

    pub fn classify(&self, status: &str) -> StatusClass {
        if self.completed.contains(status) {
            StatusClass::Completed
        } else if self.in_progress.contains(status) {
            StatusClass::InProgress
        } else if self.open.contains(status) {
            StatusClass::Open
        } else {
            StatusClass::Other
        }
    }
}

fn labels(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn split_labels(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .collect()
}
