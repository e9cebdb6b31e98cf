//! Per-item failure isolation.
//!
//! A batch stage (one fetch per location, one normalization per raw file) must never be
//! aborted by a single bad item. [`BatchReport`] collects the outcome of every item: values
//! that succeeded, items that were deliberately skipped, and `(item, error)` pairs for the
//! failures, each logged with the identifier needed to retry it by hand.

use log::{error, warn};
use std::fmt::Display;

#[derive(Debug)]
pub struct BatchReport<T, E> {
    pub succeeded: Vec<T>,
    pub skipped: Vec<(String, String)>,
    pub failed: Vec<(String, E)>,
}

impl<T, E> Default for BatchReport<T, E> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T, E: Display> BatchReport<T, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, id: impl Into<String>, result: Result<T, E>) {
        match result {
            Ok(value) => self.succeeded.push(value),
            Err(err) => {
                let id = id.into();
                error!("{}: {}", id, err);
                self.failed.push((id, err));
            }
        }
    }

    pub fn skip(&mut self, id: impl Into<String>, reason: impl Display) {
        let id = id.into();
        warn!("Skipped {}: {}", id, reason);
        self.skipped.push((id, reason.to_string()));
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.skipped.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_ids(&self) -> impl Iterator<Item = &str> {
        self.failed.iter().map(|(id, _)| id.as_str())
    }
}
