//! Batch-wide tracker for tags missing from the tag catalog.
//!
//! One tracker lives for one batch run. Counters only ever grow and the first
//! example of each tag is kept as-is, so the tracker can be shared across
//! worker threads and flushed to a report once every file has been parsed.

use crate::types::{
    UnknownFieldEntry, UnknownFieldObservation, UnknownFieldsReport, UnknownFieldsSummary,
};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Default number of characters kept from the first example of a tag
pub const DEFAULT_EXAMPLE_PREFIX_CHARS: usize = 200;

#[derive(Debug)]
pub struct UnknownTagTracker {
    example_prefix_chars: usize,
    observations: Mutex<BTreeMap<String, UnknownFieldObservation>>,
}

impl Default for UnknownTagTracker {
    fn default() -> Self {
        Self::new(DEFAULT_EXAMPLE_PREFIX_CHARS)
    }
}

impl UnknownTagTracker {
    pub fn new(example_prefix_chars: usize) -> Self {
        Self {
            example_prefix_chars,
            observations: Mutex::new(BTreeMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, UnknownFieldObservation>> {
        // Counters stay consistent even if a holder panicked mid-update
        self.observations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Count one occurrence of `tag`; `value` is kept only on first sight
    pub fn record(&self, tag: &str, value: &str) {
        let mut observations = self.lock();
        match observations.get_mut(tag) {
            Some(observation) => observation.occurrence_count += 1,
            None => {
                let example: String = value.chars().take(self.example_prefix_chars).collect();
                observations.insert(
                    tag.to_string(),
                    UnknownFieldObservation {
                        occurrence_count: 1,
                        first_example_value: example,
                    },
                );
            }
        }
    }

    pub fn observation(&self, tag: &str) -> Option<UnknownFieldObservation> {
        self.lock().get(tag).cloned()
    }

    pub fn unique_tags(&self) -> usize {
        self.lock().len()
    }

    pub fn total_occurrences(&self) -> u64 {
        self.lock().values().map(|o| o.occurrence_count).sum()
    }

    /// Snapshot of all observations, sorted by tag
    pub fn report(&self) -> UnknownFieldsReport {
        let observations = self.lock();
        let unknown_fields: Vec<UnknownFieldEntry> = observations
            .iter()
            .map(|(tag, observation)| UnknownFieldEntry {
                tag: tag.clone(),
                occurrences: observation.occurrence_count,
                example: observation.first_example_value.clone(),
            })
            .collect();

        UnknownFieldsReport {
            summary: UnknownFieldsSummary {
                total_unique_unknown_fields: unknown_fields.len(),
                total_unknown_field_occurrences: unknown_fields.iter().map(|e| e.occurrences).sum(),
            },
            unknown_fields,
        }
    }
}
