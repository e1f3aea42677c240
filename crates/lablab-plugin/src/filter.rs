// SPDX-FileCopyrightText: 2026 Lablab Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Include/exclude selection of discovered plugins by id.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::loader::PluginCandidate;

/// Case-insensitive include/exclude filter over plugin ids.
///
/// An empty include list admits everything. Exclusion is applied after
/// inclusion, so an id present in both lists is excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl PluginFilter {
    /// Build a filter from raw option values.
    ///
    /// Each value may itself be a comma-separated list. Entries are trimmed,
    /// blanks are dropped and case-insensitive repeats are collapsed.
    pub fn new<I, E, S, T>(include: I, exclude: E) -> Self
    where
        I: IntoIterator<Item = S>,
        E: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            include: split_ids(include),
            exclude: split_ids(exclude),
        }
    }

    pub fn include(&self) -> &[String] {
        &self.include
    }

    pub fn exclude(&self) -> &[String] {
        &self.exclude
    }

    /// True when the filter admits every id.
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    pub fn allows(&self, id: &str) -> bool {
        let included =
            self.include.is_empty() || self.include.iter().any(|i| i.eq_ignore_ascii_case(id));
        included && !self.exclude.iter().any(|e| e.eq_ignore_ascii_case(id))
    }

    /// Keep the admitted candidates, preserving their order.
    pub fn apply(&self, candidates: Vec<PluginCandidate>) -> Vec<PluginCandidate> {
        if self.is_empty() {
            return candidates;
        }
        candidates
            .into_iter()
            .filter(|candidate| {
                let keep = self.allows(&candidate.manifest.id);
                if !keep {
                    debug!(plugin = %candidate.manifest.id, "plugin filtered out");
                }
                keep
            })
            .collect()
    }
}

fn split_ids<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut ids: Vec<String> = Vec::new();
    for value in values {
        for id in value.as_ref().split(',').map(str::trim) {
            if !id.is_empty() && !ids.iter().any(|seen| seen.eq_ignore_ascii_case(id)) {
                ids.push(id.to_string());
            }
        }
    }
    ids
}
