//! Channel selection + verbosity threshold.
//!
//! Selection is kept as the set of channels the user switched off, so a
//! channel nobody announced yet is shown until it is explicitly deselected.
//!
//! Severity and verbosity run in opposite directions: an entry is visible iff
//! its channel is selected and `threshold >= 3 - severity`. Severity 3 passes
//! every threshold, severity 0 only the maximum one, and threshold 0 keeps
//! only the most severe entries.

use std::collections::BTreeSet;

use crate::protocol::packet::MAX_SEVERITY;

/// Whether `severity` passes the verbosity `threshold`.
pub fn severity_visible(threshold: u8, severity: u8) -> bool {
    threshold >= MAX_SEVERITY.saturating_sub(severity)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    deselected: BTreeSet<String>,
    verbosity: u8,
}

impl Default for FilterState {
    fn default() -> Self {
        Self::new(MAX_SEVERITY)
    }
}

impl FilterState {
    pub fn new(verbosity: u8) -> Self {
        Self {
            deselected: BTreeSet::new(),
            verbosity: verbosity.min(MAX_SEVERITY),
        }
    }

    pub fn verbosity(&self) -> u8 {
        self.verbosity
    }

    /// Clamps to 0..=3 and returns the applied value.
    pub fn set_verbosity(&mut self, threshold: u8) -> u8 {
        self.verbosity = threshold.min(MAX_SEVERITY);
        self.verbosity
    }

    pub fn select_all(&mut self) {
        self.deselected.clear();
    }

    /// Replace the deselected set with exactly `channels`.
    pub fn deselect_only<I, S>(&mut self, channels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deselected = channels.into_iter().map(Into::into).collect();
    }

    /// Returns false when the channel was already selected.
    pub fn select(&mut self, channel: &str) -> bool {
        self.deselected.remove(channel)
    }

    /// Returns false when the channel was already deselected.
    pub fn deselect(&mut self, channel: &str) -> bool {
        self.deselected.insert(channel.to_owned())
    }

    pub fn is_selected(&self, channel: &str) -> bool {
        !self.deselected.contains(channel)
    }

    /// Deselected channels in ascending order.
    pub fn deselected(&self) -> impl Iterator<Item = &str> {
        self.deselected.iter().map(String::as_str)
    }

    pub fn shows_severity(&self, severity: u8) -> bool {
        severity_visible(self.verbosity, severity)
    }

    pub fn is_visible(&self, channel: &str, severity: u8) -> bool {
        self.is_selected(channel) && self.shows_severity(severity)
    }
}
