// =============================================================================
// Persistence Window — directional observation ring
// =============================================================================
//
// A bounded ring of recent directional classifications, used to require that
// a signal repeats before it may fire. The confirmation rule is
// ">= 1 of the last 2 observations": a classification seen in either of the
// two most recent recorded evaluations counts as persistent.

use std::collections::VecDeque;

use crate::types::SignalKind;

/// Default ring capacity.
pub const DEFAULT_CAPACITY: usize = 6;

/// Bounded ring buffer of recent directional observations for one symbol.
#[derive(Debug, Clone)]
pub struct PersistenceWindow {
    observations: VecDeque<SignalKind>,
    capacity: usize,
}

impl Default for PersistenceWindow {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl PersistenceWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            observations: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    /// Record a directional classification. Non-directional kinds are not
    /// recorded — an IGNORE between two SHORT BUILDUPs should not break the
    /// buildup's persistence.
    pub fn observe(&mut self, kind: SignalKind) {
        if !kind.is_directional() {
            return;
        }
        self.observations.push_back(kind);
        while self.observations.len() > self.capacity {
            self.observations.pop_front();
        }
    }

    /// Whether `kind` was observed in at least one of the last two recorded
    /// evaluations.
    pub fn recently_observed(&self, kind: SignalKind) -> bool {
        self.observations.iter().rev().take(2).any(|k| *k == kind)
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_window_confirms_nothing() {
        let w = PersistenceWindow::default();
        assert!(!w.recently_observed(SignalKind::ShortBuildup));
    }

    #[test]
    fn one_of_last_two_confirms() {
        let mut w = PersistenceWindow::default();
        w.observe(SignalKind::ShortBuildup);
        w.observe(SignalKind::LongBuildup);
        // ShortBuildup is the second-most-recent — still confirms.
        assert!(w.recently_observed(SignalKind::ShortBuildup));
        assert!(w.recently_observed(SignalKind::LongBuildup));
    }

    #[test]
    fn older_than_two_does_not_confirm() {
        let mut w = PersistenceWindow::default();
        w.observe(SignalKind::ShortBuildup);
        w.observe(SignalKind::LongBuildup);
        w.observe(SignalKind::LongBuildup);
        assert!(!w.recently_observed(SignalKind::ShortBuildup));
    }

    #[test]
    fn non_directional_kinds_are_not_recorded() {
        let mut w = PersistenceWindow::default();
        w.observe(SignalKind::ShortBuildup);
        w.observe(SignalKind::Ignore);
        w.observe(SignalKind::NoTrade);
        assert_eq!(w.len(), 1);
        assert!(w.recently_observed(SignalKind::ShortBuildup));
    }

    #[test]
    fn ring_is_bounded() {
        let mut w = PersistenceWindow::new(6);
        for _ in 0..20 {
            w.observe(SignalKind::LongBuildup);
        }
        assert_eq!(w.len(), 6);
    }
}
