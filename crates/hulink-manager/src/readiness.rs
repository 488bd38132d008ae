//! Readiness aggregation
//!
//! Folds the states of all managed sub-components into one aggregate and
//! turns aggregate changes into at-most-once owner notifications. The
//! aggregate is recomputed from a full snapshot on every sub-component
//! completion; nothing here is incremental.

use hulink_core::ReadinessState;
use tracing::{error, warn};

/// Fold sub-component states into the aggregate.
///
/// First-match rule, not a severity ranking:
/// 1. every component Ready -> Ready
/// 2. every component Error -> Error
/// 3. any component still SettingUp -> SettingUp
/// 4. otherwise -> Limited
///
/// Rule 3 before rule 4 means one in-flight component holds the whole
/// aggregate in SettingUp no matter how many others already failed. An
/// empty snapshot (no components created yet) is SettingUp.
pub fn aggregate(states: &[ReadinessState]) -> ReadinessState {
    if states.is_empty() {
        return ReadinessState::SettingUp;
    }
    if states.iter().all(|s| *s == ReadinessState::Ready) {
        return ReadinessState::Ready;
    }
    if states.iter().all(|s| *s == ReadinessState::Error) {
        return ReadinessState::Error;
    }
    if states.iter().any(|s| *s == ReadinessState::SettingUp) {
        return ReadinessState::SettingUp;
    }
    ReadinessState::Limited
}

/// Owner-visible consequence of one recomputation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Nothing to report
    None,
    /// First arrival in an operational state; carries Ready or Limited
    Ready(ReadinessState),
    /// Aggregate reached Error; `internal` marks a coordination defect
    /// (missing component handle) rather than ordinary component failure
    Error { info: String, internal: bool },
}

/// Tracks the aggregate across recomputations and enforces the one-shot
/// notification rules: ready fires at most once per manager lifetime,
/// error fires at most once, and once error has fired ready never will.
///
/// Callers serialize access externally (the manager drives this under one
/// mutex), so the struct itself holds plain fields.
#[derive(Debug)]
pub struct ReadinessMonitor {
    aggregate: ReadinessState,
    ready_fired: bool,
    error_fired: bool,
}

impl ReadinessMonitor {
    pub fn new() -> Self {
        Self {
            aggregate: ReadinessState::SettingUp,
            ready_fired: false,
            error_fired: false,
        }
    }

    pub fn aggregate_state(&self) -> ReadinessState {
        self.aggregate
    }

    /// Recompute from a snapshot of component slots.
    ///
    /// A `None` slot means a component handle vanished while the session
    /// is alive. That is not a component failure but a defect in the
    /// coordination layer itself, so the aggregate is forced to Error and
    /// the transition is flagged internal.
    pub fn observe(&mut self, snapshot: &[Option<ReadinessState>]) -> Transition {
        let mut states = Vec::with_capacity(snapshot.len());
        for slot in snapshot {
            match slot {
                Some(state) => states.push(*state),
                None => {
                    error!("sub-component handle missing during recomputation");
                    self.aggregate = ReadinessState::Error;
                    if self.error_fired {
                        return Transition::None;
                    }
                    self.error_fired = true;
                    return Transition::Error {
                        info: "internal error: sub-component handle missing".to_string(),
                        internal: true,
                    };
                }
            }
        }

        self.aggregate = aggregate(&states);
        match self.aggregate {
            ReadinessState::Ready | ReadinessState::Limited => {
                if self.ready_fired || self.error_fired {
                    return Transition::None;
                }
                self.ready_fired = true;
                Transition::Ready(self.aggregate)
            }
            ReadinessState::Error => {
                if self.error_fired {
                    return Transition::None;
                }
                self.error_fired = true;
                warn!("all sub-components failed, aggregate is error");
                Transition::Error {
                    info: "all sub-components failed to initialize".to_string(),
                    internal: false,
                }
            }
            ReadinessState::SettingUp => Transition::None,
        }
    }
}

impl Default for ReadinessMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use ReadinessState::{Error, Limited, Ready, SettingUp};

    /// Independent restatement of the first-match rule, driven by counts
    fn expected(states: &[ReadinessState]) -> ReadinessState {
        let ready = states.iter().filter(|s| **s == Ready).count();
        let error = states.iter().filter(|s| **s == Error).count();
        let setting_up = states.iter().filter(|s| **s == SettingUp).count();
        if ready == states.len() {
            Ready
        } else if error == states.len() {
            Error
        } else if setting_up > 0 {
            SettingUp
        } else {
            Limited
        }
    }

    #[test]
    fn test_aggregate_exhaustive_three_components() {
        let all = [SettingUp, Ready, Limited, Error];
        for a in all {
            for b in all {
                for c in all {
                    let states = [a, b, c];
                    assert_eq!(
                        aggregate(&states),
                        expected(&states),
                        "states: {:?}",
                        states
                    );
                }
            }
        }
    }

    #[rstest]
    #[case(&[Ready, Ready, Ready], Ready)]
    #[case(&[Error, Error, Error], Error)]
    #[case(&[SettingUp, Error, Error], SettingUp)]
    #[case(&[Ready, SettingUp, Ready], SettingUp)]
    #[case(&[Ready, Error, Ready], Limited)]
    #[case(&[Limited, Limited, Limited], Limited)]
    #[case(&[Ready, Limited, Ready], Limited)]
    #[case(&[], SettingUp)]
    fn test_aggregate_cases(#[case] states: &[ReadinessState], #[case] want: ReadinessState) {
        assert_eq!(aggregate(states), want);
    }

    #[test]
    fn test_one_setting_up_dominates_errors() {
        // not a severity order: rule 3 wins over rule 4
        let mut states = vec![Error; 9];
        states.push(SettingUp);
        assert_eq!(aggregate(&states), SettingUp);
    }

    #[test]
    fn test_monitor_fires_ready_exactly_once() {
        let mut monitor = ReadinessMonitor::new();
        let snapshot = vec![Some(Ready), Some(Ready)];
        assert_eq!(monitor.observe(&snapshot), Transition::Ready(Ready));
        assert_eq!(monitor.observe(&snapshot), Transition::None);
        assert_eq!(monitor.observe(&snapshot), Transition::None);
        assert_eq!(monitor.aggregate_state(), Ready);
    }

    #[test]
    fn test_monitor_limited_counts_as_the_one_ready_shot() {
        let mut monitor = ReadinessMonitor::new();
        assert_eq!(
            monitor.observe(&[Some(Ready), Some(Error)]),
            Transition::Ready(Limited)
        );
        // later full recovery must not re-fire
        assert_eq!(monitor.observe(&[Some(Ready), Some(Ready)]), Transition::None);
    }

    #[test]
    fn test_monitor_error_fires_once_and_blocks_ready() {
        let mut monitor = ReadinessMonitor::new();
        match monitor.observe(&[Some(Error), Some(Error)]) {
            Transition::Error { internal, .. } => assert!(!internal),
            other => panic!("unexpected transition: {:?}", other),
        }
        assert_eq!(monitor.observe(&[Some(Error), Some(Error)]), Transition::None);
        // components recovering after a fired error never produce ready
        assert_eq!(monitor.observe(&[Some(Ready), Some(Ready)]), Transition::None);
    }

    #[test]
    fn test_monitor_missing_slot_is_internal_error() {
        let mut monitor = ReadinessMonitor::new();
        match monitor.observe(&[Some(Ready), None]) {
            Transition::Error { internal, info } => {
                assert!(internal);
                assert!(info.contains("internal"));
            }
            other => panic!("unexpected transition: {:?}", other),
        }
        assert_eq!(monitor.aggregate_state(), Error);
        // second observation of the same defect stays quiet
        assert_eq!(monitor.observe(&[Some(Ready), None]), Transition::None);
    }

    #[test]
    fn test_monitor_stays_quiet_while_setting_up() {
        let mut monitor = ReadinessMonitor::new();
        assert_eq!(
            monitor.observe(&[Some(SettingUp), Some(Ready)]),
            Transition::None
        );
        assert_eq!(monitor.aggregate_state(), SettingUp);
    }

    #[test]
    fn test_error_can_follow_ready() {
        // a session that was operational and then collapsed still informs
        // the owner once
        let mut monitor = ReadinessMonitor::new();
        assert_eq!(
            monitor.observe(&[Some(Ready), Some(Ready)]),
            Transition::Ready(Ready)
        );
        match monitor.observe(&[Some(Error), Some(Error)]) {
            Transition::Error { internal, .. } => assert!(!internal),
            other => panic!("unexpected transition: {:?}", other),
        }
    }
}
