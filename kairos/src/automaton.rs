//! The work/rest automaton as a pure function of time.
//!
//! ```text
//!   Idle ──start──► Working ──work_period──► Resting ──rest_period──► Working
//!                      │
//!                      └──work_period, streak full──► LongResting ──long_rest_period──► Working
//! ```
//!
//! Leaving `Idle` only happens through commands, so [`advance`] never does it.

use crate::config::TimerConfig;
use kairos_ipc::TimerState;
use std::time::Duration;

/// Result of evaluating the automaton once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub next: TimerState,
    pub work_streak: u32,
    /// A full work period just ended; the current task earns a progress mark.
    pub work_completed: bool,
}

impl Step {
    fn stay(state: TimerState, work_streak: u32) -> Self {
        Self {
            next: state,
            work_streak,
            work_completed: false,
        }
    }
}

/// Evaluate one tick.
///
/// `elapsed` is the time spent in `state` so far, `None` when no entry
/// time is recorded. A running state without an entry time falls back to
/// `Idle`.
pub fn advance(
    state: TimerState,
    elapsed: Option<Duration>,
    config: &TimerConfig,
    work_streak: u32,
) -> Step {
    if state.is_idle() {
        return Step::stay(state, work_streak);
    }
    let Some(elapsed) = elapsed else {
        return Step::stay(TimerState::Idle, work_streak);
    };

    match state {
        TimerState::Working if elapsed >= config.work_period() => {
            let streak = work_streak.saturating_add(1);
            if streak < config.max_work_streak {
                Step {
                    next: TimerState::Resting,
                    work_streak: streak,
                    work_completed: true,
                }
            } else {
                Step {
                    next: TimerState::LongResting,
                    work_streak: 0,
                    work_completed: true,
                }
            }
        }
        TimerState::Resting if elapsed >= config.rest_period() => {
            Step::stay(TimerState::Working, work_streak)
        }
        TimerState::LongResting if elapsed >= config.long_rest_period() => {
            Step::stay(TimerState::Working, work_streak)
        }
        _ => Step::stay(state, work_streak),
    }
}
