//! Run states and per-exchange reports.

use crate::context::Side;
use crate::referee::Judgement;
use std::fmt;

/// Lifecycle of a [`Duet`](super::Duet).
///
/// ```text
/// Idle --start--> Running --(budget | veto | stop)--> Stopped
///                  |   ^
///          failure |   | retry
///                  v   |
///                 Blocked --stop--> Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    /// The last gateway call failed; waiting for `retry` or `stop`.
    Blocked,
    Stopped,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "Idle",
            RunState::Running => "Running",
            RunState::Blocked => "Blocked",
            RunState::Stopped => "Stopped",
        };
        f.write_str(name)
    }
}

/// Why a session reached [`RunState::Stopped`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    BudgetExhausted,
    RefereeVeto,
    UserStop,
}

/// Outcome of one successful [`advance`](super::Duet::advance).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReport {
    /// Side that produced `content`.
    pub side: Side,
    pub content: String,
    /// Referee answer, when a referee is configured.
    pub judgement: Option<Judgement>,
    /// Turns left after this exchange.
    pub remaining: u32,
    /// Set when this exchange ended the session.
    pub stopped: Option<StopReason>,
}

impl TurnReport {
    pub fn is_final(&self) -> bool {
        self.stopped.is_some()
    }
}

/// A reply received from the gateway and not yet applied, held while its
/// referee check is outstanding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct PendingReview {
    pub(super) side: Side,
    pub(super) reply: String,
}
