//! Session states and their explicit ordering.
//!
//! The supervisor makes range decisions such as "is the session at or past
//! `Follow`". Those comparisons go through [`SessionState::rank`], a table
//! kept separate from the declaration order of the enum.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// The single live state of an assessment session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    Stopped,
    Idle,
    SeekLine,
    SeekSkeleton,
    Follow,
    Engaged,
    AssessStanding,
    AssessCrossing,
    LineCrossed,
    NotPassed,
    Finished,
}

impl SessionState {
    /// Every state, lowest rank first.
    pub const ALL: [SessionState; 11] = [
        SessionState::Stopped,
        SessionState::Idle,
        SessionState::SeekLine,
        SessionState::SeekSkeleton,
        SessionState::Follow,
        SessionState::Engaged,
        SessionState::AssessStanding,
        SessionState::AssessCrossing,
        SessionState::LineCrossed,
        SessionState::NotPassed,
        SessionState::Finished,
    ];

    /// Position of the state in the session's progression.
    pub const fn rank(self) -> u8 {
        match self {
            SessionState::Stopped => 0,
            SessionState::Idle => 1,
            SessionState::SeekLine => 2,
            SessionState::SeekSkeleton => 3,
            SessionState::Follow => 4,
            SessionState::Engaged => 5,
            SessionState::AssessStanding => 6,
            SessionState::AssessCrossing => 7,
            SessionState::LineCrossed => 8,
            SessionState::NotPassed => 9,
            SessionState::Finished => 10,
        }
    }

    /// States in which a person is being followed and must stay the same person.
    pub fn is_tracking(self) -> bool {
        self >= SessionState::Follow && self <= SessionState::LineCrossed
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Stopped => "stopped",
            SessionState::Idle => "idle",
            SessionState::SeekLine => "seek-line",
            SessionState::SeekSkeleton => "seek-skeleton",
            SessionState::Follow => "follow",
            SessionState::Engaged => "engaged",
            SessionState::AssessStanding => "assess-standing",
            SessionState::AssessCrossing => "assess-crossing",
            SessionState::LineCrossed => "line-crossed",
            SessionState::NotPassed => "not-passed",
            SessionState::Finished => "finished",
        }
    }
}

impl PartialOrd for SessionState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SessionState {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
