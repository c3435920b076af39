use serde::Serialize;
use std::fmt;

/// Lifecycle state of an environment.
///
/// Variants are declared in lifecycle order so "at or past `Executing`" is a
/// plain comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    #[default]
    Unknown,
    Initializing,
    Initialized,
    Executing,
    Active,
    ShuttingDown,
    Inactive,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            State::Unknown => "unknown",
            State::Initializing => "initializing",
            State::Initialized => "initialized",
            State::Executing => "executing",
            State::Active => "active",
            State::ShuttingDown => "shutting down",
            State::Inactive => "inactive",
        };
        f.write_str(s)
    }
}
