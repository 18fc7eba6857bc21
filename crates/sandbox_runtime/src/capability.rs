//! The fixed set of `console` operations a guest script may call.
//!
//! Every operation listed here is installed on the guest's `console` object at
//! bootstrap. The position of a method in [`ConsoleMethod::ALL`] is the index
//! the JavaScript glue passes back to the host on each call.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Label used by `count`, `time` and `timeEnd` when the script omits one
pub const DEFAULT_LABEL: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConsoleMethod {
    Log,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
    Assert,
    Count,
    Dir,
    Group,
    GroupEnd,
    Table,
    Time,
    TimeEnd,
    Clear,
}

impl ConsoleMethod {
    pub const COUNT: usize = 15;

    pub const ALL: [ConsoleMethod; Self::COUNT] = [
        ConsoleMethod::Log,
        ConsoleMethod::Error,
        ConsoleMethod::Warn,
        ConsoleMethod::Info,
        ConsoleMethod::Debug,
        ConsoleMethod::Trace,
        ConsoleMethod::Assert,
        ConsoleMethod::Count,
        ConsoleMethod::Dir,
        ConsoleMethod::Group,
        ConsoleMethod::GroupEnd,
        ConsoleMethod::Table,
        ConsoleMethod::Time,
        ConsoleMethod::TimeEnd,
        ConsoleMethod::Clear,
    ];

    /// Name of the property on the guest's `console` object
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsoleMethod::Log => "log",
            ConsoleMethod::Error => "error",
            ConsoleMethod::Warn => "warn",
            ConsoleMethod::Info => "info",
            ConsoleMethod::Debug => "debug",
            ConsoleMethod::Trace => "trace",
            ConsoleMethod::Assert => "assert",
            ConsoleMethod::Count => "count",
            ConsoleMethod::Dir => "dir",
            ConsoleMethod::Group => "group",
            ConsoleMethod::GroupEnd => "groupEnd",
            ConsoleMethod::Table => "table",
            ConsoleMethod::Time => "time",
            ConsoleMethod::TimeEnd => "timeEnd",
            ConsoleMethod::Clear => "clear",
        }
    }

    /// Slot of this method in the hook table and in the index the guest sends
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Whether calling this method touches the diagnostic state
    pub fn is_stateful(self) -> bool {
        matches!(
            self,
            ConsoleMethod::Count
                | ConsoleMethod::Group
                | ConsoleMethod::GroupEnd
                | ConsoleMethod::Time
                | ConsoleMethod::TimeEnd
        )
    }
}

impl fmt::Display for ConsoleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "console.{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown console method: {0}")]
pub struct UnknownConsoleMethod(pub String);

impl FromStr for ConsoleMethod {
    type Err = UnknownConsoleMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownConsoleMethod(s.to_string()))
    }
}
