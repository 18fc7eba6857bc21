use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RuntimeConfig {
    /// How long console counters, timers and group depth live
    #[serde(default)]
    pub diagnostics_scope: DiagnosticsScope,

    /// Read-only values installed on the script's `globalThis`
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub globals: IndexMap<String, serde_json::Value>,
}

/// Lifetime of the diagnostic state behind `console.count`, `console.time`
/// and `console.group`
#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub enum DiagnosticsScope {
    /// State persists across every evaluation of one runtime
    #[serde(rename = "runtime")]
    #[default]
    Runtime,
    /// State is cleared at the start of each evaluation
    #[serde(rename = "evaluation")]
    Evaluation,
}

impl DiagnosticsScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticsScope::Runtime => "runtime",
            DiagnosticsScope::Evaluation => "evaluation",
        }
    }
}
