use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::capability::ConsoleMethod;

/// Host callable bound to one console method.
///
/// Returning `Err` aborts the evaluation that made the call.
pub type HookFn = Arc<dyn Fn(&ConsoleCall) -> Result<(), String> + Send + Sync>;

/// A single console call as seen by the host
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsoleCall {
    pub method: ConsoleMethod,
    /// The arguments exactly as the script passed them
    pub args: Vec<serde_json::Value>,
    /// Value derived from the diagnostic state, for stateful methods
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect: Option<StateEffect>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StateEffect {
    Count {
        label: String,
        count: u64,
    },
    TimerStarted {
        label: String,
        /// `false` when a timer with this label was already running
        started: bool,
    },
    TimerEnded {
        label: String,
        /// `None` when `timeEnd` named a timer that was never started
        elapsed: Option<Duration>,
    },
    Group {
        depth: usize,
    },
    /// Truthiness of the condition as the script evaluated it
    Assertion {
        passed: bool,
    },
}

impl ConsoleCall {
    /// First argument rendered as a label, the way `count` and `time` read it
    pub fn label(&self) -> Option<String> {
        self.args.first().and_then(label_of)
    }
}

pub(crate) fn label_of(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Host hooks keyed by console method
///
/// Methods without a hook are accepted from the guest and do nothing
/// beyond updating diagnostic state.
#[derive(Clone, Default)]
pub struct HookConfiguration {
    hooks: [Option<HookFn>; ConsoleMethod::COUNT],
}

impl fmt::Debug for HookConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookConfiguration")
            .field("registered", &self.registered())
            .finish()
    }
}

impl HookConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `hook` for `method`, replacing any previous one
    #[must_use]
    pub fn with_hook<F>(mut self, method: ConsoleMethod, hook: F) -> Self
    where
        F: Fn(&ConsoleCall) -> Result<(), String> + Send + Sync + 'static,
    {
        self.hooks[method.index()] = Some(Arc::new(hook));
        self
    }

    /// Registers `hook` under a guest-facing method name such as `"groupEnd"`.
    ///
    /// Unrecognized names are ignored.
    #[must_use]
    pub fn with_named_hook(mut self, name: &str, hook: HookFn) -> Self {
        match name.parse::<ConsoleMethod>() {
            Ok(method) => self.hooks[method.index()] = Some(hook),
            Err(e) => debug!(name, "Ignoring hook: {e}"),
        }
        self
    }

    /// Registers the same hook for every console method
    #[must_use]
    pub fn with_all(mut self, hook: HookFn) -> Self {
        for slot in &mut self.hooks {
            *slot = Some(Arc::clone(&hook));
        }
        self
    }

    pub fn get(&self, method: ConsoleMethod) -> Option<&HookFn> {
        self.hooks[method.index()].as_ref()
    }

    pub fn has(&self, method: ConsoleMethod) -> bool {
        self.get(method).is_some()
    }

    /// Methods that currently have a hook
    pub fn registered(&self) -> Vec<ConsoleMethod> {
        ConsoleMethod::ALL
            .into_iter()
            .filter(|m| self.has(*m))
            .collect()
    }
}

impl FromIterator<(String, HookFn)> for HookConfiguration {
    fn from_iter<I: IntoIterator<Item = (String, HookFn)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::default(), |cfg, (name, hook)| {
                cfg.with_named_hook(&name, hook)
            })
    }
}
