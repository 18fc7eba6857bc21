//! Host side of the guest's `console` object
//!
//! The bridge lives in the runtime's `OpState`. Each console call from the
//! guest reaches [`ConsoleBridge::dispatch`], which updates the diagnostic
//! state first and then forwards the call to the registered hook, if any.

use std::panic::{AssertUnwindSafe, catch_unwind};

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::capability::{ConsoleMethod, DEFAULT_LABEL};
use crate::diagnostics::{DiagnosticSnapshot, DiagnosticState};
use crate::error::ConsoleError;
use crate::hooks::{ConsoleCall, HookConfiguration, StateEffect, label_of};

/// A hook failure recorded during an evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookFault {
    pub method: ConsoleMethod,
    pub message: String,
}

impl From<HookFault> for ConsoleError {
    fn from(fault: HookFault) -> Self {
        ConsoleError::Hook {
            method: fault.method,
            message: fault.message,
        }
    }
}

#[derive(Debug, Default)]
pub struct ConsoleBridge {
    hooks: HookConfiguration,
    state: DiagnosticState,
    fault: Option<HookFault>,
}

impl ConsoleBridge {
    pub fn new(hooks: HookConfiguration) -> Self {
        Self {
            hooks,
            state: DiagnosticState::new(),
            fault: None,
        }
    }

    pub fn hooks(&self) -> &HookConfiguration {
        &self.hooks
    }

    pub fn state(&self) -> &DiagnosticState {
        &self.state
    }

    pub fn snapshot(&self) -> DiagnosticSnapshot {
        self.state.snapshot()
    }

    pub fn reset_state(&mut self) {
        self.state.reset();
    }

    /// Takes the first hook failure recorded since the last call
    pub fn take_fault(&mut self) -> Option<HookFault> {
        self.fault.take()
    }

    /// Handles one console call from the guest
    ///
    /// # Errors
    ///
    /// Returns an error if the registered hook fails, or if one already failed
    /// since the last [`ConsoleBridge::take_fault`]. The failure is kept so
    /// the evaluator can report it even if the guest catches it.
    pub fn dispatch(
        &mut self,
        method: ConsoleMethod,
        args: Vec<serde_json::Value>,
    ) -> Result<(), ConsoleError> {
        self.check_fault()?;
        let effect = self.apply(method, &args);
        self.forward(method, args, effect)
    }

    /// Handles `console.assert`, whose condition the guest evaluates before
    /// its arguments are converted
    ///
    /// # Errors
    ///
    /// Same as [`ConsoleBridge::dispatch`]
    pub fn dispatch_assertion(
        &mut self,
        passed: bool,
        args: Vec<serde_json::Value>,
    ) -> Result<(), ConsoleError> {
        self.check_fault()?;
        self.forward(
            ConsoleMethod::Assert,
            args,
            Some(StateEffect::Assertion { passed }),
        )
    }

    // A failed hook aborts the evaluation: every later call throws the same
    // error without reaching a hook or touching state
    fn check_fault(&self) -> Result<(), ConsoleError> {
        match &self.fault {
            Some(fault) => Err(fault.clone().into()),
            None => Ok(()),
        }
    }

    fn forward(
        &mut self,
        method: ConsoleMethod,
        args: Vec<serde_json::Value>,
        effect: Option<StateEffect>,
    ) -> Result<(), ConsoleError> {
        trace!(method = method.as_str(), args = args.len(), "Console call");

        let Some(hook) = self.hooks.get(method).cloned() else {
            return Ok(());
        };

        let call = ConsoleCall {
            method,
            args,
            effect,
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| hook(&call)))
            .unwrap_or_else(|panic| Err(panic_message(panic.as_ref())));

        outcome.map_err(|message| {
            warn!(method = method.as_str(), error = %message, "Console hook failed");
            let fault = HookFault { method, message };
            self.fault = Some(fault.clone());
            fault.into()
        })
    }

    fn apply(&mut self, method: ConsoleMethod, args: &[serde_json::Value]) -> Option<StateEffect> {
        let label = || {
            args.first()
                .and_then(label_of)
                .unwrap_or_else(|| DEFAULT_LABEL.to_string())
        };

        match method {
            ConsoleMethod::Count => {
                let label = label();
                let count = self.state.increment_count(&label);
                Some(StateEffect::Count { label, count })
            }
            ConsoleMethod::Time => {
                let label = label();
                let started = self.state.start_timer(&label);
                if !started {
                    debug!(label, "Timer already exists");
                }
                Some(StateEffect::TimerStarted { label, started })
            }
            ConsoleMethod::TimeEnd => {
                let label = label();
                let elapsed = self.state.read_and_clear_timer(&label);
                if elapsed.is_none() {
                    debug!(label, "Timer does not exist");
                }
                Some(StateEffect::TimerEnded { label, elapsed })
            }
            ConsoleMethod::Group => Some(StateEffect::Group {
                depth: self.state.push_group(),
            }),
            ConsoleMethod::GroupEnd => Some(StateEffect::Group {
                depth: self.state.pop_group(),
            }),
            _ => None,
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("hook panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("hook panicked: {s}")
    } else {
        "hook panicked".to_string()
    }
}
