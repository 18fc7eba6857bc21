//! Deno ops backing the guest's `console` object
//!
//! These ops are the only host functions the guest scope can reach.

use deno_core::{OpState, op2};

use crate::bridge::ConsoleBridge;
use crate::capability::ConsoleMethod;
use crate::error::ConsoleError;
use crate::globals::SandboxGlobals;

/// Names of the console methods, in hook table order
#[op2]
#[serde]
pub(crate) fn op_console_methods() -> Vec<String> {
    ConsoleMethod::ALL
        .iter()
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Forward one console call to the bridge
#[op2]
#[allow(clippy::needless_pass_by_value)]
pub(crate) fn op_console_dispatch(
    state: &mut OpState,
    #[smi] method: u32,
    #[serde] args: Vec<serde_json::Value>,
) -> Result<(), ConsoleError> {
    let method =
        ConsoleMethod::from_index(method as usize).ok_or(ConsoleError::UnknownMethod(method))?;

    let bridge = state.borrow_mut::<ConsoleBridge>();
    bridge.dispatch(method, args)
}

/// Forward a `console.assert` call along with its evaluated condition
#[op2]
#[allow(clippy::needless_pass_by_value)]
pub(crate) fn op_console_assert(
    state: &mut OpState,
    passed: bool,
    #[serde] args: Vec<serde_json::Value>,
) -> Result<(), ConsoleError> {
    state
        .borrow_mut::<ConsoleBridge>()
        .dispatch_assertion(passed, args)
}

/// Host supplied values to install on `globalThis`
#[op2]
#[serde]
pub(crate) fn op_sandbox_globals(
    state: &mut OpState,
) -> serde_json::Map<String, serde_json::Value> {
    state.borrow::<SandboxGlobals>().as_map().clone()
}
