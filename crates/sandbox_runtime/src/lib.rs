//! # Sandbox Runtime
//!
//! A Deno extension that gives untrusted scripts a host controlled `console`.
//!
//! ## Overview
//!
//! The extension installs a frozen `console` object on the guest's global
//! scope. Every method on it calls a single dispatch op with the method's
//! index and its arguments converted to JSON values. On the host side the
//! [`ConsoleBridge`] updates the per-context [`DiagnosticState`] (counters,
//! timers, group depth) and forwards the call to the hook registered in the
//! [`HookConfiguration`], if there is one.
//!
//! Besides `console`, the bootstrap installs any [`SandboxGlobals`] as
//! read-only properties and removes the privileged `Deno` namespace, so guest
//! code only sees plain ECMAScript plus what the host put there.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use deno_core::{JsRuntime, RuntimeOptions};
//! use sandbox_runtime::{ConsoleBridge, ConsoleMethod, HookConfiguration, SandboxGlobals, sandbox_console};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let hooks = HookConfiguration::new().with_hook(ConsoleMethod::Log, |call| {
//!     println!("{:?}", call.args);
//!     Ok(())
//! });
//!
//! let mut runtime = JsRuntime::new(RuntimeOptions {
//!     extensions: vec![sandbox_console::init(ConsoleBridge::new(hooks), SandboxGlobals::new())],
//!     ..Default::default()
//! });
//!
//! runtime.execute_script("<main>", "console.log('hello', { n: 1 })")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Console API
//!
//! `log`, `error`, `warn`, `info`, `debug`, `trace`, `assert`, `count`, `dir`,
//! `group`, `groupEnd`, `table`, `time`, `timeEnd` and `clear`. All of them
//! return `undefined`. A method without a hook does nothing visible, and a
//! hook that fails makes the call throw.

mod bridge;
mod capability;
mod diagnostics;
mod error;
mod globals;
mod hooks;
mod ops;

#[cfg(test)]
mod tests;

pub use bridge::{ConsoleBridge, HookFault};
pub use capability::{ConsoleMethod, DEFAULT_LABEL, UnknownConsoleMethod};
pub use diagnostics::{DiagnosticSnapshot, DiagnosticState};
pub use error::ConsoleError;
pub use globals::{GlobalNameError, SandboxGlobals};
pub use hooks::{ConsoleCall, HookConfiguration, HookFn, StateEffect};

// Deno extension providing the guest console and host globals.
// Initialize with the ConsoleBridge for this context and its SandboxGlobals.
deno_core::extension!(
    sandbox_console,
    ops = [
        ops::op_console_methods,
        ops::op_console_dispatch,
        ops::op_console_assert,
        ops::op_sandbox_globals,
    ],
    esm_entry_point = "ext:sandbox_console/runtime.js",
    esm = [ dir "src", "runtime.js" ],
    options = {
        bridge: ConsoleBridge,
        globals: SandboxGlobals,
    },
    state = |state, options| {
        state.put(options.bridge);
        state.put(options.globals);
    },
);
