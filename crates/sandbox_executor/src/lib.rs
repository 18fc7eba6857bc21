//! # Sandbox Executor
//!
//! Runs untrusted scripts in an isolated V8 context whose only host
//! capability is a `console` object backed by caller supplied hooks.
//!
//! [`init_runtime`] builds the context; [`RuntimeHandle::eval_code`] runs a
//! script in it and always returns a [`ResponseEnvelope`], whatever the script
//! does.
//!
//! ```rust,no_run
//! use sandbox_executor::{ConsoleMethod, HookConfiguration, SandboxOptions, init_runtime};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let hooks = HookConfiguration::new().with_hook(ConsoleMethod::Log, |call| {
//!     println!("{:?}", call.args);
//!     Ok(())
//! });
//!
//! let mut runtime = init_runtime(SandboxOptions::new().with_hooks(hooks)).await?;
//! let result = runtime.eval_code("console.log('hi'); export default 1").await;
//! assert_eq!(result.data(), Some(&serde_json::json!(1)));
//! # Ok(())
//! # }
//! ```

mod envelope;

use deno_core::{JsRuntime, ModuleCodeString, PollEventLoopOptions, RuntimeOptions};
use thiserror::Error;
use tracing::{debug, warn};

pub use envelope::ResponseEnvelope;
pub use sandbox_config::runtime::{DiagnosticsScope, RuntimeConfig};
pub use sandbox_runtime::{
    ConsoleCall, ConsoleMethod, DiagnosticSnapshot, GlobalNameError, HookConfiguration, HookFault,
    HookFn, SandboxGlobals, StateEffect,
};

use sandbox_runtime::ConsoleBridge;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed creating isolated context: {0}")]
    Engine(String),

    #[error("Invalid global: {0}")]
    InvalidGlobal(#[from] GlobalNameError),
}

/// Everything needed to build one isolated context
#[derive(Debug, Clone, Default)]
pub struct SandboxOptions {
    pub hooks: HookConfiguration,
    pub diagnostics_scope: DiagnosticsScope,
    pub globals: serde_json::Map<String, serde_json::Value>,
}

impl SandboxOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options taking the scope and globals from a loaded [`RuntimeConfig`]
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            hooks: HookConfiguration::default(),
            diagnostics_scope: config.diagnostics_scope,
            globals: config
                .globals
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        }
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: HookConfiguration) -> Self {
        self.hooks = hooks;
        self
    }

    #[must_use]
    pub fn with_diagnostics_scope(mut self, scope: DiagnosticsScope) -> Self {
        self.diagnostics_scope = scope;
        self
    }

    /// Adds a read-only global. Names are validated by [`init_runtime`].
    #[must_use]
    pub fn with_global(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.globals.insert(name.into(), value);
        self
    }
}

/// One isolated evaluation context
///
/// The handle owns its V8 isolate and is bound to the thread that created
/// it. Evaluations take `&mut self`, so one context never runs two scripts at
/// once; create separate handles for concurrent scripts.
pub struct RuntimeHandle {
    js_runtime: JsRuntime,
    diagnostics_scope: DiagnosticsScope,
    evaluations: usize,
}

impl std::fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeHandle")
            .field("diagnostics_scope", &self.diagnostics_scope)
            .field("evaluations", &self.evaluations)
            .finish_non_exhaustive()
    }
}

/// Builds an isolated context with the console hooks and globals from `options`
///
/// No guest code runs here.
///
/// # Errors
///
/// Returns an error if a global name is invalid or if the engine fails to
/// create the context or run its bootstrap
#[allow(clippy::unused_async)]
pub async fn init_runtime(options: SandboxOptions) -> Result<RuntimeHandle, InitializationError> {
    debug!(
        hooks = ?options.hooks.registered(),
        globals = options.globals.len(),
        scope = options.diagnostics_scope.as_str(),
        "Initializing sandbox runtime"
    );

    let globals = SandboxGlobals::try_from(options.globals)?;
    let bridge = ConsoleBridge::new(options.hooks);

    let js_runtime = JsRuntime::try_new(RuntimeOptions {
        extensions: vec![sandbox_runtime::sandbox_console::init(bridge, globals)],
        ..Default::default()
    })
    .map_err(|e| {
        warn!(error = %e, "Failed creating JsRuntime");
        InitializationError::Engine(e.to_string())
    })?;

    Ok(RuntimeHandle {
        js_runtime,
        diagnostics_scope: options.diagnostics_scope,
        evaluations: 0,
    })
}

/// Builds a fresh context, evaluates `code` once and drops the context
///
/// # Errors
///
/// Returns an error only if the context cannot be created; script failures
/// are reported in the envelope
pub async fn execute(
    code: &str,
    options: SandboxOptions,
) -> Result<ResponseEnvelope, InitializationError> {
    let mut runtime = init_runtime(options).await?;
    Ok(runtime.eval_code(code).await)
}

#[derive(Debug, Error)]
enum EvalError {
    #[error("{0}")]
    Engine(String),

    #[error("Failed converting evaluation result: {0}")]
    Conversion(String),
}

impl RuntimeHandle {
    /// Evaluates `code` as an ES module and reports its default export
    ///
    /// Syntax errors, thrown values, rejected promises and failing console
    /// hooks all come back as [`ResponseEnvelope::Err`]; this never fails
    /// outward.
    #[tracing::instrument(skip_all, fields(runtime = "execution", code_length = code.len()))]
    pub async fn eval_code(&mut self, code: &str) -> ResponseEnvelope {
        self.evaluations += 1;
        self.begin_evaluation();

        let envelope = match self.evaluate(code).await {
            Ok(envelope) => envelope,
            Err(EvalError::Engine(text)) => {
                warn!(error = %text, "Evaluation failed in the engine");
                ResponseEnvelope::from_engine_error(&text)
            }
            Err(e @ EvalError::Conversion(_)) => {
                warn!(error = %e, "Evaluation result could not be converted");
                ResponseEnvelope::err(serde_json::json!({
                    "name": "Error",
                    "message": e.to_string(),
                }))
            }
        };

        // A failing hook fails the evaluation even if the script caught it
        if let Some(fault) = self.bridge_mut(ConsoleBridge::take_fault) {
            warn!(method = fault.method.as_str(), "Evaluation aborted by console hook");
            return ResponseEnvelope::from_hook_fault(&fault);
        }

        if envelope.is_ok() {
            debug!("Code executed successfully");
        } else {
            debug!(error = ?envelope.error_message(), "Code execution failed");
        }
        envelope
    }

    /// Current counters, running timers and group depth
    pub fn diagnostics(&self) -> DiagnosticSnapshot {
        self.js_runtime
            .op_state()
            .borrow()
            .borrow::<ConsoleBridge>()
            .snapshot()
    }

    pub fn reset_diagnostics(&mut self) {
        self.bridge_mut(ConsoleBridge::reset_state);
    }

    pub fn diagnostics_scope(&self) -> DiagnosticsScope {
        self.diagnostics_scope
    }

    /// Number of `eval_code` calls made on this handle
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    fn bridge_mut<T>(&mut self, f: impl FnOnce(&mut ConsoleBridge) -> T) -> T {
        let op_state = self.js_runtime.op_state();
        let mut op_state = op_state.borrow_mut();
        f(op_state.borrow_mut::<ConsoleBridge>())
    }

    fn begin_evaluation(&mut self) {
        let scope = self.diagnostics_scope;
        self.bridge_mut(|bridge| {
            bridge.take_fault();
            if scope == DiagnosticsScope::Evaluation {
                bridge.reset_state();
            }
        });
    }

    async fn evaluate(&mut self, code: &str) -> Result<ResponseEnvelope, EvalError> {
        let specifier = format!("file:///sandbox/eval-{}.js", self.evaluations);
        let main_module =
            deno_core::resolve_url(&specifier).map_err(|e| EvalError::Engine(e.to_string()))?;

        // Registering the module parses it; syntax errors surface here
        debug!(main_module =? main_module, "Loading module into runtime");
        let mod_id = self
            .js_runtime
            .load_side_es_module_from_code(&main_module, ModuleCodeString::from(code.to_string()))
            .await
            .map_err(|e| EvalError::Engine(e.to_string()))?;
        debug!(module_id = mod_id, "Module loaded successfully");

        // Importing evaluates the module; a throw rejects the import with the
        // thrown value itself
        let settle_script = format!(
            "__sandboxSettle(import({}))",
            serde_json::Value::String(specifier)
        );
        let promise = self
            .js_runtime
            .execute_script("<sandbox:settle>", settle_script)
            .map_err(|e| EvalError::Engine(e.to_string()))?;

        debug!("Running event loop");
        let resolve_future = self.js_runtime.resolve(promise);
        let settled = self
            .js_runtime
            .with_event_loop_promise(resolve_future, PollEventLoopOptions::default())
            .await
            .map_err(|e| EvalError::Engine(e.to_string()))?;

        let value = {
            deno_core::scope!(scope, &mut self.js_runtime);
            let local = deno_core::v8::Local::new(scope, settled);
            deno_core::serde_v8::from_v8::<serde_json::Value>(scope, local)
                .map_err(|e| EvalError::Conversion(e.to_string()))?
        };

        serde_json::from_value(value).map_err(|e| EvalError::Conversion(e.to_string()))
    }
}

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests;
