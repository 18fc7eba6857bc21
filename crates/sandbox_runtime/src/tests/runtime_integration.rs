//! Integration tests that spin up a JavaScript runtime
//!
//! These tests verify the guest `console` and globals behave correctly when
//! accessed from JavaScript

use std::sync::{Arc, Mutex};

use deno_core::{JsRuntime, PollEventLoopOptions, RuntimeOptions};
use serde_json::json;

use crate::{
    ConsoleBridge, ConsoleCall, ConsoleMethod, DiagnosticSnapshot, HookConfiguration,
    SandboxGlobals, StateEffect,
};

type Calls = Arc<Mutex<Vec<ConsoleCall>>>;

/// Hook configuration recording every call to every method
fn recording_hooks() -> (HookConfiguration, Calls) {
    let calls: Calls = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&calls);
    let hooks = HookConfiguration::new().with_all(Arc::new(move |call: &ConsoleCall| {
        sink.lock().unwrap().push(call.clone());
        Ok(())
    }));
    (hooks, calls)
}

fn create_test_runtime(hooks: HookConfiguration, globals: SandboxGlobals) -> JsRuntime {
    JsRuntime::new(RuntimeOptions {
        extensions: vec![crate::sandbox_console::init(
            ConsoleBridge::new(hooks),
            globals,
        )],
        ..Default::default()
    })
}

/// Helper function to execute a script and get its completion value as JSON
fn execute_js(runtime: &mut JsRuntime, code: &str) -> Result<serde_json::Value, String> {
    let value = runtime
        .execute_script("<test>", code.to_string())
        .map_err(|e| format!("Script execution failed: {e}"))?;

    deno_core::scope!(scope, runtime);
    let local = deno_core::v8::Local::new(scope, value);
    deno_core::serde_v8::from_v8::<serde_json::Value>(scope, local)
        .map_err(|e| format!("Failed to convert result to JSON: {e}"))
}

fn snapshot(runtime: &JsRuntime) -> DiagnosticSnapshot {
    runtime
        .op_state()
        .borrow()
        .borrow::<ConsoleBridge>()
        .snapshot()
}

#[test]
fn test_console_exposes_every_method() {
    let mut runtime = create_test_runtime(HookConfiguration::new(), SandboxGlobals::new());

    let result = execute_js(
        &mut runtime,
        r"Object.keys(console).filter((k) => typeof console[k] === 'function')",
    )
    .expect("Should execute successfully");

    let expected: Vec<&str> = ConsoleMethod::ALL.iter().map(ConsoleMethod::as_str).collect();
    assert_eq!(result, json!(expected));
}

#[test]
fn test_console_is_frozen_and_deno_is_hidden() {
    let mut runtime = create_test_runtime(HookConfiguration::new(), SandboxGlobals::new());

    let result = execute_js(
        &mut runtime,
        r"
        console.log = () => 'replaced';
        ({
            frozen: Object.isFrozen(console),
            replaced: console.log() === 'replaced',
            deno: typeof Deno,
        })
        ",
    )
    .expect("Should execute successfully");

    assert_eq!(
        result,
        json!({ "frozen": true, "replaced": false, "deno": "undefined" })
    );
}

#[test]
fn test_log_forwards_arguments_in_order() {
    let (hooks, calls) = recording_hooks();
    let mut runtime = create_test_runtime(hooks, SandboxGlobals::new());

    execute_js(
        &mut runtime,
        r"console.log('a', 1, true, null, undefined, { x: [1, 2] }, 'z')",
    )
    .expect("Should execute successfully");

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, ConsoleMethod::Log);
    assert_eq!(
        calls[0].args,
        vec![
            json!("a"),
            json!(1),
            json!(true),
            json!(null),
            json!(null),
            json!({ "x": [1, 2] }),
            json!("z"),
        ]
    );
    assert_eq!(calls[0].effect, None);
}

#[test]
fn test_non_json_values_are_converted() {
    let (hooks, calls) = recording_hooks();
    let mut runtime = create_test_runtime(hooks, SandboxGlobals::new());

    execute_js(
        &mut runtime,
        r"
        const cyclic = { name: 'loop' };
        cyclic.self = cyclic;
        function named() {}
        console.dir([10n, NaN, named, Symbol('tag'), cyclic, new Map([['k', 1]]), new Set([2])]);
        ",
    )
    .expect("Should execute successfully");

    let calls = calls.lock().unwrap();
    assert_eq!(
        calls[0].args,
        vec![json!([
            "10",
            "NaN",
            "[Function: named]",
            "tag",
            { "name": "loop", "self": "[Circular]" },
            [["k", 1]],
            [2]
        ])]
    );
}

#[test]
fn test_errors_are_forwarded_as_objects() {
    let (hooks, calls) = recording_hooks();
    let mut runtime = create_test_runtime(hooks, SandboxGlobals::new());

    execute_js(&mut runtime, r"console.error(new TypeError('bad input'))")
        .expect("Should execute successfully");

    let calls = calls.lock().unwrap();
    let arg = &calls[0].args[0];
    assert_eq!(arg["name"], json!("TypeError"));
    assert_eq!(arg["message"], json!("bad input"));
    assert!(arg["stack"].is_string());
}

#[test]
fn test_stateful_methods_update_bridge_state() {
    let (hooks, calls) = recording_hooks();
    let mut runtime = create_test_runtime(hooks, SandboxGlobals::new());

    execute_js(
        &mut runtime,
        r"
        console.count('x');
        console.count('x');
        console.count();
        console.group('outer');
        console.group('inner');
        console.groupEnd();
        console.time('t');
        ",
    )
    .expect("Should execute successfully");

    let snapshot = snapshot(&runtime);
    assert_eq!(snapshot.counters.get("x"), Some(&2));
    assert_eq!(snapshot.counters.get("default"), Some(&1));
    assert_eq!(snapshot.group_depth, 1);
    assert_eq!(snapshot.timers, vec!["t".to_string()]);

    let calls = calls.lock().unwrap();
    assert_eq!(
        calls[1].effect,
        Some(StateEffect::Count {
            label: "x".into(),
            count: 2
        })
    );
    assert_eq!(calls[4].effect, Some(StateEffect::Group { depth: 2 }));
}

#[test]
fn test_extra_group_end_does_not_underflow() {
    let mut runtime = create_test_runtime(HookConfiguration::new(), SandboxGlobals::new());

    execute_js(
        &mut runtime,
        r"console.groupEnd(); console.groupEnd(); console.group('g');",
    )
    .expect("Should execute successfully");

    assert_eq!(snapshot(&runtime).group_depth, 1);
}

#[test]
fn test_failing_hook_throws_in_guest() {
    let hooks = HookConfiguration::new()
        .with_hook(ConsoleMethod::Info, |_| Err("sink unavailable".to_string()));
    let mut runtime = create_test_runtime(hooks, SandboxGlobals::new());

    let result = execute_js(
        &mut runtime,
        r"
        try {
            console.info('hello');
            'no error';
        } catch (e) {
            e.message;
        }
        ",
    )
    .expect("Should execute successfully");

    assert_eq!(result, json!("console.info hook failed: sink unavailable"));

    let fault = runtime
        .op_state()
        .borrow_mut()
        .borrow_mut::<ConsoleBridge>()
        .take_fault()
        .expect("fault should be recorded");
    assert_eq!(fault.method, ConsoleMethod::Info);
}

#[test]
fn test_globals_are_installed_read_only() {
    let mut globals = SandboxGlobals::new();
    globals
        .insert("settings", json!({ "retries": 3, "tags": ["a"] }))
        .unwrap();
    let mut runtime = create_test_runtime(HookConfiguration::new(), globals);

    let result = execute_js(
        &mut runtime,
        r"
        settings.retries = 10;
        ({
            retries: settings.retries,
            frozen: Object.isFrozen(settings.tags),
            writable: Object.getOwnPropertyDescriptor(globalThis, 'settings').writable,
        })
        ",
    )
    .expect("Should execute successfully");

    assert_eq!(
        result,
        json!({ "retries": 3, "frozen": true, "writable": false })
    );
}

#[tokio::test]
async fn test_settle_builds_envelopes() {
    let mut runtime = create_test_runtime(HookConfiguration::new(), SandboxGlobals::new());

    execute_js(
        &mut runtime,
        r"
        globalThis.results = [];
        __sandboxSettle(Promise.resolve({ default: 5 })).then((r) => results.push(r));
        __sandboxSettle(Promise.resolve({})).then((r) => results.push(r));
        __sandboxSettle(Promise.reject(42)).then((r) => results.push(r));
        ",
    )
    .expect("Should execute successfully");

    runtime
        .run_event_loop(PollEventLoopOptions::default())
        .await
        .expect("Event loop should complete");

    let results = execute_js(&mut runtime, "results").expect("Should execute successfully");
    assert_eq!(
        results,
        json!([
            { "ok": true, "data": 5 },
            { "ok": true },
            { "ok": false, "error": 42 },
        ])
    );
}

#[test]
fn test_plain_objects_with_error_fields_keep_their_shape() {
    let (hooks, calls) = recording_hooks();
    let mut runtime = create_test_runtime(hooks, SandboxGlobals::new());

    execute_js(
        &mut runtime,
        r"
        console.table([{ name: 'a', message: 'b', n: 1 }]);
        const failure = new Error('disk full');
        failure.code = 'ENOSPC';
        console.error(failure);
        ",
    )
    .expect("Should execute successfully");

    let calls = calls.lock().unwrap();
    assert_eq!(
        calls[0].args,
        vec![json!([{ "name": "a", "message": "b", "n": 1 }])]
    );
    let error = &calls[1].args[0];
    assert_eq!(error["message"], json!("disk full"));
    assert_eq!(error["code"], json!("ENOSPC"));
}

#[test]
fn test_conversion_ignores_prototype_setters() {
    let (hooks, calls) = recording_hooks();
    let mut runtime = create_test_runtime(hooks, SandboxGlobals::new());

    execute_js(
        &mut runtime,
        r#"
        Object.defineProperty(Object.prototype, 'a', { set() {}, configurable: true });
        Object.defineProperty(Array.prototype, '0', { set() {}, configurable: true });
        console.log(JSON.parse('{"__proto__": 7, "c": 3}'), { a: 1 }, ['first']);
        "#,
    )
    .expect("Should execute successfully");

    let calls = calls.lock().unwrap();
    assert_eq!(
        calls[0].args,
        vec![json!({ "__proto__": 7, "c": 3 }), json!({ "a": 1 }), json!(["first"])]
    );
}

#[test]
fn test_assert_reports_condition_before_conversion() {
    let (hooks, calls) = recording_hooks();
    let mut runtime = create_test_runtime(hooks, SandboxGlobals::new());

    execute_js(
        &mut runtime,
        r"console.assert(NaN, 'nan'); console.assert('NaN', 'string');",
    )
    .expect("Should execute successfully");

    let calls = calls.lock().unwrap();
    assert_eq!(calls[0].args, vec![json!("NaN"), json!("nan")]);
    assert_eq!(calls[0].effect, Some(StateEffect::Assertion { passed: false }));
    assert_eq!(calls[1].effect, Some(StateEffect::Assertion { passed: true }));
}

#[test]
fn test_console_calls_after_hook_failure_throw() {
    let (recording, calls) = recording_hooks();
    let hooks = recording.with_hook(ConsoleMethod::Warn, |_| Err("sink closed".to_string()));
    let mut runtime = create_test_runtime(hooks, SandboxGlobals::new());

    let result = execute_js(
        &mut runtime,
        r"
        const thrown = [];
        for (const call of [() => console.warn('a'), () => console.log('b')]) {
            try { call(); } catch (e) { thrown.push(e.message); }
        }
        thrown
        ",
    )
    .expect("Should execute successfully");

    assert_eq!(
        result,
        json!([
            "console.warn hook failed: sink closed",
            "console.warn hook failed: sink closed",
        ])
    );
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_settle_ignores_prototype_then() {
    let mut runtime = create_test_runtime(HookConfiguration::new(), SandboxGlobals::new());

    execute_js(
        &mut runtime,
        r"
        globalThis.results = [];
        Object.prototype.then = function (resolve) { resolve({ ok: true, data: 'forged' }); };
        __sandboxSettle(Promise.resolve({ __proto__: null, default: 1 })).then((r) => results.push(r));
        __sandboxSettle(Promise.reject(new Error('real'))).then((r) => results.push(r));
        ",
    )
    .expect("Should execute successfully");

    runtime
        .run_event_loop(PollEventLoopOptions::default())
        .await
        .expect("Event loop should complete");

    let results = execute_js(
        &mut runtime,
        "delete Object.prototype.then; results.map((r) => [r.ok, r.data ?? r.error.message])",
    )
    .expect("Should execute successfully");
    assert_eq!(results, json!([[true, 1], [false, "real"]]));
}
