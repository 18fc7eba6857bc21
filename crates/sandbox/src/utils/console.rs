use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use sandbox_executor::{ConsoleCall, ConsoleMethod, HookConfiguration, StateEffect};
use serde_json::Value;

const INDENT: &str = "  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Line {
    pub(crate) stream: Stream,
    pub(crate) text: String,
}

impl Line {
    fn out(text: impl Into<String>) -> Self {
        Self {
            stream: Stream::Stdout,
            text: text.into(),
        }
    }

    fn err(text: impl Into<String>) -> Self {
        Self {
            stream: Stream::Stderr,
            text: text.into(),
        }
    }
}

/// Prints guest console calls to the terminal
///
/// Group depth is tracked from the `Group` effects the runtime attaches to
/// `group` and `groupEnd` calls.
#[derive(Debug, Clone)]
pub(crate) struct ConsolePrinter {
    json: bool,
    depth: Arc<AtomicUsize>,
}

impl ConsolePrinter {
    pub(crate) fn new(json: bool) -> Self {
        Self {
            json,
            depth: Arc::default(),
        }
    }

    /// A hook for every console method, all writing through this printer
    pub(crate) fn hooks(&self) -> HookConfiguration {
        let printer = self.clone();
        HookConfiguration::new().with_all(Arc::new(move |call: &ConsoleCall| printer.print(call)))
    }

    fn print(&self, call: &ConsoleCall) -> Result<(), String> {
        if self.json {
            let line = serde_json::to_string(call).map_err(|e| e.to_string())?;
            return write_line(&Line::out(line));
        }

        // The group label prints at the depth it opens from
        let depth = self.depth.load(Ordering::Relaxed);
        if let Some(StateEffect::Group { depth }) = &call.effect {
            self.depth.store(*depth, Ordering::Relaxed);
        }

        match render(call, depth) {
            Some(line) => write_line(&line),
            None => Ok(()),
        }
    }
}

fn write_line(line: &Line) -> Result<(), String> {
    let result = match line.stream {
        Stream::Stdout => writeln!(std::io::stdout().lock(), "{}", line.text),
        Stream::Stderr => writeln!(std::io::stderr().lock(), "{}", line.text),
    };
    result.map_err(|e| format!("failed writing console output: {e}"))
}

/// Renders one call as terminal text, `None` for calls that print nothing
pub(crate) fn render(call: &ConsoleCall, depth: usize) -> Option<Line> {
    let line = match call.method {
        ConsoleMethod::Log | ConsoleMethod::Info | ConsoleMethod::Debug => {
            Line::out(join_args(&call.args))
        }
        ConsoleMethod::Error | ConsoleMethod::Warn => Line::err(join_args(&call.args)),
        ConsoleMethod::Trace => Line::err(prefixed("Trace", &call.args)),
        ConsoleMethod::Assert => {
            let passed = match &call.effect {
                Some(StateEffect::Assertion { passed }) => *passed,
                _ => is_truthy(call.args.first().unwrap_or(&Value::Null)),
            };
            if passed {
                return None;
            }
            Line::err(prefixed("Assertion failed", call.args.get(1..).unwrap_or_default()))
        }
        ConsoleMethod::Count => match &call.effect {
            Some(StateEffect::Count { label, count }) => Line::out(format!("{label}: {count}")),
            _ => return None,
        },
        ConsoleMethod::TimeEnd => match &call.effect {
            Some(StateEffect::TimerEnded {
                label,
                elapsed: Some(elapsed),
            }) => Line::out(format!("{label}: {:.3}ms", elapsed.as_secs_f64() * 1000.0)),
            Some(StateEffect::TimerEnded {
                label,
                elapsed: None,
            }) => Line::err(format!("Timer '{label}' does not exist")),
            _ => return None,
        },
        ConsoleMethod::Time => match &call.effect {
            Some(StateEffect::TimerStarted {
                label,
                started: false,
            }) => Line::err(format!("Timer '{label}' already exists")),
            _ => return None,
        },
        ConsoleMethod::Group => {
            if call.args.is_empty() {
                return None;
            }
            Line::out(join_args(&call.args))
        }
        ConsoleMethod::Dir | ConsoleMethod::Table => {
            let value = call.args.first()?;
            Line::out(serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()))
        }
        ConsoleMethod::GroupEnd | ConsoleMethod::Clear => return None,
    };

    Some(indent(line, depth))
}

fn indent(line: Line, depth: usize) -> Line {
    if depth == 0 {
        return line;
    }
    let pad = INDENT.repeat(depth);
    let text = line
        .text
        .lines()
        .map(|l| format!("{pad}{l}"))
        .collect::<Vec<_>>()
        .join("\n");
    Line { text, ..line }
}

fn prefixed(prefix: &str, args: &[Value]) -> String {
    if args.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}: {}", join_args(args))
    }
}

/// Strings print as-is, everything else as compact JSON
fn join_args(args: &[Value]) -> String {
    args.iter()
        .map(|arg| match arg {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// Only for calls without an `Assertion` effect; a converted NaN reads as the
// string "NaN" here and counts as truthy
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
