use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;

use sandbox_runtime::{ConsoleError, HookFault};

/// Outcome of one evaluation
///
/// Serializes as `{ "ok": true, "data": ... }` or `{ "ok": false, "error": ... }`.
/// `data` is omitted when the script has no default export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "RawEnvelope", try_from = "RawEnvelope")]
pub enum ResponseEnvelope {
    Ok { data: Option<serde_json::Value> },
    Err { error: serde_json::Value },
}

#[derive(Serialize, Deserialize)]
struct RawEnvelope {
    ok: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    data: Option<serde_json::Value>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    error: Option<serde_json::Value>,
}

// A key that is present with `null` is still present
fn present<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

impl From<ResponseEnvelope> for RawEnvelope {
    fn from(envelope: ResponseEnvelope) -> Self {
        match envelope {
            ResponseEnvelope::Ok { data } => RawEnvelope {
                ok: true,
                data,
                error: None,
            },
            ResponseEnvelope::Err { error } => RawEnvelope {
                ok: false,
                data: None,
                error: Some(error),
            },
        }
    }
}

impl TryFrom<RawEnvelope> for ResponseEnvelope {
    type Error = String;

    fn try_from(raw: RawEnvelope) -> Result<Self, Self::Error> {
        match (raw.ok, raw.data, raw.error) {
            (true, data, None) => Ok(ResponseEnvelope::Ok { data }),
            (false, None, error) => Ok(ResponseEnvelope::Err {
                error: error.unwrap_or(serde_json::Value::Null),
            }),
            (true, _, Some(_)) => Err("successful envelope cannot carry an error".into()),
            (false, Some(_), _) => Err("failed envelope cannot carry data".into()),
        }
    }
}

impl ResponseEnvelope {
    pub fn ok(data: Option<serde_json::Value>) -> Self {
        ResponseEnvelope::Ok { data }
    }

    pub fn err(error: serde_json::Value) -> Self {
        ResponseEnvelope::Err { error }
    }

    /// Envelope for a console hook that failed during the evaluation
    pub fn from_hook_fault(fault: &HookFault) -> Self {
        let message = ConsoleError::from(fault.clone()).to_string();
        ResponseEnvelope::err(json!({
            "name": "HookError",
            "message": message,
            "method": fault.method.as_str(),
        }))
    }

    /// Envelope for a failure reported by the engine as text rather than as
    /// a thrown value, such as a module that does not parse.
    ///
    /// A leading `Uncaught ` is dropped and a `Name: message` first line is
    /// split into its parts.
    pub fn from_engine_error(text: &str) -> Self {
        let text = text.trim();
        let first_line = text.lines().next().unwrap_or_default();
        let first_line = first_line.strip_prefix("Uncaught ").unwrap_or(first_line);

        let (name, message) = match first_line.split_once(": ") {
            Some((name, message)) if is_error_name(name) => (name, message),
            _ => ("Error", first_line),
        };

        ResponseEnvelope::err(json!({
            "name": name,
            "message": message,
            "stack": text,
        }))
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ResponseEnvelope::Ok { .. })
    }

    pub fn is_err(&self) -> bool {
        !self.is_ok()
    }

    /// The default export, if the evaluation succeeded and exported one
    pub fn data(&self) -> Option<&serde_json::Value> {
        match self {
            ResponseEnvelope::Ok { data } => data.as_ref(),
            ResponseEnvelope::Err { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&serde_json::Value> {
        match self {
            ResponseEnvelope::Ok { .. } => None,
            ResponseEnvelope::Err { error } => Some(error),
        }
    }

    /// Human readable form of the error: its `message` for error objects,
    /// the JSON text of anything else that was thrown
    pub fn error_message(&self) -> Option<String> {
        self.error().map(|error| match error.get("message") {
            Some(serde_json::Value::String(message)) => message.clone(),
            _ => error.to_string(),
        })
    }

    pub fn into_result(self) -> Result<Option<serde_json::Value>, serde_json::Value> {
        match self {
            ResponseEnvelope::Ok { data } => Ok(data),
            ResponseEnvelope::Err { error } => Err(error),
        }
    }
}

fn is_error_name(name: &str) -> bool {
    name.ends_with("Error") && name.chars().all(|c| c.is_ascii_alphanumeric())
}
