use serde::Serialize;

/// Names the guest scope reserves for the runtime itself
const RESERVED: &[&str] = &["console", "globalThis", "Deno", "__sandboxSettle"];

/// Read-only values installed on the guest's `globalThis` at bootstrap
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SandboxGlobals(serde_json::Map<String, serde_json::Value>);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GlobalNameError {
    #[error("\"{0}\" is not a valid JavaScript identifier")]
    InvalidIdentifier(String),
    #[error("\"{0}\" is reserved by the runtime")]
    Reserved(String),
}

impl SandboxGlobals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a global, replacing a previous value with the same name
    ///
    /// # Errors
    ///
    /// This function will return an error if the name is not a plain
    /// identifier or collides with a name the runtime installs itself
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<(), GlobalNameError> {
        let name = name.into();
        validate_name(&name)?;
        self.0.insert(name, value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }

    pub(crate) fn as_map(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.0
    }
}

impl TryFrom<serde_json::Map<String, serde_json::Value>> for SandboxGlobals {
    type Error = GlobalNameError;

    fn try_from(map: serde_json::Map<String, serde_json::Value>) -> Result<Self, Self::Error> {
        let mut globals = Self::new();
        for (name, value) in map {
            globals.insert(name, value)?;
        }
        Ok(globals)
    }
}

fn validate_name(name: &str) -> Result<(), GlobalNameError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');

    if !valid_start || !valid_rest {
        return Err(GlobalNameError::InvalidIdentifier(name.to_string()));
    }
    if RESERVED.contains(&name) {
        return Err(GlobalNameError::Reserved(name.to_string()));
    }
    Ok(())
}
