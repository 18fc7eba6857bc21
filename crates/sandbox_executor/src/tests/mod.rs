
use std::sync::{Arc, Mutex};

use crate::{ConsoleCall, ConsoleMethod, HookConfiguration};

/// Records every call a hook receives
#[derive(Clone, Default)]
pub(crate) struct Spy {
    calls: Arc<Mutex<Vec<ConsoleCall>>>,
}

impl Spy {
    pub(crate) fn calls(&self) -> Vec<ConsoleCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn args(&self) -> Vec<Vec<serde_json::Value>> {
        self.calls().into_iter().map(|c| c.args).collect()
    }

    pub(crate) fn times_called(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Registers this spy as the hook for `method`
    pub(crate) fn hook(&self, hooks: HookConfiguration, method: ConsoleMethod) -> HookConfiguration {
        let calls = Arc::clone(&self.calls);
        hooks.with_hook(method, move |call| {
            calls.lock().unwrap().push(call.clone());
            Ok(())
        })
    }
}
