use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::{Parser, ValueEnum};
use sandbox_config::{Config, runtime::DiagnosticsScope};
use sandbox_executor::{ResponseEnvelope, SandboxOptions, init_runtime};
use tracing::{debug, info};

use crate::utils::console::ConsolePrinter;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ScopeArg {
    /// Counters, timers and groups persist for the whole runtime
    Runtime,
    /// Counters, timers and groups are cleared before each evaluation
    Evaluation,
}

impl From<ScopeArg> for DiagnosticsScope {
    fn from(scope: ScopeArg) -> Self {
        match scope {
            ScopeArg::Runtime => DiagnosticsScope::Runtime,
            ScopeArg::Evaluation => DiagnosticsScope::Evaluation,
        }
    }
}

#[derive(Debug, Clone, Parser)]
pub struct RunCmd {
    /// Path of the JavaScript module to evaluate
    pub script: Utf8PathBuf,

    /// Lifetime of console counters, timers and groups, overrides the config
    #[arg(long, value_enum)]
    pub scope: Option<ScopeArg>,

    /// Print console calls as JSON lines instead of text
    #[arg(long)]
    pub json: bool,
}

impl RunCmd {
    pub(crate) async fn handle(&self, cfg: Config) -> Result<ResponseEnvelope> {
        let code = std::fs::read_to_string(&self.script)
            .context(format!("Failed reading script: {}", self.script))?;

        let mut options = SandboxOptions::from_config(&cfg.runtime);
        if let Some(scope) = self.scope {
            options = options.with_diagnostics_scope(scope.into());
        }

        let printer = ConsolePrinter::new(self.json);
        let options = options.with_hooks(printer.hooks());

        debug!(script = %self.script, scope = options.diagnostics_scope.as_str(), "Running script");
        let mut runtime = init_runtime(options)
            .await
            .context("Failed initializing sandbox")?;

        let envelope = runtime.eval_code(&code).await;
        info!(ok = envelope.is_ok(), "Script finished");

        println!("{}", serde_json::to_string_pretty(&envelope)?);
        Ok(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_script(dir: &tempfile::TempDir, code: &str) -> Utf8PathBuf {
        let path = Utf8PathBuf::from_path_buf(dir.path().join("script.js")).unwrap();
        std::fs::write(&path, code).unwrap();
        path
    }

    #[tokio::test]
    async fn test_run_reports_default_export() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = RunCmd {
            script: write_script(&dir, "console.log('hi'); export default API_BASE"),
            scope: None,
            json: true,
        };

        let mut cfg = Config::default();
        cfg.runtime
            .globals
            .insert("API_BASE".into(), serde_json::json!("https://example.com"));

        let envelope = cmd.handle(cfg).await.unwrap();
        assert_eq!(envelope.data(), Some(&serde_json::json!("https://example.com")));
    }

    #[tokio::test]
    async fn test_run_reports_thrown_error() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = RunCmd {
            script: write_script(&dir, "throw new Error('boom')"),
            scope: Some(ScopeArg::Evaluation),
            json: false,
        };

        let envelope = cmd.handle(Config::default()).await.unwrap();
        assert_eq!(envelope.error_message().as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_missing_script_is_an_error() {
        let cmd = RunCmd {
            script: Utf8PathBuf::from("/definitely/not/here.js"),
            scope: None,
            json: false,
        };

        let err = cmd.handle(Config::default()).await.unwrap_err();
        assert!(err.to_string().contains("Failed reading script"));
    }
}
