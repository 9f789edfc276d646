//! Kiro CLI strategy.

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use meterbar_core::Candidate;
use meterbar_fetch::{FetchContext, FetchError, FetchKind, FetchStrategy, ProcessError};

use super::error::KiroError;
use super::parser::{is_not_logged_in, parse_kiro_output};

/// Kiro CLI binary name.
pub const KIRO_BINARY: &str = "kiro-cli";

const USAGE_ARGS: &[&str] = &["usage", "--format", "json"];

/// Reads usage by running `kiro-cli usage`.
#[derive(Debug, Default)]
pub struct KiroCliStrategy;

impl KiroCliStrategy {
    /// Creates the strategy.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FetchStrategy for KiroCliStrategy {
    fn id(&self) -> &str {
        "kiro.cli"
    }

    fn kind(&self) -> FetchKind {
        FetchKind::CLI
    }

    fn source_label(&self) -> String {
        format!("cli:{KIRO_BINARY}")
    }

    async fn is_available(&self, ctx: &FetchContext) -> bool {
        ctx.process.command_exists(KIRO_BINARY)
    }

    #[instrument(skip(self, ctx))]
    async fn fetch(&self, ctx: &FetchContext) -> Result<Candidate, FetchError> {
        let output = ctx
            .process
            .run_with_options(KIRO_BINARY, USAGE_ARGS, &[("NO_COLOR", "1")], ctx.timeout())
            .await
            .map_err(KiroError::Cli)?;

        if !output.success() {
            if is_not_logged_in(&output.stderr) || is_not_logged_in(&output.stdout) {
                warn!("kiro-cli reports no login");
                return Err(KiroError::NotLoggedIn.into());
            }
            return Err(KiroError::Cli(ProcessError::NonZeroExit {
                code: output.exit_code,
                stderr: output.stderr,
            })
            .into());
        }

        debug!(duration = ?output.duration, "kiro-cli finished");
        Ok(parse_kiro_output(&output.stdout, self.priority(), &self.source_label())?)
    }
}

// ============================================================================
// Tests
// ============================================================================
