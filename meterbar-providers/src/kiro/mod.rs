//! Kiro provider.
//!
//! Kiro has no usage API; the CLI prints the current credit balance.

mod error;
mod parser;
mod strategy;

use meterbar_core::ProviderKind;
use meterbar_fetch::{CandidatePipeline, FetchContext, FetchKind};

use crate::descriptor::ProviderDescriptor;

pub use error::KiroError;
pub use parser::{KiroUsageResponse, is_not_logged_in, parse_kiro_output};
pub use strategy::{KIRO_BINARY, KiroCliStrategy};

/// Builds the single CLI strategy.
pub fn build_kiro_pipeline(_ctx: &FetchContext) -> CandidatePipeline {
    CandidatePipeline::with_strategies(vec![Box::new(KiroCliStrategy::new())])
}

/// Kiro descriptor.
pub fn kiro_descriptor() -> ProviderDescriptor {
    ProviderDescriptor::builder(ProviderKind::Kiro)
        .dashboard("https://app.kiro.dev/account/usage")
        .pipeline(&[FetchKind::CLI], build_kiro_pipeline)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor() {
        let desc = kiro_descriptor();
        assert_eq!(desc.cli_name(), "kiro");
        assert!(!desc.metadata.default_enabled);
        assert_eq!(desc.build_pipeline(&FetchContext::new()).len(), 1);
    }
}
