//! Providers command - list available providers.

use anyhow::Result;
use meterbar_providers::ProviderRegistry;
use meterbar_store::SettingsStore;
use tracing::info;

use crate::output::{JsonFormatter, ProviderInfoOutput, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Runs the providers command.
pub async fn run(cli: &Cli) -> Result<ExitCode> {
    info!("Listing providers");

    let settings = SettingsStore::load_default().await.get().await;
    let providers = ProviderRegistry::all();

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);

            println!("{}", formatter.format_providers_header());
            println!("{}", "─".repeat(70));

            for desc in providers {
                println!("{}", formatter.format_provider_line(desc, settings.is_enabled(desc.id)));
            }

            println!();
            println!(
                "Total: {} providers ({} enabled)",
                providers.len(),
                providers.iter().filter(|d| settings.is_enabled(d.id)).count()
            );
        }
        OutputFormat::Json => {
            let outputs: Vec<ProviderInfoOutput> = providers
                .iter()
                .map(|desc| ProviderInfoOutput::new(desc, settings.is_enabled(desc.id)))
                .collect();
            println!("{}", JsonFormatter::new(cli.pretty).format(&outputs)?);
        }
    }

    Ok(ExitCode::Success)
}
