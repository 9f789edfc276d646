//! Output formatting for CLI.

mod json;
mod text;

pub use json::{CostOutput, JsonFormatter, ProviderInfoOutput, ProviderOutput, TickOutput};
pub use text::TextFormatter;
#[cfg(test)]
mod tests;
