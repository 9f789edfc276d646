//! Text output formatting with progress bars and colors.

use chrono::{DateTime, Duration, Local, NaiveDate, Utc};
use meterbar_core::{Candidate, DailySample, ModelUsage, Projection, ProviderKind, UsageModel, keys};
use meterbar_providers::ProviderDescriptor;
use meterbar_store::DisplayState;

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const BLUE: &str = "\x1b[34m";
const CYAN: &str = "\x1b[36m";

// Progress bar characters
const BAR_FULL: char = '█';
const BAR_EMPTY: char = '░';

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
    bar_width: usize,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self {
            use_colors,
            bar_width: 10,
        }
    }

    /// Formats one provider's display state.
    pub fn format_state(&self, provider: ProviderKind, state: &DisplayState) -> String {
        let name = provider.display_name();
        let mut lines = Vec::new();

        match state {
            DisplayState::NoData => {
                lines.push(format!("{} {}", self.bold(name), self.dim("No data yet")));
            }
            DisplayState::Failed { kind, stale } => {
                lines.push(format!("{}: {} - {}", self.bold(name), self.red("Error"), kind.label()));
                if let Some(result) = stale {
                    lines.push(self.dim(&format!(
                        "Showing last good data from {}",
                        self.format_fetched_at(result.fetched_at)
                    )));
                    for account in &result.accounts {
                        lines.push(self.format_account(account));
                    }
                }
            }
            DisplayState::Loaded { result, stale } => {
                let mut header = self.bold(name);
                if let Some(method) = result.primary_details.text(keys::LOGIN_METHOD) {
                    header.push_str(&format!(" ({method})"));
                }
                if *stale {
                    header.push_str(&format!(
                        " {}",
                        self.yellow(&format!("stale, from {}", self.format_fetched_at(result.fetched_at)))
                    ));
                }
                lines.push(header);
                for account in &result.accounts {
                    lines.push(self.format_account(account));
                }
            }
        }

        lines.join("\n")
    }

    /// Formats one reconciled account.
    fn format_account(&self, account: &Candidate) -> String {
        let mut lines = vec![format!("  {}", self.cyan(&account.display_label()))];
        lines.push(format!("    {}", self.format_usage(&account.usage)));

        if let Some(resets_at) = account.usage.resets_at() {
            lines.push(format!("    Resets {}", self.dim(&self.format_reset_time(resets_at))));
        }
        if let Some(plan) = account.details.text(keys::PLAN) {
            lines.push(format!("    Plan: {}", self.blue(plan)));
        }
        if let Some(org) = account.details.text(keys::ORGANIZATION) {
            lines.push(format!("    Org:  {org}"));
        }
        if account.source_labels.len() > 1 {
            lines.push(format!("    {}", self.dim(&format!("via {}", account.source_labels.join(", ")))));
        }

        lines.join("\n")
    }

    /// Formats a single reading.
    pub fn format_usage(&self, usage: &UsageModel) -> String {
        match usage {
            UsageModel::QuotaBased {
                remaining, total, ..
            } => {
                let left = usage.used_percent().map_or(100.0, |used| 100.0 - used);
                let bar = self.progress_bar(left.clamp(0.0, 100.0));
                let amount = if *remaining < 0.0 {
                    self.red(&format!("{} over of {}", format_quantity(-remaining), format_quantity(*total)))
                } else {
                    self.color_for_percent(
                        left,
                        &format!("{} / {} left", format_quantity(*remaining), format_quantity(*total)),
                    )
                };
                format!("{bar} {amount}")
            }
            UsageModel::PayAsYouGo {
                utilization_percent,
                cost,
                ..
            } => {
                let left = (100.0 - utilization_percent).clamp(0.0, 100.0);
                let bar = self.progress_bar(left);
                match cost {
                    Some(cost) => format!("{bar} {:.0}% used, {}", utilization_percent, self.green(&format!("${cost:.2}"))),
                    None => format!("{bar} {utilization_percent:.0}% used"),
                }
            }
            UsageModel::Unavailable { kind, reason } => self.dim(&format!("{kind}: {reason}")),
        }
    }

    /// Formats a progress bar.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn progress_bar(&self, percent_remaining: f64) -> String {
        let filled = ((percent_remaining / 100.0) * self.bar_width as f64).round() as usize;
        let filled = filled.min(self.bar_width);
        let empty = self.bar_width - filled;

        let bar = format!(
            "{}{}",
            BAR_FULL.to_string().repeat(filled),
            BAR_EMPTY.to_string().repeat(empty)
        );

        self.color_for_percent(percent_remaining, &bar)
    }

    /// Formats reset time as a countdown within a day, else absolute.
    fn format_reset_time(&self, resets_at: DateTime<Utc>) -> String {
        let now = Utc::now();
        if resets_at <= now {
            return "now".to_string();
        }

        let diff = resets_at - now;
        if diff < Duration::hours(1) {
            let mins = diff.num_minutes();
            format!("in {} minute{}", mins, if mins == 1 { "" } else { "s" })
        } else if diff < Duration::hours(24) {
            let hours = diff.num_hours();
            let mins = diff.num_minutes() % 60;
            if mins > 0 {
                format!("in {hours}h {mins}m")
            } else {
                format!("in {} hour{}", hours, if hours == 1 { "" } else { "s" })
            }
        } else {
            let local = resets_at.with_timezone(&Local);
            local.format("%a %b %-d at %H:%M").to_string()
        }
    }

    fn format_fetched_at(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&Local).format("%H:%M").to_string()
    }

    /// Formats a cost report.
    pub fn format_cost(
        &self,
        provider: ProviderKind,
        projection: Option<&Projection>,
        daily: &[DailySample],
        models: &[ModelUsage],
        today: NaiveDate,
    ) -> String {
        let mut lines = Vec::new();
        lines.push(format!("{} Cost Report", self.bold(provider.display_name())));
        lines.push("─".repeat(40));

        match projection {
            Some(p) => {
                lines.push(format!(
                    "Month to date: {}",
                    self.green(&format!("${:.2}", p.current_month_total))
                ));
                lines.push(format!(
                    "Projected:     {} by {}",
                    self.bold(&format!("${:.2}", p.predicted_eom)),
                    today.format("%B end")
                ));
                lines.push(format!(
                    "Daily average: ${:.2} over {} day{} ({} remaining)",
                    p.weighted_avg_daily_cost,
                    p.days_with_data,
                    if p.days_with_data == 1 { "" } else { "s" },
                    p.remaining_days
                ));
                lines.push(format!("Confidence:    {}", self.confidence(&p.confidence.to_string())));
            }
            None => {
                lines.push(self.dim("No cost history in the look-back window"));
            }
        }

        if !daily.is_empty() {
            lines.push(String::new());
            lines.push(self.dim("Daily breakdown:"));
            for day in daily {
                lines.push(format!("  {}  ${:.2}", day.date.format("%Y-%m-%d"), day.cost));
            }
        }

        if !models.is_empty() {
            lines.push(String::new());
            lines.push(self.dim("By model:"));
            for model in models {
                lines.push(format!(
                    "  {:<24} {:>8} incl. {:>8} billed  ${:.2}",
                    model.model,
                    format_quantity(model.included_requests),
                    format_quantity(model.billed_requests),
                    model.billed_amount
                ));
            }
        }

        lines.join("\n")
    }

    /// Formats provider list header.
    pub fn format_providers_header(&self) -> String {
        format!(
            "{:<14} {:<12} {:<8} {:<8} {}",
            self.bold("Provider"),
            self.bold("CLI"),
            self.bold("Enabled"),
            self.bold("Default"),
            self.bold("Dashboard")
        )
    }

    /// Formats a single provider line.
    pub fn format_provider_line(&self, desc: &ProviderDescriptor, enabled: bool) -> String {
        let mark = |on: bool| if on { self.green("✓") } else { self.dim("−") };
        let dashboard = desc.metadata.dashboard_url.unwrap_or("−");

        format!(
            "{:<14} {:<12} {:<8} {:<8} {}",
            desc.display_name(),
            desc.cli_name(),
            mark(enabled),
            mark(desc.metadata.default_enabled),
            dashboard
        )
    }

    /// Formats a one-line-per-provider summary.
    pub fn format_summary(&self, states: &[(ProviderKind, DisplayState)]) -> String {
        let mut lines = Vec::new();

        for (provider, state) in states {
            let name = provider.display_name();
            let line = match state {
                DisplayState::NoData => format!("{:<12} {}", name, self.dim("No data")),
                DisplayState::Failed { kind, stale } => {
                    let suffix = if stale.is_some() { " (showing last good)" } else { "" };
                    format!("{:<12} {}{}", name, self.red(kind.label()), suffix)
                }
                DisplayState::Loaded { result, stale } => {
                    let usage = self.format_usage(&result.aggregate_usage);
                    let marker = if *stale { self.yellow(" stale") } else { String::new() };
                    let accounts = if result.account_count() > 1 {
                        self.dim(&format!(" +{} more", result.account_count() - 1))
                    } else {
                        String::new()
                    };
                    format!("{name:<12} {usage}{accounts}{marker}")
                }
            };
            lines.push(line);
        }

        lines.join("\n")
    }

    // ========================================================================
    // Color/style helpers
    // ========================================================================

    fn color_for_percent(&self, percent: f64, text: &str) -> String {
        if !self.use_colors {
            return text.to_string();
        }

        if percent < 20.0 {
            self.red(text)
        } else if percent < 50.0 {
            self.yellow(text)
        } else {
            self.green(text)
        }
    }

    fn confidence(&self, label: &str) -> String {
        match label {
            "high" => self.green(label),
            "medium" => self.yellow(label),
            _ => self.red(label),
        }
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.use_colors {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    pub(crate) fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    pub(crate) fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }

    fn blue(&self, text: &str) -> String {
        self.paint(BLUE, text)
    }

    pub(crate) fn cyan(&self, text: &str) -> String {
        self.paint(CYAN, text)
    }
}

/// Formats a quantity compactly: whole numbers without decimals, thousands
/// with a K or M suffix.
pub fn format_quantity(n: f64) -> String {
    if n.abs() >= 1_000_000.0 {
        format!("{:.1}M", n / 1_000_000.0)
    } else if n.abs() >= 1_000.0 {
        format!("{:.1}K", n / 1_000.0)
    } else if (n - n.round()).abs() < 1e-9 {
        format!("{n:.0}")
    } else {
        format!("{n:.2}")
    }
}

// ============================================================================
// Tests
// ============================================================================
