//! CLI output formatting tests.
//!
//! These tests verify that CLI output is correctly formatted for both
//! text and JSON output modes.

use meterbar_core::{Candidate, ErrorKind, ProviderKind, ProviderResult, UsageModel, keys};
use meterbar_store::DisplayState;
use std::sync::Arc;

fn result(kind: ProviderKind, accounts: Vec<Candidate>) -> Arc<ProviderResult> {
    Arc::new(ProviderResult::from_accounts(kind, accounts).unwrap())
}

fn quota(remaining: f64, total: f64) -> UsageModel {
    UsageModel::quota(remaining, total, false).unwrap()
}

#[cfg(test)]
mod text_formatter_tests {
    use super::super::text::TextFormatter;
    use super::*;

    #[test]
    fn test_progress_bar_boundary_values() {
        let formatter = TextFormatter::new(false);

        let test_cases = vec![
            (0.0, "░░░░░░░░░░"),
            (10.0, "█░░░░░░░░░"),
            (25.0, "███░░░░░░░"),
            (50.0, "█████░░░░░"),
            (75.0, "████████░░"),
            (100.0, "██████████"),
        ];

        for (percent, expected) in test_cases {
            assert_eq!(formatter.progress_bar(percent), expected, "Failed for {percent}%");
        }
    }

    #[test]
    fn test_no_data_is_not_zero() {
        let formatter = TextFormatter::new(false);
        let output = formatter.format_state(ProviderKind::Claude, &DisplayState::NoData);

        assert!(output.contains("Claude"));
        assert!(output.contains("No data yet"));
        assert!(!output.contains("left"));
    }

    #[test]
    fn test_loaded_lists_every_account() {
        let formatter = TextFormatter::new(false);
        let primary = Candidate::new(quota(80.0, 100.0), 80, "env:A")
            .with_email("work@example.com")
            .with_detail(keys::PLAN, "max")
            .with_detail(keys::LOGIN_METHOD, "oauth");
        let secondary = Candidate::new(quota(10.0, 100.0), 70, "env:B").with_email("home@example.com");
        let state = DisplayState::Loaded {
            result: result(ProviderKind::Claude, vec![primary, secondary]),
            stale: false,
        };

        let output = formatter.format_state(ProviderKind::Claude, &state);

        assert!(output.contains("Claude (oauth)"));
        assert!(output.contains("work@example.com"));
        assert!(output.contains("home@example.com"));
        assert!(output.contains("80 / 100 left"));
        assert!(output.contains("Plan: max"));
        assert!(!output.contains("stale"));
    }

    #[test]
    fn test_stale_loaded_is_marked() {
        let formatter = TextFormatter::new(false);
        let state = DisplayState::Loaded {
            result: result(ProviderKind::Kiro, vec![Candidate::new(quota(5.0, 50.0), 70, "cli")]),
            stale: true,
        };

        assert!(formatter.format_state(ProviderKind::Kiro, &state).contains("stale, from"));
    }

    #[test]
    fn test_failed_with_fallback() {
        let formatter = TextFormatter::new(false);
        let state = DisplayState::Failed {
            kind: ErrorKind::Network,
            stale: Some(result(
                ProviderKind::Cursor,
                vec![Candidate::new(quota(30.0, 500.0), 80, "env:A")],
            )),
        };

        let output = formatter.format_state(ProviderKind::Cursor, &state);
        assert!(output.contains("Error - network error"));
        assert!(output.contains("Showing last good data"));
        assert!(output.contains("30 / 500 left"));
    }

    #[test]
    fn test_pay_as_you_go_shows_cost() {
        let formatter = TextFormatter::new(false);
        let usage = UsageModel::pay_as_you_go(12.0, Some(4.5)).unwrap();
        let output = formatter.format_usage(&usage);

        assert!(output.contains("12% used"));
        assert!(output.contains("$4.50"));
    }

    #[test]
    fn test_summary_one_line_per_provider() {
        let formatter = TextFormatter::new(false);
        let states = vec![
            (
                ProviderKind::Claude,
                DisplayState::Loaded {
                    result: result(ProviderKind::Claude, vec![Candidate::new(quota(50.0, 100.0), 80, "a")]),
                    stale: false,
                },
            ),
            (
                ProviderKind::Copilot,
                DisplayState::Failed {
                    kind: ErrorKind::AuthenticationFailed,
                    stale: None,
                },
            ),
            (ProviderKind::Windsurf, DisplayState::NoData),
        ];

        let output = formatter.format_summary(&states);
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Claude"));
        assert!(lines[1].contains("authentication failed"));
        assert!(lines[2].contains("No data"));
    }
}

#[cfg(test)]
mod json_formatter_tests {
    use super::super::json::{JsonFormatter, ProviderOutput};
    use super::*;

    #[test]
    fn test_states_serialize_distinctly() {
        let formatter = JsonFormatter::new(false);
        let zero = result(ProviderKind::Claude, vec![Candidate::new(quota(100.0, 100.0), 80, "a")]);
        let states = vec![
            (ProviderKind::Claude, DisplayState::Loaded { result: zero, stale: false }),
            (
                ProviderKind::Copilot,
                DisplayState::Failed {
                    kind: ErrorKind::Decoding,
                    stale: None,
                },
            ),
            (ProviderKind::Kiro, DisplayState::NoData),
        ];

        let output = formatter.format_states(&states).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        let rows = parsed.as_array().unwrap();

        assert_eq!(rows[0]["provider"], "claude");
        assert_eq!(rows[0]["state"], "ok");
        assert_eq!(rows[0]["confirmedZero"], true);
        assert_eq!(rows[0]["result"]["accounts"].as_array().unwrap().len(), 1);

        assert_eq!(rows[1]["state"], "failed");
        assert_eq!(rows[1]["error"], "decoding");
        assert!(rows[1].get("result").is_none());

        assert_eq!(rows[2]["state"], "no_data");
        assert_eq!(rows[2]["confirmedZero"], false);
    }

    #[test]
    fn test_failed_with_stale_result_keeps_it() {
        let stale = result(ProviderKind::Cursor, vec![Candidate::new(quota(1.0, 2.0), 80, "a")]);
        let state = DisplayState::Failed {
            kind: ErrorKind::Network,
            stale: Some(stale),
        };

        let output = ProviderOutput::from_state(ProviderKind::Cursor, &state);
        assert_eq!(output.state, "failed");
        assert!(output.result.is_some());
        assert!(!output.confirmed_zero);
    }

    #[test]
    fn test_pretty_output() {
        let formatter = JsonFormatter::new(true);
        let output = formatter.format(&serde_json::json!({"a": 1})).unwrap();
        assert!(output.contains('\n'));
    }
}
