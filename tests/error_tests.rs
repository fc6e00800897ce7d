//! Tests for the error system.

use realtime_console::error::unified::*;
use realtime_console::error::*;

#[test]
fn error_api_creation() {
    let err = ConsoleError::api(404, "Not found");
    assert!(matches!(&err, ConsoleError::Api { status: 404, .. }));
    assert_eq!(err.to_string(), "API error (status 404): Not found");
}

#[test]
fn error_tool_creation() {
    let err = ConsoleError::tool("get_weather", "lookup failed");
    assert_eq!(
        err.to_string(),
        "Tool execution error: get_weather: lookup failed"
    );
}

#[test]
fn error_helper_mappings_are_stable_for_major_variants() {
    struct Case {
        error: ConsoleError,
        expected_category: ErrorCategory,
        expected_recovery: RecoverySuggestion,
    }

    let io_error = std::io::Error::new(std::io::ErrorKind::Other, "disk");
    let serde_error = serde_json::from_str::<serde_json::Value>("{not-json}").unwrap_err();

    let cases = vec![
        Case {
            error: ConsoleError::Authentication("missing key".to_string()),
            expected_category: ErrorCategory::Authentication,
            expected_recovery: RecoverySuggestion::PromptForCredentials,
        },
        Case {
            error: ConsoleError::api(401, "unauthorized"),
            expected_category: ErrorCategory::Authentication,
            expected_recovery: RecoverySuggestion::PromptForCredentials,
        },
        Case {
            error: ConsoleError::api(502, "bad gateway"),
            expected_category: ErrorCategory::Transport,
            expected_recovery: RecoverySuggestion::InspectEventLog,
        },
        Case {
            error: ConsoleError::Configuration("bad url".to_string()),
            expected_category: ErrorCategory::Configuration,
            expected_recovery: RecoverySuggestion::CheckConfiguration,
        },
        Case {
            error: ConsoleError::InvalidArgument("duplicate tool".to_string()),
            expected_category: ErrorCategory::Configuration,
            expected_recovery: RecoverySuggestion::CheckConfiguration,
        },
        Case {
            error: ConsoleError::Io(io_error),
            expected_category: ErrorCategory::Transport,
            expected_recovery: RecoverySuggestion::InspectEventLog,
        },
        Case {
            error: ConsoleError::Serialization(serde_error),
            expected_category: ErrorCategory::Transport,
            expected_recovery: RecoverySuggestion::InspectEventLog,
        },
        Case {
            error: ConsoleError::Stream("socket closed".to_string()),
            expected_category: ErrorCategory::Transport,
            expected_recovery: RecoverySuggestion::InspectEventLog,
        },
        Case {
            error: ConsoleError::tool("get_weather", "timeout"),
            expected_category: ErrorCategory::Tool,
            expected_recovery: RecoverySuggestion::InspectEventLog,
        },
        Case {
            error: ConsoleError::Audio("feed dropped".to_string()),
            expected_category: ErrorCategory::Audio,
            expected_recovery: RecoverySuggestion::InspectEventLog,
        },
        Case {
            error: ConsoleError::NotConnected,
            expected_category: ErrorCategory::State,
            expected_recovery: RecoverySuggestion::Reconnect,
        },
        Case {
            error: ConsoleError::InvalidState("already connected".to_string()),
            expected_category: ErrorCategory::State,
            expected_recovery: RecoverySuggestion::Ignore,
        },
    ];

    for case in cases {
        assert_eq!(case.error.category(), case.expected_category, "{}", case.error);
        assert_eq!(
            case.error.recovery_suggestion(),
            case.expected_recovery,
            "{}",
            case.error
        );
        assert!(!case.error.is_fatal(), "{}", case.error);
    }
}
