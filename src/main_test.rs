use super::*;
use clap::CommandFactory;

#[test]
fn test_cli_definition_is_valid() {
    Cli::command().debug_assert();
}

#[test]
fn test_log_filter_uses_flag_without_rust_log() {
    assert_eq!(log_filter(LogLevel::Debug, None).to_string(), "debug");
    assert_eq!(log_filter(LogLevel::Error, None).to_string(), "error");
}

#[test]
fn test_log_filter_prefers_rust_log() {
    let filter = log_filter(LogLevel::Info, Some("restarter=trace"));
    assert_eq!(filter.to_string(), "restarter=trace");
}
