//! Tests for the simulate subcommand.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;

#[test]
fn cli_parse_simulate_defaults() {
    match parse(&["taskgate", "simulate", "--tasks", "25"]) {
        CliCommand::Simulate {
            tasks,
            concurrency,
            failure_rate,
            latency_ms,
            json,
        } => {
            assert_eq!(tasks, 25);
            assert!(concurrency.is_none());
            assert_eq!(failure_rate, 0.0);
            assert_eq!(latency_ms, 50);
            assert!(!json);
        }
        _ => panic!("expected Simulate"),
    }
}

#[test]
fn cli_parse_simulate_all_flags() {
    match parse(&[
        "taskgate",
        "simulate",
        "--tasks",
        "100",
        "--concurrency",
        "8",
        "--failure-rate",
        "0.25",
        "--latency-ms",
        "10",
        "--json",
    ]) {
        CliCommand::Simulate {
            tasks,
            concurrency,
            failure_rate,
            latency_ms,
            json,
        } => {
            assert_eq!(tasks, 100);
            assert_eq!(concurrency, Some(8));
            assert!((failure_rate - 0.25).abs() < 1e-9);
            assert_eq!(latency_ms, 10);
            assert!(json);
        }
        _ => panic!("expected Simulate with flags"),
    }
}

#[test]
fn cli_simulate_requires_task_count() {
    assert!(Cli::try_parse_from(["taskgate", "simulate"]).is_err());
    assert!(Cli::try_parse_from(["taskgate", "simulate", "--tasks", "many"]).is_err());
}
