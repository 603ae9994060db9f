//! Tests for the batch subcommand.

use super::parse;
use crate::cli::CliCommand;

#[test]
fn cli_parse_batch() {
    match parse(&["taskgate", "batch", "--requests", "40"]) {
        CliCommand::Batch {
            requests,
            keys,
            json,
        } => {
            assert_eq!(requests, 40);
            assert_eq!(keys, 1);
            assert!(!json);
        }
        _ => panic!("expected Batch"),
    }
}

#[test]
fn cli_parse_batch_keys_and_json() {
    match parse(&["taskgate", "batch", "--requests", "9", "--keys", "3", "--json"]) {
        CliCommand::Batch {
            requests,
            keys,
            json,
        } => {
            assert_eq!(requests, 9);
            assert_eq!(keys, 3);
            assert!(json);
        }
        _ => panic!("expected Batch with --keys"),
    }
}
