use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use std::path::Path;

#[test]
fn cli_parse_probe() {
    match parse(&["hdm", "probe", "https://example.com/file.iso"]) {
        CliCommand::Probe { url } => assert_eq!(url, "https://example.com/file.iso"),
        other => panic!("expected Probe, got {:?}", other),
    }
}

#[test]
fn cli_parse_checksum() {
    match parse(&["hdm", "checksum", "/tmp/file.iso"]) {
        CliCommand::Checksum { path } => assert_eq!(path, Path::new("/tmp/file.iso")),
        other => panic!("expected Checksum, got {:?}", other),
    }
}

#[test]
fn cli_rejects_unknown_subcommand() {
    assert!(Cli::try_parse_from(["hdm", "status"]).is_err());
}
