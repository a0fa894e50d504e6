//! CLI integration tests
//!
//! These run the `xmldom` binary against the fixture documents.

#![cfg(feature = "cli")]

mod common;

use std::fs;
use std::process::{Command, Output};

use common::fixture;

fn xmldom(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_xmldom"))
        .args(args)
        .output()
        .expect("Failed to execute command")
}

fn path_arg(rel: &str) -> String {
    fixture(rel).to_str().unwrap().to_string()
}

// ============================================================================
// Format Command Tests
// ============================================================================

#[test]
fn test_cli_format_indent() {
    let output = xmldom(&["format", "--indent", &path_arg("xml/simple.xml")]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "format should succeed");
    assert!(stdout.starts_with("<?xml"), "should write a declaration: {}", stdout);
    assert!(stdout.contains("<root>\n    <element>Value</element>\n</root>"));
}

#[test]
fn test_cli_format_omit_declaration() {
    let output = xmldom(&["format", "--omit-declaration", &path_arg("xml/simple.xml")]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert_eq!(stdout.trim_end(), "<root><element>Value</element></root>");
}

#[test]
fn test_cli_format_missing_file() {
    let output = xmldom(&["format", "does-not-exist.xml"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("Error: file not found"), "{}", stderr);
}

// ============================================================================
// Query Command Tests
// ============================================================================

#[test]
fn test_cli_query_count() {
    let output = xmldom(&[
        "query",
        &path_arg("xml/library.xml"),
        "count(/lib:library/lib:book)",
        "--ns",
        "lib=urn:library",
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert_eq!(stdout.trim(), "2");
}

#[test]
fn test_cli_query_node_set() {
    let output = xmldom(&[
        "query",
        &path_arg("xml/library.xml"),
        "//lib:title",
        "--ns",
        "lib=urn:library",
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains(">Dune</"), "{}", lines[0]);
    assert!(lines[1].contains(">Emma</"), "{}", lines[1]);
}

#[test]
fn test_cli_query_json() {
    let output = xmldom(&["query", "--json", &path_arg("xml/library.xml"), "string(/*/@name)"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value, serde_json::json!("City Library"));
}

#[test]
fn test_cli_query_unbound_prefix() {
    let output = xmldom(&["query", &path_arg("xml/library.xml"), "//lib:title"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("Error:"), "{}", stderr);
}

// ============================================================================
// Validate Command Tests
// ============================================================================

#[test]
fn test_cli_validate_valid() {
    let output = xmldom(&[
        "validate",
        "--schema",
        &path_arg("xsd/library.xsd"),
        &path_arg("xml/library.xml"),
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("Document is valid"));
}

#[test]
fn test_cli_validate_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let document = dir.path().join("library.xml");
    let xml = fs::read_to_string(fixture("xml/library.xml")).unwrap();
    fs::write(&document, xml.replace("<price>9.99</price>", "<price>-1</price>")).unwrap();

    let output = xmldom(&[
        "validate",
        "-s",
        &path_arg("xsd/library.xsd"),
        document.to_str().unwrap(),
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout.contains("Document is invalid"));
    assert!(stdout.contains("/library/book/price"), "{}", stdout);
}
