use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn weft() -> Command {
    Command::cargo_bin("weft").unwrap()
}

/// Writes `<name>.as` into the scratch dir and returns the base path the
/// assembler expects as its argument.
fn write_source(dir: &TempDir, name: &str, text: &str) -> String {
    let base = dir.path().join(name);
    fs::write(format!("{}.as", base.display()), text).unwrap();
    base.to_str().unwrap().to_string()
}

fn read(base: &str, ext: &str) -> String {
    fs::read_to_string(format!("{base}.{ext}")).unwrap()
}

fn exists(base: &str, ext: &str) -> bool {
    Path::new(&format!("{base}.{ext}")).exists()
}

const DEMO: &str = "\
; demo program
mcro setup
clr r1
mcroend
.entry MAIN
.extern W
MAIN: mov #3, r2
setup
lea STR, r6
jmp &MAIN
cmp W, #0
stop
STR: .string \"hi\"
END: .data 4, -4
.entry END
";

const DEMO_OB: &str = "     11 5
0000100 001A04
0000101 00001C
0000102 14190C
0000103 111E04
0000104 00037A
0000105 24100C
0000106 FFFFE4
0000107 050004
0000108 000001
0000109 000004
0000110 3C0004
0000111 000068
0000112 000069
0000113 000000
0000114 000004
0000115 FFFFFC
";

#[test]
fn runs_without_arguments() {
    weft().assert().success();
}

#[test]
fn missing_source_fails() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("nothere");
    weft().arg(base.to_str().unwrap()).assert().failure();
}

#[test]
fn assembles_demo_program() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_source(&dir, "demo", DEMO);

    weft()
        .arg(&base)
        .assert()
        .success()
        .stdout(contains("Finished"));

    assert_eq!(read(&base, "ob"), DEMO_OB);
    assert_eq!(read(&base, "ext"), "W 0000108\n");
    assert_eq!(read(&base, "ent"), "MAIN 0000100\nEND 0000114\n");
}

#[test]
fn expanded_source_drops_definitions_and_comments() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_source(&dir, "demo", DEMO);

    weft().arg(&base).assert().success();

    let am = read(&base, "am");
    assert!(!am.contains("mcro"));
    assert!(!am.contains(';'));
    assert!(am.contains("clr r1\n"));
    assert_eq!(am.lines().count(), 11);
}

#[test]
fn macro_body_replaces_invocation_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_source(
        &dir,
        "loops",
        "mcro twice\ninc r1\ninc r1\nmcroend\ntwice\nstop\n",
    );

    weft().arg(&base).assert().success();
    assert_eq!(read(&base, "am"), "inc r1\ninc r1\nstop\n");
}

#[test]
fn reassembly_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_source(&dir, "demo", DEMO);

    weft().arg(&base).assert().success();
    let first = (read(&base, "ob"), read(&base, "ext"), read(&base, "ent"));

    weft().arg(&base).assert().success();
    let second = (read(&base, "ob"), read(&base, "ext"), read(&base, "ent"));

    assert_eq!(first, second);
}

#[test]
fn diagnostics_suppress_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_source(&dir, "broken", "mov r1,\nJMP: jmp &NOWHERE\n");

    weft()
        .arg(&base)
        .assert()
        .success()
        .stdout(contains("Skipping"));

    // The expanded source is still produced; the listings are not.
    assert!(exists(&base, "am"));
    assert!(!exists(&base, "ob"));
    assert!(!exists(&base, "ext"));
    assert!(!exists(&base, "ent"));
}

#[test]
fn one_bad_file_does_not_stop_the_next() {
    let dir = tempfile::tempdir().unwrap();
    let bad = write_source(&dir, "bad", "frobnicate\n");
    let good = write_source(&dir, "good", "stop\n");

    weft()
        .arg(&bad)
        .arg(&good)
        .assert()
        .success()
        .stdout(contains("Skipping").and(contains("Finished")));

    assert!(!exists(&bad, "ob"));
    assert_eq!(read(&good, "ob"), "     1 0\n0000100 3C0004\n");
}

#[test]
fn listings_only_appear_when_used() {
    let dir = tempfile::tempdir().unwrap();
    let base = write_source(&dir, "plain", "mov r1, r2\nstop\n");

    weft().arg(&base).assert().success();

    assert!(exists(&base, "ob"));
    assert!(!exists(&base, "ext"));
    assert!(!exists(&base, "ent"));
}

#[test]
fn over_long_line_invalidates_file() {
    let dir = tempfile::tempdir().unwrap();
    let long = format!("LBL: .data {}1\n", "1, ".repeat(40));
    let base = write_source(&dir, "wide", &long);

    weft()
        .arg(&base)
        .assert()
        .success()
        .stdout(contains("Skipping"));
    assert!(!exists(&base, "ob"));
}
