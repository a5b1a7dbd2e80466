use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

#[test]
fn inspect_defaults_to_simple_tokens() {
    let mut cmd = cargo_bin_cmd!("nbdeck");
    cmd.arg("inspect").arg(fixture("deck.ipynb"));

    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("front_matter [0, 0]\ncell_meta [10001, 10001] {}\n"))
        .stdout(predicate::str::contains("nb_code_cell [20001, 20001]"));
}

#[test]
fn inspect_tokens_json() {
    let mut cmd = cargo_bin_cmd!("nbdeck");
    cmd.arg("inspect").arg(fixture("deck.ipynb")).arg("tokens-json");

    let output = cmd.assert().success().get_output().stdout.clone();
    let tokens: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let carriers = tokens
        .as_array()
        .unwrap()
        .iter()
        .filter(|token| token["type"] == "cell_meta")
        .count();
    assert_eq!(carriers, 3);
}

#[test]
fn inspect_rejects_unknown_transform() {
    let mut cmd = cargo_bin_cmd!("nbdeck");
    cmd.arg("inspect").arg(fixture("deck.ipynb")).arg("ast-tag");

    cmd.assert().failure();
}

#[test]
fn list_formats_shows_registry_and_transforms() {
    let mut cmd = cargo_bin_cmd!("nbdeck");
    cmd.arg("--list-formats");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("html"))
        .stdout(predicate::str::contains("man"))
        .stdout(predicate::str::contains("tree-json"));
}
