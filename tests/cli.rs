//! CLI smoke tests. Nothing here touches the network: every invocation
//! fails or exits before a request would be sent.

use assert_cmd::Command;

fn cli() -> Command {
    let mut cmd = Command::cargo_bin("loki-nlu").expect("binary should build");
    // Keep the process environment out of the way.
    cmd.env_remove("LOKI_CONFIG_PATH")
        .env_remove("LOKI_ENDPOINT")
        .env_remove("LOKI_USERNAME")
        .env_remove("LOKI_KEY");
    cmd
}

#[test]
fn help_lists_subcommands() {
    let assert = cli().arg("--help").assert().success();
    let output = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(output.contains("match"));
    assert!(output.contains("raw"));
    assert!(output.contains("exercise"));
}

#[test]
fn no_subcommand_fails_with_usage() {
    cli().assert().failure();
}

#[test]
fn match_requires_input_text() {
    cli().arg("match").assert().failure();
}

#[test]
fn match_with_missing_template_file_fails() {
    let assert = cli()
        .args(["match", "今天天氣如何", "--template", "/nonexistent/template.json"])
        .assert()
        .failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("failed to read template"));
}

#[test]
fn exercise_with_missing_file_fails() {
    let assert = cli()
        .args(["exercise", "--file", "/nonexistent/utterances.txt"])
        .assert()
        .failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("failed to read"));
}
