use assert_cmd::Command;
use predicates::prelude::*;

fn geotab_support() -> Command {
    let mut cmd = Command::cargo_bin("geotab-support").unwrap();
    // Keep the developer's environment out of the tests
    cmd.env_remove("PROJECT_ID")
        .env_remove("GEMINI_MODEL")
        .env_remove("VERTEX_API_ENDPOINT")
        .env_remove("VERTEX_ACCESS_TOKEN")
        .env_remove("VERTEX_LOCATION")
        .env_remove("VERTEX_TIMEOUT_SECS");
    cmd
}

#[test]
fn test_cli_help() {
    geotab_support()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: geotab-support"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("route"))
        .stdout(predicate::str::contains("--project-id <PROJECT_ID>"))
        .stdout(predicate::str::contains("--version"));
}

#[test]
fn test_cli_serve_help() {
    geotab_support()
        .arg("serve")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: geotab-support serve"))
        .stdout(predicate::str::contains("--port <PORT>"))
        .stdout(predicate::str::contains("--reveal-delay-ms <REVEAL_DELAY_MS>"));
}

#[test]
fn test_cli_no_command() {
    geotab_support()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage: geotab-support"));
}

#[test]
fn test_route_go9() {
    geotab_support()
        .arg("route")
        .arg("What do the LEDs mean?")
        .assert()
        .success()
        .stdout(predicate::str::contains("Device: Geotab GO9"))
        .stdout(predicate::str::contains(
            "Reference URL: https://www.geotab.com/es/go9-support-document/",
        ));
}

#[test]
fn test_route_focus_needs_no_project() {
    geotab_support()
        .arg("route")
        .arg("My GO Focus camera won't connect")
        .assert()
        .success()
        .stdout(predicate::str::contains("Device: GO Focus / Focus Plus"))
        .stdout(predicate::str::contains(
            "https://support.geotab.com/camera-devices/doc/go-focus-plus-new",
        ));
}

#[test]
fn test_serve_without_project_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    geotab_support()
        .current_dir(dir.path())
        .arg("serve")
        .arg("--port")
        .arg("0")
        .timeout(std::time::Duration::from_secs(10))
        .assert()
        .failure()
        .stderr(predicate::str::contains("PROJECT_ID not found"));
}

#[test]
fn test_chat_without_project_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    geotab_support()
        .current_dir(dir.path())
        .arg("chat")
        .write_stdin("hello\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("PROJECT_ID not found"));
}

#[test]
fn test_chat_reports_request_error_inline() {
    let dir = tempfile::tempdir().unwrap();
    // Nothing listens on port 9 locally, so every request fails fast.
    geotab_support()
        .current_dir(dir.path())
        .args(["--project-id", "test-project"])
        .args(["--api-endpoint", "http://127.0.0.1:9"])
        .arg("chat")
        .write_stdin("What do the LEDs mean?\n")
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("Analyzing Geotab GO9 documentation..."))
        .stdout(predicate::str::contains("Error generating response:"));
}
