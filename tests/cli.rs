use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn moviebot() -> Command {
    let mut cmd = Command::cargo_bin("moviebot").unwrap();
    for var in ["MOVIEBOT_DATA", "OLLAMA_URL", "MOVIEBOT_MODEL", "MOVIEBOT_STT_URL", "MOVIEBOT_TEMPLATES", "RUST_LOG"] {
        cmd.env_remove(var);
    }
    cmd
}

fn movies_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "Title,Genre,Rating").unwrap();
    writeln!(file, "Inception,Sci-Fi,8.8").unwrap();
    writeln!(file, "Gladiator,Action,8.5").unwrap();
    file
}

#[test]
fn test_cli_help() {
    moviebot()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: moviebot"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("ask"))
        .stdout(predicate::str::contains("voice"))
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("--data <DATA>"))
        .stdout(predicate::str::contains("--prompt-template <PROMPT_TEMPLATE>"));
}

#[test]
fn test_cli_serve_help() {
    moviebot()
        .arg("serve")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: moviebot serve"))
        .stdout(predicate::str::contains("--port <PORT>"))
        .stdout(predicate::str::contains("--templates <TEMPLATES>"));
}

#[test]
fn test_cli_no_command() {
    // clap exits with non-zero status when no command is given
    moviebot()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage: moviebot"));
}

#[test]
fn test_cli_rejects_unknown_prompt_template() {
    moviebot()
        .args(["--prompt-template", "haiku", "ask", "drama"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown prompt template"));
}

#[test]
fn test_ask_dataset_hit() {
    let csv = movies_csv();
    moviebot()
        .arg("--data")
        .arg(csv.path())
        .args(["ask", "SCI-FI"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Recommended Movies:\n- Inception (Rating: 8.8)\n"))
        .stdout(predicate::str::contains("Gladiator").not());
}

#[test]
fn test_ask_blank_query_fails() {
    let csv = movies_csv();
    moviebot()
        .arg("--data")
        .arg(csv.path())
        .args(["ask", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("query must not be empty"));
}

#[test]
fn test_ask_missing_dataset_fails() {
    moviebot()
        .args(["--data", "/nonexistent/movies.csv", "ask", "drama"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load movie dataset"));
}

#[test]
fn test_serve_fails_when_dataset_is_missing() {
    moviebot()
        .args(["--data", "/nonexistent/movies.csv", "serve", "--port", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load movie dataset"));
}

#[test]
fn test_serve_fails_when_port_is_taken() {
    let taken = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
    let port = taken.local_addr().unwrap().port().to_string();
    let csv = movies_csv();

    moviebot()
        .arg("--data")
        .arg(csv.path())
        .args(["serve", "--port", &port])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to bind to address"));
}

#[test]
fn test_templates_option_is_global() {
    moviebot()
        .args(["ask", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--templates <TEMPLATES>"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ask_falls_back_to_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "flan-t5-base",
            "created_at": "2024-01-01T00:00:00Z",
            "response": " No information found. ",
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let csv = movies_csv();
    let data = csv.path().to_path_buf();
    let uri = server.uri();
    let assert = tokio::task::spawn_blocking(move || {
        moviebot()
            .arg("--data")
            .arg(&data)
            .args(["--ollama-url", &uri, "ask", "romcom"])
            .assert()
    })
    .await
    .unwrap();

    assert
        .success()
        .stdout(predicate::str::contains("Answer (From AI Model):\nNo information found.\n"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_voice_unintelligible_reports_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transcribe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "" })))
        .mount(&server)
        .await;

    let mut audio = NamedTempFile::new().unwrap();
    audio.write_all(b"RIFF0000WAVE").unwrap();
    let audio_path = audio.path().to_path_buf();
    let stt_url = format!("{}/transcribe", server.uri());

    let assert = tokio::task::spawn_blocking(move || {
        moviebot()
            .args(["--data", "/nonexistent/movies.csv", "--stt-url", &stt_url, "voice"])
            .arg(&audio_path)
            .assert()
    })
    .await
    .unwrap();

    // Transcription fails before the dataset is touched.
    assert
        .failure()
        .stderr(predicate::str::contains("Could not understand audio."))
        .stderr(predicate::str::contains("Failed to load movie dataset").not());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_voice_transcript_is_resolved() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transcribe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "action" })))
        .mount(&server)
        .await;

    let csv = movies_csv();
    let data = csv.path().to_path_buf();
    let mut audio = NamedTempFile::new().unwrap();
    audio.write_all(b"RIFF0000WAVE").unwrap();
    let audio_path = audio.path().to_path_buf();
    let stt_url = format!("{}/transcribe", server.uri());

    let assert = tokio::task::spawn_blocking(move || {
        moviebot()
            .arg("--data")
            .arg(&data)
            .args(["--stt-url", &stt_url, "voice"])
            .arg(&audio_path)
            .assert()
    })
    .await
    .unwrap();

    assert
        .success()
        .stdout(predicate::str::contains("You said: action"))
        .stdout(predicate::str::contains("- Gladiator (Rating: 8.5)"));
}

#[test]
fn test_chat_reads_stdin() {
    let csv = movies_csv();
    moviebot()
        .arg("--data")
        .arg(csv.path())
        .arg("chat")
        .write_stdin("action\n\nquit\nsci-fi\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("- Gladiator (Rating: 8.5)"))
        .stdout(predicate::str::contains("Inception").not());
}
