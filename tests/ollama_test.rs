use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use moviebot::{
    AnswerSource, Dataset, GenerationError, GenerationParams, OllamaGenerator, Resolver, TextGenerator,
};

#[test_log::test(tokio::test)]
async fn test_generate_sends_greedy_bounded_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({
            "model": "flan-t5-base",
            "prompt": "Question: hi\nAnswer:",
            "stream": false,
            "options": { "num_predict": 150, "temperature": 0.0, "top_k": 1 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "flan-t5-base",
            "created_at": "2024-01-01T00:00:00Z",
            "response": "  hello there \n",
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let generator = OllamaGenerator::new(server.uri(), "flan-t5-base");
    let text = generator
        .generate("Question: hi\nAnswer:", GenerationParams::default())
        .await
        .unwrap();

    // The raw client hands back the text untouched; trimming is the resolver's job.
    assert_eq!(text, "  hello there \n");
}

#[test_log::test(tokio::test)]
async fn test_generate_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model 'missing' not found"))
        .mount(&server)
        .await;

    let generator = OllamaGenerator::new(server.uri(), "missing");
    let err = generator
        .generate("prompt", GenerationParams::default())
        .await
        .unwrap_err();

    match err {
        GenerationError::Status { status, body } => {
            assert_eq!(status, 404);
            assert!(body.contains("not found"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test_log::test(tokio::test)]
async fn test_generate_bad_json_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let generator = OllamaGenerator::new(server.uri(), "m");
    let err = generator
        .generate("prompt", GenerationParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Decode(_)));
}

#[tokio::test]
async fn test_unreachable_service_is_request_error() {
    // Bind then drop a listener so the port is known to be closed.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let uri = format!("http://127.0.0.1:{port}");

    let generator = OllamaGenerator::new(uri, "m");
    let err = generator
        .generate("prompt", GenerationParams::default())
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Request { .. }));
}

#[test_log::test(tokio::test)]
async fn test_resolver_fallback_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_string_contains("Question: romcom"))
        .and(body_string_contains("Inception. Sci-Fi. 8.8"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "flan-t5-base",
            "created_at": "2024-01-01T00:00:00Z",
            "response": "No information found.\n",
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dataset = Dataset::from_reader("Title,Genre,Rating\nInception,Sci-Fi,8.8\n".as_bytes()).unwrap();
    let generator = Arc::new(OllamaGenerator::new(server.uri(), "flan-t5-base"));
    let resolver = Resolver::new(Arc::new(dataset), generator);

    let resolution = resolver.resolve("romcom").await.unwrap();
    assert_eq!(resolution.source, AnswerSource::Generated);
    assert_eq!(resolution.text, "No information found.");

    // A dataset hit never reaches the server; `expect(1)` is verified on drop.
    let resolution = resolver.resolve("sci-fi").await.unwrap();
    assert_eq!(resolution.text, "- Inception (Rating: 8.8)");
}
