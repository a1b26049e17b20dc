use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use video_transcriber::audio::{read_extracted_audio, write_wav, ExtractedAudio};
use video_transcriber::config::{TranscriptionConfig, TranscriptionProvider};
use video_transcriber::correction::{LlmCorrector, TextCorrector};
use video_transcriber::llm::{create_llm, ChatMessage, LLMConfig, LLMProvider};
use video_transcriber::transcription::{create_backend, TranscriptionResult};

const GOOGLE_PATH: &str = "/speech-api/v2/recognize";
const WHISPER_PATH: &str = "/v1/audio/transcriptions";

async fn sample_audio(dir: &TempDir) -> ExtractedAudio {
    let path = dir.path().join("audio.wav");
    write_wav(&path, &[0x0102, -2, 300, 0, 7]).unwrap();
    read_extracted_audio(&path).await.unwrap()
}

fn transcription_config(
    provider: TranscriptionProvider,
    server: &MockServer,
    route: &str,
) -> TranscriptionConfig {
    TranscriptionConfig {
        provider,
        endpoint: Some(format!("{}{}", server.uri(), route)),
        request_timeout_seconds: 5,
        ..TranscriptionConfig::default()
    }
}

#[tokio::test]
async fn test_google_success_sends_l16_audio() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GOOGLE_PATH))
        .and(query_param("lang", "en-GB"))
        .and(query_param("client", "chromium"))
        .and(query_param("output", "json"))
        .and(header("content-type", "audio/l16; rate=16000"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "{\"result\":[]}\n{\"result\":[{\"alternative\":[{\"transcript\":\"I am going home\",\"confidence\":0.91}],\"final\":true}],\"result_index\":0}\n",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let audio = sample_audio(&dir).await;
    let backend =
        create_backend(&transcription_config(TranscriptionProvider::Google, &server, GOOGLE_PATH))
            .unwrap();

    let result = backend.recognize(&audio, "en-GB").await;
    assert_eq!(result, TranscriptionResult::Success("I am going home".to_string()));

    let requests = server.received_requests().await.unwrap();
    let body = &requests[0].body;
    assert_eq!(body.len(), 10);
    assert_eq!(&body[..4], &[0x01, 0x02, 0xFF, 0xFE]);
}

#[tokio::test]
async fn test_google_passes_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GOOGLE_PATH))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"result\":[]}\n"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let audio = sample_audio(&dir).await;
    let mut config = transcription_config(TranscriptionProvider::Google, &server, GOOGLE_PATH);
    config.api_key = Some("test-key".to_string());

    let result = create_backend(&config).unwrap().recognize(&audio, "en-GB").await;
    assert_eq!(result, TranscriptionResult::Unrecognized);
}

#[tokio::test]
async fn test_google_http_error_is_service_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GOOGLE_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_string("quota exceeded"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let audio = sample_audio(&dir).await;
    let backend =
        create_backend(&transcription_config(TranscriptionProvider::Google, &server, GOOGLE_PATH))
            .unwrap();

    match backend.recognize(&audio, "en-GB").await {
        TranscriptionResult::ServiceError(message) => {
            assert!(message.contains("403"), "{}", message);
            assert!(message.contains("quota exceeded"), "{}", message);
        }
        other => panic!("expected service error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_timeout_is_service_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GOOGLE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{\"result\":[]}")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let audio = sample_audio(&dir).await;
    let mut config = transcription_config(TranscriptionProvider::Google, &server, GOOGLE_PATH);
    config.request_timeout_seconds = 1;

    let result = create_backend(&config).unwrap().recognize(&audio, "en-GB").await;
    assert_eq!(
        result,
        TranscriptionResult::ServiceError("request timed out".to_string())
    );
}

#[tokio::test]
async fn test_unreachable_service_is_service_error() {
    let server = MockServer::start().await;
    let config = transcription_config(TranscriptionProvider::Google, &server, GOOGLE_PATH);
    drop(server);

    let dir = TempDir::new().unwrap();
    let audio = sample_audio(&dir).await;

    let result = create_backend(&config).unwrap().recognize(&audio, "en-GB").await;
    assert!(matches!(result, TranscriptionResult::ServiceError(_)));
}

#[tokio::test]
async fn test_whisper_multipart_upload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(WHISPER_PATH))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_string_contains("name=\"model\""))
        .and(body_string_contains("whisper-1"))
        .and(body_string_contains("filename=\"audio.wav\""))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": " hello there "})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let audio = sample_audio(&dir).await;
    let mut config = transcription_config(TranscriptionProvider::Whisper, &server, WHISPER_PATH);
    config.api_key = Some("sk-test".to_string());

    let result = create_backend(&config).unwrap().recognize(&audio, "en-GB").await;
    assert_eq!(result, TranscriptionResult::Success("hello there".to_string()));
}

#[tokio::test]
async fn test_whisper_blank_text_is_unrecognized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(WHISPER_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "  "})))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let audio = sample_audio(&dir).await;
    let config = transcription_config(TranscriptionProvider::Whisper, &server, WHISPER_PATH);

    let result = create_backend(&config).unwrap().recognize(&audio, "de-DE").await;
    assert_eq!(result, TranscriptionResult::Unrecognized);
}

#[tokio::test]
async fn test_whisper_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(WHISPER_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let audio = sample_audio(&dir).await;
    let config = transcription_config(TranscriptionProvider::Whisper, &server, WHISPER_PATH);

    match create_backend(&config).unwrap().recognize(&audio, "en-GB").await {
        TranscriptionResult::ServiceError(message) => assert!(message.contains("500"), "{}", message),
        other => panic!("expected service error, got {:?}", other),
    }
}

fn llm_config(server: &MockServer) -> LLMConfig {
    LLMConfig {
        provider: LLMProvider::LMStudio,
        endpoint: Some(format!("{}/v1/chat/completions", server.uri())),
        timeout_seconds: 5,
        ..LLMConfig::default()
    }
}

#[tokio::test]
async fn test_llm_corrector_against_lmstudio() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("I am gong home"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "gong -> going"}}],
            "usage": {"total_tokens": 57}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let corrector = LlmCorrector::new(&llm_config(&server)).unwrap();
    assert_eq!(corrector.correct("I am gong home").await, "I am going home");
}

#[tokio::test]
async fn test_llm_corrector_falls_back_on_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("model not loaded"))
        .mount(&server)
        .await;

    let corrector = LlmCorrector::new(&llm_config(&server)).unwrap();
    assert_eq!(corrector.correct("I am gong home").await, "I am gong home");
}

#[tokio::test]
async fn test_openai_provider_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_string_contains("\"model\":\"gpt-4o-mini\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "No corrections needed"}}],
            "usage": {"total_tokens": 12}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = LLMConfig {
        provider: LLMProvider::OpenAI,
        api_key: Some("sk-test".to_string()),
        model: "gpt-4o-mini".to_string(),
        ..llm_config(&server)
    };
    let llm = create_llm(&config).unwrap();
    let response = llm
        .chat(vec![ChatMessage::user("I am going home")])
        .await
        .unwrap();
    assert_eq!(response.content, "No corrections needed");
    assert_eq!(response.tokens_used, Some(12));
}
