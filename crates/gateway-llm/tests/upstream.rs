//! Adapter behaviour against simulated upstream APIs

use gateway_core::config::ProvidersConfig;
use gateway_core::error::GatewayError;
use gateway_core::llm::{ChatRequest, Message, ProviderId, Role, StreamDelta};
use gateway_core::Credential;
use gateway_llm::{DeltaStream, ProviderError, ProviderRegistry};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn registry_for(server: &MockServer) -> ProviderRegistry {
    let base = server.uri();
    ProviderRegistry::new(ProvidersConfig {
        openai_api_base: base.clone(),
        anthropic_api_base: base.clone(),
        gemini_api_base: base.clone(),
        openrouter_api_base: base,
        openrouter_referer: "https://gateway.test".to_string(),
        openrouter_title: "Gateway Test".to_string(),
    })
}

fn hello(model: &str) -> ChatRequest {
    ChatRequest::new(model, vec![Message::user("Hello")])
}

fn sse(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/event-stream")
}

async fn collect(mut stream: DeltaStream) -> Vec<StreamDelta> {
    let mut deltas = Vec::new();
    while let Some(item) = stream.next_delta().await {
        deltas.push(item.unwrap());
    }
    deltas
}

#[tokio::test]
async fn test_openai_chat() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-user"))
        .and(body_partial_json(json!({"model": "gpt-4o", "stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hi there"}}],
            "usage": {"prompt_tokens": 4, "completion_tokens": 2, "total_tokens": 6}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = registry_for(&server).adapter(ProviderId::OpenAI, Credential::new("sk-user"));
    let response = adapter.chat(&hello("gpt-4o")).await.unwrap();

    assert_eq!(response.id, "chatcmpl-1");
    assert_eq!(response.content, "Hi there");
    assert_eq!(response.role, Role::Assistant);
    assert_eq!(response.usage.unwrap().total_tokens, 6);
}

#[tokio::test]
async fn test_anthropic_chat_headers_and_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "ak-user"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({"max_tokens": 1024})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "model": "claude-3-5-haiku-20241022",
            "content": [{"type": "text", "text": "Bonjour"}],
            "usage": {"input_tokens": 7, "output_tokens": 5}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter =
        registry_for(&server).adapter(ProviderId::Anthropic, Credential::new("ak-user"));
    let response = adapter
        .chat(&hello("claude-3-5-haiku-20241022"))
        .await
        .unwrap();

    assert_eq!(response.content, "Bonjour");
    let usage = response.usage.unwrap();
    assert_eq!(usage.prompt_tokens, 7);
    assert_eq!(usage.completion_tokens, 5);
    assert_eq!(usage.total_tokens, 12);

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_gemini_chat_uses_query_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:generateContent"))
        .and(query_param("key", "gm-user"))
        .and(body_partial_json(json!({
            "contents": [{"role": "user", "parts": [{"text": "Hello"}]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "Hola"}]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = registry_for(&server).adapter(ProviderId::Gemini, Credential::new("gm-user"));
    let response = adapter.chat(&hello("gemini-1.5-flash")).await.unwrap();

    assert_eq!(response.id, "");
    assert_eq!(response.content, "Hola");
    assert_eq!(response.model, "gemini-1.5-flash");
    assert!(response.usage.is_none());

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_openrouter_attribution_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer or-user"))
        .and(header("http-referer", "https://gateway.test"))
        .and(header("x-title", "Gateway Test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "gen-1",
            "model": "openai/gpt-4o",
            "choices": [{"message": {"role": "assistant", "content": "ok"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter =
        registry_for(&server).adapter(ProviderId::OpenRouter, Credential::new("or-user"));
    let response = adapter.chat(&hello("openai/gpt-4o")).await.unwrap();

    assert_eq!(response.content, "ok");
    assert!(response.usage.is_none());
}

#[tokio::test]
async fn test_non_success_status_is_upstream_error_for_every_provider() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(429).set_body_json(json!({"error": {"message": "slow down"}})),
        )
        .mount(&server)
        .await;

    let registry = registry_for(&server);
    for id in ProviderId::ALL {
        let adapter = registry.adapter(id, Credential::new("k"));
        match adapter.chat(&hello("some-model")).await {
            Err(ProviderError::Upstream { status, body, .. }) => {
                assert_eq!(status, 429, "{id}");
                assert_eq!(body.unwrap()["error"]["message"], "slow down");
            }
            other => panic!("{id}: unexpected result {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_stream_non_success_status_fails_before_any_delta() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": {"message": "bad key"}})),
        )
        .mount(&server)
        .await;

    let registry = registry_for(&server);
    for id in ProviderId::ALL {
        let adapter = registry.adapter(id, Credential::new("k"));
        match adapter.stream_chat(&hello("some-model")).await {
            Err(err) => {
                assert_eq!(err.status(), Some(401), "{id}");
                match GatewayError::from(err) {
                    GatewayError::Upstream { status, body, .. } => {
                        assert_eq!(status, Some(401), "{id}");
                        assert_eq!(body.unwrap()["error"]["message"], "bad key", "{id}");
                    }
                    other => panic!("{id}: unexpected error {other:?}"),
                }
            }
            Ok(stream) => panic!("{id}: expected failure, got stream {stream:?}"),
        }
    }
    assert_eq!(
        server.received_requests().await.unwrap().len(),
        ProviderId::ALL.len()
    );
}

#[tokio::test]
async fn test_upstream_error_keeps_non_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let adapter = registry_for(&server).adapter(ProviderId::OpenAI, Credential::new("k"));
    let err = adapter.stream_chat(&hello("gpt-4o")).await.unwrap_err();

    match GatewayError::from(err) {
        GatewayError::Upstream {
            status,
            message,
            body,
        } => {
            assert_eq!(status, Some(503));
            assert_eq!(message, "upstream unavailable");
            assert!(body.is_none());
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn test_openai_stream_stops_at_done() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"id\":\"c1\",\"model\":\"gpt-4o\",\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"Hel\"}}]}\n\n",
        "data: {\"id\":\"c1\",\"model\":\"gpt-4o\",\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
        "data: {\"id\":\"c1\",\"choices\":[{\"delta\":{\"content\n\n",
        ": keep-alive comment\n\n",
        "data: {\"id\":\"c1\",\"model\":\"gpt-4o\",\"choices\":[{\"delta\":{}}]}\n\n",
        "data: [DONE]\n\n",
        "data: {\"id\":\"c1\",\"model\":\"gpt-4o\",\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(sse(body))
        .mount(&server)
        .await;

    let adapter = registry_for(&server).adapter(ProviderId::OpenAI, Credential::new("k"));
    let deltas = collect(adapter.stream_chat(&hello("gpt-4o")).await.unwrap()).await;

    let texts: Vec<_> = deltas.iter().map(|d| d.delta.as_str()).collect();
    assert_eq!(texts, vec!["Hel", "lo", ""]);
    assert_eq!(deltas[0].role, Some(Role::Assistant));
    assert!(deltas.iter().all(|d| d.id == "c1" && !d.done));
}

#[tokio::test]
async fn test_openrouter_stream() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"id\":\"gen-1\",\"model\":\"openai/gpt-4o\",\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"A\"}}]}\r\n\r\n",
        "data: {\"id\":\"gen-1\",\"model\":\"openai/gpt-4o\",\"choices\":[{\"delta\":{\"content\":\"B\"}}]}\r\n\r\n",
        "data: [DONE]\r\n\r\n",
    );
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("x-title", "Gateway Test"))
        .respond_with(sse(body))
        .mount(&server)
        .await;

    let adapter = registry_for(&server).adapter(ProviderId::OpenRouter, Credential::new("k"));
    let deltas = collect(adapter.stream_chat(&hello("openai/gpt-4o")).await.unwrap()).await;

    let texts: Vec<_> = deltas.iter().map(|d| d.delta.as_str()).collect();
    assert_eq!(texts, vec!["A", "B"]);
    assert_eq!(deltas[0].model, "openai/gpt-4o");
}

#[tokio::test]
async fn test_anthropic_stream_only_content_block_deltas() {
    let server = MockServer::start().await;
    let body = concat!(
        "event: message_start\n",
        "data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_7\",\"model\":\"claude-3-5-haiku-20241022\"}}\n\n",
        "event: content_block_start\n",
        "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n",
        "event: ping\n",
        "data: {\"type\":\"ping\"}\n\n",
        "event: content_block_delta\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}\n\n",
        "event: content_block_delta\n",
        "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\" you\"}}\n\n",
        "event: message_stop\n",
        "data: {\"type\":\"message_stop\"}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(sse(body))
        .mount(&server)
        .await;

    let adapter = registry_for(&server).adapter(ProviderId::Anthropic, Credential::new("k"));
    let deltas = collect(adapter.stream_chat(&hello("claude")).await.unwrap()).await;

    let texts: Vec<_> = deltas.iter().map(|d| d.delta.as_str()).collect();
    assert_eq!(texts, vec!["Hi", " you"]);
    assert!(deltas.iter().all(|d| d.id == "msg_7"));
}

#[tokio::test]
async fn test_gemini_stream_array() {
    let server = MockServer::start().await;
    let body = r#"[{
  "candidates": [{"content": {"parts": [{"text": "Hel"}], "role": "model"}}]
}
,
{
  "candidates": [{"content": {"parts": [{"text": "lo {with} \"braces\""}], "role": "model"}}]
}
,
{
  "usageMetadata": {"promptTokenCount": 3}
}
]"#;
    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:streamGenerateContent"))
        .and(query_param("key", "gm"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
        .mount(&server)
        .await;

    let adapter = registry_for(&server).adapter(ProviderId::Gemini, Credential::new("gm"));
    let deltas = collect(adapter.stream_chat(&hello("gemini-1.5-flash")).await.unwrap()).await;

    let texts: Vec<_> = deltas.iter().map(|d| d.delta.as_str()).collect();
    assert_eq!(texts, vec!["Hel", "lo {with} \"braces\""]);
    assert!(deltas.iter().all(|d| d.model == "gemini-1.5-flash" && d.id.is_empty()));
}

#[tokio::test]
async fn test_empty_stream_body_is_no_response_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let adapter = registry_for(&server).adapter(ProviderId::OpenAI, Credential::new("k"));
    assert!(matches!(
        adapter.stream_chat(&hello("gpt-4o")).await,
        Err(ProviderError::NoResponseBody)
    ));
}

#[tokio::test]
async fn test_closing_stream_stops_delivery() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"id\":\"c1\",\"choices\":[{\"delta\":{\"content\":\"one\"}}]}\n\n",
        "data: {\"id\":\"c1\",\"choices\":[{\"delta\":{\"content\":\"two\"}}]}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .respond_with(sse(body))
        .mount(&server)
        .await;

    let adapter = registry_for(&server).adapter(ProviderId::OpenAI, Credential::new("k"));
    let mut stream = adapter.stream_chat(&hello("gpt-4o")).await.unwrap();

    let first = stream.next_delta().await.unwrap().unwrap();
    assert_eq!(first.delta, "one");
    assert_eq!(first.model, "gpt-4o");

    stream.close();
    assert!(stream.is_closed());
    assert!(stream.next_delta().await.is_none());
}
