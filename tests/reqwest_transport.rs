use std::sync::{Arc, Mutex};

use parley_chat::account::{Usage, UsageWindow};
use parley_chat::config::ClientConfig;
use parley_chat::headers::StaticHeaders;
use parley_chat::{ChatCallbacks, ChatClient, ChatOptions, Message};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, moderation: bool) -> ChatClient {
    let mut config = ClientConfig {
        base_url: Some(server.uri()),
        ..ClientConfig::default()
    };
    config.moderation.enabled = moderation;
    ChatClient::builder()
        .config(config)
        .headers(StaticHeaders::bearer("sk-test"))
        .build()
        .expect("client")
}

fn finish_log() -> (ChatCallbacks, Arc<Mutex<Vec<String>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (finish, error) = (log.clone(), log.clone());
    let callbacks = ChatCallbacks::new()
        .on_finish(move |text| finish.lock().unwrap().push(text))
        .on_error(move |err| error.lock().unwrap().push(format!("error: {err}")));
    (callbacks, log)
}

#[tokio::test]
async fn streams_event_stream_over_http() {
    let server = MockServer::start().await;
    let sse = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"hel\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(serde_json::json!({"stream": true, "model": "gpt-4"})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, false);
    let (mut callbacks, log) = finish_log();
    client
        .chat(
            ChatOptions::new(vec![Message::user("hi")], "gpt-4").streaming(true),
            &mut callbacks,
        )
        .await;

    assert_eq!(*log.lock().unwrap(), vec!["hello"]);
}

#[tokio::test]
async fn moderation_runs_before_the_chat_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/moderations"))
        .and(body_partial_json(serde_json::json!({"input": "hi"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{"flagged": false, "categories": {"hate": false}}]
        })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content": "hey there"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, true);
    let (mut callbacks, log) = finish_log();
    client
        .chat(ChatOptions::new(vec![Message::user("hi")], "gpt-4"), &mut callbacks)
        .await;

    assert_eq!(*log.lock().unwrap(), vec!["hey there"]);
}

#[tokio::test]
async fn rate_limit_is_reported_with_retry_hint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "7")
                .set_body_json(serde_json::json!({
                    "error": {"message": "slow down", "type": "rate_limit_exceeded"}
                })),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, false);
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = errors.clone();
    let mut callbacks = ChatCallbacks::new().on_error(move |err| sink.lock().unwrap().push(err));
    client
        .chat(ChatOptions::new(vec![Message::user("hi")], "gpt-4"), &mut callbacks)
        .await;

    let errors = errors.lock().unwrap();
    match errors.as_slice() {
        [parley_chat::ChatError::RateLimit { retry_after, .. }] => {
            assert_eq!(*retry_after, Some(std::time::Duration::from_secs(7)));
        }
        other => panic!("unexpected errors: {other:?}"),
    }
}

#[tokio::test]
async fn usage_is_queried_with_get_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dashboard/billing/usage"))
        .and(query_param("start_date", "2024-03-01"))
        .and(query_param("end_date", "2024-03-16"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "total_usage": 1999.5
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dashboard/billing/subscription"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "hard_limit_usd": 120,
            "system_hard_limit_usd": 150
        })))
        .expect(1)
        .mount(&server)
        .await;

    let window = UsageWindow::month_to_date(
        chrono::NaiveDate::from_ymd_opt(2024, 3, 15).expect("date"),
    );
    let usage = client_for(&server, false)
        .usage_for(&window)
        .await
        .expect("usage");
    assert_eq!(
        usage,
        Usage {
            used: Some(20.0),
            hard_limit_usd: Some(120.0),
            system_hard_limit_usd: Some(150.0),
        }
    );
}
