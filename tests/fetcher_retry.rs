//! Bounded-retry behaviour of the structured fetcher

mod common;

use common::{Reply, ScriptedClient, outline_xml, test_params};
use knowledge_weaver::WeaverError;
use knowledge_weaver::fetcher::{RetryPolicy, StructuredFetcher};
use knowledge_weaver::outline::Outline;
use knowledge_weaver::prompts;
use std::sync::Arc;
use std::time::Duration;

fn fetcher(client: Arc<ScriptedClient>) -> StructuredFetcher {
    StructuredFetcher::new(client, RetryPolicy::new(3, Duration::ZERO))
}

async fn fetch(client: Arc<ScriptedClient>) -> knowledge_weaver::Result<(Outline, String)> {
    fetcher(client)
        .fetch_structured::<Outline>(
            &prompts::build_outliner_system_prompt(),
            &prompts::build_outliner_user_prompt("Rust"),
            &test_params(),
        )
        .await
        .map(|s| (s.document, s.raw_payload))
}

#[tokio::test]
async fn succeeds_on_third_attempt_after_malformed_output() {
    let valid = outline_xml("Rust", &["Ownership"]);
    let client = Arc::new(
        ScriptedClient::new()
            .outline_reply(Reply::Text("Sorry, here is some prose.".to_string()))
            .outline_reply(Reply::Text("still no markup".to_string()))
            .outline_reply(Reply::Text(format!("Here you go:\n{}\nEnjoy!", valid))),
    );

    let (outline, raw) = fetch(client.clone()).await.unwrap();
    assert_eq!(client.outline_calls(), 3);
    assert_eq!(raw, valid);
    assert_eq!(outline.sections()[0].title, "Ownership");
}

#[tokio::test]
async fn gives_up_after_three_malformed_attempts() {
    let client = Arc::new(
        ScriptedClient::new()
            .outline_reply(Reply::Text("nope".to_string()))
            .outline_reply(Reply::Text("<knowledge><topic>half".to_string()))
            .outline_reply(Reply::Text("nope again".to_string()))
            .outline_reply(Reply::Text(outline_xml("Rust", &["Never requested"]))),
    );

    let err = fetch(client.clone()).await.unwrap_err();
    assert_eq!(client.outline_calls(), 3);
    match err {
        WeaverError::GenerationExhausted {
            attempts,
            last_error,
        } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last_error, WeaverError::MalformedOutline { .. }));
        }
        other => panic!("expected GenerationExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn transport_failures_are_retried_like_malformed_output() {
    let client = Arc::new(
        ScriptedClient::new()
            .outline_reply(Reply::Fail(429))
            .outline_reply(Reply::Fail(503))
            .outline_reply(Reply::Text(outline_xml("Rust", &["Traits"]))),
    );

    let (outline, _) = fetch(client.clone()).await.unwrap();
    assert_eq!(client.outline_calls(), 3);
    assert_eq!(outline.topic, "Rust");
}

#[tokio::test]
async fn exhaustion_reports_last_transport_error() {
    let client = Arc::new(
        ScriptedClient::new()
            .outline_reply(Reply::Text("garbage".to_string()))
            .outline_reply(Reply::Text("garbage".to_string()))
            .outline_reply(Reply::Fail(401)),
    );

    let err = fetch(client.clone()).await.unwrap_err();
    assert_eq!(client.outline_calls(), 3);
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn single_attempt_policy_makes_one_call() {
    let client = Arc::new(ScriptedClient::new().outline_reply(Reply::Text("nope".to_string())));
    let fetcher = StructuredFetcher::new(client.clone(), RetryPolicy::new(0, Duration::ZERO));
    assert_eq!(fetcher.policy().max_attempts, 1);

    let result = fetcher
        .fetch_structured::<Outline>("sys about creating outlines", "user", &test_params())
        .await;
    assert!(result.is_err());
    assert_eq!(client.outline_calls(), 1);
}

#[tokio::test]
async fn outline_without_section_list_is_retried() {
    let client = Arc::new(
        ScriptedClient::new()
            .outline_reply(Reply::Text("<knowledge><topic>Rust</topic></knowledge>".to_string()))
            .outline_reply(Reply::Text(outline_xml("Rust", &["Lifetimes"]))),
    );

    let (outline, _) = fetch(client.clone()).await.unwrap();
    assert_eq!(client.outline_calls(), 2);
    assert_eq!(outline.sections()[0].title, "Lifetimes");
}

#[tokio::test]
async fn trailing_chatter_inside_delimiters_is_retried() {
    let valid = outline_xml("Rust", &["Borrowing"]);
    let client = Arc::new(
        ScriptedClient::new()
            .outline_reply(Reply::Text(format!(
                "{} and another draft: <knowledge>b</knowledge>",
                valid
            )))
            .outline_reply(Reply::Text(valid.clone())),
    );

    let (_, raw) = fetch(client.clone()).await.unwrap();
    assert_eq!(client.outline_calls(), 2);
    assert_eq!(raw, valid);
}
