//! Full send cycles: real files on disk, mock generation endpoint

use std::sync::Arc;

use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use filechat::assembler::TurnAssembler;
use filechat::extract::FileExtractor;
use filechat::models::{ContentUnit, Role};
use filechat::orchestrator::{ChatOrchestrator, Refusal, SendOutcome};
use filechat::transport::GeminiTransport;

const GENERATE_PATH: &str = "/v1beta/models/test-model:generateContent";

fn chat_against(server: &MockServer) -> ChatOrchestrator {
    ChatOrchestrator::new(
        TurnAssembler::new(Arc::new(FileExtractor::new())),
        Arc::new(GeminiTransport::new(
            &format!("{}/v1beta", server.uri()),
            "test-model",
        )),
        Some("test-key".to_string()),
        None,
    )
}

fn reply_body(text: &str) -> Value {
    json!({"candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]})
}

async fn last_request_body(server: &MockServer) -> Value {
    let requests = server.received_requests().await.expect("recording enabled");
    let last = requests.last().expect("at least one request");
    serde_json::from_slice(&last.body).expect("json body")
}

#[tokio::test]
async fn test_text_and_files_reach_the_service_in_attachment_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("Looks good.")))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("tempdir");
    let csv_path = dir.path().join("scores.csv");
    std::fs::write(&csv_path, "name,score\nada,10\n").expect("write csv");
    let png_path = dir.path().join("chart.png");
    std::fs::write(&png_path, [0x89, b'P', b'N', b'G', 1, 2, 3]).expect("write png");

    let chat = chat_against(&server);
    chat.submit_text("What do you think?").await;
    chat.attach_files([&csv_path, &png_path]).await;

    let outcome = chat.send_turn().await;
    assert!(matches!(outcome, SendOutcome::Replied(_)), "got {outcome:?}");

    let body = last_request_body(&server).await;
    assert_eq!(
        body,
        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {"text": "What do you think?"},
                    {"text": "--- Content from scores.csv ---\nname,score\nada,10\n"},
                    {"inline_data": {"mime_type": "image/png", "data": "iVBORwECAw=="}}
                ]
            }]
        })
    );

    let history = chat.snapshot().await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].content, vec![ContentUnit::text("Looks good.")]);
    assert!(chat.pending_attachments().await.is_empty());
}

#[tokio::test]
async fn test_server_error_appends_exactly_one_bot_turn() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("Hello!")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({"error": {"message": "quota exceeded"}})),
        )
        .mount(&server)
        .await;

    let chat = chat_against(&server);
    chat.submit_text("hi").await;
    assert!(matches!(chat.send_turn().await, SendOutcome::Replied(_)));
    let before = chat.snapshot().await;

    chat.submit_text("and again").await;
    let outcome = chat.send_turn().await;
    assert!(matches!(outcome, SendOutcome::Failed(_)), "got {outcome:?}");

    let after = chat.snapshot().await;
    // earlier turns untouched, then the new user turn and one error turn
    assert_eq!(&after[..before.len()], &before[..]);
    assert_eq!(after.len(), before.len() + 2);
    let new_bot_turns: Vec<_> = after[before.len()..]
        .iter()
        .filter(|turn| turn.role == Role::Bot)
        .collect();
    assert_eq!(new_bot_turns.len(), 1);
    assert!(new_bot_turns[0].text().contains("quota exceeded"));

    // the failed request still carried the text history
    let body = last_request_body(&server).await;
    let roles: Vec<&str> = body["contents"]
        .as_array()
        .expect("contents array")
        .iter()
        .filter_map(|c| c["role"].as_str())
        .collect();
    assert_eq!(roles, vec!["user", "model", "user"]);
}

#[tokio::test]
async fn test_unreadable_attachment_fails_without_calling_the_service() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("unused")))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("tempdir");
    let good = dir.path().join("notes.txt");
    std::fs::write(&good, "fine").expect("write notes");
    let missing = dir.path().join("vanished.pdf");

    let chat = chat_against(&server);
    chat.submit_text("read these").await;
    chat.attach_files([good, missing]).await;

    let outcome = chat.send_turn().await;
    let SendOutcome::Failed(turn) = outcome else {
        panic!("expected failure");
    };
    assert!(turn.text().contains("vanished.pdf"));
}

#[tokio::test]
async fn test_empty_send_is_refused_without_a_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("unused")))
        .expect(0)
        .mount(&server)
        .await;

    let chat = chat_against(&server);
    assert_eq!(
        chat.send_turn().await,
        SendOutcome::Refused(Refusal::EmptyTurn)
    );
    assert!(chat.snapshot().await.is_empty());
}
