use std::sync::Arc;
use std::time::Duration;

use super::{Conversation, Preset};
use crate::chat::{ChatMessage, ChatRole};
use crate::error::PersonaError;
use crate::testing::ScriptedService;

async fn session(service: &Arc<ScriptedService>) -> Conversation {
    let conversation = Conversation::new(service.clone());
    conversation.init(Preset::Generic, "").await.unwrap();
    conversation
}

#[tokio::test]
async fn init_yields_single_system_message() {
    let service = Arc::new(ScriptedService::new());
    let conversation = session(&service).await;

    let transcript = conversation.get_conversation().await.unwrap();
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript[0].role, ChatRole::System);
    assert!(conversation.is_committed().await);
    assert_eq!(conversation.model().await, "gpt-3.5-turbo");

    assert!(matches!(
        conversation.init(Preset::Dan, "gpt-4").await,
        Err(PersonaError::AlreadyInitialized)
    ));
    assert_eq!(service.calls(), 0);
}

#[tokio::test]
async fn uninitialized_transcript_is_an_error() {
    let service = Arc::new(ScriptedService::new());
    let conversation = Conversation::new(service.clone());
    assert!(matches!(
        conversation.get_conversation().await,
        Err(PersonaError::InvalidInput(_))
    ));
    assert!(conversation.query(ChatRole::User, "hi").await.is_err());
    assert_eq!(service.calls(), 0);
}

#[tokio::test]
async fn single_choice_query_commits() {
    let service = Arc::new(ScriptedService::new());
    let conversation = session(&service).await;
    service.push_reply(&["Hi!"]);

    let choices = conversation.query(ChatRole::User, "Hello").await.unwrap();
    assert_eq!(choices.len(), 1);

    let transcript = conversation.get_conversation().await.unwrap();
    assert_eq!(transcript.len(), 3);
    assert_eq!(transcript[1].content, "Hello");
    assert_eq!(transcript[2].content, "Hi!");
    assert!(conversation.is_committed().await);

    let request = conversation.last_request().await.unwrap();
    assert_eq!(request.messages.len(), 2);
    assert!(!request.stream);
    assert!(conversation.last_response().await.is_some());
}

#[tokio::test]
async fn pending_session_rejects_query_without_mutation() {
    let service = Arc::new(ScriptedService::new());
    let conversation = session(&service).await;
    service.push_reply(&["one", "two"]);
    conversation.query(ChatRole::User, "pick").await.unwrap();
    assert!(!conversation.is_committed().await);

    let before = conversation.get_conversation().await.unwrap().len();
    assert!(matches!(
        conversation.query(ChatRole::User, "again").await,
        Err(PersonaError::InvalidInput(_))
    ));
    assert_eq!(conversation.get_conversation().await.unwrap().len(), before);
    assert_eq!(service.calls(), 1);

    assert!(conversation.commit_response(7).await.is_err());
    conversation.commit_response(1).await.unwrap();
    let transcript = conversation.get_conversation().await.unwrap();
    assert_eq!(transcript.last().unwrap().content, "two");
    assert!(conversation.is_committed().await);
}

#[tokio::test]
async fn upstream_failure_leaves_transcript_untouched() {
    let service = Arc::new(ScriptedService::new());
    let conversation = session(&service).await;
    service.push_error(PersonaError::HttpError("timeout".into()));

    let err = conversation.query(ChatRole::User, "Hello").await.unwrap_err();
    assert!(err.is_upstream());
    assert_eq!(conversation.get_conversation().await.unwrap().len(), 1);
    assert!(conversation.is_committed().await);
    assert!(conversation.last_request().await.is_none());
}

#[tokio::test]
async fn role_names_are_validated() {
    let service = Arc::new(ScriptedService::new());
    let conversation = session(&service).await;
    assert!(matches!(
        conversation.query_as("wizard", "hi").await,
        Err(PersonaError::InvalidInput(_))
    ));
    assert!(matches!(
        conversation.query(ChatRole::User, "").await,
        Err(PersonaError::InvalidInput(_))
    ));
    assert_eq!(service.calls(), 0);

    conversation.query_as("system", "be brief").await.unwrap();
    let sent = &service.requests()[0];
    assert_eq!(sent.messages.last().unwrap().role, ChatRole::System);
}

#[tokio::test]
async fn edit_of_assistant_message_fails_without_call() {
    let service = Arc::new(ScriptedService::new());
    let conversation = session(&service).await;
    conversation.query(ChatRole::User, "q1").await.unwrap();
    conversation.query(ChatRole::User, "q2").await.unwrap();
    let calls = service.calls();
    let before = conversation.get_conversation().await.unwrap();

    assert!(matches!(
        conversation.edit_conversation(2, "rewritten").await,
        Err(PersonaError::InvalidInput(_))
    ));
    assert!(conversation.edit_conversation(9, "x").await.is_err());
    assert_eq!(conversation.get_conversation().await.unwrap(), before);
    assert_eq!(service.calls(), calls);
}

#[tokio::test]
async fn edit_replaces_user_turn_and_reruns_once() {
    let service = Arc::new(ScriptedService::new());
    let conversation = session(&service).await;
    service.push_reply(&["a1"]);
    service.push_reply(&["a2"]);
    conversation.query(ChatRole::User, "q1").await.unwrap();
    conversation.query(ChatRole::User, "q2").await.unwrap();

    service.push_reply(&["a2 redone"]);
    conversation.edit_conversation(3, "q2 edited").await.unwrap();
    assert_eq!(service.calls(), 3);

    let sent = service.requests().pop().unwrap();
    let contents: Vec<&str> = sent.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(&contents[1..], &["q1", "a1", "q2 edited"]);
    assert_eq!(sent.messages[3].role, ChatRole::User);

    let transcript = conversation.get_conversation().await.unwrap();
    assert_eq!(transcript.len(), 5);
    assert_eq!(transcript[4].content, "a2 redone");
}

#[tokio::test]
async fn directive_is_appended_without_upstream_call() {
    let service = Arc::new(ScriptedService::new());
    let conversation = session(&service).await;
    conversation.add_directive("Reply in haiku").await.unwrap();

    let transcript = conversation.get_conversation().await.unwrap();
    let last = transcript.last().unwrap();
    assert_eq!(last.role, ChatRole::System);
    assert_eq!(last.content, "Reply in haiku");
    assert_eq!(service.calls(), 0);
    assert!(conversation.add_directive("").await.is_err());
}

#[tokio::test]
async fn provided_history_resumes_conversation() {
    let service = Arc::new(ScriptedService::new());
    let conversation = Conversation::new(service.clone()).with_default_model("gpt-4");
    let history = vec![
        ChatMessage::system().content("You are terse.").build(),
        ChatMessage::user().content("2+2?").build(),
        ChatMessage::assistant().content("4").build(),
    ];
    conversation.init_with_provided("", &history).await.unwrap();
    assert_eq!(conversation.model().await, "gpt-4");
    let preset = conversation.preset().await;
    assert_eq!(preset, Preset::Default);
    assert!(preset.system_prompt().is_none());

    conversation.query(ChatRole::User, "3+3?").await.unwrap();
    assert_eq!(service.requests()[0].messages.len(), 4);
    assert_eq!(service.requests()[0].model, "gpt-4");
}

#[tokio::test]
async fn streamed_reply_is_committed_after_drain() {
    let service = Arc::new(ScriptedService::new());
    let conversation = session(&service).await;
    service.push_stream(&["Hel", "lo"]);

    let handle = conversation.query_stream("Say hello").await.unwrap();
    assert!(!conversation.is_committed().await);
    assert!(service.requests()[0].stream);
    assert!(conversation.query(ChatRole::User, "too early").await.is_err());

    let mut sink = Vec::new();
    handle.drain(&mut sink).await.unwrap();
    assert_eq!(sink, b"Hello");

    let transcript = conversation.get_conversation().await.unwrap();
    let last = transcript.last().unwrap();
    assert_eq!(last.role, ChatRole::Assistant);
    assert_eq!(last.content, "Hello");
    assert!(conversation.is_committed().await);
    assert!(conversation.commit_response_text("again".into()).await.is_err());
}

#[tokio::test]
async fn closed_stream_leaves_session_pending() {
    let service = Arc::new(ScriptedService::new());
    let conversation = session(&service).await;
    service.push_stream(&["never", "seen"]);

    let handle = conversation.query_stream("hi").await.unwrap();
    handle.close().await.unwrap();

    let mut sink = Vec::new();
    handle.drain(&mut sink).await.unwrap();
    assert!(sink.is_empty());
    assert!(!conversation.is_committed().await);
    assert_eq!(conversation.get_conversation().await.unwrap().len(), 2);

    // the caller may settle the session by hand
    conversation.commit_response_text(String::new()).await.unwrap();
    assert!(conversation.is_committed().await);
}

#[tokio::test]
async fn stream_error_mid_reply_keeps_session_pending() {
    let service = Arc::new(ScriptedService::new());
    let conversation = session(&service).await;
    service.push_failing_stream(&["Hel"], PersonaError::HttpError("reset".into()));

    let handle = conversation.query_stream("hi").await.unwrap();
    let mut sink = Vec::new();
    let err = handle.drain(&mut sink).await.unwrap_err();
    assert!(err.is_upstream());
    assert_eq!(sink, b"Hel");
    assert!(!conversation.is_committed().await);

    conversation.commit_response_text("Hel".into()).await.unwrap();
    let transcript = conversation.get_conversation().await.unwrap();
    assert_eq!(transcript.last().unwrap().content, "Hel");
}

#[tokio::test]
async fn failed_stream_open_changes_nothing() {
    let service = Arc::new(ScriptedService::new());
    let conversation = session(&service).await;

    assert!(conversation.query_stream("hi").await.is_err());
    assert!(conversation.is_committed().await);
    assert_eq!(conversation.get_conversation().await.unwrap().len(), 1);
}

#[tokio::test]
async fn stream_edit_rewrites_and_commits() {
    let service = Arc::new(ScriptedService::new());
    let conversation = session(&service).await;
    service.push_reply(&["first answer"]);
    conversation.query(ChatRole::User, "first").await.unwrap();

    service.push_stream(&["second ", "answer"]);
    let handle = conversation
        .edit_conversation_stream(1, "first, reworded")
        .await
        .unwrap();
    let sent = service.requests().pop().unwrap();
    assert_eq!(sent.messages.len(), 2);
    assert_eq!(sent.messages[1].content, "first, reworded");

    let mut sink = Vec::new();
    handle.drain(&mut sink).await.unwrap();
    let transcript = conversation.get_conversation().await.unwrap();
    assert_eq!(transcript.len(), 3);
    assert_eq!(transcript[2].content, "second answer");
}

#[tokio::test]
async fn concurrent_queries_are_serialized() {
    let service = Arc::new(ScriptedService::with_delay(Duration::from_millis(30)));
    let conversation = session(&service).await;

    let a = conversation.clone();
    let b = conversation.clone();
    let (ra, rb) = tokio::join!(
        tokio::spawn(async move { a.query(ChatRole::User, "first").await }),
        tokio::spawn(async move { b.query(ChatRole::User, "second").await }),
    );
    ra.unwrap().unwrap();
    rb.unwrap().unwrap();

    let requests = service.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].messages.len(), 2);
    // the later call carries the earlier question and its answer
    assert_eq!(requests[1].messages.len(), 4);
    assert_eq!(
        requests[1].messages[1].content,
        requests[0].messages[1].content
    );
    assert_eq!(conversation.get_conversation().await.unwrap().len(), 5);
}
