use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures_util::StreamExt;
use qchat::prelude::*;
use qcommon::ManualClock;
use qprovider::adapters::mock::MockProvider;
use qprovider::{BackendFailure, ChatMessage, Role};

fn start() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

fn gateway_with(provider: MockProvider) -> (ChatGateway, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start()));
    let sessions = SessionManager::new(Arc::new(InMemoryConversationStore::new()))
        .with_clock(clock.clone());
    let service = ChatService::builder(Arc::new(provider))
        .sessions(sessions)
        .build();

    (ChatGateway::new(service), clock)
}

fn payload(question: &str) -> ChatTurnPayload {
    ChatTurnPayload {
        question: question.to_string(),
        model: None,
        streaming: false,
    }
}

fn user() -> CurrentUser {
    CurrentUser::new("user-1", "user")
}

#[tokio::test]
async fn scenario_a_new_owner_gets_new_session_and_persisted_turn() {
    let (gateway, _clock) = gateway_with(MockProvider::instant());

    let response = gateway
        .handle_turn(&user(), payload("hello"))
        .await
        .expect("turn succeeds");

    assert_eq!(response.question, "hello");
    assert_eq!(
        response.answer,
        "[Mock] This is a mock response. (question: hello)"
    );

    let sessions = gateway.sessions(&user()).await.expect("sessions");
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].session_id, response.session_id);

    let turns = gateway
        .session_turns(&user(), &SessionId::new(response.session_id.clone()))
        .await
        .expect("turns");
    assert_eq!(turns, vec![response]);
}

#[tokio::test]
async fn scenario_b_follow_up_within_window_reuses_session_and_history() {
    let (gateway, clock) = gateway_with(MockProvider::instant());
    let first = gateway
        .handle_turn(&user(), payload("hello"))
        .await
        .expect("first");

    clock.advance(Duration::from_secs(5 * 60));
    let second = gateway
        .handle_turn(&user(), payload("and then?"))
        .await
        .expect("second");
    assert_eq!(second.session_id, first.session_id);

    let history = gateway
        .service()
        .sessions()
        .build_history(&SessionId::new(second.session_id.clone()), "third")
        .await
        .expect("history");
    let roles = history.iter().map(ChatMessage::role).collect::<Vec<_>>();
    assert_eq!(
        roles,
        vec![
            Role::System,
            Role::User,
            Role::Assistant,
            Role::User,
            Role::Assistant,
            Role::User,
        ]
    );
    assert_eq!(history[1].content(), "hello");
    assert_eq!(history[2].content(), first.answer);
    assert_eq!(history[3].content(), "and then?");
    assert_eq!(history[5].content(), "third");
}

#[tokio::test]
async fn scenario_c_message_after_window_starts_new_session() {
    let (gateway, clock) = gateway_with(MockProvider::instant());
    let first = gateway
        .handle_turn(&user(), payload("hello"))
        .await
        .expect("first");

    clock.advance(Duration::from_secs(31 * 60));
    let later = gateway
        .handle_turn(&user(), payload("back again"))
        .await
        .expect("later");
    assert_ne!(later.session_id, first.session_id);

    let sessions = gateway.sessions(&user()).await.expect("sessions");
    assert_eq!(
        sessions
            .iter()
            .map(|s| s.session_id.clone())
            .collect::<Vec<_>>(),
        vec![later.session_id, first.session_id]
    );
}

#[tokio::test]
async fn scenario_d_rate_limited_backend_is_retryable_429() {
    let (gateway, _clock) =
        gateway_with(MockProvider::instant().with_failure(BackendFailure::status(429)));

    let error = gateway
        .handle_turn(&user(), payload("hello"))
        .await
        .expect_err("rate limited");

    assert_eq!(error.status, 429);
    assert_eq!(error.body.canonical_kind, "RATE_LIMIT");
    assert!(error.body.retryable);
    assert_eq!(error.body.provider_name.as_deref(), Some("mock"));
}

#[tokio::test]
async fn scenario_e_stream_concatenation_matches_persisted_answer() {
    let (gateway, _clock) = gateway_with(MockProvider::instant());
    let expected = MockProvider::instant().render_answer(&[ChatMessage::user("ping")]);

    let events = gateway
        .service()
        .stream_turn(ChatTurnRequest::new("user-1", "ping"))
        .collect::<Vec<_>>()
        .await;

    let mut streamed = String::new();
    for event in &events {
        if let ChatEvent::Message { fragment } = event {
            streamed.push_str(fragment);
        }
    }
    assert_eq!(streamed, expected);

    let Some(ChatEvent::Done {
        turn_id,
        session_id,
    }) = events.last()
    else {
        panic!("stream must end with done: {events:?}");
    };

    let turns = gateway
        .session_turns(&user(), session_id)
        .await
        .expect("turns");
    let stored = turns
        .iter()
        .find(|turn| turn.turn_id == turn_id.as_str())
        .expect("done refers to a persisted turn");
    assert_eq!(stored.answer, streamed);
}

#[tokio::test]
async fn streaming_and_non_streaming_answers_match() {
    let (gateway, _clock) = gateway_with(MockProvider::instant().with_response("same answer"));

    let complete = gateway
        .handle_turn(&user(), payload("q"))
        .await
        .expect("complete");

    let frames = gateway
        .handle_stream(&user(), payload("q"))
        .await
        .expect("stream starts")
        .collect::<Vec<_>>()
        .await;

    assert!(frames[0].starts_with("event: session\n"));
    assert!(frames.last().expect("frames").starts_with("event: done\n"));

    let turns = gateway
        .session_turns(&user(), &SessionId::new(complete.session_id.clone()))
        .await
        .expect("turns");
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].answer, turns[1].answer);
}

#[tokio::test]
async fn mid_stream_failure_emits_error_frame_and_stores_nothing() {
    let (gateway, _clock) = gateway_with(
        MockProvider::instant().with_failure_after(2, BackendFailure::status(503)),
    );

    let frames = gateway
        .handle_stream(&user(), payload("q"))
        .await
        .expect("stream starts")
        .collect::<Vec<_>>()
        .await;

    assert_eq!(frames.len(), 4);
    assert!(frames[1].starts_with("event: message\n"));
    let last = frames.last().expect("frames");
    assert!(last.starts_with("event: error\n"));
    assert!(last.contains("\"canonicalKind\":\"BACKEND_UNAVAILABLE\""));
    assert!(last.contains("\"retryable\":true"));

    let sessions = gateway.sessions(&user()).await.expect("sessions");
    let turns = gateway
        .session_turns(&user(), &SessionId::new(sessions[0].session_id.clone()))
        .await
        .expect("turns");
    assert!(turns.is_empty());
}

#[tokio::test]
async fn admission_denial_is_reported_before_any_work() {
    let (gateway, _clock) = gateway_with(MockProvider::instant());
    let gateway = gateway.with_admission(Arc::new(FixedWindowAdmission::new(
        1,
        Duration::from_secs(60),
    )));

    gateway
        .handle_turn(&user(), payload("one"))
        .await
        .expect("first admitted");
    let error = gateway
        .handle_stream(&user(), payload("two"))
        .await
        .err()
        .expect("second denied");

    assert_eq!(error.status, 429);
    assert_eq!(error.body.canonical_kind, "ADMISSION_DENIED");
    assert!(error.body.retryable);
}

#[tokio::test]
async fn model_outside_allow_list_is_rejected() {
    let (gateway, _clock) = gateway_with(MockProvider::instant());
    let gateway = gateway.with_allowed_models(["gpt-4o", "gpt-4o-mini"]);

    let mut request = payload("hello");
    request.model = Some("gpt-2".to_string());
    let error = gateway
        .handle_turn(&user(), request)
        .await
        .expect_err("model rejected");
    assert_eq!(error.status, 400);
    assert_eq!(error.body.canonical_kind, "INVALID_REQUEST");

    let mut request = payload("hello");
    request.model = Some("gpt-4o".to_string());
    let reply = gateway.handle(&user(), request).await.expect("allowed");
    assert!(matches!(reply, qchat::GatewayReply::Complete(_)));
}

#[tokio::test]
async fn padded_model_name_is_matched_against_allow_list() {
    let (gateway, _clock) = gateway_with(MockProvider::instant());
    let gateway = gateway.with_allowed_models(["gpt-4o"]);

    let mut request = payload("hello");
    request.model = Some("  gpt-4o ".to_string());
    let response = gateway
        .handle_turn(&user(), request)
        .await
        .expect("padded name accepted");
    assert!(response.answer.contains(MockProvider::DEFAULT_RESPONSE));

    let mut request = payload("hello");
    request.model = Some("   ".to_string());
    gateway
        .handle_turn(&user(), request)
        .await
        .expect("blank model falls back to the default");
}

#[tokio::test]
async fn other_users_cannot_read_or_delete_a_session() {
    let (gateway, _clock) = gateway_with(MockProvider::instant());
    let response = gateway
        .handle_turn(&user(), payload("private"))
        .await
        .expect("turn");
    let session_id = SessionId::new(response.session_id);
    let intruder = CurrentUser::new("user-2", "user");

    let error = gateway
        .session_turns(&intruder, &session_id)
        .await
        .expect_err("forbidden");
    assert_eq!(error.status, 403);

    let error = gateway
        .delete_session(&intruder, &session_id)
        .await
        .expect_err("forbidden");
    assert_eq!(error.status, 403);

    gateway
        .delete_session(&user(), &session_id)
        .await
        .expect("owner deletes");
    let error = gateway
        .session_turns(&user(), &session_id)
        .await
        .expect_err("gone");
    assert_eq!(error.status, 404);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_resolution_yields_one_active_session() {
    let clock = Arc::new(ManualClock::new(start()));
    let sessions = SessionManager::new(Arc::new(InMemoryConversationStore::new()))
        .with_clock(clock);
    let owner = OwnerId::new("racer");

    let handles = (0..8)
        .map(|_| {
            let sessions = sessions.clone();
            let owner = owner.clone();
            tokio::spawn(async move { sessions.resolve_session(&owner).await })
        })
        .collect::<Vec<_>>();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.expect("task").expect("resolve").id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(
        sessions
            .sessions_for_owner(&owner)
            .await
            .expect("list")
            .len(),
        1
    );
}
