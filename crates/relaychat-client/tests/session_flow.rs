//! End-to-end controller behaviour against a scripted transport.

use std::sync::Arc;
use std::time::Duration;

use relaychat_client::mock::{MockChunk, MockReply, MockTransport};
use relaychat_client::{ChatClient, ClientConfig, SendError, SessionState, TurnAuthor};
use relaychat_contracts::Frame;

fn acme_frames() -> Vec<Frame> {
    vec![
        Frame::content("It's "),
        Frame::content("under review."),
        Frame::final_metadata(),
    ]
}

fn client(mock: &Arc<MockTransport>) -> Arc<ChatClient> {
    Arc::new(ChatClient::new(mock.clone(), ClientConfig::default()))
}

async fn wait_for_state(client: &ChatClient, state: SessionState) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while client.state() != state {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("state not reached");
}

#[tokio::test]
async fn acme_status_question_streams_to_completion() {
    let mock = MockTransport::new()
        .with_session("session-acme")
        .with_reply(MockReply::frames(&acme_frames()))
        .into_arc();
    let client = client(&mock);

    let session = client.initialize("4").await.unwrap();
    let turn = client
        .send(&session, "What's the status of my application to Acme?")
        .await
        .unwrap();

    assert_eq!(turn.response_text, "It's under review.");
    assert!(turn.is_complete);
    assert!(!turn.is_error);
    assert_eq!(turn.author, TurnAuthor::User);
    assert_eq!(client.state(), SessionState::Ready);

    let turns = client.turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].author, TurnAuthor::System);
    assert_eq!(turns[1], turn);

    let sent = mock.sent_requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].session_id, "session-acme");
    assert_eq!(sent[0].message, "What's the status of my application to Acme?");
}

#[tokio::test]
async fn records_split_at_arbitrary_boundaries_assemble_in_order() {
    let wire: String = ["Ça ", "avance ", "bien ✓"]
        .iter()
        .map(|text| Frame::content(*text).to_record())
        .chain(std::iter::once(Frame::final_metadata().to_record()))
        .collect();
    let chunks = wire
        .as_bytes()
        .chunks(7)
        .map(|chunk| MockChunk::Bytes(chunk.to_vec()))
        .collect();

    let mock = MockTransport::new()
        .with_session("s-1")
        .with_reply(MockReply::Stream(chunks))
        .into_arc();
    let client = client(&mock);
    let session = client.initialize("4").await.unwrap();

    let turn = client.send(&session, "how is it going?").await.unwrap();
    assert_eq!(turn.response_text, "Ça avance bien ✓");
    assert!(turn.is_complete);
    assert!(!turn.is_error);
}

#[tokio::test]
async fn malformed_record_does_not_abort_turn() {
    let mock = MockTransport::new()
        .with_session("s-1")
        .with_reply(MockReply::Stream(vec![
            MockChunk::frame(&Frame::content("one ")),
            MockChunk::raw("data: {not json\n\n"),
            MockChunk::raw(": keep-alive\n\n"),
            MockChunk::frame(&Frame::content("two")),
            MockChunk::frame(&Frame::final_metadata()),
        ]))
        .into_arc();
    let client = client(&mock);
    let session = client.initialize("4").await.unwrap();

    let turn = client.send(&session, "count").await.unwrap();
    assert_eq!(turn.response_text, "one two");
    assert!(!turn.is_error);
}

#[tokio::test]
async fn error_frame_fails_turn_but_conversation_continues() {
    let mock = MockTransport::new()
        .with_session("s-1")
        .with_reply(MockReply::frames(&[Frame::error(
            "The assistant is unavailable (HTTP 500)",
        )]))
        .with_reply(MockReply::frames(&acme_frames()))
        .into_arc();
    let client = client(&mock);
    let session = client.initialize("4").await.unwrap();

    let failed = client.send(&session, "first").await.unwrap();
    assert!(failed.is_complete);
    assert!(failed.is_error);
    assert_eq!(failed.response_text, "The assistant is unavailable (HTTP 500)");
    assert_eq!(client.state(), SessionState::Ready);

    let next = client.send(&session, "second").await.unwrap();
    assert_eq!(next.response_text, "It's under review.");
    assert_eq!(client.turns().len(), 3);
}

#[tokio::test]
async fn stream_without_terminator_ends_in_error() {
    let mock = MockTransport::new()
        .with_session("s-1")
        .with_reply(MockReply::frames(&[Frame::content("It's ")]))
        .into_arc();
    let client = client(&mock);
    let session = client.initialize("4").await.unwrap();

    let turn = client.send(&session, "status?").await.unwrap();
    assert!(turn.is_complete);
    assert!(turn.is_error);
    assert_eq!(client.state(), SessionState::Ready);
}

#[tokio::test]
async fn send_while_streaming_is_rejected_without_second_call() {
    let mock = MockTransport::new()
        .with_session("s-1")
        .with_reply(MockReply::Stream(vec![
            MockChunk::frame(&Frame::content("It's ")),
            MockChunk::Delay(200),
            MockChunk::frame(&Frame::content("under review.")),
            MockChunk::frame(&Frame::final_metadata()),
        ]))
        .into_arc();
    let client = client(&mock);
    let session = client.initialize("4").await.unwrap();

    let first = {
        let client = client.clone();
        let session = session.clone();
        tokio::spawn(async move { client.send(&session, "first").await })
    };
    wait_for_state(&client, SessionState::Streaming).await;

    assert_eq!(
        client.send(&session, "second").await,
        Err(SendError::TurnInFlight)
    );
    assert_eq!(mock.send_calls(), 1);

    let turn = first.await.unwrap().unwrap();
    assert_eq!(turn.response_text, "It's under review.");
    assert_eq!(client.turns().len(), 2);
}

#[tokio::test]
async fn snapshots_grow_monotonically() {
    let mock = MockTransport::new()
        .with_session("s-1")
        .with_reply(MockReply::frames(&acme_frames()))
        .into_arc();
    let client = client(&mock);
    let mut snapshots = client.subscribe();
    let session = client.initialize("4").await.unwrap();
    client.send(&session, "status?").await.unwrap();

    let mut seen = Vec::new();
    while let Ok(snapshot) = snapshots.try_recv() {
        seen.push(snapshot);
    }

    // welcome, empty user turn, two deltas, completion
    assert_eq!(seen.len(), 5);
    assert_eq!(seen[0].index, 0);
    let texts: Vec<&str> = seen[1..]
        .iter()
        .map(|snapshot| snapshot.turn.response_text.as_str())
        .collect();
    assert_eq!(texts, vec!["", "It's ", "It's under review.", "It's under review."]);
    assert!(seen.iter().all(|snapshot| snapshot.session_id == "s-1"));
    assert!(seen[4].turn.is_complete);
}

#[tokio::test]
async fn close_is_idempotent_and_invalidates_session() {
    let mock = MockTransport::new().with_session("s-1").into_arc();
    let client = client(&mock);
    let mut session = client.initialize("4").await.unwrap();

    client.close(&mut session).await;
    client.close(&mut session).await;

    assert!(!session.initialized);
    assert_eq!(mock.close_calls(), 1);
    assert_eq!(client.state(), SessionState::Closed);
    assert!(client.turns().is_empty());
    assert!(client.session().is_none());
    assert_eq!(
        client.send(&session, "hello?").await,
        Err(SendError::NotInitialized)
    );
}

#[tokio::test]
async fn failed_close_notification_is_swallowed() {
    let mock = MockTransport::new()
        .with_session("s-1")
        .with_failing_close()
        .into_arc();
    let client = client(&mock);
    let mut session = client.initialize("4").await.unwrap();

    client.close(&mut session).await;
    assert_eq!(mock.close_calls(), 1);
    assert_eq!(client.state(), SessionState::Closed);
}

#[tokio::test]
async fn closing_during_stream_settles_in_flight_turn() {
    let mock = MockTransport::new()
        .with_session("s-1")
        .with_reply(MockReply::Stream(vec![
            MockChunk::frame(&Frame::content("partial")),
            MockChunk::Delay(10_000),
            MockChunk::frame(&Frame::final_metadata()),
        ]))
        .into_arc();
    let client = client(&mock);
    let mut session = client.initialize("4").await.unwrap();

    let in_flight = {
        let client = client.clone();
        let session = session.clone();
        tokio::spawn(async move { client.send(&session, "long question").await })
    };
    wait_for_state(&client, SessionState::Streaming).await;

    client.close(&mut session).await;
    let turn = tokio::time::timeout(Duration::from_secs(2), in_flight)
        .await
        .expect("send did not observe close")
        .unwrap()
        .unwrap();

    assert!(turn.is_complete);
    assert!(turn.is_error);
    assert_eq!(client.state(), SessionState::Closed);
    assert!(client.turns().is_empty());
}

#[tokio::test]
async fn new_session_after_close() {
    let mock = MockTransport::new()
        .with_session("s-1")
        .with_session("s-2")
        .with_reply(MockReply::frames(&acme_frames()))
        .into_arc();
    let client = client(&mock);

    let mut first = client.initialize("4").await.unwrap();
    client.close(&mut first).await;

    let second = client.initialize("4").await.unwrap();
    assert_eq!(second.session_id, "s-2");
    assert_eq!(client.state(), SessionState::Ready);
    assert_eq!(
        client.send(&first, "stale handle").await,
        Err(SendError::NotInitialized)
    );

    let turn = client.send(&second, "status?").await.unwrap();
    assert_eq!(turn.response_text, "It's under review.");
    assert_eq!(mock.init_calls(), 2);
}
