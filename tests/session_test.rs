use lancelink::application_impl::*;
use lancelink::domain_model::*;
use lancelink::session::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep, timeout};

fn msg(id: &str, sender: &str, receiver: &str, text: &str) -> Message {
    Message {
        id: MessageId(id.to_owned()),
        sender_id: sender.into(),
        receiver_id: receiver.into(),
        text: text.to_owned(),
        sent_at: None,
    }
}

fn spawn_for_a() -> (
    Arc<FakeRealtimeChannel>,
    Arc<FakeHistoryApi>,
    ChatSessionHandle,
    UnboundedReceiver<SessionEvent>,
) {
    let channel = Arc::new(FakeRealtimeChannel::new());
    let history = Arc::new(FakeHistoryApi::new());
    let (session, events) =
        ChatSessionHandle::spawn("A".into(), channel.clone(), history.clone());
    (channel, history, session, events)
}

async fn next_event(events: &mut UnboundedReceiver<SessionEvent>) -> SessionEvent {
    timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timed out waiting for a session event")
        .expect("session closed")
}

async fn wait_for<F>(events: &mut UnboundedReceiver<SessionEvent>, mut accept: F) -> SessionEvent
where
    F: FnMut(&SessionEvent) -> bool,
{
    loop {
        let event = next_event(events).await;
        if accept(&event) {
            return event;
        }
    }
}

fn ids(snapshot: &SessionSnapshot) -> Vec<String> {
    snapshot
        .entries
        .iter()
        .map(|e| e.message.id.0.clone())
        .collect()
}

#[tokio::test]
async fn history_then_send_then_live_then_ack() {
    let (channel, history, session, mut events) = spawn_for_a();
    history.seed(&"A".into(), &"B".into(), vec![msg("h1", "A", "B", "hi")]);

    session.set_peer("B".into());
    wait_for(&mut events, |e| {
        matches!(e, SessionEvent::HistoryLoaded { count: 1 })
    })
    .await;

    session.send_text("yo");
    let appended = wait_for(&mut events, |e| matches!(e, SessionEvent::Appended(_))).await;
    let temp_id = match appended {
        SessionEvent::Appended(m) => {
            assert!(m.id.is_temporary());
            assert_eq!(m.text, "yo");
            m.id
        }
        other => panic!("unexpected event: {:?}", other),
    };

    wait_for(&mut events, |e| {
        matches!(e, SessionEvent::Confirmed { temp_id: t, .. } if *t == temp_id)
    })
    .await;

    channel.push_inbound(msg("m2", "B", "A", "sup"));
    wait_for(&mut events, |e| {
        matches!(e, SessionEvent::Appended(m) if m.id.0 == "m2")
    })
    .await;

    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.state, SessionState::Ready);
    assert_eq!(ids(&snapshot), vec!["h1", "srv-1", "m2"]);
    assert_eq!(snapshot.entries[1].message.text, "yo");
    assert!(
        snapshot
            .entries
            .iter()
            .all(|e| e.delivery == DeliveryState::Confirmed)
    );

    session.shutdown().await;
}

#[tokio::test]
async fn empty_text_is_never_sent() {
    let (channel, _history, session, mut events) = spawn_for_a();
    // a rejected send would surface as SendFailed if anything went out
    channel.set_ack_mode(FakeAckMode::Reject);

    session.set_peer("B".into());
    wait_for(&mut events, |e| {
        matches!(e, SessionEvent::HistoryLoaded { .. })
    })
    .await;

    session.send_text("");
    session.send_text("   ");
    session.send_text("\t\n");
    sleep(Duration::from_millis(100)).await;

    let snapshot = session.snapshot().await.unwrap();
    assert!(snapshot.entries.is_empty());
    assert!(events.try_recv().is_err());

    session.shutdown().await;
}

#[tokio::test]
async fn inbound_events_are_filtered_and_deduplicated() {
    let (channel, _history, session, mut events) = spawn_for_a();

    session.set_peer("B".into());
    wait_for(&mut events, |e| {
        matches!(e, SessionEvent::HistoryLoaded { .. })
    })
    .await;

    // other conversations on the shared channel
    channel.push_inbound(msg("x1", "C", "D", "noise"));
    channel.push_inbound(msg("x2", "A", "C", "noise"));
    // replayed delivery
    channel.push_inbound(msg("m1", "B", "A", "sup"));
    channel.push_inbound(msg("m1", "B", "A", "sup"));

    wait_for(&mut events, |e| {
        matches!(e, SessionEvent::Appended(m) if m.id.0 == "m1")
    })
    .await;
    sleep(Duration::from_millis(100)).await;

    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(ids(&snapshot), vec!["m1"]);

    session.shutdown().await;
}

#[tokio::test]
async fn stale_history_never_overwrites_a_newer_pair() {
    let (_channel, history, session, mut events) = spawn_for_a();
    history.seed(&"A".into(), &"B".into(), vec![msg("hb", "A", "B", "old")]);
    history.seed(&"A".into(), &"C".into(), vec![msg("hc", "A", "C", "new")]);
    let gate = history.hold(&"A".into(), &"B".into());

    session.set_peer("B".into());
    wait_for(&mut events, |e| matches!(e, SessionEvent::LoadStarted)).await;

    // switch away while the first fetch is still in flight
    session.set_peer("C".into());
    wait_for(&mut events, |e| {
        matches!(e, SessionEvent::HistoryLoaded { count: 1 })
    })
    .await;

    // the superseded fetch resolves late
    gate.notify_one();
    sleep(Duration::from_millis(100)).await;

    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(ids(&snapshot), vec!["hc"]);

    session.shutdown().await;
}

#[tokio::test]
async fn failed_send_is_marked_and_manually_retryable() {
    let (channel, _history, session, mut events) = spawn_for_a();
    channel.set_ack_mode(FakeAckMode::Reject);

    session.set_peer("B".into());
    wait_for(&mut events, |e| {
        matches!(e, SessionEvent::HistoryLoaded { .. })
    })
    .await;

    session.send_text("hello");
    let temp_id = match wait_for(&mut events, |e| {
        matches!(e, SessionEvent::SendFailed { .. })
    })
    .await
    {
        SessionEvent::SendFailed { temp_id } => temp_id,
        other => panic!("unexpected event: {:?}", other),
    };

    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.entries.len(), 1);
    assert_eq!(snapshot.entries[0].delivery, DeliveryState::Failed);
    assert_eq!(snapshot.entries[0].message.id, temp_id);

    channel.set_ack_mode(FakeAckMode::Accept);
    session.retry_send(temp_id.clone());
    wait_for(&mut events, |e| {
        matches!(e, SessionEvent::Confirmed { temp_id: t, .. } if *t == temp_id)
    })
    .await;

    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.entries.len(), 1);
    assert_eq!(snapshot.entries[0].delivery, DeliveryState::Confirmed);
    assert!(!snapshot.entries[0].message.id.is_temporary());
    assert_eq!(snapshot.entries[0].message.text, "hello");

    session.shutdown().await;
}

#[tokio::test]
async fn ack_timeout_marks_the_entry_failed() {
    let (channel, _history, session, mut events) = spawn_for_a();
    channel.set_ack_mode(FakeAckMode::Timeout);

    session.set_peer("B".into());
    wait_for(&mut events, |e| {
        matches!(e, SessionEvent::HistoryLoaded { .. })
    })
    .await;

    session.send_text("hello");
    wait_for(&mut events, |e| {
        matches!(e, SessionEvent::SendFailed { .. })
    })
    .await;

    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.entries[0].delivery, DeliveryState::Failed);

    session.shutdown().await;
}

#[tokio::test]
async fn load_failure_leaves_the_list_and_retry_load_recovers() {
    let (_channel, history, session, mut events) = spawn_for_a();
    history.set_failing(true);

    session.set_peer("B".into());
    wait_for(&mut events, |e| matches!(e, SessionEvent::LoadFailed(_))).await;

    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.state, SessionState::LoadFailed);
    assert!(snapshot.entries.is_empty());

    // no automatic retry; recovery is an explicit command
    sleep(Duration::from_millis(100)).await;
    assert!(events.try_recv().is_err());

    history.set_failing(false);
    history.seed(&"A".into(), &"B".into(), vec![msg("h1", "A", "B", "hi")]);
    session.retry_load();
    wait_for(&mut events, |e| {
        matches!(e, SessionEvent::HistoryLoaded { count: 1 })
    })
    .await;

    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.state, SessionState::Ready);
    assert_eq!(ids(&snapshot), vec!["h1"]);

    session.shutdown().await;
}

#[tokio::test]
async fn reconnect_refreshes_history_without_losing_the_list() {
    let (channel, history, session, mut events) = spawn_for_a();
    history.seed(&"A".into(), &"B".into(), vec![msg("h1", "A", "B", "hi")]);

    session.set_peer("B".into());
    wait_for(&mut events, |e| {
        matches!(e, SessionEvent::HistoryLoaded { count: 1 })
    })
    .await;

    // a message was missed while the transport was down
    history.seed(
        &"A".into(),
        &"B".into(),
        vec![msg("h1", "A", "B", "hi"), msg("h2", "B", "A", "u there?")],
    );
    channel.emit_reconnected();
    wait_for(&mut events, |e| {
        matches!(e, SessionEvent::HistoryLoaded { count: 2 })
    })
    .await;

    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(snapshot.state, SessionState::Ready);
    assert_eq!(ids(&snapshot), vec!["h1", "h2"]);

    session.shutdown().await;
}

#[tokio::test]
async fn live_messages_during_the_load_are_kept_behind_the_baseline() {
    let (channel, history, session, mut events) = spawn_for_a();
    history.seed(&"A".into(), &"B".into(), vec![msg("h1", "A", "B", "hi")]);
    let gate = history.hold(&"A".into(), &"B".into());

    session.set_peer("B".into());
    wait_for(&mut events, |e| matches!(e, SessionEvent::LoadStarted)).await;

    channel.push_inbound(msg("m2", "B", "A", "sup"));
    sleep(Duration::from_millis(50)).await;
    gate.notify_one();

    wait_for(&mut events, |e| {
        matches!(e, SessionEvent::HistoryLoaded { count: 2 })
    })
    .await;
    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(ids(&snapshot), vec!["h1", "m2"]);

    session.shutdown().await;
}

#[tokio::test]
async fn own_echo_and_ack_collapse_to_one_entry() {
    let (channel, _history, session, mut events) = spawn_for_a();
    channel.set_echo_to_sender(true);

    session.set_peer("B".into());
    wait_for(&mut events, |e| {
        matches!(e, SessionEvent::HistoryLoaded { .. })
    })
    .await;

    session.send_text("yo");
    wait_for(&mut events, |e| {
        matches!(e, SessionEvent::Confirmed { .. })
    })
    .await;
    sleep(Duration::from_millis(100)).await;

    // whichever of the echo and the ack lands first, exactly one entry
    // with the server id remains
    let snapshot = session.snapshot().await.unwrap();
    assert_eq!(ids(&snapshot), vec!["srv-1"]);
    assert_eq!(snapshot.entries[0].delivery, DeliveryState::Confirmed);

    session.shutdown().await;
}

#[tokio::test]
async fn teardown_releases_the_channel_subscription() {
    let (channel, _history, session, mut events) = spawn_for_a();

    session.set_peer("B".into());
    wait_for(&mut events, |e| {
        matches!(e, SessionEvent::HistoryLoaded { .. })
    })
    .await;
    assert_eq!(channel.subscriber_count(), 1);

    // a pair change swaps the subscription instead of stacking another
    session.set_peer("C".into());
    wait_for(&mut events, |e| {
        matches!(e, SessionEvent::HistoryLoaded { .. })
    })
    .await;
    assert_eq!(channel.subscriber_count(), 1);

    session.shutdown().await;
    assert_eq!(channel.subscriber_count(), 0);
}
