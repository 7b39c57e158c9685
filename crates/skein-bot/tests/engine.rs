//! End-to-end engine behavior against scripted sources.
//!
//! Tokio time is paused in every test, so poll intervals elapse instantly
//! while ordering stays deterministic. Wall-clock timestamps (watermarks,
//! `indexed_at`) are real; tests place items relative to a captured `now`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::json;
use skein_bot::testing::{
    MockChatSource, MockCommitSource, MockNotificationSource, MockResolver,
};
use skein_bot::{
    BotEvent, EngineBuilder, EngineSources, EventEngine, EventKind, SourceError, StreamItem,
};
use skein_proto::{
    AtUri, ChatLogPage, CommitEvent, Did, Notification, NotificationReason, OpAction, RepoOp,
};
use tokio::sync::mpsc;

const BOT: &str = "did:plc:bot";
const OTHER: &str = "did:plc:other";

fn did(s: &str) -> Did {
    Did::new(s).unwrap()
}

fn uri(s: &str) -> AtUri {
    AtUri::parse(s).unwrap()
}

struct Harness {
    engine: EventEngine,
    notifications: Arc<MockNotificationSource>,
    commits: Arc<MockCommitSource>,
    chat: Arc<MockChatSource>,
    resolver: Arc<MockResolver>,
}

fn harness(configure: impl FnOnce(EngineBuilder) -> EngineBuilder) -> Harness {
    let notifications = Arc::new(MockNotificationSource::new());
    let commits = Arc::new(MockCommitSource::new());
    let chat = Arc::new(MockChatSource::new());
    let resolver = Arc::new(MockResolver::new());

    let sources = EngineSources {
        notifications: Arc::clone(&notifications) as _,
        commits: Arc::clone(&commits) as _,
        chat: Arc::clone(&chat) as _,
        resolver: Arc::clone(&resolver) as _,
    };
    let config = configure(EngineBuilder::new()).build_config();
    let engine = EventEngine::with_config(sources, config).unwrap();

    Harness {
        engine,
        notifications,
        commits,
        chat,
        resolver,
    }
}

fn listener() -> (
    impl Fn(BotEvent) + Send + Sync + 'static,
    mpsc::UnboundedReceiver<BotEvent>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        move |event| {
            let _ = tx.send(event);
        },
        rx,
    )
}

fn drain(rx: &mut mpsc::UnboundedReceiver<BotEvent>) -> Vec<BotEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn reply_record(parent_repo: &str) -> serde_json::Value {
    json!({
        "$type": "app.bsky.feed.post",
        "text": "a reply",
        "reply": {
            "root": { "uri": format!("at://{parent_repo}/app.bsky.feed.post/root"), "cid": "c" },
            "parent": { "uri": format!("at://{parent_repo}/app.bsky.feed.post/parent"), "cid": "c" },
        },
        "createdAt": "2024-06-01T12:00:00Z",
    })
}

fn notification(
    reason: NotificationReason,
    record_uri: &str,
    record: serde_json::Value,
    reason_subject: Option<&str>,
    indexed_at: DateTime<Utc>,
) -> Notification {
    Notification {
        uri: uri(record_uri),
        cid: "c".to_string(),
        author: did(OTHER),
        reason,
        reason_subject: reason_subject.map(uri),
        record,
        indexed_at,
    }
}

/// Let the paused clock run past `n` poll intervals.
async fn run_intervals(n: u64) {
    tokio::time::sleep(Duration::from_secs(5 * n + 1)).await;
}

// ---------------------------------------------------------------------------
// Polling driver
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn poll_scenario_delivers_only_listened_fresh_kinds() {
    let t0 = Utc::now();
    let h = harness(|b| b.polling().starting_watermark(t0));
    h.engine.set_identity(did(BOT)).await;

    // Newest-first page: reply at T0+3, mention at T0+2, follow at T0+1.
    let page = vec![
        notification(
            NotificationReason::Reply,
            &format!("at://{OTHER}/app.bsky.feed.post/reply"),
            reply_record(BOT),
            None,
            t0 + TimeDelta::seconds(3),
        ),
        notification(
            NotificationReason::Mention,
            &format!("at://{OTHER}/app.bsky.feed.post/mention"),
            json!({}),
            None,
            t0 + TimeDelta::seconds(2),
        ),
        notification(
            NotificationReason::Follow,
            &format!("at://{OTHER}/app.bsky.graph.follow/f1"),
            json!({}),
            None,
            t0 + TimeDelta::seconds(1),
        ),
    ];
    h.notifications.push_page(page.clone());
    // The same page again on the second tick: everything is now behind the
    // watermark.
    h.notifications.push_page(page);

    let (on_reply, mut replies) = listener();
    h.engine.on(EventKind::Reply, on_reply).unwrap();

    run_intervals(2).await;

    let events = drain(&mut replies);
    assert_eq!(events.len(), 1, "exactly one reply event: {events:?}");
    match &events[0] {
        BotEvent::Reply(post) => assert_eq!(post.uri.rkey(), "reply"),
        other => panic!("expected reply, got {other:?}"),
    }
    assert!(h.notifications.fetch_count() >= 2);

    h.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn nothing_at_or_below_the_watermark_is_emitted() {
    let t0 = Utc::now();
    let h = harness(|b| b.polling().starting_watermark(t0));
    h.engine.set_identity(did(BOT)).await;

    // All items at or before T0: the entire page is stale.
    h.notifications.push_page(vec![
        notification(
            NotificationReason::Reply,
            &format!("at://{OTHER}/app.bsky.feed.post/old1"),
            reply_record(BOT),
            None,
            t0,
        ),
        notification(
            NotificationReason::Reply,
            &format!("at://{OTHER}/app.bsky.feed.post/old2"),
            reply_record(BOT),
            None,
            t0 - TimeDelta::seconds(30),
        ),
    ]);

    let (on_reply, mut replies) = listener();
    h.engine.on(EventKind::Reply, on_reply).unwrap();

    run_intervals(1).await;

    assert!(drain(&mut replies).is_empty());
    h.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn watermark_advances_even_when_classification_errors() {
    let t0 = Utc::now();
    let h = harness(|b| b.polling().starting_watermark(t0));
    h.engine.set_identity(did(BOT)).await;

    // Newest item malformed (claims reply, carries garbage), older item fine.
    let page = vec![
        notification(
            NotificationReason::Reply,
            &format!("at://{OTHER}/app.bsky.feed.post/bad"),
            json!({ "$type": "app.bsky.feed.post" }),
            None,
            t0 + TimeDelta::seconds(3),
        ),
        notification(
            NotificationReason::Mention,
            &format!("at://{OTHER}/app.bsky.feed.post/good"),
            json!({}),
            None,
            t0 + TimeDelta::seconds(2),
        ),
    ];
    h.notifications.push_page(page.clone());
    h.notifications.push_page(page);

    let (on_any, mut events) = listener();
    h.engine.on(EventKind::Reply, on_any).unwrap();
    let (on_mention, mut mentions) = listener();
    h.engine.on(EventKind::Mention, on_mention).unwrap();
    let (on_error, mut errors) = listener();
    h.engine.on(EventKind::Error, on_error).unwrap();

    run_intervals(2).await;

    // First tick: one error (malformed head item), one mention. Second tick:
    // nothing - the watermark advanced to T0+3 despite the error.
    assert_eq!(drain(&mut errors).len(), 1);
    assert_eq!(drain(&mut mentions).len(), 1);
    assert!(drain(&mut events).is_empty());

    h.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn transport_failure_is_an_error_event_and_the_loop_continues() {
    let t0 = Utc::now();
    let h = harness(|b| b.polling().starting_watermark(t0));
    h.engine.set_identity(did(BOT)).await;

    h.notifications
        .push_error(SourceError::Transport("connection refused".to_string()));
    h.notifications.push_page(vec![notification(
        NotificationReason::Mention,
        &format!("at://{OTHER}/app.bsky.feed.post/after"),
        json!({}),
        None,
        t0 + TimeDelta::seconds(1),
    )]);

    let (on_mention, mut mentions) = listener();
    h.engine.on(EventKind::Mention, on_mention).unwrap();
    let (on_error, mut errors) = listener();
    h.engine.on(EventKind::Error, on_error).unwrap();

    run_intervals(2).await;

    assert_eq!(drain(&mut errors).len(), 1);
    // The tick after the failure still delivered.
    assert_eq!(drain(&mut mentions).len(), 1);

    h.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn no_classification_until_identity_is_set() {
    let t0 = Utc::now();
    let h = harness(|b| b.polling().starting_watermark(t0));

    h.notifications.push_page(vec![notification(
        NotificationReason::Reply,
        &format!("at://{OTHER}/app.bsky.feed.post/r1"),
        reply_record(BOT),
        None,
        t0 + TimeDelta::seconds(1),
    )]);

    let (on_reply, mut replies) = listener();
    h.engine.on(EventKind::Reply, on_reply).unwrap();

    run_intervals(2).await;

    // No identity: ticks are dropped before fetching anything.
    assert!(drain(&mut replies).is_empty());
    assert_eq!(h.notifications.fetch_count(), 0);

    h.engine.set_identity(did(BOT)).await;
    run_intervals(1).await;

    assert_eq!(drain(&mut replies).len(), 1);
    h.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_yields_silence_within_two_intervals() {
    let t0 = Utc::now();
    let h = harness(|b| b.polling().starting_watermark(t0));
    h.engine.set_identity(did(BOT)).await;

    h.notifications.push_page(vec![notification(
        NotificationReason::Mention,
        &format!("at://{OTHER}/app.bsky.feed.post/m1"),
        json!({}),
        None,
        t0 + TimeDelta::seconds(1),
    )]);

    let (on_mention, mut mentions) = listener();
    h.engine.on(EventKind::Mention, on_mention).unwrap();

    run_intervals(1).await;
    assert_eq!(drain(&mut mentions).len(), 1);

    h.engine.stop().await;
    assert!(!h.engine.is_running());

    // More data is available, but no tick may start after stop().
    h.notifications.push_page(vec![notification(
        NotificationReason::Mention,
        &format!("at://{OTHER}/app.bsky.feed.post/m2"),
        json!({}),
        None,
        t0 + TimeDelta::seconds(60),
    )]);
    let fetches_at_stop = h.notifications.fetch_count();

    run_intervals(2).await;

    assert!(drain(&mut mentions).is_empty());
    assert_eq!(h.notifications.fetch_count(), fetches_at_stop);
}

// ---------------------------------------------------------------------------
// Lifecycle policy
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn drivers_run_until_explicitly_stopped() {
    let h = harness(|b| b.polling());
    h.engine.set_identity(did(BOT)).await;

    let id = h.engine.on(EventKind::Reply, |_| {}).unwrap();
    assert!(h.engine.is_running());

    // Removing the last listener does not stop the driver.
    assert!(h.engine.off(EventKind::Reply, id));
    assert!(!h.engine.has_listeners(EventKind::Reply));
    run_intervals(1).await;
    assert!(h.engine.is_running());

    // An explicit global teardown does.
    h.engine.remove_all_listeners(None).await;
    assert!(!h.engine.is_running());
}

#[tokio::test(start_paused = true)]
async fn remove_all_listeners_forcibly_stops_drivers() {
    let h = harness(|b| b.polling());
    h.engine.set_identity(did(BOT)).await;

    h.engine.on(EventKind::Reply, |_| {}).unwrap();
    h.engine.on(EventKind::Message, |_| {}).unwrap();
    assert!(h.engine.is_running());

    // Clearing one kind still tears the drivers down.
    h.engine.remove_all_listeners(Some(EventKind::Reply)).await;
    assert!(!h.engine.is_running());
    assert!(h.engine.has_listeners(EventKind::Message));
}

// ---------------------------------------------------------------------------
// Firehose driver
// ---------------------------------------------------------------------------

fn create_op(path: &str, record: serde_json::Value) -> RepoOp {
    RepoOp {
        action: OpAction::Create,
        path: path.to_string(),
        record: Some(record),
    }
}

#[tokio::test(start_paused = true)]
async fn firehose_batch_yields_one_event_per_op_in_op_order() {
    let h = harness(|b| b.firehose());
    h.engine.set_identity(did(BOT)).await;

    let ops = vec![
        create_op(
            "app.bsky.feed.like/l1",
            json!({
                "$type": "app.bsky.feed.like",
                "subject": { "uri": format!("at://{BOT}/app.bsky.feed.post/p1"), "cid": "c" },
                "createdAt": "2024-06-01T12:00:00Z",
            }),
        ),
        create_op(
            "app.bsky.graph.follow/f1",
            json!({
                "$type": "app.bsky.graph.follow",
                "subject": BOT,
                "createdAt": "2024-06-01T12:00:00Z",
            }),
        ),
        create_op(
            "app.bsky.feed.repost/r1",
            json!({
                "$type": "app.bsky.feed.repost",
                "subject": { "uri": format!("at://{BOT}/app.bsky.feed.post/p1"), "cid": "c" },
                "createdAt": "2024-06-01T12:00:00Z",
            }),
        ),
    ];
    h.commits.push_session(vec![
        StreamItem::Open,
        StreamItem::Commit(CommitEvent {
            repo: did(OTHER),
            seq: Some(1),
            ops,
        }),
    ]);

    // One shared channel across the three kinds keeps emission order visible.
    let (on_any, mut events) = listener();
    let on_any = Arc::new(on_any);
    for kind in [EventKind::Like, EventKind::Follow, EventKind::Repost] {
        let on_any = Arc::clone(&on_any);
        h.engine.on(kind, move |e| on_any(e)).unwrap();
    }

    tokio::time::sleep(Duration::from_millis(100)).await;

    let kinds: Vec<EventKind> = drain(&mut events).iter().map(BotEvent::kind).collect();
    assert_eq!(
        kinds,
        vec![EventKind::Like, EventKind::Follow, EventKind::Repost]
    );

    h.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn reply_and_mention_from_one_op_share_one_hydration() {
    let h = harness(|b| b.firehose());
    h.engine.set_identity(did(BOT)).await;

    let record = json!({
        "$type": "app.bsky.feed.post",
        "text": "reply that also mentions",
        "reply": {
            "root": { "uri": format!("at://{BOT}/app.bsky.feed.post/root"), "cid": "c" },
            "parent": { "uri": format!("at://{BOT}/app.bsky.feed.post/parent"), "cid": "c" },
        },
        "facets": [{
            "index": { "byteStart": 0, "byteEnd": 4 },
            "features": [{ "$type": "app.bsky.richtext.facet#mention", "did": BOT }],
        }],
        "createdAt": "2024-06-01T12:00:00Z",
    });
    h.commits.push_session(vec![
        StreamItem::Open,
        StreamItem::Commit(CommitEvent {
            repo: did(OTHER),
            seq: Some(1),
            ops: vec![create_op("app.bsky.feed.post/p1", record)],
        }),
    ]);

    let (on_any, mut events) = listener();
    let on_any = Arc::new(on_any);
    for kind in [EventKind::Reply, EventKind::Mention] {
        let on_any = Arc::clone(&on_any);
        h.engine.on(kind, move |e| on_any(e)).unwrap();
    }

    tokio::time::sleep(Duration::from_millis(100)).await;

    let kinds: Vec<EventKind> = drain(&mut events).iter().map(BotEvent::kind).collect();
    assert_eq!(kinds, vec![EventKind::Reply, EventKind::Mention]);
    assert_eq!(h.resolver.post_calls(), 1, "one hydration shared by both");

    h.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stream_errors_are_reemitted_and_the_stream_survives() {
    let h = harness(|b| b.firehose());
    h.engine.set_identity(did(BOT)).await;

    h.commits.push_session(vec![
        StreamItem::Open,
        StreamItem::Error(SourceError::Transport("hiccup".to_string())),
        StreamItem::Commit(CommitEvent {
            repo: did(OTHER),
            seq: Some(2),
            ops: vec![create_op(
                "app.bsky.graph.follow/f1",
                json!({
                    "$type": "app.bsky.graph.follow",
                    "subject": BOT,
                    "createdAt": "2024-06-01T12:00:00Z",
                }),
            )],
        }),
    ]);

    let (on_any, mut events) = listener();
    let on_any = Arc::new(on_any);
    for kind in [EventKind::Open, EventKind::Error, EventKind::Follow] {
        let on_any = Arc::clone(&on_any);
        h.engine.on(kind, move |e| on_any(e)).unwrap();
    }

    tokio::time::sleep(Duration::from_millis(100)).await;

    let kinds: Vec<EventKind> = drain(&mut events).iter().map(BotEvent::kind).collect();
    assert_eq!(
        kinds,
        vec![EventKind::Open, EventKind::Error, EventKind::Follow]
    );

    h.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn closed_stream_reconnects_with_backoff() {
    let h = harness(|b| b.firehose());
    h.engine.set_identity(did(BOT)).await;

    h.commits.push_session(vec![StreamItem::Open, StreamItem::Closed]);
    h.commits.push_session(vec![StreamItem::Open]);

    let (on_any, mut events) = listener();
    let on_any = Arc::new(on_any);
    for kind in [EventKind::Open, EventKind::Close] {
        let on_any = Arc::clone(&on_any);
        h.engine.on(kind, move |e| on_any(e)).unwrap();
    }

    // First session: open then close. Reconnect happens after ~1s backoff.
    tokio::time::sleep(Duration::from_secs(3)).await;

    let kinds: Vec<EventKind> = drain(&mut events).iter().map(BotEvent::kind).collect();
    assert_eq!(
        kinds,
        vec![EventKind::Open, EventKind::Close, EventKind::Open]
    );
    assert_eq!(h.commits.connect_count(), 2);

    h.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn commits_before_identity_are_dropped_not_queued() {
    let h = harness(|b| b.firehose());

    h.commits.push_session(vec![
        StreamItem::Open,
        StreamItem::Commit(CommitEvent {
            repo: did(OTHER),
            seq: Some(1),
            ops: vec![create_op(
                "app.bsky.graph.follow/f1",
                json!({
                    "$type": "app.bsky.graph.follow",
                    "subject": BOT,
                    "createdAt": "2024-06-01T12:00:00Z",
                }),
            )],
        }),
    ]);

    let (on_follow, mut follows) = listener();
    h.engine.on(EventKind::Follow, on_follow).unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(drain(&mut follows).is_empty());

    // Identity arrives later; the dropped commit does not replay.
    h.engine.set_identity(did(BOT)).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(drain(&mut follows).is_empty());

    h.engine.stop().await;
}

// ---------------------------------------------------------------------------
// Chat driver
// ---------------------------------------------------------------------------

fn chat_page(cursor: Option<&str>, logs: serde_json::Value) -> ChatLogPage {
    serde_json::from_value(json!({ "cursor": cursor, "logs": logs })).unwrap()
}

#[tokio::test(start_paused = true)]
async fn chat_cursor_advances_and_is_retained_on_empty_pages() {
    let h = harness(|b| b.polling());
    h.engine.set_identity(did(BOT)).await;

    h.chat.push_page(chat_page(Some("abc"), json!([])));
    h.chat.push_page(chat_page(
        Some("def"),
        json!([{
            "$type": "chat.bsky.convo.defs#logCreateMessage",
            "convoId": "convo1",
            "message": {
                "$type": "chat.bsky.convo.defs#messageView",
                "id": "msg1",
                "text": "hello bot",
                "sender": { "did": OTHER },
                "sentAt": "2024-06-01T12:00:00Z",
            },
        }]),
    ));
    // Third and later fetches fall back to the default: empty, no cursor.

    let (on_message, mut messages) = listener();
    h.engine.on(EventKind::Message, on_message).unwrap();

    run_intervals(4).await;

    let events = drain(&mut messages);
    assert_eq!(events.len(), 1);
    match &events[0] {
        BotEvent::Message(msg) => {
            assert_eq!(msg.text, "hello bot");
            assert_eq!(msg.convo_id, "convo1");
            assert_eq!(msg.sender.did.as_str(), OTHER);
        }
        other => panic!("expected message, got {other:?}"),
    }

    let cursors = h.chat.cursors_seen();
    assert!(cursors.len() >= 4);
    assert_eq!(cursors[0], None);
    assert_eq!(cursors[1].as_deref(), Some("abc"));
    assert_eq!(cursors[2].as_deref(), Some("def"));
    // The cursorless page did not regress the stored cursor.
    assert_eq!(cursors[3].as_deref(), Some("def"));

    h.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn chat_skips_own_and_deleted_messages_and_reports_unknown_shapes() {
    let h = harness(|b| b.polling());
    h.engine.set_identity(did(BOT)).await;

    h.chat.push_page(chat_page(
        Some("a"),
        json!([
            {
                "$type": "chat.bsky.convo.defs#logCreateMessage",
                "convoId": "convo1",
                "message": {
                    "$type": "chat.bsky.convo.defs#messageView",
                    "id": "own",
                    "text": "from the bot itself",
                    "sender": { "did": BOT },
                    "sentAt": "2024-06-01T12:00:00Z",
                },
            },
            {
                "$type": "chat.bsky.convo.defs#logCreateMessage",
                "convoId": "convo1",
                "message": { "$type": "chat.bsky.convo.defs#deletedMessageView", "id": "gone" },
            },
            { "$type": "chat.bsky.convo.defs#logBeginConvo", "convoId": "convo1" },
            {
                "$type": "chat.bsky.convo.defs#logCreateMessage",
                "convoId": "convo1",
                "message": {
                    "$type": "chat.bsky.convo.defs#messageView",
                    "id": "real",
                    "text": "hi",
                    "sender": { "did": OTHER },
                    "sentAt": "2024-06-01T12:00:01Z",
                },
            },
        ]),
    ));

    let (on_message, mut messages) = listener();
    h.engine.on(EventKind::Message, on_message).unwrap();
    let (on_error, mut errors) = listener();
    h.engine.on(EventKind::Error, on_error).unwrap();

    run_intervals(1).await;

    let events = drain(&mut messages);
    assert_eq!(events.len(), 1);
    match &events[0] {
        BotEvent::Message(msg) => assert_eq!(msg.id, "real"),
        other => panic!("expected message, got {other:?}"),
    }
    // The unrecognized logBeginConvo entry surfaced as an error event.
    assert_eq!(drain(&mut errors).len(), 1);

    h.engine.stop().await;
}
