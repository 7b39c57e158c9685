//! Feed Watch - event engine demo.
//!
//! Runs the skein event engine against scripted in-memory sources: a few
//! notifications land on the polling feed and a short commit-stream session
//! plays out, while every resulting bot event is printed. No network access
//! is needed.
//!
//! ## Usage
//!
//! ```bash
//! # Watch the polled notification feed
//! feed-watch polling
//!
//! # Watch a scripted commit-stream session
//! feed-watch firehose
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{TimeDelta, Utc};
use clap::{Parser, Subcommand};
use serde_json::json;
use skein_bot::testing::{
    MockChatSource, MockCommitSource, MockNotificationSource, MockResolver,
};
use skein_bot::{
    BotEvent, EngineBuilder, EngineSources, EventEngine, EventKind, StreamItem,
};
use skein_proto::{AtUri, CommitEvent, Did, Notification, NotificationReason, OpAction, RepoOp};

const BOT: &str = "did:plc:feedwatch";

/// Watch a scripted feed through the skein event engine.
#[derive(Parser)]
#[command(name = "feed-watch")]
#[command(about = "Demo: the skein event engine against scripted sources")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Poll interval in seconds
    #[arg(short, long, default_value_t = 1)]
    interval: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive the notification polling strategy
    Polling,
    /// Drive the commit-stream strategy
    Firehose,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let notifications = Arc::new(MockNotificationSource::new());
    let commits = Arc::new(MockCommitSource::new());
    let sources = EngineSources {
        notifications: Arc::clone(&notifications) as _,
        commits: Arc::clone(&commits) as _,
        chat: Arc::new(MockChatSource::new()),
        resolver: Arc::new(MockResolver::new()),
    };

    let builder = EngineBuilder::new()
        .poll_interval(Duration::from_secs(cli.interval))
        .starting_watermark(Utc::now() - TimeDelta::seconds(1));
    let builder = match cli.command {
        Commands::Polling => {
            script_notifications(&notifications);
            builder.polling()
        }
        Commands::Firehose => {
            script_commits(&commits);
            builder.firehose()
        }
    };

    let engine = EventEngine::with_config(sources, builder.build_config())?;
    engine.set_identity(Did::new(BOT)?).await;

    for kind in [
        EventKind::Open,
        EventKind::Close,
        EventKind::Error,
        EventKind::Reply,
        EventKind::Mention,
        EventKind::Like,
        EventKind::Follow,
    ] {
        engine.on(kind, print_event)?;
    }

    tracing::info!("engine running; watching for 5 seconds");
    tokio::time::sleep(Duration::from_secs(5)).await;

    engine.stop().await;
    tracing::info!("engine stopped");
    Ok(())
}

fn print_event(event: BotEvent) {
    match event {
        BotEvent::Open => println!("stream open"),
        BotEvent::Close => println!("stream closed"),
        BotEvent::Error(e) => println!("error: {e}"),
        BotEvent::Reply(post) => println!("reply from @{}: {:?}", post.author.handle, post.record.text),
        BotEvent::Quote(post) => println!("quote from @{}", post.author.handle),
        BotEvent::Mention(post) => println!("mention from @{}", post.author.handle),
        BotEvent::Repost { user, .. } => println!("repost by @{}", user.handle),
        BotEvent::Like { user, .. } => println!("like by @{}", user.handle),
        BotEvent::Follow { user, .. } => println!("new follower: @{}", user.handle),
        BotEvent::Message(msg) => println!("dm from @{}: {:?}", msg.sender.handle, msg.text),
    }
}

fn script_notifications(source: &MockNotificationSource) {
    let now = Utc::now();
    source.push_page(vec![
        Notification {
            uri: AtUri::parse("at://did:plc:carol/app.bsky.feed.post/3kreply").unwrap(),
            cid: "demo-cid-1".to_string(),
            author: Did::new("did:plc:carol").unwrap(),
            reason: NotificationReason::Reply,
            reason_subject: None,
            record: json!({
                "$type": "app.bsky.feed.post",
                "text": "replying to the bot",
                "reply": {
                    "root": { "uri": format!("at://{BOT}/app.bsky.feed.post/root"), "cid": "c" },
                    "parent": { "uri": format!("at://{BOT}/app.bsky.feed.post/parent"), "cid": "c" },
                },
                "createdAt": now.to_rfc3339(),
            }),
            indexed_at: now + TimeDelta::seconds(2),
        },
        Notification {
            uri: AtUri::parse("at://did:plc:dave/app.bsky.graph.follow/3kfollow").unwrap(),
            cid: "demo-cid-2".to_string(),
            author: Did::new("did:plc:dave").unwrap(),
            reason: NotificationReason::Follow,
            reason_subject: None,
            record: json!({}),
            indexed_at: now + TimeDelta::seconds(1),
        },
    ]);
}

fn script_commits(source: &MockCommitSource) {
    source.push_session(vec![
        StreamItem::Open,
        StreamItem::Commit(CommitEvent {
            repo: Did::new("did:plc:erin").unwrap(),
            seq: Some(1),
            ops: vec![RepoOp {
                action: OpAction::Create,
                path: "app.bsky.feed.like/3klike".to_string(),
                record: Some(json!({
                    "$type": "app.bsky.feed.like",
                    "subject": { "uri": format!("at://{BOT}/app.bsky.feed.post/hit"), "cid": "c" },
                    "createdAt": Utc::now().to_rfc3339(),
                })),
            }],
        }),
        StreamItem::Closed,
    ]);
    // After the close the engine reconnects; the second session stays quiet.
    source.push_session(vec![StreamItem::Open]);
}
