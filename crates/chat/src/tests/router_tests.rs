use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use anyhow::anyhow;
use chrono::Utc;
use tokio::sync::{Barrier, Mutex};

use super::*;

#[derive(Default)]
struct Recording {
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl TriggerHandler for Recording {
    async fn handle(&self, message: &ChatMessage) -> anyhow::Result<()> {
        self.seen.lock().await.push(message.text.clone());
        Ok(())
    }
}

struct Failing;

#[async_trait]
impl TriggerHandler for Failing {
    async fn handle(&self, _message: &ChatMessage) -> anyhow::Result<()> {
        Err(anyhow!("scene unavailable"))
    }
}

struct Rendezvous(Arc<Barrier>);

#[async_trait]
impl TriggerHandler for Rendezvous {
    async fn handle(&self, _message: &ChatMessage) -> anyhow::Result<()> {
        self.0.wait().await;
        Ok(())
    }
}

fn message(text: &str) -> Arc<ChatMessage> {
    Arc::new(ChatMessage {
        channel: "virtuagallery".into(),
        sender: "viewer".into(),
        text: text.into(),
        received_at: Utc::now(),
    })
}

fn trigger(pattern: &str, handler: Arc<dyn TriggerHandler>) -> Trigger {
    Trigger::new(pattern, handler).expect("valid pattern")
}

#[tokio::test]
async fn every_matching_trigger_fires() {
    let cam = Arc::new(Recording::default());
    let any_cam = Arc::new(Recording::default());
    let other = Arc::new(Recording::default());
    let router = TriggerRouter::new(vec![
        trigger(r"\[CAM 2\]", cam.clone()),
        trigger(r"cam \d", any_cam.clone()),
        trigger("brb", other.clone()),
    ]);

    let outcome = router.dispatch(message("show me [cam 2] now")).await;
    assert_eq!(outcome, DispatchOutcome { matched: 2, failed: 0 });
    assert_eq!(*cam.seen.lock().await, vec!["show me [cam 2] now"]);
    assert_eq!(any_cam.seen.lock().await.len(), 1);
    assert!(other.seen.lock().await.is_empty());
}

#[tokio::test]
async fn unmatched_message_runs_nothing() {
    let handler = Arc::new(Recording::default());
    let router = TriggerRouter::new(vec![trigger(r"\[CAM 1\]", handler.clone())]);

    let outcome = router.dispatch(message("hello chat")).await;
    assert_eq!(outcome, DispatchOutcome::default());
    assert!(handler.seen.lock().await.is_empty());
}

#[tokio::test]
async fn handler_failure_does_not_affect_siblings() {
    let handler = Arc::new(Recording::default());
    let router = TriggerRouter::new(vec![
        trigger("cam", Arc::new(Failing)),
        trigger("cam", handler.clone()),
    ]);

    let outcome = router.dispatch(message("cam please")).await;
    assert_eq!(outcome, DispatchOutcome { matched: 2, failed: 1 });
    assert_eq!(handler.seen.lock().await.len(), 1);
}

#[tokio::test]
async fn matched_handlers_run_concurrently() {
    let barrier = Arc::new(Barrier::new(2));
    let router = TriggerRouter::new(vec![
        trigger("go", Arc::new(Rendezvous(barrier.clone()))),
        trigger("go", Arc::new(Rendezvous(barrier))),
    ]);

    let outcome = tokio::time::timeout(Duration::from_secs(2), router.dispatch(message("go")))
        .await
        .expect("both handlers reached the barrier");
    assert_eq!(outcome.matched, 2);
}

#[test]
fn invalid_pattern_is_rejected() {
    let err = Trigger::new("[CAM 1", Arc::new(Failing)).err().expect("invalid");
    assert!(matches!(err, ChatError::InvalidPattern { pattern, .. } if pattern == "[CAM 1"));
}

#[test]
fn patterns_ignore_case() {
    let trigger = trigger(r"\[CAM 4\]", Arc::new(Failing));
    assert!(trigger.matches("[cam 4]"));
    assert!(trigger.matches("switch to [Cam 4] pls"));
    assert!(!trigger.matches("[cam 5]"));
}

struct FakeChat {
    events: broadcast::Sender<ChatEvent>,
    joined: Mutex<Vec<String>>,
    joins: AtomicUsize,
}

impl FakeChat {
    fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            events,
            joined: Mutex::new(Vec::new()),
            joins: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ChatTransport for FakeChat {
    async fn start(&self) -> Result<(), ChatError> {
        Ok(())
    }

    async fn join(&self, channel: &str) -> Result<(), ChatError> {
        self.joins.fetch_add(1, Ordering::SeqCst);
        self.joined.lock().await.push(channel.to_string());
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    async fn stop(&self) {}
}

#[tokio::test]
async fn intake_joins_on_ready_and_dispatches_messages() {
    let chat = Arc::new(FakeChat::new());
    let handler = Arc::new(Recording::default());
    let router = Arc::new(TriggerRouter::new(vec![trigger(
        r"\[CAM 3\]",
        handler.clone(),
    )]));
    let intake = spawn_intake(router, chat.clone(), "virtuagallery".into());

    chat.events.send(ChatEvent::Ready).expect("send ready");
    chat.events
        .send(ChatEvent::Message((*message("[CAM 3]")).clone()))
        .expect("send message");

    tokio::time::timeout(Duration::from_secs(2), async {
        while handler.seen.lock().await.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("message dispatched");
    assert_eq!(*chat.joined.lock().await, vec!["virtuagallery"]);

    chat.events
        .send(ChatEvent::Disconnected {
            reason: "stopped".into(),
        })
        .expect("send disconnect");
    tokio::time::timeout(Duration::from_secs(2), intake)
        .await
        .expect("intake stops")
        .expect("intake task");
    assert_eq!(chat.joins.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn intake_without_triggers_still_joins_and_stops() {
    let chat = Arc::new(FakeChat::new());
    let router = Arc::new(TriggerRouter::default());
    assert!(router.is_empty());
    let intake = spawn_intake(router, chat.clone(), "virtuagallery".into());

    chat.events.send(ChatEvent::Ready).expect("send ready");
    chat.events
        .send(ChatEvent::Message((*message("[CAM 3]")).clone()))
        .expect("send message");
    chat.events
        .send(ChatEvent::Disconnected {
            reason: "stopped".into(),
        })
        .expect("send disconnect");

    tokio::time::timeout(Duration::from_secs(2), intake)
        .await
        .expect("intake stops")
        .expect("intake task");
    assert_eq!(*chat.joined.lock().await, vec!["virtuagallery"]);
}
