use std::sync::Mutex;
use std::time::Duration;

use futures::Stream;
use serde::Serialize;
use tokio::sync::mpsc;

/// Events buffered before an observer attaches. Small on purpose: events
/// are tiny and infrequent, and a saturated channel drops rather than
/// blocks the producer.
pub const DEFAULT_CAPACITY: usize = 256;

/// How long a subscriber waits in silence before synthesising a
/// keep-alive, so a long-polling observer connection is not mistaken for
/// dead.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    Init,
    Verifying,
    Download,
    Processing,
    Complete,
    KeepAlive,
}

impl std::fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Self::Init => "init",
            Self::Verifying => "verifying",
            Self::Download => "download",
            Self::Processing => "processing",
            Self::Complete => "complete",
            Self::KeepAlive => "keep-alive",
        };
        f.write_str(tag)
    }
}

/// A single progress update. Ephemeral — only the most recent event
/// matters to a newly attached observer.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub percent: u8,
    pub stage: ProgressStage,
    pub message: String,
}

impl ProgressEvent {
    pub fn new(percent: u8, stage: ProgressStage, message: impl Into<String>) -> Self {
        Self {
            percent: percent.min(100),
            stage,
            message: message.into(),
        }
    }

    /// Terminal event. Success or failure is carried in the message; the
    /// stage alone ends the subscription.
    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(100, ProgressStage::Complete, message)
    }

    fn keep_alive() -> Self {
        Self::new(0, ProgressStage::KeepAlive, "")
    }
}

/// Bounded conduit between background workers and one async observer.
///
/// `publish` never blocks and never fails visibly: a full buffer or a
/// departed observer just drops the event. Exactly one subscription can
/// be taken per channel; events published before that are delivered as
/// the initial snapshot.
pub struct ProgressChannel {
    tx: mpsc::Sender<ProgressEvent>,
    rx: Mutex<Option<mpsc::Receiver<ProgressEvent>>>,
    keep_alive: Duration,
}

impl ProgressChannel {
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_CAPACITY, KEEP_ALIVE_INTERVAL)
    }

    pub fn with_settings(capacity: usize, keep_alive: Duration) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            keep_alive,
        }
    }

    /// Publish from any thread, sync or async context alike.
    pub fn publish(&self, event: ProgressEvent) {
        let _ = self.tx.try_send(event);
    }

    /// Take the single subscription. Returns `None` once already taken.
    pub fn subscribe(&self) -> Option<ProgressSubscription> {
        let rx = self.rx.lock().expect("progress receiver lock").take()?;
        Some(ProgressSubscription {
            rx,
            keep_alive: self.keep_alive,
            done: false,
        })
    }
}

impl Default for ProgressChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Ordered, finite sequence of progress events for one observer.
///
/// Ends after a `Complete` event or once every publisher is gone.
pub struct ProgressSubscription {
    rx: mpsc::Receiver<ProgressEvent>,
    keep_alive: Duration,
    done: bool,
}

impl ProgressSubscription {
    pub async fn next(&mut self) -> Option<ProgressEvent> {
        if self.done {
            return None;
        }

        match tokio::time::timeout(self.keep_alive, self.rx.recv()).await {
            Ok(Some(event)) => {
                if event.stage == ProgressStage::Complete {
                    self.done = true;
                }
                Some(event)
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(_) => Some(ProgressEvent::keep_alive()),
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = ProgressEvent> + Send {
        futures::stream::unfold(self, |mut sub| async move {
            sub.next().await.map(|event| (event, sub))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(percent: u8, stage: ProgressStage) -> ProgressEvent {
        ProgressEvent::new(percent, stage, "msg")
    }

    #[tokio::test]
    async fn delivers_events_in_publish_order() {
        let channel = ProgressChannel::new();
        channel.publish(event(1, ProgressStage::Init));
        channel.publish(event(5, ProgressStage::Download));
        channel.publish(ProgressEvent::complete("done"));

        let mut sub = channel.subscribe().unwrap();
        assert_eq!(sub.next().await.unwrap().stage, ProgressStage::Init);
        assert_eq!(sub.next().await.unwrap().stage, ProgressStage::Download);
        assert_eq!(sub.next().await.unwrap().stage, ProgressStage::Complete);
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn buffered_events_survive_late_subscription() {
        let channel = ProgressChannel::new();
        channel.publish(event(42, ProgressStage::Processing));

        let mut sub = channel.subscribe().unwrap();
        let seen = sub.next().await.unwrap();
        assert_eq!(seen.percent, 42);
    }

    #[tokio::test]
    async fn only_one_subscription_per_channel() {
        let channel = ProgressChannel::new();
        assert!(channel.subscribe().is_some());
        assert!(channel.subscribe().is_none());
    }

    #[tokio::test]
    async fn idle_subscriber_gets_keep_alives() {
        let channel = ProgressChannel::with_settings(8, Duration::from_millis(20));
        let mut sub = channel.subscribe().unwrap();

        let seen = sub.next().await.unwrap();
        assert_eq!(seen.stage, ProgressStage::KeepAlive);

        // A real event afterwards still comes through.
        channel.publish(event(10, ProgressStage::Download));
        let seen = sub.next().await.unwrap();
        assert_eq!(seen.stage, ProgressStage::Download);
    }

    #[tokio::test]
    async fn publish_after_observer_gone_is_silent() {
        let channel = ProgressChannel::new();
        let sub = channel.subscribe().unwrap();
        drop(sub);

        // Must neither block nor panic.
        channel.publish(event(50, ProgressStage::Processing));
    }

    #[tokio::test]
    async fn full_buffer_drops_instead_of_blocking() {
        let channel = ProgressChannel::with_settings(2, KEEP_ALIVE_INTERVAL);
        for i in 0..10 {
            channel.publish(event(i, ProgressStage::Download));
        }

        let mut sub = channel.subscribe().unwrap();
        assert_eq!(sub.next().await.unwrap().percent, 0);
        assert_eq!(sub.next().await.unwrap().percent, 1);
    }

    #[test]
    fn percent_clamped_to_hundred() {
        let event = ProgressEvent::new(250, ProgressStage::Processing, "");
        assert_eq!(event.percent, 100);
    }

    #[test]
    fn stage_serializes_snake_case() {
        let json = serde_json::to_string(&ProgressEvent::complete("ok")).unwrap();
        assert!(json.contains("\"complete\""));
    }
}
