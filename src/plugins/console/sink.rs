use crate::plugins::registry::{AlertSink, FailureAlert, Notifier, Presence, PresenceReporter};
use tokio::sync::mpsc;

/// Something the terminal UI task should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiMessage {
    Notice(String),
    Alert(FailureAlert),
}

/// Forwards notifications and alerts to the task that owns the terminal, so
/// nothing else writes over the progress bars.
#[derive(Clone)]
pub struct UiChannel {
    tx: mpsc::UnboundedSender<UiMessage>,
}

impl UiChannel {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UiMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for UiChannel {
    fn notify(&self, title: &str) -> anyhow::Result<()> {
        self.tx
            .send(UiMessage::Notice(title.to_string()))
            .map_err(|_| anyhow::anyhow!("terminal UI is gone"))
    }
}

impl AlertSink for UiChannel {
    fn present_failure(&self, alert: FailureAlert) {
        if let Err(e) = self.tx.send(UiMessage::Alert(alert)) {
            // Nobody left to show it to; keep it in the log at least.
            if let UiMessage::Alert(alert) = e.0 {
                tracing::error!("{}", alert);
            }
        }
    }
}

/// Presence updates go to the log only.
pub struct LogPresence;

impl PresenceReporter for LogPresence {
    fn report(&self, presence: Presence) {
        match presence {
            Presence::Playing { title } => tracing::info!(target: "presence", "playing {}", title),
            Presence::Idle => tracing::info!(target: "presence", "idle"),
        }
    }
}
