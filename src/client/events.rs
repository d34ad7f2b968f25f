use std::sync::atomic::{AtomicBool, Ordering};
use log::{error, info, warn};
use tokio::sync::mpsc;
use crate::Error;

/// Terminal notification for one publish session
#[derive(Debug, Clone, PartialEq)]
pub enum PublishEvent {
    /// The session hit a fatal error
    Failed { code: i32, message: String },

    /// The session was closed by the caller.
    ///
    /// Timestamps are the last decode times in ticks and can be passed back as
    /// timestamp bases when reconnecting.
    Closed {
        endpoint: String,
        stream_name: String,
        last_video_timestamp: i64,
        last_audio_timestamp: i64,
    },
}

/// Delivers at most one terminal event per session
pub(crate) struct EventEmitter {
    fired: AtomicBool,
    sender: mpsc::Sender<PublishEvent>,
}

impl EventEmitter {
    pub(crate) fn new() -> (Self, mpsc::Receiver<PublishEvent>) {
        let (sender, receiver) = mpsc::channel(1);
        (EventEmitter { fired: AtomicBool::new(false), sender }, receiver)
    }

    /// Report a fatal error; returns false when an event was already raised
    pub(crate) fn fail(&self, session_id: &str, err: &Error) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            warn!("[{}] Suppressed failure after terminal event: {}", session_id, err);
            return false;
        }
        error!("[{}] Publish failed: {}", session_id, err);
        self.deliver(PublishEvent::Failed { code: err.code(), message: err.to_string() });
        true
    }

    pub(crate) fn closed(&self, session_id: &str, event: PublishEvent) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            warn!("[{}] Suppressed close after terminal event", session_id);
            return false;
        }
        info!("[{}] Publish closed", session_id);
        self.deliver(event);
        true
    }

    fn deliver(&self, event: PublishEvent) {
        // Capacity is one and only one event is ever sent
        if self.sender.try_send(event).is_err() {
            warn!("Event receiver dropped");
        }
    }
}
