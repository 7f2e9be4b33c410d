//! Progress reporting from the search engine to its host.
//!
//! The engine only produces lines; hosts decide how to surface them. The CLI
//! prints them as they arrive, the job service forwards them over a channel
//! that its consumer drains on a poll interval.

use crossbeam_channel::Sender;

/// Receives human-readable status lines in chronological order
pub trait ProgressSink {
    fn report(&self, message: &str);
}

impl<F: Fn(&str)> ProgressSink for F {
    fn report(&self, message: &str) {
        self(message)
    }
}

/// Discards all progress
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn report(&self, _message: &str) {}
}

/// Forwards progress into a channel. A disconnected receiver is ignored so a
/// consumer going away never disturbs the running search.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: Sender<String>,
}

impl ChannelSink {
    pub fn new(sender: Sender<String>) -> Self {
        Self { sender }
    }
}

impl ProgressSink for ChannelSink {
    fn report(&self, message: &str) {
        let _ = self.sender.send(message.to_string());
    }
}
