use tokio::sync::broadcast;
use tracing::debug;
use tug_core::services::SpeechOutput;

/// Fans every pushed sentence out to all connected sockets.
///
/// The number of subscribed sockets is the stream's peer count, so a
/// stream nobody listens to reads as not connected.
#[derive(Clone, Debug)]
pub struct SpeechHub {
    name: &'static str,
    tx: broadcast::Sender<String>,
}

impl SpeechHub {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { name, tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

impl SpeechOutput for SpeechHub {
    fn peer_count(&self) -> usize {
        self.tx.receiver_count()
    }

    fn push(&self, text: &str) {
        if self.tx.send(text.to_string()).is_err() {
            debug!(stream = self.name, "Dropped sentence, no subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_peer_count_follows_subscribers() {
        let hub = SpeechHub::new("speech", 8);
        assert_eq!(hub.peer_count(), 0);
        hub.push("nobody hears this");

        let mut first = hub.subscribe();
        let second = hub.subscribe();
        assert_eq!(hub.peer_count(), 2);

        hub.push("Go!");
        assert_eq!(first.recv().await.unwrap(), "Go!");

        drop(second);
        assert_eq!(hub.peer_count(), 1);
    }
}
