use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

/// The downstream side closed and will not take more data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("downstream closed")]
pub struct SinkClosed;

/// Where the relay writes tokens.
#[async_trait]
pub trait DownstreamSink: Send + Sync {
    /// Writes one chunk and returns once it is handed to the client side.
    async fn write(&self, chunk: Bytes) -> Result<(), SinkClosed>;

    /// Resolves when the client side is gone.
    async fn closed(&self) {
        futures::future::pending::<()>().await
    }
}

/// A sink over a bounded channel whose receiver feeds the response body.
///
/// With a capacity of one, at most one token waits between the relay and the
/// client. Dropping the receiver (the response body) closes the sink.
pub struct ChannelSink {
    sender: mpsc::Sender<Bytes>,
}

impl ChannelSink {
    /// Creates the sink and the receiving end for the response body.
    pub fn channel() -> (Self, mpsc::Receiver<Bytes>) {
        let (sender, receiver) = mpsc::channel(1);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl DownstreamSink for ChannelSink {
    async fn write(&self, chunk: Bytes) -> Result<(), SinkClosed> {
        self.sender.send(chunk).await.map_err(|_| SinkClosed)
    }

    async fn closed(&self) {
        self.sender.closed().await
    }
}
