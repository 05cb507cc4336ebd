//! Ordered chunk delivery to the caller

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::llm::Chunk;
use crate::domain::DomainError;

/// Receives the canonical chunks of one call, in order.
///
/// `send` is awaited before the next chunk is produced, so a slow consumer throttles the
/// producer.
#[async_trait]
pub trait ChunkSink: Send {
    async fn send(&mut self, chunk: Chunk) -> Result<(), DomainError>;
}

#[async_trait]
impl ChunkSink for mpsc::Sender<Chunk> {
    async fn send(&mut self, chunk: Chunk) -> Result<(), DomainError> {
        mpsc::Sender::send(self, chunk)
            .await
            .map_err(|_| DomainError::aborted("Chunk receiver dropped"))
    }
}

#[async_trait]
impl ChunkSink for Vec<Chunk> {
    async fn send(&mut self, chunk: Chunk) -> Result<(), DomainError> {
        self.push(chunk);
        Ok(())
    }
}

/// Adapts a synchronous callback
pub struct CallbackSink<F>(pub F);

#[async_trait]
impl<F> ChunkSink for CallbackSink<F>
where
    F: FnMut(Chunk) + Send,
{
    async fn send(&mut self, chunk: Chunk) -> Result<(), DomainError> {
        (self.0)(chunk);
        Ok(())
    }
}
