//! Downstream client contract used to execute a flushed batch.

use async_trait::async_trait;

use crate::retry::TaskError;

/// Reply to a batched call.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchReply<O> {
    /// One result shared by every member of the batch.
    Shared(O),
    /// One result per member, in submission order.
    PerItem(Vec<O>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchResponse<O> {
    pub reply: BatchReply<O>,
    pub metadata: Option<serde_json::Value>,
}

impl<O> BatchResponse<O> {
    pub fn shared(output: O) -> Self {
        Self {
            reply: BatchReply::Shared(output),
            metadata: None,
        }
    }

    pub fn per_item(outputs: Vec<O>) -> Self {
        Self {
            reply: BatchReply::PerItem(outputs),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Executes one flushed batch as a single downstream call.
#[async_trait]
pub trait BatchClient: Send + Sync + 'static {
    type Payload: Send + 'static;
    type Output: Clone + Send + 'static;

    async fn send(
        &self,
        key: &str,
        payloads: Vec<Self::Payload>,
    ) -> Result<BatchResponse<Self::Output>, TaskError>;
}
