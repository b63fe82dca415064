//! Operation bookkeeping: the backup queue and the outstanding map.
//!
//! Flow:
//! 1. A caller submits an operation with a oneshot reply
//! 2. While loading it waits in the [`BackupQueue`] (submission order)
//! 3. Once sent it moves to [`OutstandingOperations`] under its request id
//! 4. The validated response removes the entry and resolves the caller

use shared_types::{MessageType, Payload};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::debug;

use super::errors::ConnectorError;

/// Outcome delivered to a caller.
pub type OperationResult = Result<Payload, ConnectorError>;

/// Caller's end of an operation.
pub type Reply = oneshot::Sender<OperationResult>;

/// An operation not yet sent.
///
/// Holds the inputs rather than a built envelope: nonce, timestamp and
/// signature are minted when it is actually sent.
#[derive(Debug)]
pub struct QueuedOperation {
    /// Operation name.
    pub operation: MessageType,
    /// Request payload.
    pub payload: Payload,
    /// Where the result goes.
    pub reply: Reply,
}

impl QueuedOperation {
    /// Resolve the caller. A caller that went away is ignored.
    pub fn resolve(self, result: OperationResult) {
        deliver(self.operation, self.reply, result);
    }
}

fn deliver(operation: MessageType, reply: Reply, result: OperationResult) {
    if reply.send(result).is_err() {
        debug!(operation = %operation, "Caller abandoned operation");
    }
}

/// Operations submitted before the session came up.
#[derive(Debug, Default)]
pub struct BackupQueue {
    queue: VecDeque<QueuedOperation>,
}

impl BackupQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append in submission order.
    pub fn push(&mut self, operation: QueuedOperation) {
        debug!(operation = %operation.operation, queued = self.queue.len() + 1, "Operation queued");
        self.queue.push_back(operation);
    }

    /// Take every queued operation, oldest first.
    pub fn drain(&mut self) -> Vec<QueuedOperation> {
        self.queue.drain(..).collect()
    }

    /// Reject every queued operation.
    pub fn reject_all(&mut self, error: &ConnectorError) -> usize {
        let drained = self.drain();
        let count = drained.len();
        for operation in drained {
            operation.resolve(Err(error.clone()));
        }
        count
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

struct Outstanding {
    operation: MessageType,
    reply: Reply,
    sent_at: Instant,
}

/// Sent operations awaiting their response, keyed by request id.
#[derive(Default)]
pub struct OutstandingOperations {
    pending: HashMap<String, Outstanding>,
}

impl OutstandingOperations {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a sent operation.
    pub fn register(&mut self, request_id: String, operation: MessageType, reply: Reply) {
        debug!(request_id = %request_id, operation = %operation, "Registered outstanding operation");
        self.pending.insert(
            request_id,
            Outstanding {
                operation,
                reply,
                sent_at: Instant::now(),
            },
        );
    }

    /// Whether `request_id` answers an outstanding `operation`.
    pub fn is_pending(&self, request_id: &str, operation: MessageType) -> bool {
        self.pending
            .get(request_id)
            .is_some_and(|entry| entry.operation == operation)
    }

    /// Resolve the entry for `request_id` if it belongs to `operation`.
    ///
    /// Returns false (and keeps the entry) when the id is unknown or was
    /// issued for a different operation.
    pub fn complete(
        &mut self,
        request_id: &str,
        operation: MessageType,
        result: OperationResult,
    ) -> bool {
        if !self.is_pending(request_id, operation) {
            return false;
        }
        let Some(entry) = self.pending.remove(request_id) else {
            return false;
        };
        debug!(
            request_id = %request_id,
            operation = %operation,
            elapsed_ms = entry.sent_at.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Completed outstanding operation"
        );
        deliver(entry.operation, entry.reply, result);
        true
    }

    /// Reject every outstanding operation.
    pub fn reject_all(&mut self, error: &ConnectorError) -> usize {
        let count = self.pending.len();
        for (_, entry) in self.pending.drain() {
            deliver(entry.operation, entry.reply, Err(error.clone()));
        }
        count
    }

    /// Age of the oldest outstanding operation.
    pub fn oldest_age(&self) -> Option<Duration> {
        self.pending.values().map(|entry| entry.sent_at.elapsed()).max()
    }

    /// Number of outstanding operations.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is outstanding.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
