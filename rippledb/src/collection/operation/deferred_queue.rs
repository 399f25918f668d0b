use crate::collection::{Document, InsertResult, UpdateOptions};
use crate::common::Value;
use crate::config::DeferThresholds;
use std::collections::{HashMap, VecDeque};

/// Receives the combined result of a deferred insert batch once its last
/// document has been processed.
pub(crate) type InsertCallback = Box<dyn FnOnce(InsertResult) + Send>;

/// A single unit of queued work.
pub(crate) enum DeferredOp {
    Insert(Document),
    Upsert(Document),
    /// Applies `update` to the document stored under `key`; `query` is the
    /// query of the original call, used by positional updates.
    Update {
        key: Value,
        query: Document,
        update: Document,
        options: UpdateOptions,
    },
    Remove(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeferredKind {
    Insert,
    Upsert,
    Update,
    Remove,
}

impl DeferredOp {
    pub fn kind(&self) -> DeferredKind {
        match self {
            DeferredOp::Insert(_) => DeferredKind::Insert,
            DeferredOp::Upsert(_) => DeferredKind::Upsert,
            DeferredOp::Update { .. } => DeferredKind::Update,
            DeferredOp::Remove(_) => DeferredKind::Remove,
        }
    }
}

impl DeferredKind {
    fn threshold(&self, thresholds: &DeferThresholds) -> usize {
        match self {
            DeferredKind::Insert => thresholds.insert,
            DeferredKind::Upsert => thresholds.upsert,
            DeferredKind::Update => thresholds.update,
            DeferredKind::Remove => thresholds.remove,
        }
    }
}

pub(crate) struct DeferredTask {
    pub op: DeferredOp,
    pub batch: u64,
}

struct Batch {
    remaining: usize,
    result: InsertResult,
    callback: Option<InsertCallback>,
}

/// FIFO of deferred writes, drained one chunk at a time.
///
/// A chunk holds consecutive tasks of one kind, at most that kind's
/// threshold. Every queued call forms a batch; when its last task settles
/// the batch callback receives the accumulated result.
#[derive(Default)]
pub(crate) struct DeferredQueue {
    tasks: VecDeque<DeferredTask>,
    batches: HashMap<u64, Batch>,
    next_batch: u64,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn push_batch(&mut self, ops: Vec<DeferredOp>, callback: Option<InsertCallback>) -> u64 {
        let batch = self.next_batch;
        self.next_batch += 1;
        self.batches.insert(
            batch,
            Batch {
                remaining: ops.len(),
                result: InsertResult::default(),
                callback,
            },
        );
        self.tasks.extend(ops.into_iter().map(|op| DeferredTask { op, batch }));
        batch
    }

    /// Removes the next chunk from the front of the queue.
    pub fn take_chunk(&mut self, thresholds: &DeferThresholds) -> Vec<DeferredTask> {
        let Some(kind) = self.tasks.front().map(|task| task.op.kind()) else {
            return vec![];
        };
        let limit = kind.threshold(thresholds).max(1);

        let mut chunk = Vec::new();
        while chunk.len() < limit && self.tasks.front().is_some_and(|task| task.op.kind() == kind) {
            if let Some(task) = self.tasks.pop_front() {
                chunk.push(task);
            }
        }
        chunk
    }

    /// Records `count` processed tasks of a batch. Returns the callback and
    /// final result once the batch is complete.
    pub fn settle(&mut self, batch: u64, count: usize, partial: InsertResult) -> Option<(InsertCallback, InsertResult)> {
        let entry = self.batches.get_mut(&batch)?;
        entry.remaining = entry.remaining.saturating_sub(count);
        entry.result.merge(partial);
        if entry.remaining > 0 {
            return None;
        }

        let finished = self.batches.remove(&batch)?;
        finished.callback.map(|callback| (callback, finished.result))
    }

    /// Drops every queued task. Pending callbacks are never called.
    pub fn clear(&mut self) {
        self.tasks.clear();
        self.batches.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn inserts(count: usize) -> Vec<DeferredOp> {
        (0..count).map(|i| DeferredOp::Insert(doc! { n: i })).collect()
    }

    #[test]
    fn test_chunks_respect_threshold_and_kind() {
        let mut queue = DeferredQueue::new();
        queue.push_batch(inserts(5), None);
        queue.push_batch(vec![DeferredOp::Remove(Value::from("1"))], None);

        let thresholds = DeferThresholds::uniform(2);
        assert_eq!(queue.take_chunk(&thresholds).len(), 2);
        assert_eq!(queue.take_chunk(&thresholds).len(), 2);
        let last_inserts = queue.take_chunk(&thresholds);
        assert_eq!(last_inserts.len(), 1);
        assert_eq!(last_inserts[0].op.kind(), DeferredKind::Insert);

        let removes = queue.take_chunk(&thresholds);
        assert_eq!(removes.len(), 1);
        assert_eq!(removes[0].op.kind(), DeferredKind::Remove);
        assert!(queue.is_empty());
        assert!(queue.take_chunk(&thresholds).is_empty());
    }

    #[test]
    fn test_settle_calls_back_once_complete() {
        let mut queue = DeferredQueue::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let batch = queue.push_batch(
            inserts(3),
            Some(Box::new(move |result: InsertResult| {
                calls_clone.fetch_add(result.inserted().len(), Ordering::Relaxed);
            })),
        );

        assert!(queue
            .settle(batch, 2, InsertResult::new(vec![doc! { n: 0 }, doc! { n: 1 }], vec![]))
            .is_none());
        let (callback, result) = queue
            .settle(batch, 1, InsertResult::new(vec![doc! { n: 2 }], vec![]))
            .unwrap();
        callback(result);
        assert_eq!(calls.load(Ordering::Relaxed), 3);
        assert!(queue.settle(batch, 1, InsertResult::default()).is_none());
    }
}
