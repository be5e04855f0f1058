//! Turns the one-shot list of candidates discovery produces into a
//! best-effort priority stream: a single feeder task owns a `BinaryHeap`
//! ordered by `Candidate::queue_key` and drains it into a bounded `mpsc`
//! channel, since `mpsc` alone is FIFO and can't express priority itself.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use gh_intel_types::Candidate;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

struct HeapItem(Candidate);

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.0.queue_key() == other.0.queue_key()
    }
}

impl Eq for HeapItem {}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.queue_key().cmp(&other.0.queue_key())
    }
}

/// Spawns the feeder task and returns the receiving end workers pull from.
/// The channel closes (and workers observe `recv() == None`) once the heap
/// is drained or `cancel` fires.
pub fn spawn_priority_feeder(
    candidates: Vec<Candidate>,
    capacity: usize,
    cancel: CancellationToken,
) -> mpsc::Receiver<Candidate> {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    tokio::spawn(async move {
        let mut heap: BinaryHeap<HeapItem> = candidates.into_iter().map(HeapItem).collect();
        while let Some(HeapItem(candidate)) = heap.pop() {
            tokio::select! {
                _ = cancel.cancelled() => break,
                send_result = tx.send(candidate) => {
                    if send_result.is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}
