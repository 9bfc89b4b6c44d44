//! Work item span helpers.
//!
//! Every item a queue executes runs inside a `queue.work` span so that
//! whatever the item logs is attributed to its queue and position.

use crate::queue::QueueId;
use tracing::Span;

/// Start a span for one work item execution.
///
/// `work.seq` is the item's admission order on its queue, starting at 0.
pub fn start_work_span(queue_id: &QueueId, seq: u64) -> Span {
    tracing::info_span!(
        "queue.work",
        "queue.id" = %queue_id,
        "work.seq" = seq,
    )
}
