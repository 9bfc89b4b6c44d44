//! Metric instrument factories for serialq.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"serialq"` meter; without a
//! registered provider they are no-ops.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for serialq instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("serialq")
}

/// Counter: work items submitted to a queue.
/// Labels: `result` ("ok" | "disposed").
pub fn work_submitted() -> Counter<u64> {
    meter()
        .u64_counter("serialq.work.submitted")
        .with_description("Number of work items submitted")
        .build()
}

/// Histogram: time a work item waited for the queue lock, in milliseconds.
pub fn work_wait_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("serialq.work.wait_ms")
        .with_description("Time spent waiting for the queue lock")
        .with_unit("ms")
        .build()
}

/// Histogram: time a work item held the queue lock, in milliseconds.
pub fn work_run_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("serialq.work.run_ms")
        .with_description("Work item execution time")
        .with_unit("ms")
        .build()
}

/// Counter: queue teardowns performed. At most one per queue.
pub fn queue_disposals() -> Counter<u64> {
    meter()
        .u64_counter("serialq.queue.disposals")
        .with_description("Number of queues disposed")
        .build()
}
