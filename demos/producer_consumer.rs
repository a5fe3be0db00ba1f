//! # Example: producer_consumer
//!
//! One fast producer, two consumers reading at different speeds.
//!
//! Demonstrates how to:
//! - Publish into a [`StateCell`] without waiting for consumers.
//! - Observe through per-consumer [`Cursor`](stateflow::Cursor)s (conflation: slow readers skip values).
//! - Stop one consumer with a [`CancellationToken`] and close the cell with a grace period.
//!
//! ## Flow
//! ```text
//! producer ──► publish(1..=N) ──► close via shutdown_within(grace)
//!     fast consumer ──► next_or_cancel() ──► sees most values, then Closed
//!     slow consumer ──► next() + sleep   ──► sees few values, always the final one
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example producer_consumer
//! ```

use std::time::Duration;

use stateflow::{ObserveError, StateCell};
use tokio_util::sync::CancellationToken;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. A named cell seeded with 0 (revision 0)
    let cell = StateCell::builder(0u64).with_name("progress").build();

    // 2. Fast consumer, cancellable from outside
    let token = CancellationToken::new();
    let mut fast = cell.subscribe();
    let fast_task = {
        let token = token.clone();
        tokio::spawn(async move {
            let mut seen = 0usize;
            loop {
                match fast.next_or_cancel(&token).await {
                    Ok(_) => seen += 1,
                    Err(ObserveError::Closed) => return (seen, "closed"),
                    Err(_) => return (seen, "cancelled"),
                }
            }
        })
    };

    // 3. Slow consumer: conflation means it only sees the latest values
    let mut slow = cell.subscribe();
    let slow_task = tokio::spawn(async move {
        let mut last = 0;
        while let Ok(v) = slow.next().await {
            println!("[slow] value={v}");
            last = v;
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        last
    });

    // 4. Produce
    for v in 1..=200u64 {
        let revision = cell.publish(v)?;
        if v % 50 == 0 {
            println!("[producer] published {v} at revision {revision}");
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    // 5. Close and wait for both cursors to detach
    cell.shutdown_within(Duration::from_secs(5)).await?;
    token.cancel();

    let (fast_seen, fast_end) = fast_task.await?;
    let slow_last = slow_task.await?;
    println!("[fast] observed {fast_seen} values, ended: {fast_end}");
    println!("[slow] final value {slow_last}");
    Ok(())
}
