//! # Example: custom_subscriber
//!
//! Demonstrates how to build and attach a custom event subscriber.
//!
//! Shows how to:
//! - Implement the [`Subscribe`] trait.
//! - Inspect [`Event`] / [`EventKind`] for cursor and cell lifecycle.
//! - Wire the subscriber in through [`StateCell::builder`].
//!
//! ## Flow
//! ```text
//! StateCell::builder(seed).with_subscribers(..).build()
//!     ├─► subscribe()       → publish(ObserverAttached)
//!     ├─► drop(cursor)      → publish(ObserverDetached)
//!     ├─► shutdown_within() → publish(CellClosed), then AllDetachedWithin | GraceExceeded
//!     └─► listener task ──► SubscriberSet.emit() ──► ConsoleSubscriber.on_event()
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example custom_subscriber
//! ```

use std::{sync::Arc, time::Duration};

use stateflow::{Event, EventKind, RuntimeError, StateCell, Subscribe};

/// A simple console subscriber that prints selected events.
struct ConsoleSubscriber;

#[async_trait::async_trait]
impl Subscribe for ConsoleSubscriber {
    async fn on_event(&self, ev: &Event) {
        let cell = ev.cell.as_deref().unwrap_or("<unnamed>");
        match ev.kind {
            // === Cursors ===
            EventKind::ObserverAttached => {
                println!(
                    "[sub] attached: cell={cell} cursor={} observers={}",
                    ev.cursor.map(|c| c.to_string()).unwrap_or_default(),
                    ev.observers.unwrap_or(0)
                );
            }
            EventKind::ObserverDetached => {
                println!(
                    "[sub] detached: cell={cell} cursor={} observers={}",
                    ev.cursor.map(|c| c.to_string()).unwrap_or_default(),
                    ev.observers.unwrap_or(0)
                );
            }

            // === Cell ===
            EventKind::CellClosed => {
                println!("[sub] closed:   cell={cell} revision={}", ev.revision.unwrap_or(0));
            }
            EventKind::PublishRejected => {
                println!("[sub] rejected: cell={cell}");
            }

            // === Shutdown ===
            EventKind::AllDetachedWithin => {
                println!("[sub] all cursors detached within grace");
            }
            EventKind::GraceExceeded => {
                println!("[sub] grace exceeded: {}", ev.reason.as_deref().unwrap_or("<none>"));
            }

            // === Ignored ===
            EventKind::ObserverCancelled
            | EventKind::ObserverTerminated
            | EventKind::SubscriberPanicked
            | EventKind::SubscriberOverflow => {}
        }
    }

    fn name(&self) -> &'static str {
        "console"
    }

    fn queue_capacity(&self) -> usize {
        1024
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cell = StateCell::builder(String::from("idle"))
        .with_name("status")
        .with_subscribers(vec![Arc::new(ConsoleSubscriber) as Arc<dyn Subscribe>])
        .build();

    // A cursor that follows the cell and detaches on close.
    let mut follower = cell.subscribe();
    let follower_task = tokio::spawn(async move {
        while let Ok(status) = follower.next().await {
            println!("[follower] status={status}");
        }
    });

    // A cursor that is held on purpose and keeps the shutdown from draining.
    let held = cell.subscribe();

    for status in ["starting", "running", "stopping"] {
        cell.publish(status.to_string())?;
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    match cell.shutdown_within(Duration::from_millis(200)).await {
        Ok(()) => println!("[main] drained"),
        Err(RuntimeError::GraceExceeded { stuck, .. }) => println!("[main] still attached: {stuck:?}"),
        Err(e) => return Err(e.into()),
    }
    assert!(cell.publish("late".to_string()).is_err());

    drop(held);
    follower_task.await?;

    // Give the subscriber worker a moment to print the tail of the event stream.
    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok(())
}
