//! Liveness sweep
//!
//! A background task that periodically asks the registry to retire
//! subscribers whose connections have gone away. Each pass runs to
//! completion before the next tick is awaited, so passes never overlap.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info};

use crate::broker::registry::Registry;

/// Spawn [`run_sweeper`] on the current runtime.
pub fn spawn_sweeper(registry: Arc<Registry>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(run_sweeper(registry, every))
}

/// Purge dead subscribers every `every`, forever. The first pass happens one
/// interval after start.
pub async fn run_sweeper(registry: Arc<Registry>, every: Duration) {
    let every = every.max(Duration::from_millis(1));
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Liveness sweep running every {:?}", every);
    loop {
        ticker.tick().await;
        let removed = registry.purge_dead();
        if removed > 0 {
            info!("{removed} inactive subscribers have been removed");
        } else {
            debug!("Sweep found no inactive subscribers");
        }
    }
}
