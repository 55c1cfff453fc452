use std::sync::Arc;

use log::debug;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::registry::ClientRegistry;

/// Handle owning a running eviction sweeper.
///
/// Dropping the handle ends the task on its next poll; [`stop`](Self::stop)
/// ends it deterministically by waiting for the loop to wind down.
pub struct SweeperHandle {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the sweeper to stop and wait until it has.
    ///
    /// Once this returns, no further sweep pass can run.
    pub async fn stop(self) {
        let _ = self.stop.send(());
        let _ = self.task.await;
    }
}

/// Start the background eviction loop for `registry`.
///
/// Every `sweep_interval` the task drops entries idle longer than
/// `idle_timeout`, both taken from the registry's
/// [`GateConfig`](crate::GateConfig). The loop runs until its
/// [`SweeperHandle`] stops it or is dropped.
pub fn spawn_sweeper(registry: Arc<ClientRegistry>) -> SweeperHandle {
    let (stop, mut stopped) = oneshot::channel();
    let sweep_interval = registry.config().sweep_interval;
    let idle_timeout = registry.config().idle_timeout;

    let task = tokio::spawn(async move {
        let mut ticker = interval(sweep_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = registry.sweep(idle_timeout);
                    if removed > 0 {
                        debug!("evicted {} idle client(s)", removed);
                    }
                }
                _ = &mut stopped => {
                    debug!("eviction sweeper stopped");
                    break;
                }
            }
        }
    });

    SweeperHandle { stop, task }
}
