//! Periodic unread-count polling

use super::NotificationCenter;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Poll the unread count every `period` until `shutdown` fires.
///
/// A failed tick is logged and skipped. Polling stops for good once the
/// session has expired, since every further tick would fail the same way.
pub fn spawn_poller(
    center: NotificationCenter,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    debug!("Notification poller stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match center.poll_unread().await {
                        Ok(_) => {}
                        Err(err) if err.is_session_expired() => {
                            info!(error = %err, "Session expired, stopping notification poller");
                            break;
                        }
                        Err(err) => {
                            warn!(error = %err, "Unread count poll failed, retrying next tick");
                        }
                    }
                }
            }
        }
    })
}
