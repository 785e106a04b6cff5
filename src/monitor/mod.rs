//! Background activity tracking
//!
//! Translates recorded user interaction into session keepalive and
//! session timeout, entirely client-side: an active user's token is
//! refreshed before it can lapse, an idle user is signed out after the
//! inactivity timeout. Pure background process; nothing is rendered.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::session::SessionControl;

/// Idle time after which the session is terminated
pub const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Proactive refresh period. Shorter than the timeout so an active
/// user's token is renewed before the idle clock could expire it.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(25 * 60);

/// How often the idle clock is checked
pub const CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Notice shown on the login screen after an inactivity logout
pub const INACTIVITY_NOTICE: &str = "Logged out automatically after 30 minutes of inactivity.";

/// Monitors user activity for one authenticated session.
///
/// Start it once a user is signed in; call [`record_activity`] from the
/// embedding UI on every recognized interaction event (pointer press or
/// move, key press, scroll, touch start, click). Dropping the monitor
/// cancels both timers, so no tick can fire against a torn-down
/// session.
///
/// [`record_activity`]: ActivityMonitor::record_activity
pub struct ActivityMonitor {
    shared: Arc<Shared>,
    task: JoinHandle<()>,
}

struct Shared {
    session: Arc<dyn SessionControl>,
    /// Reference point for the monotonic idle clock.
    epoch: Instant,
    /// Milliseconds since `epoch` of the most recent activity.
    /// Monotonically non-decreasing.
    last_activity_ms: AtomicU64,
}

impl Shared {
    fn record(&self) {
        let offset = self.epoch.elapsed().as_millis() as u64;
        self.last_activity_ms.store(offset, Ordering::SeqCst);
        self.session.touch_activity();
    }

    fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.last_activity_ms.load(Ordering::SeqCst));
        self.epoch.elapsed().saturating_sub(last)
    }
}

impl ActivityMonitor {
    /// Start monitoring. Records one initial activity tick so the
    /// timers measure from now rather than from stale storage.
    pub fn start(session: Arc<dyn SessionControl>) -> Self {
        let shared = Arc::new(Shared {
            session,
            epoch: Instant::now(),
            last_activity_ms: AtomicU64::new(0),
        });
        shared.record();

        let task = tokio::spawn(run(Arc::clone(&shared)));
        Self { shared, task }
    }

    /// Record a user interaction: updates the in-memory idle clock and
    /// writes the persisted activity stamp through. Cheap enough to
    /// call on every event.
    pub fn record_activity(&self) {
        self.shared.record();
    }

    /// Time since the last recorded activity.
    pub fn idle_for(&self) -> Duration {
        self.shared.idle_for()
    }

    /// True once the timer task has exited (inactivity logout or the
    /// session ended elsewhere).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Tear the monitor down, cancelling both timers.
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for ActivityMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn should_refresh(idle: Duration) -> bool {
    idle < INACTIVITY_TIMEOUT
}

fn idle_timed_out(idle: Duration) -> bool {
    idle >= INACTIVITY_TIMEOUT
}

async fn run(shared: Arc<Shared>) {
    let mut session_state = shared.session.subscribe();

    let start = Instant::now();
    let mut refresh_tick = time::interval_at(start + REFRESH_INTERVAL, REFRESH_INTERVAL);
    let mut check_tick = time::interval_at(start + CHECK_INTERVAL, CHECK_INTERVAL);
    refresh_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    check_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = refresh_tick.tick() => {
                let idle = shared.idle_for();
                if should_refresh(idle) {
                    log::debug!("activity detected, refreshing token");
                    if let Err(err) = shared.session.refresh().await {
                        // Transient failures leave the session alone; a
                        // 401 inside refresh() has already torn it down.
                        log::warn!("proactive refresh failed: {err}");
                    }
                } else {
                    log::debug!("user idle for {idle:?}, skipping proactive refresh");
                }
            }
            _ = check_tick.tick() => {
                let idle = shared.idle_for();
                if idle_timed_out(idle) {
                    log::info!("no activity for {idle:?}, signing out");
                    shared.session.force_logout(Some(INACTIVITY_NOTICE)).await;
                    // Both timers die with the loop.
                    break;
                }
            }
            changed = session_state.changed() => {
                // Stand down when the session ends elsewhere (explicit
                // logout, failed refresh) or the coordinator is gone.
                if changed.is_err() || !session_state.borrow_and_update().is_signed_in() {
                    log::debug!("session ended, stopping activity monitor");
                    break;
                }
            }
        }
    }
}
