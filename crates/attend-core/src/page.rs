//! A mounted capture page: one controller plus the timers that live and die
//! with it.
//!
//! Mounting starts a clock-display ticker and, for enrollment, a session
//! expiry timer. When expiry fires the user is signed out and the page is
//! torn down on the spot, whatever the controller is doing. Unmounting (or
//! dropping) the page cancels both timers.

use crate::auth::AuthProvider;
use crate::controller::{Action, Adapters, CaptureController, ControllerConfig, Trigger};
use crate::notify::{Notification, NotificationSink};
use crate::types::ActionRecord;
use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Enrollment sessions end two minutes after mount.
pub const ENROLL_SESSION_EXPIRY: Duration = Duration::from_secs(120);

const CLOCK_FORMAT: &str = "%H:%M:%S";

#[derive(Debug, Clone)]
pub struct PageConfig {
    /// `None` disables expiry (check-in/check-out kiosk).
    pub session_expiry: Option<Duration>,
    pub clock_tick: Duration,
}

impl PageConfig {
    pub fn enroll() -> Self {
        Self {
            session_expiry: Some(ENROLL_SESSION_EXPIRY),
            clock_tick: Duration::from_secs(60),
        }
    }

    pub fn attendance() -> Self {
        Self {
            session_expiry: None,
            clock_tick: Duration::from_secs(60),
        }
    }
}

/// Why the page stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageExit {
    /// Still mounted.
    Active,
    /// Session expired; the user was signed out and must go back to login.
    Expired,
    /// Closed by its owner.
    Unmounted,
}

#[derive(Debug, Clone)]
pub struct InteractiveSession {
    pub id: Uuid,
    pub started_at: DateTime<Local>,
    pub expires_after: Option<Duration>,
}

pub struct CapturePage {
    session: InteractiveSession,
    controller: Arc<CaptureController>,
    mount: CancellationToken,
    exit: watch::Receiver<PageExit>,
    exit_tx: Arc<watch::Sender<PageExit>>,
    clock: watch::Receiver<String>,
    tasks: Vec<JoinHandle<()>>,
}

impl CapturePage {
    /// Mount a page. Must be called inside a tokio runtime.
    pub fn mount(
        adapters: Adapters,
        controller_config: ControllerConfig,
        page_config: PageConfig,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        let mount = CancellationToken::new();
        let sink = adapters.sink.clone();
        let controller = Arc::new(CaptureController::new(
            adapters,
            controller_config,
            mount.clone(),
        ));
        let session = InteractiveSession {
            id: Uuid::new_v4(),
            started_at: Local::now(),
            expires_after: page_config.session_expiry,
        };

        let (exit_tx, exit) = watch::channel(PageExit::Active);
        let exit_tx = Arc::new(exit_tx);
        let (clock_tx, clock) = watch::channel(now_display());

        let mut tasks = vec![tokio::spawn(run_clock(
            clock_tx,
            page_config.clock_tick,
            mount.clone(),
        ))];

        if let Some(expiry) = page_config.session_expiry {
            tasks.push(tokio::spawn(run_expiry(
                session.id,
                expiry,
                auth,
                sink,
                exit_tx.clone(),
                mount.clone(),
            )));
        }

        tracing::info!(
            session = %session.id,
            expires_after = ?session.expires_after,
            "capture page mounted"
        );

        Self {
            session,
            controller,
            mount,
            exit,
            exit_tx,
            clock,
            tasks,
        }
    }

    pub fn session(&self) -> &InteractiveSession {
        &self.session
    }

    pub fn controller(&self) -> &Arc<CaptureController> {
        &self.controller
    }

    pub fn last_action(&self) -> Option<ActionRecord> {
        self.controller.last_action()
    }

    /// Current clock text, refreshed every `clock_tick`.
    pub fn clock(&self) -> String {
        self.clock.borrow().clone()
    }

    pub fn exit_state(&self) -> PageExit {
        *self.exit.borrow()
    }

    /// Run an action in the background so the page stays responsive (and
    /// expiry can cut over) while it is in flight.
    pub fn dispatch(&self, action: Action) -> JoinHandle<Trigger> {
        let controller = self.controller.clone();
        tokio::spawn(async move { controller.trigger(action).await })
    }

    /// Resolve once the session has expired. Never resolves for pages
    /// without expiry unless they are unmounted.
    pub async fn expired(&self) -> PageExit {
        let mut exit = self.exit.clone();
        exit.wait_for(|e| *e != PageExit::Active)
            .await
            .map(|state| *state)
            .unwrap_or(PageExit::Unmounted)
    }

    /// Tear the page down and wait for its timers to stop.
    pub async fn unmount(mut self) {
        self.mount.cancel();
        self.exit_tx.send_if_modified(|e| {
            if *e == PageExit::Active {
                *e = PageExit::Unmounted;
                true
            } else {
                false
            }
        });
        for task in std::mem::take(&mut self.tasks) {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "page task failed");
            }
        }
        tracing::info!(session = %self.session.id, "capture page unmounted");
    }
}

impl Drop for CapturePage {
    fn drop(&mut self) {
        self.mount.cancel();
    }
}

fn now_display() -> String {
    Local::now().format(CLOCK_FORMAT).to_string()
}

async fn run_clock(tx: watch::Sender<String>, tick: Duration, mount: CancellationToken) {
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tx.send_replace(now_display());
            }
            _ = mount.cancelled() => break,
        }
    }
}

async fn run_expiry(
    session: Uuid,
    expiry: Duration,
    auth: Arc<dyn AuthProvider>,
    sink: Arc<dyn NotificationSink>,
    exit: Arc<watch::Sender<PageExit>>,
    mount: CancellationToken,
) {
    tokio::select! {
        _ = mount.cancelled() => {
            tracing::debug!(%session, "expiry timer cancelled");
        }
        _ = tokio::time::sleep(expiry) => {
            tracing::info!(%session, ?expiry, "session expired, signing out");
            // Hard cutover: anything still in flight resolves into a dead page.
            mount.cancel();
            if let Err(err) = auth.sign_out().await {
                tracing::warn!(%session, error = %err, "sign-out on expiry failed");
            }
            sink.notify(Notification::info("Session expired. Logged out."));
            exit.send_replace(PageExit::Expired);
        }
    }
}
