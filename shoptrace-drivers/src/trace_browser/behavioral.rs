use rand::rngs::OsRng;
use rand::Rng;
use shoptrace_common::{Result, TraceError};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::geometry::{Point, Rect};
use super::renderer::{MouseEvent, MouseEventKind, Renderer};

/// Sleep for `ms` milliseconds.
pub async fn sleep(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// Timing model for synthetic pointer interaction.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionTiming {
    /// Pause after a dropdown is opened or closed.
    pub settle_delay: Duration,
    /// Milliseconds of travel per pixel of `width + height`.
    pub travel_factor: f64,
    /// Release delay as a multiple of the press delay.
    pub dwell_ratio: f64,
    /// Ancestors the popup-container walk may climb.
    pub max_ancestor_depth: usize,
}

impl Default for InteractionTiming {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(500),
            travel_factor: 2.0,
            dwell_ratio: 1.2,
            max_ancestor_depth: 32,
        }
    }
}

impl InteractionTiming {
    /// Delay between hover and press, proportional to the element's size.
    pub fn press_delay(&self, rect: &Rect) -> Duration {
        millis((rect.width + rect.height) * self.travel_factor)
    }

    /// Delay between hover and release/click.
    pub fn release_delay(&self, rect: &Rect) -> Duration {
        millis((rect.width + rect.height) * self.travel_factor * self.dwell_ratio)
    }
}

fn millis(ms: f64) -> Duration {
    if ms.is_finite() && ms > 0.0 {
        Duration::from_nanos((ms * 1_000_000.0).round() as u64)
    } else {
        Duration::ZERO
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// All four events were dispatched.
    Completed,
    /// Cancelled before the press or release fired.
    Cancelled,
}

/// Handle to a scheduled click sequence.
///
/// Dropping the handle does not stop the sequence; call [`ClickHandle::cancel`].
#[derive(Debug)]
pub struct ClickHandle {
    cancel: CancellationToken,
    task: JoinHandle<Result<ClickOutcome>>,
}

impl ClickHandle {
    /// Prevent any not-yet-dispatched events of this click from firing.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the sequence to finish or be cancelled.
    pub async fn wait(self) -> Result<ClickOutcome> {
        self.task
            .await
            .map_err(|e| TraceError::driver(format!("click task failed: {e}")))?
    }
}

#[derive(Debug, Clone)]
/// Produces human-like pointer timings for synthetic interaction.
pub struct BehavioralEngine {
    timing: InteractionTiming,
    session: CancellationToken,
}

impl Default for BehavioralEngine {
    fn default() -> Self {
        Self::new(InteractionTiming::default())
    }
}

impl BehavioralEngine {
    pub fn new(timing: InteractionTiming) -> Self {
        Self {
            timing,
            session: CancellationToken::new(),
        }
    }

    /// Tie this engine's session to an outer token (e.g. the runtime's).
    pub fn with_parent(timing: InteractionTiming, parent: &CancellationToken) -> Self {
        Self {
            timing,
            session: parent.child_token(),
        }
    }

    pub fn timing(&self) -> &InteractionTiming {
        &self.timing
    }

    /// Cancel every click scheduled by this engine (and its clones).
    ///
    /// This ends the session: clicks requested afterwards fail with
    /// [`TraceError::Cancelled`].
    pub fn cancel_pending(&self) {
        self.session.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.session.is_cancelled()
    }

    /// Sleep for a random duration between `min` and `max` milliseconds.
    pub async fn random_delay(&self, min: u64, max: u64) {
        let ms = OsRng.gen_range(min..=max.max(min));
        sleep(ms).await;
    }

    /// Wait for the page to react to an interaction.
    pub async fn settle(&self) {
        tokio::time::sleep(self.timing.settle_delay).await;
    }

    /// Hover over `element` now, then press and release on its center after
    /// size-proportional delays.
    ///
    /// Press and release run on a spawned task; the returned handle can
    /// cancel or await them.
    pub async fn simulate_click<R: Renderer>(
        &self,
        renderer: &Arc<R>,
        element: &R::Element,
    ) -> Result<ClickHandle> {
        let token = self.session.child_token();
        if token.is_cancelled() {
            return Err(TraceError::Cancelled);
        }

        let rect = renderer.bounding_rect(element).await?;
        let entry = rect.origin();
        let center = rect.center();
        let press_after = self.timing.press_delay(&rect);
        let release_after = self.timing.release_delay(&rect);

        renderer
            .dispatch_mouse(element, MouseEvent::bubbling(MouseEventKind::Over, entry))
            .await?;
        let hovered_at = Instant::now();
        debug!(
            target: "browser.click",
            ?element,
            ?press_after,
            ?release_after,
            "hover dispatched"
        );

        let task = tokio::spawn(press_and_release(
            Arc::clone(renderer),
            element.clone(),
            ScheduledPress {
                center,
                press_at: hovered_at + press_after,
                release_at: hovered_at + release_after,
            },
            token.clone(),
        ));

        Ok(ClickHandle {
            cancel: token,
            task,
        })
    }

    /// Click and wait for the full sequence; cancellation is an error here.
    pub async fn click_and_wait<R: Renderer>(
        &self,
        renderer: &Arc<R>,
        element: &R::Element,
    ) -> Result<()> {
        match self.simulate_click(renderer, element).await?.wait().await? {
            ClickOutcome::Completed => Ok(()),
            ClickOutcome::Cancelled => Err(TraceError::Cancelled),
        }
    }
}

struct ScheduledPress {
    center: Point,
    press_at: Instant,
    release_at: Instant,
}

async fn press_and_release<R: Renderer>(
    renderer: Arc<R>,
    element: R::Element,
    plan: ScheduledPress,
    cancel: CancellationToken,
) -> Result<ClickOutcome> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(ClickOutcome::Cancelled),
        _ = sleep_until(plan.press_at) => {}
    }
    renderer
        .dispatch_mouse(&element, MouseEvent::bubbling(MouseEventKind::Down, plan.center))
        .await?;

    tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(ClickOutcome::Cancelled),
        _ = sleep_until(plan.release_at) => {}
    }
    renderer
        .dispatch_mouse(&element, MouseEvent::bubbling(MouseEventKind::Up, plan.center))
        .await?;
    renderer
        .dispatch_mouse(&element, MouseEvent::bubbling(MouseEventKind::Click, plan.center))
        .await?;
    debug!(target: "browser.click", ?element, "click dispatched");
    Ok(ClickOutcome::Completed)
}
