use shoptrace_common::{Result, TraceError};
use std::sync::Arc;

use super::behavioral::{self, BehavioralEngine, ClickHandle, InteractionTiming};
use super::geometry::Point;
use super::renderer::Renderer;

/// The interaction helper surface, bound to one renderer.
///
/// Operations are split across modules: clicks and delays here, combo
/// boxes in [`super::combo`], the clickable-element walk in
/// [`super::gather`] and control discovery in [`super::controls`].
pub struct InteractionHelpers<R: Renderer> {
    pub(crate) renderer: Arc<R>,
    pub(crate) engine: BehavioralEngine,
}

impl<R: Renderer> Clone for InteractionHelpers<R> {
    fn clone(&self) -> Self {
        Self {
            renderer: Arc::clone(&self.renderer),
            engine: self.engine.clone(),
        }
    }
}

impl<R: Renderer> InteractionHelpers<R> {
    pub fn new(renderer: Arc<R>, timing: InteractionTiming) -> Self {
        Self::with_engine(renderer, BehavioralEngine::new(timing))
    }

    pub fn with_engine(renderer: Arc<R>, engine: BehavioralEngine) -> Self {
        Self { renderer, engine }
    }

    pub fn renderer(&self) -> &Arc<R> {
        &self.renderer
    }

    pub fn engine(&self) -> &BehavioralEngine {
        &self.engine
    }

    /// Hover → press → release → click on `element`, see
    /// [`BehavioralEngine::simulate_click`].
    pub async fn simulate_click(&self, element: &R::Element) -> Result<ClickHandle> {
        self.engine.simulate_click(&self.renderer, element).await
    }

    pub async fn sleep(&self, ms: u64) {
        behavioral::sleep(ms).await;
    }

    /// Cancel all scheduled synthetic events of this session.
    pub fn cancel_pending(&self) {
        self.engine.cancel_pending();
    }

    pub(crate) async fn element_at(&self, point: Point) -> Result<R::Element> {
        self.renderer
            .element_from_point(point)
            .await?
            .ok_or(TraceError::NoElementAtPoint {
                x: point.x,
                y: point.y,
            })
    }
}
