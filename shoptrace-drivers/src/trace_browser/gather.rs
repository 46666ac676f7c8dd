use shoptrace_common::Result;
use tracing::debug;

use super::helpers::InteractionHelpers;
use super::renderer::Renderer;

impl<R: Renderer> InteractionHelpers<R> {
    /// Collect every node under `root` (default: the document element) that
    /// has an `onclick` handler or a computed `cursor: pointer`.
    ///
    /// Nodes are visited depth-first in pre-order and appended to `gathered`
    /// (or a fresh vector), which is returned.
    pub async fn gather_click_elements(
        &self,
        root: Option<R::Element>,
        gathered: Option<Vec<R::Element>>,
    ) -> Result<Vec<R::Element>> {
        let root = match root {
            Some(root) => root,
            None => self.renderer.document_root().await?,
        };
        let mut gathered = gathered.unwrap_or_default();
        let found = self.renderer.clickable_descendants(&root).await?;

        debug!(target: "browser.gather", found = found.len(), "clickable elements gathered");
        gathered.extend(found);
        Ok(gathered)
    }
}
