//! Reading and setting combo-box values, for native `<select>` elements and
//! for custom dropdowns rendered as lists.
//!
//! Custom dropdowns are opened with a synthetic click, their popup is found
//! geometrically below the control, and its `li` items are handed to a
//! handler that decides what happens next through a [`DropdownOutcome`].
use shoptrace_common::{Result, TraceError};
use tracing::{debug, info, warn};

use super::geometry::Rect;
use super::helpers::InteractionHelpers;
use super::renderer::{Renderer, Selector};

/// A list item discovered in an open dropdown.
#[derive(Debug, Clone, PartialEq)]
pub struct DropdownItem<E> {
    pub element: E,
    pub text: String,
}

/// What a dropdown handler wants done once it has seen the items.
#[derive(Debug, Clone, PartialEq)]
pub struct DropdownOutcome<T> {
    /// Value handed back to the caller of `expand_combo_dropdown`.
    pub collected: T,
    /// Click the control again to close the popup.
    pub close_requested: bool,
    /// Index of an item to click before closing.
    pub activate: Option<usize>,
}

impl<T> DropdownOutcome<T> {
    pub fn close(collected: T) -> Self {
        Self {
            collected,
            close_requested: true,
            activate: None,
        }
    }

    pub fn keep_open(collected: T) -> Self {
        Self {
            collected,
            close_requested: false,
            activate: None,
        }
    }

    pub fn activating(mut self, index: usize) -> Self {
        self.activate = Some(index);
        self
    }
}

impl<R: Renderer> InteractionHelpers<R> {
    /// Open the custom dropdown at `rect`, let `handler` inspect its items,
    /// then act on the returned outcome.
    ///
    /// The settle delay is always waited after the handler's actions, even
    /// when the dropdown is left open.
    pub async fn expand_combo_dropdown<T, F>(&self, rect: Rect, handler: F) -> Result<T>
    where
        F: FnOnce(&[DropdownItem<R::Element>]) -> DropdownOutcome<T> + Send,
        T: Send,
    {
        let combo = self.element_at(rect.probe_point()).await?;
        info!(target: "browser.combo", ?rect, ?combo, "expanding dropdown");

        self.engine.click_and_wait(&self.renderer, &combo).await?;
        self.engine.settle().await;

        let container = self.popup_container(&rect).await?;
        let items = self.list_items(&container).await?;
        debug!(target: "browser.combo", ?container, items = items.len(), "popup located");

        let outcome = handler(&items);

        if let Some(index) = outcome.activate {
            match items.get(index) {
                Some(item) => {
                    debug!(target: "browser.combo", text = %item.text, "activating item");
                    self.engine
                        .click_and_wait(&self.renderer, &item.element)
                        .await?;
                }
                None => warn!(
                    target: "browser.combo",
                    index,
                    available = items.len(),
                    "handler asked to activate a missing item"
                ),
            }
        }

        if outcome.close_requested {
            debug!(target: "browser.combo", "closing dropdown");
            self.engine.click_and_wait(&self.renderer, &combo).await?;
        }
        self.engine.settle().await;

        Ok(outcome.collected)
    }

    /// Labels of every option of the control at `rect`, in document order.
    pub async fn extract_combo_values(&self, rect: Rect) -> Result<Vec<String>> {
        let combo = self.element_at(rect.probe_point()).await?;

        if self.is_native_select(&combo).await? {
            let options = self.renderer.select_options(&combo).await?;
            return Ok(options.into_iter().map(|o| o.text).collect());
        }

        self.expand_combo_dropdown(rect, |items| {
            DropdownOutcome::close(items.iter().map(|i| i.text.clone()).collect())
        })
        .await
    }

    /// Select the option labelled exactly `text`; `false` when absent.
    pub async fn select_combobox_value(&self, rect: Rect, text: &str) -> Result<bool> {
        let combo = self.element_at(rect.probe_point()).await?;

        if self.is_native_select(&combo).await? {
            let options = self.renderer.select_options(&combo).await?;
            let Some(option) = options.into_iter().find(|o| o.text == text) else {
                debug!(target: "browser.combo", %text, "no matching native option");
                return Ok(false);
            };
            self.renderer.set_value(&combo, &option.value).await?;
            self.renderer.dispatch_change(&combo).await?;
            info!(target: "browser.combo", %text, value = %option.value, "native option selected");
            return Ok(true);
        }

        // Clicking an item usually closes the popup by itself.
        let selected = self
            .expand_combo_dropdown(rect, |items| {
                match items.iter().position(|i| i.text == text) {
                    Some(index) => DropdownOutcome::keep_open(true).activating(index),
                    None => DropdownOutcome::close(false),
                }
            })
            .await?;
        info!(target: "browser.combo", %text, selected, "custom dropdown selection");
        Ok(selected)
    }

    async fn is_native_select(&self, element: &R::Element) -> Result<bool> {
        Ok(self
            .renderer
            .tag_name(element)
            .await?
            .eq_ignore_ascii_case("select"))
    }

    /// Climb from the element just below the control while each parent
    /// still starts at or after the control's top-left corner.
    async fn popup_container(&self, control: &Rect) -> Result<R::Element> {
        let max_depth = self.engine.timing().max_ancestor_depth;
        let mut elem = self.element_at(control.below_point()).await?;
        let mut climbed = 0;

        loop {
            let Some(parent) = self.renderer.parent(&elem).await? else {
                return Err(TraceError::PopupContainerNotFound { depth: climbed });
            };
            let parent_rect = self.renderer.bounding_rect(&parent).await?;
            if !parent_rect.starts_within(control) {
                return Ok(elem);
            }
            if climbed == max_depth {
                return Err(TraceError::PopupContainerNotFound { depth: climbed });
            }
            debug!(target: "browser.combo", climbed, ?parent_rect, "climbing popup ancestors");
            elem = parent;
            climbed += 1;
        }
    }

    async fn list_items(&self, container: &R::Element) -> Result<Vec<DropdownItem<R::Element>>> {
        let elements = self
            .renderer
            .query_all(container, &Selector::tag("li"))
            .await?;
        let mut items = Vec::with_capacity(elements.len());
        for element in elements {
            let text = self.renderer.text_content(&element).await?;
            items.push(DropdownItem { element, text });
        }
        Ok(items)
    }
}
