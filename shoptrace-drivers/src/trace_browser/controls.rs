//! Discovery of the interactive controls visible on a page.
//!
//! Controls are identified by kind and on-screen rectangle; the same widget
//! reached through two different queries collapses into one [`Control`].
use serde::{Deserialize, Serialize};
use shoptrace_common::Result;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use tracing::{debug, info};
use url::Url;

use super::geometry::Rect;
use super::helpers::InteractionHelpers;
use super::renderer::{Renderer, Selector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    Text,
    Select,
    RadioButton,
    Checkbox,
    Link,
    Button,
}

impl ControlKind {
    pub const ALL: [ControlKind; 6] = [
        ControlKind::Text,
        ControlKind::Select,
        ControlKind::RadioButton,
        ControlKind::Checkbox,
        ControlKind::Link,
        ControlKind::Button,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ControlKind::Text => "text",
            ControlKind::Select => "select",
            ControlKind::RadioButton => "radiobutton",
            ControlKind::Checkbox => "checkbox",
            ControlKind::Link => "link",
            ControlKind::Button => "button",
        }
    }
}

/// An interactive widget found on the page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Control {
    pub kind: ControlKind,
    pub rect: Rect,
    /// Label, caption or visible text.
    pub label: Option<String>,
    /// Selectable values, for selects.
    pub values: Option<Vec<String>>,
    /// Link target, for links.
    pub code: Option<String>,
}

impl Control {
    pub fn new(kind: ControlKind, rect: Rect) -> Self {
        Self {
            kind,
            rect,
            label: None,
            values: None,
            code: None,
        }
    }

    pub fn with_label(mut self, label: Option<String>) -> Self {
        self.label = label;
        self
    }

    fn identity(&self) -> (ControlKind, [u64; 4]) {
        (
            self.kind,
            [
                self.rect.left.to_bits(),
                self.rect.top.to_bits(),
                self.rect.width.to_bits(),
                self.rect.height.to_bits(),
            ],
        )
    }
}

impl PartialEq for Control {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Control {}

impl Hash for Control {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Control: {}, location: ({}, {}), size: {}x{}, label: {:?}, values: {:?}",
            self.kind.as_str(),
            self.rect.left,
            self.rect.top,
            self.rect.width,
            self.rect.height,
            self.label,
            self.values
        )
    }
}

/// Input types that accept free text.
const TEXT_INPUT_TYPES: [&str; 6] = ["text", "search", "num", "tel", "email", "url"];
const BUTTON_INPUT_TYPES: [&str; 3] = ["button", "submit", "image"];

/// Drop the fragment so `page#a` and `page#b` compare equal.
pub fn normalize_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.split('#').next().unwrap_or_default().to_string(),
    }
}

impl<R: Renderer> InteractionHelpers<R> {
    /// Large enough to hit, and actually on top at its center.
    pub async fn is_visible(&self, element: &R::Element) -> Result<bool> {
        let rect = self.renderer.bounding_rect(element).await?;
        if rect.width <= 1.0 || rect.height <= 1.0 {
            return Ok(false);
        }

        match self.renderer.element_from_point(rect.probe_point()).await? {
            Some(hit) => self.renderer.contains(element, &hit).await,
            None => Ok(false),
        }
    }

    /// `label[for=id]`, then an enclosing `<label>`, then the placeholder.
    pub async fn label_of(&self, element: &R::Element) -> Result<Option<String>> {
        if let Some(id) = self.renderer.attribute(element, "id").await? {
            if !id.is_empty() {
                let root = self.renderer.document_root().await?;
                let labels = self
                    .renderer
                    .query_all(&root, &Selector::attr_eq("label", "for", &id))
                    .await?;
                if let Some(label) = labels.first() {
                    return Ok(Some(self.visible_text(label).await?));
                }
            }
        }

        if let Some(parent) = self.renderer.parent(element).await? {
            if self.renderer.tag_name(&parent).await?.eq_ignore_ascii_case("label") {
                return Ok(Some(self.visible_text(&parent).await?));
            }
        }

        self.renderer.attribute(element, "placeholder").await
    }

    /// An `href` that navigates somewhere other than the current page.
    pub async fn is_link(&self, element: &R::Element) -> Result<bool> {
        let Some(href) = self.resolved_href(element).await? else {
            return Ok(false);
        };
        if href.is_empty() || href.starts_with("javascript:") {
            return Ok(false);
        }
        let current = self.renderer.current_url().await?;
        Ok(normalize_url(&href) != normalize_url(&current))
    }

    /// Every visible control on the page, without duplicates.
    ///
    /// Order: selects, text inputs, buttons, links, checkboxes, radio
    /// buttons, then anything else that looks clickable.
    pub async fn extract_controls(&self) -> Result<Vec<Control>> {
        let root = self.renderer.document_root().await?;
        let mut controls = Vec::new();

        for select in self.visible(&root, &Selector::tag("select")).await? {
            let rect = self.renderer.bounding_rect(&select).await?;
            let label = self.label_of(&select).await?;
            let values = self.extract_combo_values(rect).await?;
            controls.push(Control {
                values: Some(values),
                ..Control::new(ControlKind::Select, rect).with_label(label)
            });
        }

        let mut text_selectors = vec![
            Selector::input_type(TEXT_INPUT_TYPES[0]),
            Selector::input_type(TEXT_INPUT_TYPES[1]),
            Selector::tag("textarea"),
        ];
        text_selectors.extend(TEXT_INPUT_TYPES[2..].iter().map(|t| Selector::input_type(t)));
        for selector in &text_selectors {
            for input in self.visible(&root, selector).await? {
                let rect = self.renderer.bounding_rect(&input).await?;
                let label = self.label_of(&input).await?;
                controls.push(Control::new(ControlKind::Text, rect).with_label(label));
            }
        }

        for button in self.button_candidates(&root).await? {
            controls.push(self.button_control(&button).await?);
        }

        for anchor in self.visible(&root, &Selector::with_attr("a", "href")).await? {
            if !self.is_link(&anchor).await? {
                continue;
            }
            let rect = self.renderer.bounding_rect(&anchor).await?;
            let text = self.visible_text(&anchor).await?;
            controls.push(Control {
                code: self.resolved_href(&anchor).await?,
                ..Control::new(ControlKind::Link, rect).with_label(Some(text))
            });
        }

        for (kind, input_type) in [
            (ControlKind::Checkbox, "checkbox"),
            (ControlKind::RadioButton, "radio"),
        ] {
            for input in self.visible(&root, &Selector::input_type(input_type)).await? {
                let rect = self.renderer.bounding_rect(&input).await?;
                let label = self.label_of(&input).await?;
                controls.push(Control::new(kind, rect).with_label(label));
            }
        }

        for clickable in self.gather_click_elements(Some(root), None).await? {
            if self.is_visible(&clickable).await? {
                controls.push(self.button_control(&clickable).await?);
            }
        }

        let found = controls.len();
        let mut seen = HashSet::new();
        controls.retain(|c| seen.insert(c.clone()));
        info!(
            target: "browser.controls",
            found,
            unique = controls.len(),
            "controls extracted"
        );
        Ok(controls)
    }

    async fn visible(&self, root: &R::Element, selector: &Selector) -> Result<Vec<R::Element>> {
        let mut out = Vec::new();
        for element in self.renderer.query_all(root, selector).await? {
            if self.is_visible(&element).await? {
                out.push(element);
            } else {
                debug!(target: "browser.controls", %selector, ?element, "skipping hidden element");
            }
        }
        Ok(out)
    }

    /// Anchors that do not navigate, `<button>`s and button-like inputs.
    async fn button_candidates(&self, root: &R::Element) -> Result<Vec<R::Element>> {
        let mut out = Vec::new();
        for anchor in self.visible(root, &Selector::tag("a")).await? {
            if !self.is_link(&anchor).await? {
                out.push(anchor);
            }
        }
        out.extend(self.visible(root, &Selector::tag("button")).await?);
        for input_type in BUTTON_INPUT_TYPES {
            out.extend(self.visible(root, &Selector::input_type(input_type)).await?);
        }
        Ok(out)
    }

    async fn button_control(&self, element: &R::Element) -> Result<Control> {
        let rect = self.renderer.bounding_rect(element).await?;
        let text = self.visible_text(element).await?;
        let label = if text.is_empty() {
            self.renderer.attribute(element, "value").await?
        } else {
            Some(text)
        };
        Ok(Control::new(ControlKind::Button, rect).with_label(label))
    }

    async fn visible_text(&self, element: &R::Element) -> Result<String> {
        Ok(self.renderer.text_content(element).await?.trim().to_string())
    }

    /// The `href` attribute resolved against the current page URL.
    async fn resolved_href(&self, element: &R::Element) -> Result<Option<String>> {
        let Some(href) = self.renderer.attribute(element, "href").await? else {
            return Ok(None);
        };
        if href.starts_with("javascript:") {
            return Ok(Some(href));
        }
        let current = self.renderer.current_url().await?;
        Ok(Some(match Url::parse(&current).and_then(|base| base.join(&href)) {
            Ok(resolved) => resolved.to_string(),
            Err(_) => href,
        }))
    }
}
