//! The rendering/query capability the interaction helpers run against.
//!
//! A [`Renderer`] owns the live visual tree. The helpers never create or
//! destroy nodes; they query geometry and structure and dispatch synthetic
//! events. Implementations: [`crate::trace_browser::page::WebDriverPage`]
//! for a live browser and [`crate::trace_browser::memory::MemoryPage`] for
//! deterministic tests.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shoptrace_common::Result;
use std::fmt;

use super::geometry::{Point, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseEventKind {
    Over,
    Down,
    Up,
    Click,
}

impl MouseEventKind {
    /// DOM event type name.
    pub fn dom_type(&self) -> &'static str {
        match self {
            MouseEventKind::Over => "mouseover",
            MouseEventKind::Down => "mousedown",
            MouseEventKind::Up => "mouseup",
            MouseEventKind::Click => "click",
        }
    }
}

/// A synthetic mouse event in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MouseEvent {
    pub kind: MouseEventKind,
    pub client: Point,
    pub bubbles: bool,
}

impl MouseEvent {
    /// Bubbling event, so ancestor listeners observe it.
    pub fn bubbling(kind: MouseEventKind, client: Point) -> Self {
        Self {
            kind,
            client,
            bubbles: true,
        }
    }
}

/// One `<option>` of a native select.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub text: String,
    pub value: String,
}

/// The small selector vocabulary the helpers need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Every element with the tag name.
    Tag(String),
    /// Elements with the tag carrying `attr`, optionally with an exact value.
    TagWithAttr {
        tag: String,
        attr: String,
        value: Option<String>,
    },
}

impl Selector {
    pub fn tag(tag: &str) -> Self {
        Selector::Tag(tag.to_ascii_lowercase())
    }

    pub fn with_attr(tag: &str, attr: &str) -> Self {
        Selector::TagWithAttr {
            tag: tag.to_ascii_lowercase(),
            attr: attr.to_string(),
            value: None,
        }
    }

    pub fn attr_eq(tag: &str, attr: &str, value: &str) -> Self {
        Selector::TagWithAttr {
            tag: tag.to_ascii_lowercase(),
            attr: attr.to_string(),
            value: Some(value.to_string()),
        }
    }

    /// `input[type="…"]`
    pub fn input_type(kind: &str) -> Self {
        Self::attr_eq("input", "type", kind)
    }

    /// CSS form, for backends that speak CSS selectors.
    pub fn to_css(&self) -> String {
        match self {
            Selector::Tag(tag) => tag.clone(),
            Selector::TagWithAttr {
                tag,
                attr,
                value: None,
            } => format!("{tag}[{attr}]"),
            Selector::TagWithAttr {
                tag,
                attr,
                value: Some(v),
            } => format!("{tag}[{attr}=\"{}\"]", v.replace('\\', "\\\\").replace('"', "\\\"")),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css())
    }
}

#[async_trait]
pub trait Renderer: Send + Sync + 'static {
    /// Opaque node handle owned by the renderer.
    type Element: Clone + PartialEq + fmt::Debug + Send + Sync + 'static;

    /// Topmost element rendered at `point`, if any.
    async fn element_from_point(&self, point: Point) -> Result<Option<Self::Element>>;

    async fn bounding_rect(&self, element: &Self::Element) -> Result<Rect>;

    /// Parent node; `None` at the document root.
    async fn parent(&self, element: &Self::Element) -> Result<Option<Self::Element>>;

    /// Child nodes in document order.
    async fn child_nodes(&self, element: &Self::Element) -> Result<Vec<Self::Element>>;

    /// The document element (`<html>`).
    async fn document_root(&self) -> Result<Self::Element>;

    /// Upper-case tag name, as the DOM reports it; empty for non-elements.
    async fn tag_name(&self, element: &Self::Element) -> Result<String>;

    async fn text_content(&self, element: &Self::Element) -> Result<String>;

    async fn attribute(&self, element: &Self::Element, name: &str) -> Result<Option<String>>;

    /// Descendants of `root` matching `selector`, in document order.
    async fn query_all(
        &self,
        root: &Self::Element,
        selector: &Selector,
    ) -> Result<Vec<Self::Element>>;

    /// Options of a native select, in document order.
    async fn select_options(&self, select: &Self::Element) -> Result<Vec<SelectOption>>;

    /// Assign a form control's `value` property.
    async fn set_value(&self, element: &Self::Element, value: &str) -> Result<()>;

    /// Fire a `change` event on the element.
    async fn dispatch_change(&self, element: &Self::Element) -> Result<()>;

    async fn dispatch_mouse(&self, element: &Self::Element, event: MouseEvent) -> Result<()>;

    /// Whether an `onclick` handler property is assigned.
    async fn has_click_handler(&self, element: &Self::Element) -> Result<bool>;

    /// Computed style property; `None` for nodes that are not elements.
    async fn computed_style(&self, element: &Self::Element, property: &str)
        -> Result<Option<String>>;

    async fn current_url(&self) -> Result<String>;

    /// `root` and its descendants that carry an `onclick` handler or a
    /// computed `cursor: pointer`, in pre-order.
    ///
    /// The default walks the tree one query at a time; remote backends
    /// should answer it in a single request.
    async fn clickable_descendants(&self, root: &Self::Element) -> Result<Vec<Self::Element>> {
        let mut found = Vec::new();
        let mut stack = vec![root.clone()];
        while let Some(node) = stack.pop() {
            let clickable = self.has_click_handler(&node).await?
                || self.computed_style(&node, "cursor").await?.as_deref() == Some("pointer");
            if clickable {
                found.push(node.clone());
            }
            let children = self.child_nodes(&node).await?;
            stack.extend(children.into_iter().rev());
        }
        Ok(found)
    }

    /// Whether `node` is `ancestor` or one of its descendants.
    async fn contains(&self, ancestor: &Self::Element, node: &Self::Element) -> Result<bool> {
        let mut cur = Some(node.clone());
        while let Some(n) = cur {
            if &n == ancestor {
                return Ok(true);
            }
            cur = self.parent(&n).await?;
        }
        Ok(false)
    }
}
