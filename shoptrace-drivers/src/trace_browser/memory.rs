//! Deterministic in-memory page implementing [`Renderer`].
//!
//! Nodes carry explicit rectangles instead of being laid out; hit testing
//! picks the last visible element in document order whose rectangle
//! contains the point. Clicks can toggle, show or hide other nodes, which is
//! enough to model custom dropdowns. Every dispatched event is recorded with
//! a `tokio` timestamp so timing can be asserted under a paused clock.
use async_trait::async_trait;
use shoptrace_common::{Result, TraceError};
use std::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

use super::geometry::{Point, Rect};
use super::renderer::{MouseEvent, MouseEventKind, Renderer, SelectOption, Selector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Side effect run when a click reaches a node (directly or by bubbling).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickBehavior {
    Toggle(NodeId),
    Show(NodeId),
    Hide(NodeId),
}

/// Description of a node to append.
#[derive(Debug, Clone, Default)]
pub struct NodeSpec {
    tag: Option<String>,
    text: String,
    rect: Rect,
    attrs: Vec<(String, String)>,
    cursor: Option<String>,
    onclick: bool,
    hidden: bool,
}

impl NodeSpec {
    pub fn element(tag: &str) -> Self {
        Self {
            tag: Some(tag.to_ascii_lowercase()),
            ..Self::default()
        }
    }

    pub fn text_node(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Self::default()
        }
    }

    pub fn rect(mut self, left: f64, top: f64, width: f64, height: f64) -> Self {
        self.rect = Rect::new(left, top, width, height);
        self
    }

    /// For elements, appends a text child with this content.
    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.push((name.to_string(), value.to_string()));
        self
    }

    pub fn cursor(mut self, cursor: &str) -> Self {
        self.cursor = Some(cursor.to_string());
        self
    }

    pub fn onclick(mut self) -> Self {
        self.onclick = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedEvent {
    Mouse {
        target: NodeId,
        event: MouseEvent,
        at: Instant,
    },
    Change {
        target: NodeId,
        at: Instant,
    },
}

#[derive(Debug)]
struct Node {
    tag: Option<String>,
    text: String,
    rect: Rect,
    attrs: Vec<(String, String)>,
    cursor: Option<String>,
    onclick: bool,
    hidden: bool,
    value: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    behaviors: Vec<ClickBehavior>,
}

#[derive(Debug)]
struct PageState {
    nodes: Vec<Node>,
    events: Vec<RecordedEvent>,
    url: String,
}

impl PageState {
    fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| TraceError::driver(format!("stale node {id:?}")))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.0)
            .ok_or_else(|| TraceError::driver(format!("stale node {id:?}")))
    }

    fn is_shown(&self, id: NodeId) -> bool {
        let mut cur = Some(id);
        while let Some(n) = cur.and_then(|id| self.nodes.get(id.0)) {
            if n.hidden {
                return false;
            }
            cur = n.parent;
        }
        true
    }

    /// Pre-order descendants of `root`, excluding `root`.
    fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self
            .nodes
            .get(root.0)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(n) = self.nodes.get(id.0) {
                stack.extend(n.children.iter().rev().copied());
            }
        }
        out
    }

    fn text_of(&self, id: NodeId) -> String {
        let Some(node) = self.nodes.get(id.0) else {
            return String::new();
        };
        if node.tag.is_none() {
            return node.text.clone();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|d| self.nodes.get(d.0))
            .filter(|n| n.tag.is_none())
            .map(|n| n.text.as_str())
            .collect()
    }

    fn attr(&self, id: NodeId, name: &str) -> Option<String> {
        self.nodes.get(id.0).and_then(|n| {
            n.attrs
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.clone())
        })
    }

    fn matches(&self, id: NodeId, selector: &Selector) -> bool {
        let Some(tag) = self.nodes.get(id.0).and_then(|n| n.tag.as_deref()) else {
            return false;
        };
        match selector {
            Selector::Tag(want) => tag == want,
            Selector::TagWithAttr { tag: want, attr, value } => {
                tag == want
                    && match (self.attr(id, attr), value) {
                        (Some(_), None) => true,
                        (Some(have), Some(expected)) => &have == expected,
                        (None, _) => false,
                    }
            }
        }
    }

    fn options(&self, select: NodeId) -> Vec<SelectOption> {
        self.descendants(select)
            .into_iter()
            .filter(|&id| self.matches(id, &Selector::Tag("option".into())))
            .map(|id| {
                let text = self.text_of(id);
                let value = self.attr(id, "value").unwrap_or_else(|| text.clone());
                SelectOption { text, value }
            })
            .collect()
    }
}

/// In-memory page; see the module docs.
#[derive(Debug)]
pub struct MemoryPage {
    state: Mutex<PageState>,
}

impl Default for MemoryPage {
    fn default() -> Self {
        Self::new(Rect::new(0.0, 0.0, 1280.0, 800.0))
    }
}

impl MemoryPage {
    /// A page whose `<html>` element covers `viewport`.
    pub fn new(viewport: Rect) -> Self {
        let root = Node {
            tag: Some("html".into()),
            text: String::new(),
            rect: viewport,
            attrs: Vec::new(),
            cursor: None,
            onclick: false,
            hidden: false,
            value: None,
            parent: None,
            children: Vec::new(),
            behaviors: Vec::new(),
        };
        Self {
            state: Mutex::new(PageState {
                nodes: vec![root],
                events: Vec::new(),
                url: "about:blank".into(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Append `spec` as the last child of `parent`.
    pub fn append(&self, parent: NodeId, spec: NodeSpec) -> NodeId {
        let mut state = self.state();
        let id = NodeId(state.nodes.len());
        let is_element = spec.tag.is_some();
        let inner_text = (is_element && !spec.text.is_empty()).then(|| spec.text.clone());
        state.nodes.push(Node {
            tag: spec.tag,
            text: if is_element { String::new() } else { spec.text },
            rect: spec.rect,
            attrs: spec.attrs,
            cursor: spec.cursor,
            onclick: spec.onclick,
            hidden: spec.hidden,
            value: None,
            parent: Some(parent),
            children: Vec::new(),
            behaviors: Vec::new(),
        });
        if let Some(p) = state.nodes.get_mut(parent.0) {
            p.children.push(id);
        }
        if let Some(text) = inner_text {
            let text_id = NodeId(state.nodes.len());
            state.nodes.push(Node {
                tag: None,
                text,
                rect: Rect::default(),
                attrs: Vec::new(),
                cursor: None,
                onclick: false,
                hidden: false,
                value: None,
                parent: Some(id),
                children: Vec::new(),
                behaviors: Vec::new(),
            });
            state.nodes[id.0].children.push(text_id);
        }
        id
    }

    /// Append a native `<select>` with `(value, text)` options.
    pub fn append_select(&self, parent: NodeId, rect: Rect, options: &[(&str, &str)]) -> NodeId {
        let select = self.append(
            parent,
            NodeSpec::element("select").rect(rect.left, rect.top, rect.width, rect.height),
        );
        for (value, text) in options {
            self.append(
                select,
                NodeSpec::element("option").attr("value", value).text(text),
            );
        }
        select
    }

    pub fn on_click(&self, node: NodeId, behavior: ClickBehavior) {
        if let Some(n) = self.state().nodes.get_mut(node.0) {
            n.behaviors.push(behavior);
        }
    }

    pub fn set_hidden(&self, node: NodeId, hidden: bool) {
        if let Some(n) = self.state().nodes.get_mut(node.0) {
            n.hidden = hidden;
        }
    }

    /// Neither the node nor any ancestor is hidden.
    pub fn is_shown(&self, node: NodeId) -> bool {
        self.state().is_shown(node)
    }

    pub fn set_url(&self, url: &str) {
        self.state().url = url.to_string();
    }

    /// Current `value` of a form control; selects default to their first option.
    pub fn value_of(&self, node: NodeId) -> Option<String> {
        let state = self.state();
        let n = state.nodes.get(node.0)?;
        n.value.clone().or_else(|| {
            if n.tag.as_deref() == Some("select") {
                state.options(node).first().map(|o| o.value.clone())
            } else {
                state.attr(node, "value")
            }
        })
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.state().events.clone()
    }

    /// Mouse events whose target was `node`, in dispatch order.
    pub fn mouse_events_on(&self, node: NodeId) -> Vec<(MouseEvent, Instant)> {
        self.state()
            .events
            .iter()
            .filter_map(|e| match e {
                RecordedEvent::Mouse { target, event, at } if *target == node => {
                    Some((*event, *at))
                }
                _ => None,
            })
            .collect()
    }

    pub fn clicks_on(&self, node: NodeId) -> usize {
        self.mouse_events_on(node)
            .iter()
            .filter(|(e, _)| e.kind == MouseEventKind::Click)
            .count()
    }

    pub fn change_events_on(&self, node: NodeId) -> usize {
        self.state()
            .events
            .iter()
            .filter(|e| matches!(e, RecordedEvent::Change { target, .. } if *target == node))
            .count()
    }
}

#[async_trait]
impl Renderer for MemoryPage {
    type Element = NodeId;

    async fn element_from_point(&self, point: Point) -> Result<Option<NodeId>> {
        let state = self.state();
        let mut hit = None;
        let mut stack = vec![NodeId(0)];
        while let Some(id) = stack.pop() {
            let node = state.node(id)?;
            if node.tag.is_none() || node.hidden {
                continue;
            }
            if node.rect.contains(point) {
                hit = Some(id);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        Ok(hit)
    }

    async fn bounding_rect(&self, element: &NodeId) -> Result<Rect> {
        let state = self.state();
        let node = state.node(*element)?;
        if state.is_shown(*element) {
            Ok(node.rect)
        } else {
            Ok(Rect::default())
        }
    }

    async fn parent(&self, element: &NodeId) -> Result<Option<NodeId>> {
        Ok(self.state().node(*element)?.parent)
    }

    async fn child_nodes(&self, element: &NodeId) -> Result<Vec<NodeId>> {
        Ok(self.state().node(*element)?.children.clone())
    }

    async fn document_root(&self) -> Result<NodeId> {
        Ok(self.root())
    }

    async fn tag_name(&self, element: &NodeId) -> Result<String> {
        Ok(self
            .state()
            .node(*element)?
            .tag
            .as_deref()
            .map(str::to_ascii_uppercase)
            .unwrap_or_default())
    }

    async fn text_content(&self, element: &NodeId) -> Result<String> {
        let state = self.state();
        state.node(*element)?;
        Ok(state.text_of(*element))
    }

    async fn attribute(&self, element: &NodeId, name: &str) -> Result<Option<String>> {
        let state = self.state();
        state.node(*element)?;
        Ok(state.attr(*element, name))
    }

    async fn query_all(&self, root: &NodeId, selector: &Selector) -> Result<Vec<NodeId>> {
        let state = self.state();
        state.node(*root)?;
        Ok(state
            .descendants(*root)
            .into_iter()
            .filter(|&id| state.matches(id, selector))
            .collect())
    }

    async fn select_options(&self, select: &NodeId) -> Result<Vec<SelectOption>> {
        let state = self.state();
        state.node(*select)?;
        Ok(state.options(*select))
    }

    async fn set_value(&self, element: &NodeId, value: &str) -> Result<()> {
        self.state().node_mut(*element)?.value = Some(value.to_string());
        Ok(())
    }

    async fn dispatch_change(&self, element: &NodeId) -> Result<()> {
        let mut state = self.state();
        state.node(*element)?;
        state.events.push(RecordedEvent::Change {
            target: *element,
            at: Instant::now(),
        });
        Ok(())
    }

    async fn dispatch_mouse(&self, element: &NodeId, event: MouseEvent) -> Result<()> {
        let mut state = self.state();
        state.node(*element)?;
        state.events.push(RecordedEvent::Mouse {
            target: *element,
            event,
            at: Instant::now(),
        });
        if event.kind != MouseEventKind::Click {
            return Ok(());
        }

        let mut effects = Vec::new();
        let mut cur = Some(*element);
        while let Some(id) = cur {
            let node = state.node(id)?;
            effects.extend(node.behaviors.iter().copied());
            cur = if event.bubbles { node.parent } else { None };
        }
        for effect in effects {
            match effect {
                ClickBehavior::Toggle(target) => {
                    let n = state.node_mut(target)?;
                    n.hidden = !n.hidden;
                }
                ClickBehavior::Show(target) => state.node_mut(target)?.hidden = false,
                ClickBehavior::Hide(target) => state.node_mut(target)?.hidden = true,
            }
        }
        Ok(())
    }

    async fn has_click_handler(&self, element: &NodeId) -> Result<bool> {
        Ok(self.state().node(*element)?.onclick)
    }

    async fn computed_style(&self, element: &NodeId, property: &str) -> Result<Option<String>> {
        let state = self.state();
        let node = state.node(*element)?;
        if node.tag.is_none() {
            return Ok(None);
        }
        Ok(match property {
            "cursor" => Some(node.cursor.clone().unwrap_or_else(|| "auto".into())),
            _ => Some(String::new()),
        })
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.state().url.clone())
    }
}
