mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use common::{body, helpers, init_test_tracing};
use shoptrace_common::Result;
use shoptrace_drivers::trace_browser::memory::{MemoryPage, NodeId, NodeSpec};
use shoptrace_drivers::trace_browser::renderer::{MouseEvent, SelectOption, Selector};
use shoptrace_drivers::{ControlKind, InteractionHelpers, InteractionTiming, Point, Rect, Renderer};

/// Answers the clickable walk in one call, as a remote backend would, and
/// counts how often the per-node queries are still used.
#[derive(Default)]
struct BatchedPage {
    inner: MemoryPage,
    walks: AtomicUsize,
    node_queries: AtomicUsize,
}

#[async_trait]
impl Renderer for BatchedPage {
    type Element = NodeId;

    async fn element_from_point(&self, point: Point) -> Result<Option<NodeId>> {
        self.inner.element_from_point(point).await
    }
    async fn bounding_rect(&self, element: &NodeId) -> Result<Rect> {
        self.inner.bounding_rect(element).await
    }
    async fn parent(&self, element: &NodeId) -> Result<Option<NodeId>> {
        self.inner.parent(element).await
    }
    async fn child_nodes(&self, element: &NodeId) -> Result<Vec<NodeId>> {
        self.node_queries.fetch_add(1, Ordering::SeqCst);
        self.inner.child_nodes(element).await
    }
    async fn document_root(&self) -> Result<NodeId> {
        self.inner.document_root().await
    }
    async fn tag_name(&self, element: &NodeId) -> Result<String> {
        self.inner.tag_name(element).await
    }
    async fn text_content(&self, element: &NodeId) -> Result<String> {
        self.inner.text_content(element).await
    }
    async fn attribute(&self, element: &NodeId, name: &str) -> Result<Option<String>> {
        self.inner.attribute(element, name).await
    }
    async fn query_all(&self, root: &NodeId, selector: &Selector) -> Result<Vec<NodeId>> {
        self.inner.query_all(root, selector).await
    }
    async fn select_options(&self, select: &NodeId) -> Result<Vec<SelectOption>> {
        self.inner.select_options(select).await
    }
    async fn set_value(&self, element: &NodeId, value: &str) -> Result<()> {
        self.inner.set_value(element, value).await
    }
    async fn dispatch_change(&self, element: &NodeId) -> Result<()> {
        self.inner.dispatch_change(element).await
    }
    async fn dispatch_mouse(&self, element: &NodeId, event: MouseEvent) -> Result<()> {
        self.inner.dispatch_mouse(element, event).await
    }
    async fn has_click_handler(&self, element: &NodeId) -> Result<bool> {
        self.node_queries.fetch_add(1, Ordering::SeqCst);
        self.inner.has_click_handler(element).await
    }
    async fn computed_style(&self, element: &NodeId, property: &str) -> Result<Option<String>> {
        self.node_queries.fetch_add(1, Ordering::SeqCst);
        self.inner.computed_style(element, property).await
    }
    async fn current_url(&self) -> Result<String> {
        self.inner.current_url().await
    }
    async fn clickable_descendants(&self, root: &NodeId) -> Result<Vec<NodeId>> {
        self.walks.fetch_add(1, Ordering::SeqCst);
        self.inner.clickable_descendants(root).await
    }
}

#[tokio::test]
async fn gatherer_finds_nothing_on_inert_tree() {
    let page = Arc::new(MemoryPage::default());
    let body = body(&page);
    let list = page.append(body, NodeSpec::element("ul"));
    page.append(list, NodeSpec::element("li").text("plain"));
    page.append(body, NodeSpec::element("p").text("copy").cursor("text"));

    let found = helpers(&page).gather_click_elements(None, None).await.unwrap();
    assert!(found.is_empty());
}

#[tokio::test]
async fn gatherer_finds_a_single_deep_node() {
    let page = Arc::new(MemoryPage::default());
    let body = body(&page);
    let outer = page.append(body, NodeSpec::element("div"));
    let inner = page.append(outer, NodeSpec::element("section"));
    let target = page.append(inner, NodeSpec::element("span").onclick());

    let found = helpers(&page).gather_click_elements(None, None).await.unwrap();
    assert_eq!(found, vec![target]);
}

#[tokio::test]
async fn gatherer_visits_in_preorder_and_appends() {
    init_test_tracing();
    let page = Arc::new(MemoryPage::default());
    let body = body(&page);
    let card = page.append(body, NodeSpec::element("div").cursor("pointer"));
    let buy = page.append(card, NodeSpec::element("button").onclick());
    let other = page.append(body, NodeSpec::element("a").cursor("pointer"));

    let helpers = helpers(&page);
    let found = helpers.gather_click_elements(None, None).await.unwrap();
    assert_eq!(found, vec![card, buy, other]);

    // Restricting the root and passing an accumulator keeps earlier entries.
    let seeded = helpers
        .gather_click_elements(Some(card), Some(vec![other]))
        .await
        .unwrap();
    assert_eq!(seeded, vec![other, card, buy]);
}

#[tokio::test]
async fn gatherer_leaves_the_walk_to_the_renderer() {
    let page = Arc::new(BatchedPage::default());
    let body = body(&page.inner);
    let card = page.inner.append(body, NodeSpec::element("div").cursor("pointer"));
    let buy = page.inner.append(card, NodeSpec::element("button").onclick());
    page.inner.append(body, NodeSpec::element("p").text("copy"));

    let helpers = InteractionHelpers::new(Arc::clone(&page), InteractionTiming::default());
    let found = helpers.gather_click_elements(None, None).await.unwrap();

    assert_eq!(found, vec![card, buy]);
    assert_eq!(page.walks.load(Ordering::SeqCst), 1);
    assert_eq!(page.node_queries.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn visibility_requires_size_and_being_on_top() {
    let page = Arc::new(MemoryPage::default());
    let body = body(&page);
    let tiny = page.append(body, NodeSpec::element("button").rect(0.0, 0.0, 1.0, 30.0));
    let covered = page.append(body, NodeSpec::element("button").rect(10.0, 10.0, 50.0, 20.0));
    page.append(body, NodeSpec::element("div").rect(0.0, 0.0, 100.0, 100.0));
    let icon_button = page.append(body, NodeSpec::element("button").rect(200.0, 0.0, 40.0, 40.0));
    page.append(icon_button, NodeSpec::element("img").rect(200.0, 0.0, 40.0, 40.0));

    let helpers = helpers(&page);
    assert!(!helpers.is_visible(&tiny).await.unwrap());
    assert!(!helpers.is_visible(&covered).await.unwrap());
    // The hit lands on a descendant, which still counts.
    assert!(helpers.is_visible(&icon_button).await.unwrap());
}

#[tokio::test]
async fn labels_resolve_by_for_parent_then_placeholder() {
    let page = Arc::new(MemoryPage::default());
    let body = body(&page);
    page.append(body, NodeSpec::element("label").attr("for", "qty").text(" Quantity "));
    let qty = page.append(body, NodeSpec::element("input").attr("id", "qty"));
    let wrapper = page.append(body, NodeSpec::element("label").text("Gift wrap"));
    let gift = page.append(wrapper, NodeSpec::element("input").attr("type", "checkbox"));
    let search = page.append(body, NodeSpec::element("input").attr("placeholder", "Search"));
    let bare = page.append(body, NodeSpec::element("input"));

    let helpers = helpers(&page);
    assert_eq!(helpers.label_of(&qty).await.unwrap().as_deref(), Some("Quantity"));
    assert_eq!(helpers.label_of(&gift).await.unwrap().as_deref(), Some("Gift wrap"));
    assert_eq!(helpers.label_of(&search).await.unwrap().as_deref(), Some("Search"));
    assert_eq!(helpers.label_of(&bare).await.unwrap(), None);
}

#[tokio::test]
async fn links_must_leave_the_current_page() {
    let page = Arc::new(MemoryPage::default());
    page.set_url("https://shop.example/product/1#top");
    let body = body(&page);
    let cart = page.append(body, NodeSpec::element("a").attr("href", "/cart"));
    let anchor = page.append(body, NodeSpec::element("a").attr("href", "#reviews"));
    let script = page.append(body, NodeSpec::element("a").attr("href", "javascript:void(0)"));
    let none = page.append(body, NodeSpec::element("a"));

    let helpers = helpers(&page);
    assert!(helpers.is_link(&cart).await.unwrap());
    assert!(!helpers.is_link(&anchor).await.unwrap());
    assert!(!helpers.is_link(&script).await.unwrap());
    assert!(!helpers.is_link(&none).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn controls_are_extracted_in_order_without_duplicates() {
    init_test_tracing();
    let page = Arc::new(MemoryPage::default());
    page.set_url("https://shop.example/product/1");
    let body = body(&page);

    page.append(
        body,
        NodeSpec::element("label").attr("for", "size").rect(10.0, 10.0, 50.0, 20.0).text("Size"),
    );
    let size = page.append(
        body,
        NodeSpec::element("select").attr("id", "size").rect(70.0, 10.0, 150.0, 20.0),
    );
    page.append(size, NodeSpec::element("option").attr("value", "s").text("S"));
    page.append(size, NodeSpec::element("option").attr("value", "m").text("M"));

    page.append(
        body,
        NodeSpec::element("input")
            .attr("type", "text")
            .attr("placeholder", "Search")
            .rect(10.0, 40.0, 200.0, 20.0),
    );
    page.append(
        body,
        NodeSpec::element("a").attr("href", "#reviews").rect(10.0, 70.0, 80.0, 20.0).text("Reviews"),
    );
    page.append(
        body,
        NodeSpec::element("button").onclick().rect(100.0, 70.0, 100.0, 20.0).text(" Add to cart "),
    );
    page.append(
        body,
        NodeSpec::element("a").attr("href", "/cart").rect(210.0, 70.0, 50.0, 20.0).text("Cart"),
    );
    page.append(
        body,
        NodeSpec::element("button").hidden().rect(300.0, 70.0, 80.0, 20.0).text("Hidden"),
    );
    let wrap = page.append(
        body,
        NodeSpec::element("label").rect(10.0, 100.0, 120.0, 20.0).text("Gift wrap"),
    );
    page.append(
        wrap,
        NodeSpec::element("input").attr("type", "checkbox").rect(10.0, 100.0, 16.0, 16.0),
    );
    page.append(
        body,
        NodeSpec::element("div").cursor("pointer").rect(10.0, 130.0, 100.0, 20.0).text("Wishlist"),
    );

    let controls = helpers(&page).extract_controls().await.unwrap();

    let summary: Vec<_> = controls
        .iter()
        .map(|c| (c.kind, c.label.as_deref().unwrap_or("")))
        .collect();
    assert_eq!(
        summary,
        vec![
            (ControlKind::Select, "Size"),
            (ControlKind::Text, "Search"),
            (ControlKind::Button, "Reviews"),
            (ControlKind::Button, "Add to cart"),
            (ControlKind::Link, "Cart"),
            (ControlKind::Checkbox, "Gift wrap"),
            (ControlKind::Button, "Wishlist"),
        ]
    );

    assert_eq!(controls[0].values.as_deref(), Some(&["S".to_string(), "M".to_string()][..]));
    assert_eq!(controls[4].code.as_deref(), Some("https://shop.example/cart"));
    assert_eq!(controls[3].rect, Rect::new(100.0, 70.0, 100.0, 20.0));
}
