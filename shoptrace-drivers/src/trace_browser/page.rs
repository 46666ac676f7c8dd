use async_trait::async_trait;
use fantoccini::Client;
use serde_json::{json, Value};
use shoptrace_common::{Result, TraceError};
use tracing::{debug, info};

use super::behavioral::BehavioralEngine;
use super::geometry::{Point, Rect};
use super::renderer::{MouseEvent, Renderer, SelectOption, Selector};

/// W3C web element identifier key.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
/// Key used by pre-W3C drivers.
const LEGACY_ELEMENT_KEY: &str = "ELEMENT";

/// Option labels are the raw `textContent`, matching what list items report.
const SELECT_OPTIONS_SCRIPT: &str = "return Array.from(arguments[0].options || [])\
     .map(o => ({text: o.textContent, value: o.value}));";

/// Pre-order walk over element children, done in the page so a whole
/// subtree costs one round trip.
const GATHER_CLICKABLES_SCRIPT: &str = "const out = []; const stack = [arguments[0]]; \
     while (stack.length) { \
         const node = stack.pop(); \
         if (typeof node.onclick === 'function' \
             || window.getComputedStyle(node).getPropertyValue('cursor') === 'pointer') { \
             out.push(node); \
         } \
         for (let i = node.children.length - 1; i >= 0; i--) stack.push(node.children[i]); \
     } \
     return out;";

/// Reference to a DOM element in a remote WebDriver session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WebElement {
    id: String,
}

impl WebElement {
    pub fn id(&self) -> &str {
        &self.id
    }

    fn to_json(&self) -> Value {
        json!({ ELEMENT_KEY: self.id })
    }

    fn from_json(value: &Value) -> Result<Option<Self>> {
        if value.is_null() {
            return Ok(None);
        }
        value
            .get(ELEMENT_KEY)
            .or_else(|| value.get(LEGACY_ELEMENT_KEY))
            .and_then(Value::as_str)
            .map(|id| Some(Self { id: id.to_string() }))
            .ok_or_else(|| TraceError::driver(format!("not an element reference: {value}")))
    }

    fn list_from_json(value: Value) -> Result<Vec<Self>> {
        let Value::Array(items) = value else {
            return Err(TraceError::driver(format!("expected element list, got {value}")));
        };
        let mut out = Vec::with_capacity(items.len());
        for item in &items {
            if let Some(el) = Self::from_json(item)? {
                out.push(el);
            }
        }
        Ok(out)
    }
}

/// A browser tab driven over WebDriver, answering [`Renderer`] queries with
/// injected JavaScript.
#[derive(Clone)]
pub struct WebDriverPage {
    pub(crate) client: Client,
    pub(crate) behavioral_engine: BehavioralEngine,
}

impl WebDriverPage {
    pub fn new(client: Client, behavioral_engine: BehavioralEngine) -> Self {
        Self {
            client,
            behavioral_engine,
        }
    }

    /// Navigate to `url` after a short human-like pause.
    pub async fn goto(&self, url: &str) -> Result<()> {
        self.behavioral_engine.random_delay(300, 1200).await;
        self.client.goto(url).await.map_err(anyhow::Error::from)?;
        info!(target: "browser.page", %url, "navigated");
        Ok(())
    }

    async fn run(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        debug!(target: "browser.page", script, "executing script");
        Ok(self
            .client
            .execute(script, args)
            .await
            .map_err(anyhow::Error::from)?)
    }

    async fn run_string(&self, script: &str, args: Vec<Value>) -> Result<String> {
        let value = self.run(script, args).await?;
        match value {
            Value::String(s) => Ok(s),
            Value::Null => Ok(String::new()),
            other => Err(TraceError::driver(format!("expected string, got {other}"))),
        }
    }

    async fn run_bool(&self, script: &str, args: Vec<Value>) -> Result<bool> {
        Ok(self.run(script, args).await?.as_bool().unwrap_or(false))
    }
}

#[async_trait]
impl Renderer for WebDriverPage {
    type Element = WebElement;

    async fn element_from_point(&self, point: Point) -> Result<Option<WebElement>> {
        let value = self
            .run(
                "return document.elementFromPoint(arguments[0], arguments[1]);",
                vec![json!(point.x), json!(point.y)],
            )
            .await?;
        WebElement::from_json(&value)
    }

    async fn bounding_rect(&self, element: &WebElement) -> Result<Rect> {
        let value = self
            .run(
                "const r = arguments[0].getBoundingClientRect(); \
                 return {left: r.left, top: r.top, width: r.width, height: r.height};",
                vec![element.to_json()],
            )
            .await?;
        serde_json::from_value(value)
            .map_err(|e| TraceError::driver(format!("malformed bounding rect: {e}")))
    }

    async fn parent(&self, element: &WebElement) -> Result<Option<WebElement>> {
        let value = self
            .run("return arguments[0].parentElement;", vec![element.to_json()])
            .await?;
        WebElement::from_json(&value)
    }

    // WebDriver cannot return text nodes, so only element children are listed.
    async fn child_nodes(&self, element: &WebElement) -> Result<Vec<WebElement>> {
        let value = self
            .run("return Array.from(arguments[0].children);", vec![element.to_json()])
            .await?;
        WebElement::list_from_json(value)
    }

    async fn document_root(&self) -> Result<WebElement> {
        let value = self.run("return document.documentElement;", vec![]).await?;
        WebElement::from_json(&value)?
            .ok_or_else(|| TraceError::driver("document has no root element"))
    }

    async fn tag_name(&self, element: &WebElement) -> Result<String> {
        self.run_string("return arguments[0].tagName || '';", vec![element.to_json()])
            .await
    }

    async fn text_content(&self, element: &WebElement) -> Result<String> {
        self.run_string("return arguments[0].textContent || '';", vec![element.to_json()])
            .await
    }

    async fn attribute(&self, element: &WebElement, name: &str) -> Result<Option<String>> {
        let value = self
            .run(
                "return arguments[0].getAttribute(arguments[1]);",
                vec![element.to_json(), json!(name)],
            )
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn query_all(&self, root: &WebElement, selector: &Selector) -> Result<Vec<WebElement>> {
        let value = self
            .run(
                "return Array.from(arguments[0].querySelectorAll(arguments[1]));",
                vec![root.to_json(), json!(selector.to_css())],
            )
            .await?;
        WebElement::list_from_json(value)
    }

    async fn select_options(&self, select: &WebElement) -> Result<Vec<SelectOption>> {
        let value = self.run(SELECT_OPTIONS_SCRIPT, vec![select.to_json()]).await?;
        serde_json::from_value(value)
            .map_err(|e| TraceError::driver(format!("malformed select options: {e}")))
    }

    async fn set_value(&self, element: &WebElement, value: &str) -> Result<()> {
        self.run(
            "arguments[0].value = arguments[1];",
            vec![element.to_json(), json!(value)],
        )
        .await?;
        Ok(())
    }

    async fn dispatch_change(&self, element: &WebElement) -> Result<()> {
        self.run(
            "arguments[0].dispatchEvent(new Event('change', {bubbles: true}));",
            vec![element.to_json()],
        )
        .await?;
        Ok(())
    }

    async fn dispatch_mouse(&self, element: &WebElement, event: MouseEvent) -> Result<()> {
        self.run(
            "arguments[0].dispatchEvent(new MouseEvent(arguments[1], {\
                 bubbles: arguments[2], cancelable: true, view: window, \
                 clientX: arguments[3], clientY: arguments[4]}));",
            vec![
                element.to_json(),
                json!(event.kind.dom_type()),
                json!(event.bubbles),
                json!(event.client.x),
                json!(event.client.y),
            ],
        )
        .await?;
        Ok(())
    }

    async fn has_click_handler(&self, element: &WebElement) -> Result<bool> {
        self.run_bool(
            "return typeof arguments[0].onclick === 'function';",
            vec![element.to_json()],
        )
        .await
    }

    async fn computed_style(&self, element: &WebElement, property: &str) -> Result<Option<String>> {
        let value = self
            .run(
                "return window.getComputedStyle(arguments[0]).getPropertyValue(arguments[1]);",
                vec![element.to_json(), json!(property)],
            )
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self
            .client
            .current_url()
            .await
            .map_err(anyhow::Error::from)?
            .to_string())
    }

    async fn clickable_descendants(&self, root: &WebElement) -> Result<Vec<WebElement>> {
        let value = self.run(GATHER_CLICKABLES_SCRIPT, vec![root.to_json()]).await?;
        WebElement::list_from_json(value)
    }

    async fn contains(&self, ancestor: &WebElement, node: &WebElement) -> Result<bool> {
        self.run_bool(
            "return arguments[0].contains(arguments[1]);",
            vec![ancestor.to_json(), node.to_json()],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_w3c_and_legacy_references() {
        let w3c = json!({ ELEMENT_KEY: "abc" });
        let legacy = json!({ "ELEMENT": "def" });
        assert_eq!(WebElement::from_json(&w3c).unwrap().unwrap().id(), "abc");
        assert_eq!(WebElement::from_json(&legacy).unwrap().unwrap().id(), "def");
        assert_eq!(WebElement::from_json(&Value::Null).unwrap(), None);
        assert!(WebElement::from_json(&json!(42)).is_err());
    }

    #[test]
    fn element_lists_skip_nulls() {
        let list = json!([{ ELEMENT_KEY: "a" }, null, { ELEMENT_KEY: "b" }]);
        let ids: Vec<_> = WebElement::list_from_json(list)
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(WebElement::list_from_json(json!("nope")).is_err());
    }

    #[test]
    fn option_labels_use_raw_text_content() {
        assert!(SELECT_OPTIONS_SCRIPT.contains("o.textContent"));
        assert!(!SELECT_OPTIONS_SCRIPT.contains("o.text,"));
    }

    #[test]
    fn gather_script_checks_handler_and_cursor_in_one_pass() {
        assert!(GATHER_CLICKABLES_SCRIPT.contains("typeof node.onclick === 'function'"));
        assert!(GATHER_CLICKABLES_SCRIPT.contains("'cursor') === 'pointer'"));
        assert!(GATHER_CLICKABLES_SCRIPT.trim_end().ends_with("return out;"));
    }

    #[test]
    fn references_round_trip_through_json() {
        let el = WebElement { id: "xyz".into() };
        assert_eq!(WebElement::from_json(&el.to_json()).unwrap(), Some(el));
    }
}
