//! Page-side scripts and their evaluation.
//!
//! Elements found by a query are tagged with a `data-retrace-id` attribute so that
//! later commands can address them by handle.

use chromiumoxide::Page;
use retrace_engine::driver::DriverError;
use retrace_engine::selector::SelectorKind;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub const HANDLE_ATTRIBUTE: &str = "data-retrace-id";

/// Maximum retries for context errors during page navigation.
const MAX_CONTEXT_RETRIES: u32 = 10;

/// Delay between retries when context is not found (page navigating).
const CONTEXT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Check if an error indicates the page context is unavailable (e.g., during navigation).
fn is_context_error(err: &str) -> bool {
    err.contains("Cannot find context")
        || err.contains("Execution context was destroyed")
        || err.contains("-32000")
}

/// Reply of [`query_script`].
#[derive(Debug, Deserialize)]
pub struct QueryReply {
    pub count: usize,
    #[serde(default)]
    pub id: Option<u32>,
    #[serde(default)]
    pub error: Option<String>,
}

pub fn query_script(kind: SelectorKind, expression: &str) -> Result<String, DriverError> {
    let expression = serde_json::to_string(expression)?;
    let kind = serde_json::to_string(&kind)?;
    Ok(format!(
        r#"(() => {{
  const kind = {kind};
  const expr = {expression};
  let nodes = [];
  try {{
    if (kind === "xpath") {{
      const r = document.evaluate(expr, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
      for (let i = 0; i < r.snapshotLength; i++) {{
        const n = r.snapshotItem(i);
        if (n.nodeType === Node.ELEMENT_NODE) nodes.push(n);
      }}
    }} else {{
      nodes = Array.from(document.querySelectorAll(expr));
    }}
  }} catch (e) {{
    return {{ count: 0, error: String(e) }};
  }}
  if (nodes.length !== 1) return {{ count: nodes.length }};
  const el = nodes[0];
  if (!el.hasAttribute("{attr}")) {{
    window.__retraceNextId = (window.__retraceNextId || 0) + 1;
    el.setAttribute("{attr}", String(window.__retraceNextId));
  }}
  return {{ count: 1, id: Number(el.getAttribute("{attr}")) }};
}})()"#,
        attr = HANDLE_ATTRIBUTE
    ))
}

pub fn handle_selector(id: u32) -> String {
    format!("[{}=\"{}\"]", HANDLE_ATTRIBUTE, id)
}

/// Clears an editable element. Returns false when the handle no longer resolves.
pub fn clear_script(id: u32) -> String {
    format!(
        r#"(() => {{
  const el = document.querySelector('{selector}');
  if (!el) return false;
  if ("value" in el) {{
    el.value = "";
    el.dispatchEvent(new Event("input", {{ bubbles: true }}));
  }} else if (el.isContentEditable) {{
    el.textContent = "";
  }}
  return true;
}})()"#,
        selector = handle_selector(id)
    )
}

/// Outcome of [`select_option_script`].
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SelectReply {
    Selected,
    Missing,
    NotSelect,
    NoOption,
}

/// Selects the option of a `<select>` whose trimmed label equals `label`, firing the
/// events a user selection would.
pub fn select_option_script(id: u32, label: &str) -> Result<String, DriverError> {
    let label = serde_json::to_string(label)?;
    Ok(format!(
        r#"(() => {{
  const el = document.querySelector('{selector}');
  if (!el) return "missing";
  if (el.tagName.toLowerCase() !== "select") return "not_select";
  const wanted = {label}.trim();
  const option = Array.from(el.options).find(o => o.text.trim() === wanted);
  if (!option) return "no_option";
  el.value = option.value;
  option.selected = true;
  el.dispatchEvent(new Event("input", {{ bubbles: true }}));
  el.dispatchEvent(new Event("change", {{ bubbles: true }}));
  return "selected";
}})()"#,
        selector = handle_selector(id)
    ))
}

pub fn scroll_script(dy: i64) -> String {
    format!("window.scrollBy(0, {}); true", dy)
}

pub const VIEWPORT_HEIGHT_SCRIPT: &str = "window.innerHeight";

/// Evaluate `expression` and deserialize its value, retrying while the page's
/// execution context is being replaced.
pub async fn evaluate<T: DeserializeOwned>(
    page: &Page,
    expression: &str,
    timeout: Duration,
) -> Result<T, DriverError> {
    let mut last_error = None;

    for attempt in 0..MAX_CONTEXT_RETRIES {
        match tokio::time::timeout(timeout, page.evaluate(expression)).await {
            Err(_) => {
                return Err(DriverError::Timeout {
                    operation: "script evaluation".into(),
                });
            }
            Ok(Ok(result)) => {
                return result
                    .into_value::<T>()
                    .map_err(|e| DriverError::Serialization(e.to_string()));
            }
            Ok(Err(e)) => {
                let err_str = e.to_string();
                if !is_context_error(&err_str) {
                    return Err(DriverError::ScriptError(err_str));
                }
                tracing::debug!(
                    "Context error during evaluation (attempt {}/{}), retrying...",
                    attempt + 1,
                    MAX_CONTEXT_RETRIES
                );
                last_error = Some(err_str);
                tokio::time::sleep(CONTEXT_RETRY_DELAY).await;
            }
        }
    }

    Err(DriverError::ScriptError(last_error.unwrap_or_else(|| {
        "Evaluation failed after retries".to_string()
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_script_escapes_expression() {
        let script = query_script(SelectorKind::XPath, r#"//a[@title="say "hi""]"#).unwrap();
        assert!(script.contains(r#"const expr = "//a[@title=\"say \"hi\"\"]";"#));
        assert!(script.contains(r#"const kind = "xpath";"#));
    }

    #[test]
    fn test_select_option_script_quotes_label() {
        let script = select_option_script(3, r#"Size "L""#).unwrap();
        assert!(script.contains(r#"const wanted = "Size \"L\"".trim();"#));
        assert!(script.contains(r#"[data-retrace-id="3"]"#));
    }

    #[test]
    fn test_handle_selector() {
        assert_eq!(handle_selector(7), r#"[data-retrace-id="7"]"#);
    }
}
