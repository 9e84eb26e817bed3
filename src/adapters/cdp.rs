//! DevTools backend: drives an already running browser tab over CDP.
//!
//! Elements never cross the protocol as remote objects. A small registry lives
//! in the page (`window.__docBatchRegistry`) and hands out numeric ids, every
//! call evaluates one expression and returns its result as a JSON string.

use crate::domain::model::{ElementId, ElementSnapshot};
use crate::domain::ports::{InterceptionHandle, PageDriver, TabOpenHook};
use crate::utils::error::{BatchError, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const PRELUDE: &str = r#"
const reg = window.__docBatchRegistry || (window.__docBatchRegistry = { next: 1, byId: new Map(), ids: new WeakMap() });
if (reg.byId.size > 5000) {
  for (const [id, el] of reg.byId) { if (!el.isConnected) { reg.byId.delete(id); reg.ids.delete(el); } }
}
const idOf = (el) => {
  if (!el) return null;
  let id = reg.ids.get(el);
  if (id === undefined || reg.byId.get(id) !== el) { id = reg.next++; reg.ids.set(el, id); reg.byId.set(id, el); }
  return id;
};
const byId = (id) => reg.byId.get(id) || null;
const need = (id) => { const el = byId(id); if (!el) { throw new Error('unknown element ' + id); } return el; };
"#;

const INSTALL_OPEN_HOOK: &str = r#"
if (window.__docBatchOpenHook) { return false; }
const prev = window.open;
const queue = [];
const hooked = function (url) {
  try { if (url) { queue.push(new URL(String(url), location.href).href); } } catch (_) {}
  return null;
};
window.__docBatchOpenHook = { prev, queue, hooked };
window.open = hooked;
return true;
"#;

const UNINSTALL_OPEN_HOOK: &str = r#"
const h = window.__docBatchOpenHook;
if (!h) { return false; }
if (window.open === h.hooked) { window.open = h.prev; }
delete window.__docBatchOpenHook;
return true;
"#;

const DRAIN_OPEN_HOOK: &str = r#"
const h = window.__docBatchOpenHook;
return h ? h.queue.splice(0) : [];
"#;

fn wrap(body: &str) -> String {
    format!(
        "(() => {{ {PRELUDE}\nconst __out = (() => {{ {body} }})();\nreturn JSON.stringify(__out === undefined ? null : __out); }})()"
    )
}

/// JS string literal for `value`.
fn js(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn browser_error(e: impl std::fmt::Display) -> BatchError {
    BatchError::BrowserError {
        message: e.to_string(),
    }
}

async fn evaluate<T: DeserializeOwned>(page: &Page, body: &str) -> Result<T> {
    let params = EvaluateParams::builder()
        .expression(wrap(body))
        .await_promise(true)
        .return_by_value(true)
        .build()
        .map_err(BatchError::script)?;
    let result = page
        .evaluate_expression(params)
        .await
        .map_err(|e| BatchError::script(e.to_string()))?;
    let raw: String = result.into_value()?;
    Ok(serde_json::from_str(&raw)?)
}

/// Connection to the browser plus the tab the batch runs in.
pub struct CdpSession {
    browser: Arc<Browser>,
    page: Page,
    handler_task: JoinHandle<()>,
}

impl CdpSession {
    /// Attach to `endpoint` and pick the first tab whose URL contains `page_match`.
    pub async fn connect(endpoint: &str, page_match: &str) -> Result<Self> {
        tracing::info!("🔌 Connecting to browser at {}", endpoint);
        let (mut browser, mut handler) = Browser::connect(endpoint).await.map_err(browser_error)?;
        let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });

        // 連線後 target 清單是非同步更新的，稍等一下再找頁面
        let _ = tokio::time::timeout(Duration::from_millis(500), browser.fetch_targets()).await;
        let pages = browser.pages().await.map_err(browser_error)?;

        let mut selected = None;
        for page in pages {
            let url = page.url().await.ok().flatten().unwrap_or_default();
            tracing::debug!("candidate tab: {}", url);
            if url.contains(page_match) {
                tracing::info!("📄 Using tab {}", url);
                selected = Some(page);
                break;
            }
        }

        let Some(page) = selected else {
            handler_task.abort();
            return Err(BatchError::PageNotFound {
                pattern: page_match.to_string(),
            });
        };

        Ok(Self {
            browser: Arc::new(browser),
            page,
            handler_task,
        })
    }

    pub fn page(&self) -> CdpPage {
        CdpPage {
            page: self.page.clone(),
        }
    }

    pub fn tab_hook(&self) -> CdpTabHook {
        CdpTabHook {
            browser: self.browser.clone(),
            page: self.page.clone(),
        }
    }
}

impl Drop for CdpSession {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

/// [`PageDriver`] over one CDP page.
#[derive(Clone)]
pub struct CdpPage {
    page: Page,
}

impl CdpPage {
    async fn eval<T: DeserializeOwned>(&self, body: &str) -> Result<T> {
        evaluate(&self.page, body).await
    }

    async fn run(&self, body: &str) -> Result<()> {
        let _: serde_json::Value = self.eval(body).await?;
        Ok(())
    }
}

#[async_trait]
impl PageDriver for CdpPage {
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementId>> {
        self.eval(&format!(
            "return Array.from(document.querySelectorAll({})).map(idOf);",
            js(selector)
        ))
        .await
    }

    async fn query_within(&self, root: ElementId, selector: &str) -> Result<Vec<ElementId>> {
        self.eval(&format!(
            "return Array.from(need({}).querySelectorAll({})).map(idOf);",
            root.0,
            js(selector)
        ))
        .await
    }

    async fn snapshot(&self, element: ElementId) -> Result<Option<ElementSnapshot>> {
        self.eval(&format!(
            r#"
const el = byId({id});
if (!el || !el.isConnected) {{ return null; }}
const r = el.getBoundingClientRect();
const cs = getComputedStyle(el);
return {{
  left: r.left, top: r.top, width: r.width, height: r.height,
  display: cs.display, visibility: cs.visibility, overflowY: cs.overflowY,
  scrollHeight: el.scrollHeight, clientHeight: el.clientHeight
}};
"#,
            id = element.0
        ))
        .await
    }

    async fn parent(&self, element: ElementId) -> Result<Option<ElementId>> {
        self.eval(&format!(
            "const p = need({}).parentElement; return (!p || p === document.body) ? null : idOf(p);",
            element.0
        ))
        .await
    }

    async fn attribute(&self, element: ElementId, name: &str) -> Result<Option<String>> {
        self.eval(&format!(
            "return need({}).getAttribute({});",
            element.0,
            js(name)
        ))
        .await
    }

    async fn text_content(&self, element: ElementId) -> Result<String> {
        self.eval(&format!("return need({}).textContent || '';", element.0))
            .await
    }

    async fn scroll_into_view(&self, element: ElementId) -> Result<()> {
        self.run(&format!(
            "need({}).scrollIntoView({{ block: 'center', inline: 'nearest' }});",
            element.0
        ))
        .await
    }

    async fn focus(&self, element: ElementId) -> Result<()> {
        self.run(&format!(
            "const el = need({}); if (el.focus) {{ el.focus({{ preventScroll: true }}); }}",
            element.0
        ))
        .await
    }

    async fn click(&self, element: ElementId) -> Result<()> {
        self.run(&format!("need({}).click();", element.0)).await
    }

    async fn dispatch_click(&self, element: ElementId) -> Result<()> {
        self.run(&format!(
            "need({}).dispatchEvent(new MouseEvent('click', {{ bubbles: true, cancelable: true, view: window }}));",
            element.0
        ))
        .await
    }

    async fn element_from_point(&self, x: f64, y: f64) -> Result<Option<ElementId>> {
        self.eval(&format!(
            "return idOf(document.elementFromPoint({}, {}));",
            x, y
        ))
        .await
    }

    async fn scroll_to_end(&self, element: ElementId) -> Result<()> {
        self.run(&format!(
            "const el = need({}); el.scrollTop = el.scrollHeight;",
            element.0
        ))
        .await
    }

    async fn scrolling_root(&self) -> Result<ElementId> {
        self.eval("return idOf(document.scrollingElement || document.documentElement);")
            .await
    }

    async fn set_outline(&self, element: ElementId, color: Option<&str>) -> Result<()> {
        let body = match color {
            Some(color) => format!(
                r#"
const el = byId({id});
if (!el) {{ return; }}
if (el.dataset.docBatchOutline === undefined) {{ el.dataset.docBatchOutline = el.style.outline || ''; }}
el.style.outline = '2px solid ' + {color};
el.style.outlineOffset = '2px';
"#,
                id = element.0,
                color = js(color)
            ),
            None => format!(
                r#"
const el = byId({id});
if (!el || el.dataset.docBatchOutline === undefined) {{ return; }}
el.style.outline = el.dataset.docBatchOutline;
el.style.outlineOffset = '';
delete el.dataset.docBatchOutline;
"#,
                id = element.0
            ),
        };
        self.run(&body).await
    }

    async fn current_path(&self) -> Result<String> {
        self.eval("return location.pathname;").await
    }

    async fn push_route(&self, path: &str) -> Result<()> {
        self.run(&format!(
            "history.pushState({{}}, '', {}); window.dispatchEvent(new PopStateEvent('popstate', {{ state: {{}} }}));",
            js(path)
        ))
        .await
    }

    async fn assign_location(&self, path: &str) -> Result<()> {
        // 延後導航，讓這次 evaluate 先拿到結果
        self.run(&format!(
            "const target = {}; setTimeout(() => location.assign(target), 0);",
            js(path)
        ))
        .await
    }
}

/// Captures `window.open` calls and reopens them as background tabs.
#[derive(Clone)]
pub struct CdpTabHook {
    browser: Arc<Browser>,
    page: Page,
}

#[async_trait]
impl TabOpenHook for CdpTabHook {
    async fn install(&self) -> Result<InterceptionHandle> {
        let installed: bool = evaluate(&self.page, INSTALL_OPEN_HOOK).await?;
        if installed {
            tracing::debug!("window.open intercepted");
        } else {
            tracing::warn!("window.open already hooked, leaving it alone");
        }
        Ok(InterceptionHandle { installed })
    }

    async fn uninstall(&self, handle: InterceptionHandle) -> Result<()> {
        if !handle.installed {
            return Ok(());
        }
        let removed: bool = evaluate(&self.page, UNINSTALL_OPEN_HOOK).await?;
        tracing::debug!("window.open restored: {}", removed);
        Ok(())
    }

    async fn forward_pending(&self) -> Result<usize> {
        let pending: Vec<String> = evaluate(&self.page, DRAIN_OPEN_HOOK).await?;
        let mut opened = 0;
        for raw in pending {
            let target = match url::Url::parse(&raw) {
                Ok(target) => target,
                Err(e) => {
                    tracing::warn!("skipping captured tab '{}': {}", raw, e);
                    continue;
                }
            };
            let params = CreateTargetParams::builder()
                .url(target.as_str())
                .background(true)
                .build()
                .map_err(browser_error)?;
            match self.browser.new_page(params).await {
                Ok(_) => {
                    tracing::debug!("background tab opened: {}", target);
                    opened += 1;
                }
                Err(e) => tracing::warn!("could not open {}: {}", target, e),
            }
        }
        Ok(opened)
    }
}
