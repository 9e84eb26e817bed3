#![allow(dead_code)]

use async_trait::async_trait;
use doc_batch_dl::config::settings::{Selectors, Settings};
use doc_batch_dl::domain::model::{ElementId, ElementSnapshot, RunStatus};
use doc_batch_dl::domain::ports::{InterceptionHandle, PageDriver, StatusSink, TabOpenHook};
use doc_batch_dl::utils::error::{BatchError, Result};
use doc_batch_dl::StopHandle;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

const ROOT: u64 = 1;
const CONTAINER: u64 = 2;
const TAB_BASE: u64 = 10;
const ENTRY_BASE: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Root,
    Container,
    Tab,
    Entry(usize),
    Overlay(usize),
    Decoy,
    CloseControl,
    Backdrop,
    Document(usize, usize),
}

#[derive(Debug, Clone)]
struct Node {
    kind: Kind,
    parent: Option<u64>,
    connected: bool,
    rect: (f64, f64, f64, f64),
    href: Option<String>,
    text: String,
}

/// How the simulated timeline behaves.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub entries: usize,
    /// Rows rendered before any scrolling, `None` means all of them.
    pub initially_loaded: Option<usize>,
    pub load_step: usize,
    pub docs_per_entry: usize,
    pub documents: HashMap<usize, usize>,
    pub no_overlay: HashSet<usize>,
    /// Entries whose overlay ignores every backdrop click.
    pub stuck: HashSet<usize>,
    /// Backdrop clicks swallowed before an overlay closes.
    pub ignored_backdrop_clicks: usize,
    /// Where the app jumps after an overlay closes.
    pub redirect_after_close: Option<String>,
    pub tabs_work: bool,
    pub push_route_fails: bool,
    pub documents_open_tabs: bool,
    /// Adds a large dialog without close control next to every overlay.
    pub decoy_overlay: bool,
    /// The list query errors once it has been answered this many times.
    pub fail_list_query_after: Option<usize>,
    pub path: String,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            entries: 5,
            initially_loaded: None,
            load_step: 5,
            docs_per_entry: 1,
            documents: HashMap::new(),
            no_overlay: HashSet::new(),
            stuck: HashSet::new(),
            ignored_backdrop_clicks: 0,
            redirect_after_close: None,
            tabs_work: true,
            push_route_fails: false,
            documents_open_tabs: false,
            decoy_overlay: false,
            fail_list_query_after: None,
            path: "/profile/transactions".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    OpenEntry(usize),
    OpenDocument(usize, usize),
    BackdropClick,
    Closed(usize),
    Scrolled,
    TabClicked(String),
    PushRoute(String),
    Assign(String),
    HookInstalled,
    HookRemoved,
}

struct State {
    scenario: Scenario,
    nodes: HashMap<u64, Node>,
    next_id: u64,
    loaded: usize,
    open_overlay: Option<(usize, u64)>,
    ignored_left: usize,
    max_open_overlays: usize,
    list_queries: usize,
    driver_calls: usize,
    hooked: bool,
    queue: Vec<String>,
    forwarded: Vec<String>,
    direct_opens: Vec<String>,
    outlines: Vec<(ElementId, Option<String>)>,
    events: Vec<Event>,
    selectors: Selectors,
}

impl State {
    fn add(&mut self, kind: Kind, parent: Option<u64>, rect: (f64, f64, f64, f64)) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                kind,
                parent,
                connected: true,
                rect,
                href: None,
                text: String::new(),
            },
        );
        id
    }

    fn node(&self, element: ElementId) -> Result<&Node> {
        self.nodes
            .get(&element.0)
            .ok_or_else(|| BatchError::script(format!("unknown element {}", element.0)))
    }

    fn connected_of(&self, pred: impl Fn(Kind) -> bool) -> Vec<ElementId> {
        let mut ids: Vec<u64> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.connected && pred(n.kind))
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids.into_iter().map(ElementId).collect()
    }

    fn entry_ids(&self) -> Vec<ElementId> {
        (0..self.loaded)
            .map(|i| ElementId(ENTRY_BASE + i as u64))
            .collect()
    }

    fn open_entry(&mut self, index: usize) {
        self.events.push(Event::OpenEntry(index));
        if self.scenario.no_overlay.contains(&index) {
            return;
        }
        let overlay = self.add(Kind::Overlay(index), Some(ROOT), (800.0, 0.0, 400.0, 900.0));
        self.add(Kind::CloseControl, Some(overlay), (1160.0, 10.0, 30.0, 30.0));
        self.add(Kind::Backdrop, Some(ROOT), (0.0, 0.0, 1200.0, 900.0));
        if self.scenario.decoy_overlay {
            self.add(Kind::Decoy, Some(ROOT), (0.0, 0.0, 1200.0, 900.0));
        }
        let docs = self
            .scenario
            .documents
            .get(&index)
            .copied()
            .unwrap_or(self.scenario.docs_per_entry);
        for k in 0..docs {
            self.add(
                Kind::Document(index, k),
                Some(overlay),
                (820.0, 100.0 + 40.0 * k as f64, 200.0, 30.0),
            );
        }

        let open_now = self.connected_of(|k| matches!(k, Kind::Overlay(_))).len();
        self.max_open_overlays = self.max_open_overlays.max(open_now);
        self.open_overlay = Some((index, overlay));
        self.ignored_left = self.scenario.ignored_backdrop_clicks;
    }

    fn backdrop_clicked(&mut self) {
        self.events.push(Event::BackdropClick);
        let Some((index, overlay)) = self.open_overlay else {
            return;
        };
        if self.scenario.stuck.contains(&index) {
            return;
        }
        if self.ignored_left > 0 {
            self.ignored_left -= 1;
            return;
        }

        for node in self.nodes.values_mut() {
            let detached = match node.kind {
                Kind::Backdrop | Kind::Decoy | Kind::Document(_, _) => true,
                _ => node.parent == Some(overlay),
            };
            if detached {
                node.connected = false;
            }
        }
        if let Some(node) = self.nodes.get_mut(&overlay) {
            node.connected = false;
        }
        self.open_overlay = None;
        self.events.push(Event::Closed(index));
        if let Some(path) = self.scenario.redirect_after_close.clone() {
            self.scenario.path = path;
        }
    }

    fn window_open(&mut self, url: String) {
        if self.hooked {
            self.queue.push(url);
        } else {
            self.direct_opens.push(url);
        }
    }
}

/// In-memory stand-in for the timeline page.
#[derive(Clone)]
pub struct FakePage {
    state: Arc<Mutex<State>>,
}

impl FakePage {
    pub fn new(scenario: Scenario) -> Self {
        Self::with_selectors(scenario, Selectors::default())
    }

    pub fn with_selectors(scenario: Scenario, selectors: Selectors) -> Self {
        let loaded = scenario
            .initially_loaded
            .unwrap_or(scenario.entries)
            .min(scenario.entries);
        let mut state = State {
            scenario,
            nodes: HashMap::new(),
            next_id: 1000,
            loaded,
            open_overlay: None,
            ignored_left: 0,
            max_open_overlays: 0,
            list_queries: 0,
            driver_calls: 0,
            hooked: false,
            queue: Vec::new(),
            forwarded: Vec::new(),
            direct_opens: Vec::new(),
            outlines: Vec::new(),
            events: Vec::new(),
            selectors,
        };

        let base = |kind: Kind, parent: Option<u64>, rect: (f64, f64, f64, f64)| Node {
            kind,
            parent,
            connected: true,
            rect,
            href: None,
            text: String::new(),
        };
        state
            .nodes
            .insert(ROOT, base(Kind::Root, None, (0.0, 0.0, 1200.0, 900.0)));
        state.nodes.insert(
            CONTAINER,
            base(Kind::Container, Some(ROOT), (0.0, 0.0, 780.0, 800.0)),
        );
        for (i, (path, label)) in [
            ("/profile/transactions", "Transaktionen"),
            ("/profile/activities", "Aktivität"),
        ]
        .into_iter()
        .enumerate()
        {
            let mut tab = base(Kind::Tab, Some(ROOT), (20.0 + 150.0 * i as f64, 10.0, 140.0, 30.0));
            tab.href = Some(format!("https://app.example{}", path));
            tab.text = format!("  {} ", label);
            state.nodes.insert(TAB_BASE + i as u64, tab);
        }
        let total = state.scenario.entries;
        for i in 0..total {
            state.nodes.insert(
                ENTRY_BASE + i as u64,
                base(
                    Kind::Entry(i),
                    Some(CONTAINER),
                    (0.0, 60.0 * i as f64, 760.0, 56.0),
                ),
            );
        }

        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn events(&self) -> Vec<Event> {
        self.lock().events.clone()
    }

    pub fn opened_entries(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::OpenEntry(i) => Some(i),
                _ => None,
            })
            .collect()
    }

    pub fn opened_documents(&self) -> Vec<(usize, usize)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::OpenDocument(i, k) => Some((i, k)),
                _ => None,
            })
            .collect()
    }

    pub fn backdrop_clicks(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| **e == Event::BackdropClick)
            .count()
    }

    pub fn max_open_overlays(&self) -> usize {
        self.lock().max_open_overlays
    }

    pub fn list_queries(&self) -> usize {
        self.lock().list_queries
    }

    /// Read calls (queries, snapshots, parent lookups) answered so far.
    pub fn driver_calls(&self) -> usize {
        self.lock().driver_calls
    }

    pub fn is_hooked(&self) -> bool {
        self.lock().hooked
    }

    pub fn loaded(&self) -> usize {
        self.lock().loaded
    }

    pub fn path(&self) -> String {
        self.lock().scenario.path.clone()
    }

    pub fn set_path(&self, path: &str) {
        self.lock().scenario.path = path.to_string();
    }

    pub fn overlay_open(&self) -> bool {
        self.lock().open_overlay.is_some()
    }

    pub fn forwarded(&self) -> Vec<String> {
        self.lock().forwarded.clone()
    }

    pub fn direct_opens(&self) -> Vec<String> {
        self.lock().direct_opens.clone()
    }

    pub fn outlines(&self) -> Vec<(ElementId, Option<String>)> {
        self.lock().outlines.clone()
    }

    /// Simulate the page calling `window.open` on its own.
    pub fn open_tab(&self, url: &str) {
        self.lock().window_open(url.to_string());
    }

    pub fn entry(&self, index: usize) -> ElementId {
        ElementId(ENTRY_BASE + index as u64)
    }

    /// Open `index` directly, as if the user had clicked it.
    pub fn open_entry_now(&self, index: usize) {
        self.lock().open_entry(index);
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementId>> {
        let mut state = self.lock();
        let selectors = state.selectors.clone();

        state.driver_calls += 1;
        let entries_only = format!(
            "{}:not({})",
            selectors.list_item, selectors.document_trigger
        );
        if selector == entries_only || selector == selectors.list_item {
            state.list_queries += 1;
            if let Some(limit) = state.scenario.fail_list_query_after {
                if state.list_queries > limit {
                    return Err(BatchError::DriverError {
                        message: "list query failed".to_string(),
                    });
                }
            }
            let mut ids = state.entry_ids();
            if selector == selectors.list_item {
                // 單純的列表選擇器也會選到文件按鈕
                ids.extend(state.connected_of(|k| matches!(k, Kind::Document(_, _))));
            }
            return Ok(ids);
        }
        if selector == selectors.document_trigger {
            return Ok(state.connected_of(|k| matches!(k, Kind::Document(_, _))));
        }
        if selector == selectors.overlay {
            return Ok(state.connected_of(|k| matches!(k, Kind::Overlay(_) | Kind::Decoy)));
        }
        if selector == selectors.backdrop {
            return Ok(state.connected_of(|k| k == Kind::Backdrop));
        }
        if selector == selectors.tab_candidates {
            return Ok(state.connected_of(|k| k == Kind::Tab));
        }
        Ok(Vec::new())
    }

    async fn query_within(&self, root: ElementId, selector: &str) -> Result<Vec<ElementId>> {
        let mut state = self.lock();
        state.driver_calls += 1;
        if selector != state.selectors.close_control {
            return Ok(Vec::new());
        }
        Ok(state
            .connected_of(|k| k == Kind::CloseControl)
            .into_iter()
            .filter(|id| state.nodes[&id.0].parent == Some(root.0))
            .collect())
    }

    async fn snapshot(&self, element: ElementId) -> Result<Option<ElementSnapshot>> {
        let mut state = self.lock();
        state.driver_calls += 1;
        let Some(node) = state.nodes.get(&element.0) else {
            return Ok(None);
        };
        if !node.connected {
            return Ok(None);
        }
        let (left, top, width, height) = node.rect;
        let (overflow_y, scroll_height, client_height) = match node.kind {
            Kind::Container => ("auto", 2000.0, 800.0),
            _ => ("visible", height, height),
        };
        Ok(Some(ElementSnapshot {
            left,
            top,
            width,
            height,
            display: "block".to_string(),
            visibility: "visible".to_string(),
            overflow_y: overflow_y.to_string(),
            scroll_height,
            client_height,
        }))
    }

    async fn parent(&self, element: ElementId) -> Result<Option<ElementId>> {
        let mut state = self.lock();
        state.driver_calls += 1;
        let node = state.node(element)?;
        // ROOT 就是 body
        Ok(node.parent.filter(|p| *p != ROOT).map(ElementId))
    }

    async fn attribute(&self, element: ElementId, name: &str) -> Result<Option<String>> {
        let state = self.lock();
        let node = state.node(element)?;
        Ok(match name {
            "href" => node.href.clone(),
            _ => None,
        })
    }

    async fn text_content(&self, element: ElementId) -> Result<String> {
        let state = self.lock();
        Ok(state.node(element)?.text.clone())
    }

    async fn scroll_into_view(&self, element: ElementId) -> Result<()> {
        self.lock().node(element)?;
        Ok(())
    }

    async fn focus(&self, element: ElementId) -> Result<()> {
        self.lock().node(element)?;
        Ok(())
    }

    async fn click(&self, element: ElementId) -> Result<()> {
        let mut state = self.lock();
        let node = state.node(element)?.clone();
        if !node.connected {
            return Err(BatchError::script("element detached"));
        }
        match node.kind {
            Kind::Entry(i) => state.open_entry(i),
            Kind::Document(i, k) => {
                state.events.push(Event::OpenDocument(i, k));
                if state.scenario.documents_open_tabs {
                    state.window_open(format!("https://app.example/doc/{}/{}", i, k));
                }
            }
            Kind::Tab => {
                let href = node.href.unwrap_or_default();
                state.events.push(Event::TabClicked(href.clone()));
                if state.scenario.tabs_work {
                    if let Some(path) = href.strip_prefix("https://app.example") {
                        state.scenario.path = path.to_string();
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn dispatch_click(&self, element: ElementId) -> Result<()> {
        let mut state = self.lock();
        let node = state.node(element)?.clone();
        if node.connected && node.kind == Kind::Backdrop {
            state.backdrop_clicked();
        }
        Ok(())
    }

    async fn element_from_point(&self, _x: f64, _y: f64) -> Result<Option<ElementId>> {
        let state = self.lock();
        Ok(state
            .connected_of(|k| k == Kind::Backdrop)
            .into_iter()
            .next())
    }

    async fn scroll_to_end(&self, element: ElementId) -> Result<()> {
        let mut state = self.lock();
        state.node(element)?;
        state.events.push(Event::Scrolled);
        state.loaded = (state.loaded + state.scenario.load_step).min(state.scenario.entries);
        Ok(())
    }

    async fn scrolling_root(&self) -> Result<ElementId> {
        Ok(ElementId(ROOT))
    }

    async fn set_outline(&self, element: ElementId, color: Option<&str>) -> Result<()> {
        self.lock()
            .outlines
            .push((element, color.map(str::to_string)));
        Ok(())
    }

    async fn current_path(&self) -> Result<String> {
        Ok(self.lock().scenario.path.clone())
    }

    async fn push_route(&self, path: &str) -> Result<()> {
        let mut state = self.lock();
        state.events.push(Event::PushRoute(path.to_string()));
        if state.scenario.push_route_fails {
            return Err(BatchError::script("history is locked"));
        }
        state.scenario.path = path.to_string();
        Ok(())
    }

    async fn assign_location(&self, path: &str) -> Result<()> {
        let mut state = self.lock();
        state.events.push(Event::Assign(path.to_string()));
        state.scenario.path = path.to_string();
        Ok(())
    }
}

#[async_trait]
impl TabOpenHook for FakePage {
    async fn install(&self) -> Result<InterceptionHandle> {
        let mut state = self.lock();
        if state.hooked {
            return Ok(InterceptionHandle { installed: false });
        }
        state.hooked = true;
        state.events.push(Event::HookInstalled);
        Ok(InterceptionHandle { installed: true })
    }

    async fn uninstall(&self, handle: InterceptionHandle) -> Result<()> {
        let mut state = self.lock();
        if handle.installed {
            state.hooked = false;
            state.events.push(Event::HookRemoved);
        }
        Ok(())
    }

    async fn forward_pending(&self) -> Result<usize> {
        let mut state = self.lock();
        let pending: Vec<String> = state.queue.drain(..).collect();
        let count = pending.len();
        state.forwarded.extend(pending);
        Ok(count)
    }
}

/// Records every status line and optionally presses stop after an entry.
#[derive(Default)]
pub struct RecordingStatus {
    statuses: Mutex<Vec<RunStatus>>,
    stop_after: Option<(usize, StopHandle)>,
}

impl RecordingStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stopping_after(index: usize, handle: StopHandle) -> Self {
        Self {
            statuses: Mutex::new(Vec::new()),
            stop_after: Some((index, handle)),
        }
    }

    pub fn statuses(&self) -> Vec<RunStatus> {
        self.statuses.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<RunStatus> {
        self.statuses.lock().unwrap().last().cloned()
    }
}

impl StatusSink for RecordingStatus {
    fn update(&self, status: &RunStatus) {
        self.statuses.lock().unwrap().push(status.clone());
        if let (Some((stop_index, handle)), RunStatus::ItemDone { index, .. }) =
            (&self.stop_after, status)
        {
            if index == stop_index {
                handle.request_stop();
            }
        }
    }
}

/// Fast timings, route lock on, highlight off.
pub fn settings() -> Settings {
    Settings {
        timings: doc_batch_dl::config::settings::Timings::fast(),
        debug_highlight: false,
        ..Settings::default()
    }
}
