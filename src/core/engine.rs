use crate::config::settings::{Route, Settings};
use crate::core::documents::DocumentActivator;
use crate::core::list::ListProvider;
use crate::core::navigation::RouteGuard;
use crate::core::overlay::{OpenOutcome, OverlayController};
use crate::core::probe;
use crate::domain::model::{
    ElementId, ItemOutcome, ItemReport, ResolvedRange, RunOutcome, RunRange, RunReport, RunStatus,
};
use crate::domain::ports::{InterceptionHandle, PageDriver, StatusSink, TabOpenHook};
use crate::utils::error::{BatchError, Result};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::Instrument;

#[derive(Debug, Default)]
struct RunFlags {
    running: AtomicBool,
    stop: AtomicBool,
}

/// Lets another task ask a run to end after its current entry.
#[derive(Debug, Clone)]
pub struct StopHandle {
    flags: Arc<RunFlags>,
}

impl StopHandle {
    pub fn request_stop(&self) {
        self.flags.stop.store(true, Ordering::SeqCst);
        tracing::info!("🛑 Stop requested");
    }

    pub fn stop_requested(&self) -> bool {
        self.flags.stop.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.flags.running.load(Ordering::SeqCst)
    }
}

/// Clears the running flag however the run ends.
struct RunningGuard<'a> {
    flags: &'a RunFlags,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.flags.running.store(false, Ordering::SeqCst);
    }
}

/// Hands the tab-open interception back even when the run future is dropped.
///
/// The normal path takes the handle out and uninstalls it inline; a cancelled
/// run leaves it here and `Drop` spawns the uninstall on the current runtime.
struct InterceptionGuard<H: TabOpenHook + Clone + 'static> {
    armed: Option<(H, InterceptionHandle)>,
}

impl<H: TabOpenHook + Clone + 'static> InterceptionGuard<H> {
    fn new(hook: &H, handle: Option<InterceptionHandle>) -> Self {
        Self {
            armed: handle.map(|handle| (hook.clone(), handle)),
        }
    }

    fn take(&mut self) -> Option<InterceptionHandle> {
        self.armed.take().map(|(_, handle)| handle)
    }
}

impl<H: TabOpenHook + Clone + 'static> Drop for InterceptionGuard<H> {
    fn drop(&mut self) {
        let Some((hook, handle)) = self.armed.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                tracing::warn!("run cancelled, removing tab-open interception");
                runtime.spawn(async move {
                    if let Err(e) = hook.uninstall(handle).await {
                        tracing::warn!("tab-open interception not removed: {}", e);
                    }
                });
            }
            Err(_) => tracing::error!("run cancelled outside a runtime, window.open stays hooked"),
        }
    }
}

/// Loop result before timestamps and route are attached.
struct LoopResult {
    range: Option<ResolvedRange>,
    outcome: RunOutcome,
    items: Vec<ItemReport>,
    tabs_forwarded: usize,
}

impl LoopResult {
    fn early(outcome: RunOutcome) -> Self {
        Self {
            range: None,
            outcome,
            items: Vec::new(),
            tabs_forwarded: 0,
        }
    }
}

/// Drives the whole batch: route lock, list walk, overlay open/close, documents.
pub struct BatchEngine<D: PageDriver, H: TabOpenHook> {
    driver: D,
    hook: H,
    flags: Arc<RunFlags>,
}

impl<D: PageDriver, H: TabOpenHook + Clone + 'static> BatchEngine<D, H> {
    pub fn new(driver: D, hook: H) -> Self {
        Self {
            driver,
            hook,
            flags: Arc::new(RunFlags::default()),
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn hook(&self) -> &H {
        &self.hook
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            flags: self.flags.clone(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.flags.running.load(Ordering::SeqCst)
    }

    /// Process `range` of the list.
    ///
    /// An empty list or an inverted range is reported through the status line
    /// and the returned report, not as an error. The tab-open interception is
    /// removed again on every way out of this function, including when the
    /// returned future is dropped before it completes.
    pub async fn run(
        &self,
        range: RunRange,
        settings: &Settings,
        status: &dyn StatusSink,
    ) -> Result<RunReport> {
        if self
            .flags
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(BatchError::AlreadyRunning);
        }
        let _running = RunningGuard { flags: &self.flags };
        self.flags.stop.store(false, Ordering::SeqCst);
        let started_at = Utc::now();

        let current = self.driver.current_path().await?;
        let desired = settings
            .routes
            .desired_for(&current)
            .cloned()
            .ok_or_else(|| BatchError::ConfigError {
                message: "no routes configured".to_string(),
            })?;
        tracing::info!("🔒 Locking route to {}", desired.path);

        let installed = match self.hook.install().await {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!("tab-open interception not installed: {}", e);
                None
            }
        };
        let mut interception = InterceptionGuard::new(&self.hook, installed);

        let result = self
            .run_loop(range, settings, &desired, status)
            .instrument(tracing::info_span!("run", route = %desired.path))
            .await;

        let mut flushed = 0;
        if let Some(handle) = interception.take() {
            flushed = self.forward_tabs().await;
            if let Err(e) = self.hook.uninstall(handle).await {
                tracing::warn!("tab-open interception not removed: {}", e);
            }
        }

        let result = result?;
        Ok(RunReport {
            desired_route: desired.path,
            range: result.range,
            outcome: result.outcome,
            items: result.items,
            tabs_forwarded: result.tabs_forwarded + flushed,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn forward_tabs(&self) -> usize {
        match self.hook.forward_pending().await {
            Ok(count) => {
                if count > 0 {
                    tracing::info!("🗂️ {} document tab(s) opened in background", count);
                }
                count
            }
            Err(e) => {
                tracing::warn!("forwarding captured tabs failed: {}", e);
                0
            }
        }
    }

    async fn run_loop(
        &self,
        range: RunRange,
        settings: &Settings,
        desired: &Route,
        status: &dyn StatusSink,
    ) -> Result<LoopResult> {
        let guard = RouteGuard::new(&self.driver, settings);
        let list = ListProvider::new(&self.driver, settings);

        status.update(&RunStatus::Searching);
        guard.ensure_active_route(desired).await;

        let mut container = list.find_scroll_container().await.ok();
        if settings.auto_load {
            list.auto_load_more(container).await;
        }

        let entries = list.list_entries().await?;
        tracing::info!("{} list entries", entries.len());
        if entries.is_empty() {
            status.update(&RunStatus::NoEntries);
            return Ok(LoopResult::early(RunOutcome::NoEntries));
        }

        let resolved = match range.resolve(entries.len()) {
            Ok(resolved) => resolved,
            Err((start, end)) => {
                tracing::warn!("Invalid range {} > {}", start, end);
                status.update(&RunStatus::InvalidRange { start, end });
                return Ok(LoopResult::early(RunOutcome::InvalidRange { start, end }));
            }
        };
        tracing::info!("Range {}..={}", resolved.start, resolved.end);

        let mut items = Vec::with_capacity(resolved.count());
        let mut tabs_forwarded = 0;

        for index in resolved.indices() {
            if self.flags.stop.load(Ordering::SeqCst) {
                break;
            }

            let outcome = self
                .process_entry(index, resolved.end, settings, desired, &mut container, status)
                .instrument(tracing::info_span!("entry", index))
                .await?;
            if let ItemOutcome::Processed { .. } = outcome {
                tabs_forwarded += self.forward_tabs().await;
            }
            items.push(ItemReport { index, outcome });
        }

        let outcome = if self.flags.stop.load(Ordering::SeqCst) {
            status.update(&RunStatus::Stopped);
            RunOutcome::Stopped
        } else {
            status.update(&RunStatus::Completed);
            RunOutcome::Completed
        };
        tracing::info!("Run finished: {:?}", outcome);

        Ok(LoopResult {
            range: Some(resolved),
            outcome,
            items,
            tabs_forwarded,
        })
    }

    async fn process_entry(
        &self,
        index: usize,
        end: usize,
        settings: &Settings,
        desired: &Route,
        container: &mut Option<ElementId>,
        status: &dyn StatusSink,
    ) -> Result<ItemOutcome> {
        let guard = RouteGuard::new(&self.driver, settings);
        let list = ListProvider::new(&self.driver, settings);
        let overlays = OverlayController::new(&self.driver, settings);
        let documents = DocumentActivator::new(&self.driver, settings);
        let timings = &settings.timings;

        guard.ensure_active_route(desired).await;

        let mut entries = list.list_entries().await?;
        if index >= entries.len() && settings.auto_load && container.is_some() {
            list.auto_load_more(*container).await;
            entries = list.list_entries().await?;
        }
        let Some(entry) = entries.get(index).copied() else {
            tracing::info!("({}/{}) entry not loaded, skipping", index, end);
            return Ok(ItemOutcome::NotLoaded);
        };

        status.update(&RunStatus::Opening { index, end });
        let overlay = match overlays.open(entry).await {
            OpenOutcome::Open(overlay) => overlay,
            OpenOutcome::Absent => {
                status.update(&RunStatus::NoOverlay { index, end });
                return Ok(ItemOutcome::NoOverlay);
            }
        };
        if !probe::is_visible(&self.driver, Some(overlay)).await {
            status.update(&RunStatus::NoOverlay { index, end });
            return Ok(ItemOutcome::NoOverlay);
        }

        status.update(&RunStatus::OpeningDocuments { index, end });
        let count = documents.activate_all_documents().await;
        if count == 0 {
            tracing::info!("no documents attached");
        }

        status.update(&RunStatus::Closing { index, end });
        let closed = overlays.close().await.is_closed();

        guard.ensure_active_route(desired).await;
        *container = list.find_scroll_container().await.ok();

        sleep(timings.after_each_item_pace).await;
        status.update(&RunStatus::ItemDone {
            index,
            end,
            documents: count,
        });
        sleep(timings.wait_after_close_overlay).await;

        Ok(ItemOutcome::Processed {
            documents: count,
            closed,
        })
    }
}
