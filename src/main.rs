use anyhow::Context;
use clap::Parser;
use doc_batch_dl::config::RunChoice;
use doc_batch_dl::core::list::ListProvider;
use doc_batch_dl::domain::model::{ItemOutcome, RunOutcome};
use doc_batch_dl::utils::error::ErrorSeverity;
use doc_batch_dl::utils::{logger, validation::Validate};
use doc_batch_dl::{
    BatchConfig, BatchEngine, BatchError, CdpSession, CliConfig, ConsoleStatus, LocalPreferences,
    PageDriver, PreferenceStore, RunRange, RunReport, RunStatus, Settings, StatusSink, TabOpenHook,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_log {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("🚀 Starting doc-batch-dl");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(e) = cli.validate() {
        fail(&e);
    }

    // 載入 TOML 配置（可省略）
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("📁 Loading configuration from: {}", path);
            match BatchConfig::from_file(path) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("❌ Failed to load config file '{}': {}", path, e);
                    eprintln!("💡 Make sure the file exists and is valid TOML format");
                    std::process::exit(1);
                }
            }
        }
        None => BatchConfig::default(),
    };
    cli.apply_to(&mut config);

    if let Err(e) = config.validate() {
        fail(&e);
    }

    let store = LocalPreferences::new(&cli.prefs);
    let stored = match store.load().await {
        Ok(stored) => stored,
        Err(e) => {
            tracing::warn!("Preferences not loaded: {}", e);
            None
        }
    };

    let choice = cli.resolve(&config, stored.as_ref());
    let settings = config.settings(choice.speed, choice.auto_load);
    display_summary(&config, &cli, &choice);

    let session = match CdpSession::connect(&config.browser.endpoint, &config.browser.page_match)
        .await
    {
        Ok(session) => session,
        Err(e) => fail(&e),
    };
    let engine = BatchEngine::new(session.page(), session.tab_hook());

    let current = engine
        .driver()
        .current_path()
        .await
        .context("reading the current location")?;
    if !settings.routes.is_eligible(&current) {
        let paths: Vec<&str> = settings.routes.routes().iter().map(|r| r.path.as_str()).collect();
        tracing::warn!(
            "⚠️ {} is not one of {}, the route guard will navigate away",
            current,
            paths.join(", ")
        );
    }

    if cli.dry_run {
        tracing::info!("🔍 DRY RUN MODE - nothing will be clicked");
        perform_dry_run(&engine, &settings, &current, choice.range).await;
        return Ok(());
    }

    if let Err(e) = store.save(&choice.to_preferences()).await {
        tracing::warn!("Preferences not saved: {}", e);
    }

    let status = Arc::new(ConsoleStatus::new());

    // Ctrl-C 當作停止按鈕：目前這一筆處理完才結束
    let stop = engine.stop_handle();
    let stop_status = status.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.request_stop();
            stop_status.update(&RunStatus::StopRequested);
        }
    });

    match engine.run(choice.range, &settings, status.as_ref()).await {
        Ok(report) => {
            display_report(&report);
            if cli.json_log {
                tracing::info!(report = %serde_json::to_string(&report)?, "run report");
            }
        }
        Err(e) => fail(&e),
    }

    Ok(())
}

fn fail(e: &BatchError) -> ! {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}

fn display_summary(config: &BatchConfig, cli: &CliConfig, choice: &RunChoice) {
    println!("📋 Configuration Summary:");
    println!("  Browser: {}", config.browser.endpoint);
    println!("  Page match: {}", config.browser.page_match);
    println!("  Range: {}..{}", choice.range.start, choice.range.end);
    println!("  Speed: {:?}", choice.speed);
    println!("  Auto-load: {}", choice.auto_load);
    println!("  Route lock: {}", config.behavior.lock_route);
    println!("  Highlight: {}", config.behavior.debug_highlight);
    println!("  Preferences: {}", cli.prefs);
    if cli.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }
    println!();
}

async fn perform_dry_run<D, H>(
    engine: &BatchEngine<D, H>,
    settings: &Settings,
    current: &str,
    range: RunRange,
) where
    D: PageDriver,
    H: TabOpenHook + Clone + 'static,
{
    println!("🔍 Dry Run Analysis:");
    println!("  Current path: {}", current);
    if let Some(route) = settings.routes.desired_for(current) {
        println!("  Locked route: {} ({})", route.path, route.label);
    }

    let list = ListProvider::new(engine.driver(), settings);
    match list.list_entries().await {
        Ok(entries) => {
            println!("  Entries loaded: {}", entries.len());
            match range.resolve(entries.len()) {
                Ok(resolved) => println!(
                    "  Would process: {}..={} ({} entries)",
                    resolved.start,
                    resolved.end,
                    resolved.count()
                ),
                Err((start, end)) => println!("  {}", RunStatus::InvalidRange { start, end }),
            }
        }
        Err(e) => println!("  Entries could not be read: {}", e),
    }
}

fn display_report(report: &RunReport) {
    println!();
    println!("📊 Run Report:");
    println!("  Route: {}", report.desired_route);
    let outcome = match &report.outcome {
        RunOutcome::Completed => "completed".to_string(),
        RunOutcome::Stopped => "stopped".to_string(),
        RunOutcome::InvalidRange { start, end } => format!("invalid range ({} > {})", start, end),
        RunOutcome::NoEntries => "no entries".to_string(),
    };
    println!("  Outcome: {}", outcome);
    println!("  Entries visited: {}", report.items.len());
    println!("  Documents opened: {}", report.documents_total());
    println!("  Background tabs: {}", report.tabs_forwarded);
    for item in report.skipped() {
        let reason = match item.outcome {
            ItemOutcome::NotLoaded => "not loaded",
            ItemOutcome::NoOverlay => "no overlay",
            ItemOutcome::Processed { .. } => continue,
        };
        println!("  ⏭️ #{} skipped: {}", item.index, reason);
    }
    let stuck = report
        .items
        .iter()
        .filter(|item| matches!(item.outcome, ItemOutcome::Processed { closed: false, .. }))
        .count();
    if stuck > 0 {
        println!("  ⚠️ {} overlay(s) did not close", stuck);
    }
    let elapsed = report.finished_at - report.started_at;
    println!("  Duration: {}s", elapsed.num_seconds());
}
