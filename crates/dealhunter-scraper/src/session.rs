//! Rendering session manager.
//!
//! One isolated browser per request: [`SessionProvider::acquire`] walks a
//! chain of launch candidates and returns the first browser that starts;
//! [`Session::release`] tears it down. Sessions are never pooled or shared.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::Page;
use dealhunter_core::AppConfig;
use futures::StreamExt;
use serde::Deserialize;
use tokio::task::JoinHandle;

use crate::error::EngineError;
use crate::page::{ImageInfo, RenderedPage};

/// Well-known system install locations, tried in order.
pub const SYSTEM_BROWSER_PATHS: [&str; 5] = [
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/google-chrome",
    "/usr/bin/chrome",
];

/// Extra flags for containerized/headless hosts. Sandbox flags come from
/// `BrowserConfigBuilder::no_sandbox`.
const LAUNCH_FLAGS: [&str; 4] = [
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-software-rasterizer",
    "--disable-extensions",
];

/// Executable names recognised inside a browser cache directory.
const CACHED_BROWSER_NAMES: [&str; 5] = [
    "chrome",
    "chromium",
    "chromium-browser",
    "chrome-headless-shell",
    "headless_shell",
];

const CACHE_SCAN_DEPTH: usize = 5;

/// What a navigation waits for before the page is snapshotted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSignal {
    /// Load event, then resource activity quiet for a second.
    NetworkIdle,
    /// Load event only.
    Loaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Navigation {
    pub timeout: Duration,
    pub wait: LoadSignal,
}

/// A scoped browsing context. Callers must [`release`](Session::release) it
/// on every path.
pub trait Session: Send {
    /// Navigates and snapshots the rendered page.
    fn render(
        &mut self,
        url: &str,
        navigation: Navigation,
    ) -> impl Future<Output = Result<RenderedPage, EngineError>> + Send;

    fn release(self) -> impl Future<Output = ()> + Send;
}

pub trait SessionProvider: Send + Sync {
    type Session: Session;

    /// # Errors
    ///
    /// [`EngineError::SessionUnavailable`] once every launch option failed.
    fn acquire(&self) -> impl Future<Output = Result<Self::Session, EngineError>> + Send;
}

/// One entry of the launch chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchCandidate {
    Executable(PathBuf),
    /// Let the automation library discover an installed browser itself.
    LibraryDefault,
}

impl fmt::Display for LaunchCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchCandidate::Executable(path) => write!(f, "{}", path.display()),
            LaunchCandidate::LibraryDefault => write!(f, "library default"),
        }
    }
}

/// Builds the launch chain: operator override, system installs, a browser
/// found in the cache directory, then the library default. Paths that
/// `exists` rejects are left out.
pub fn launch_candidates<F>(
    override_path: Option<&Path>,
    cache_dir: Option<&Path>,
    exists: F,
) -> Vec<LaunchCandidate>
where
    F: Fn(&Path) -> bool,
{
    let mut candidates = Vec::new();
    let mut push = |path: PathBuf| {
        let candidate = LaunchCandidate::Executable(path);
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    };

    if let Some(path) = override_path {
        if exists(path) {
            push(path.to_path_buf());
        } else {
            tracing::warn!(path = %path.display(), "configured browser path does not exist");
        }
    }
    for path in SYSTEM_BROWSER_PATHS.iter().map(Path::new) {
        if exists(path) {
            push(path.to_path_buf());
        }
    }
    if let Some(found) = cache_dir.and_then(|dir| find_cached_browser(dir, CACHE_SCAN_DEPTH)) {
        push(found);
    }
    candidates.push(LaunchCandidate::LibraryDefault);
    candidates
}

/// Depth-limited search for a browser executable under `dir`.
#[must_use]
pub fn find_cached_browser(dir: &Path, depth: usize) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut subdirs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            subdirs.push(path);
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| CACHED_BROWSER_NAMES.contains(&name))
        {
            return Some(path);
        }
    }
    if depth == 0 {
        return None;
    }
    subdirs.sort();
    subdirs
        .iter()
        .find_map(|sub| find_cached_browser(sub, depth - 1))
}

#[derive(Debug, Clone)]
pub struct ChromiumSettings {
    pub browser_path: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub user_agent: String,
    pub settle_delay: Duration,
}

impl ChromiumSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            browser_path: config.browser_path.clone(),
            cache_dir: config.browser_cache_dir.clone(),
            user_agent: config.user_agent.clone(),
            settle_delay: Duration::from_millis(config.settle_delay_ms),
        }
    }
}

/// Launches a fresh headless Chromium per session.
#[derive(Debug, Clone)]
pub struct ChromiumProvider {
    settings: ChromiumSettings,
}

impl ChromiumProvider {
    #[must_use]
    pub fn new(settings: ChromiumSettings) -> Self {
        Self { settings }
    }

    async fn launch(&self, candidate: &LaunchCandidate) -> Result<ChromiumSession, String> {
        let profile_dir = ProfileDir::fresh();

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .args(LAUNCH_FLAGS)
            .user_data_dir(profile_dir.path());
        if let LaunchCandidate::Executable(path) = candidate {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build()?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| e.to_string())?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match open_page(&browser, &self.settings.user_agent).await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler_task.abort();
                return Err(e);
            }
        };

        Ok(ChromiumSession {
            browser,
            page,
            handler_task,
            settle_delay: self.settings.settle_delay,
            profile_dir,
        })
    }
}

async fn open_page(browser: &Browser, user_agent: &str) -> Result<Page, String> {
    let page = browser
        .new_page("about:blank")
        .await
        .map_err(|e| e.to_string())?;
    page.set_user_agent(SetUserAgentOverrideParams::new(user_agent))
        .await
        .map_err(|e| e.to_string())?;
    Ok(page)
}

impl SessionProvider for ChromiumProvider {
    type Session = ChromiumSession;

    async fn acquire(&self) -> Result<ChromiumSession, EngineError> {
        if let Some(dir) = &self.settings.cache_dir {
            if let Err(e) = tokio::fs::create_dir_all(dir).await {
                tracing::warn!(path = %dir.display(), error = %e, "could not create browser cache directory");
            }
        }

        let candidates = launch_candidates(
            self.settings.browser_path.as_deref(),
            self.settings.cache_dir.as_deref(),
            Path::exists,
        );

        let mut failures = Vec::with_capacity(candidates.len());
        for (attempt, candidate) in candidates.iter().enumerate() {
            match self.launch(candidate).await {
                Ok(session) => {
                    tracing::info!(browser = %candidate, attempt, "browser session acquired");
                    return Ok(session);
                }
                Err(reason) => {
                    tracing::warn!(browser = %candidate, attempt, error = %reason, "browser launch failed");
                    failures.push(format!("{candidate}: {reason}"));
                }
            }
        }

        Err(EngineError::SessionUnavailable {
            reason: failures.join("; "),
        })
    }
}

/// What the snapshot script returns.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot {
    url: String,
    html: String,
    body_text: String,
    images: Vec<ImageInfo>,
}

const SNAPSHOT_SCRIPT: &str = r"(() => ({
    url: window.location.href,
    html: document.documentElement.outerHTML,
    bodyText: document.body ? document.body.innerText : '',
    images: Array.from(document.images).map(img => ({
        src: img.currentSrc || img.src || '',
        alt: img.alt || '',
        width: img.width || 0,
        height: img.height || 0
    }))
}))()";

/// Temporary browser user-data directory, removed when dropped. Covers
/// sessions whose request was cancelled before `release` ran.
#[derive(Debug)]
struct ProfileDir(PathBuf);

impl ProfileDir {
    fn fresh() -> Self {
        Self(std::env::temp_dir().join(format!(
            "dealhunter-profile-{:016x}",
            rand::random::<u64>()
        )))
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for ProfileDir {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.0) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::debug!(path = %self.0.display(), error = %e, "profile cleanup failed");
            }
        }
    }
}

pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    settle_delay: Duration,
    profile_dir: ProfileDir,
}

/// Extra time the idle probe gets past its own budget before the Rust side
/// stops waiting for the script.
const IDLE_PROBE_GRACE: Duration = Duration::from_millis(500);

impl ChromiumSession {
    async fn goto(&self, url: &str) -> Result<(), EngineError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| EngineError::NavigationFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

/// Budget left for the idle wait once navigation took `elapsed`.
fn idle_budget(timeout: Duration, elapsed: Duration) -> Duration {
    timeout.saturating_sub(elapsed)
}

/// Page script resolving once no new resource entries have been observed
/// for a second, or when `budget` runs out. Entries are counted through a
/// `PerformanceObserver`, which is not capped by the resource timing buffer.
fn network_idle_script(budget: Duration) -> String {
    let budget_ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX);
    format!(
        r"(async () => {{
            const budgetMs = {budget_ms};
            const idleMs = 1000;
            const interval = 250;
            const start = Date.now();
            let seen = 0;
            let observer = null;
            try {{
                performance.setResourceTimingBufferSize(100000);
                observer = new PerformanceObserver(list => {{ seen += list.getEntries().length; }});
                observer.observe({{ type: 'resource', buffered: true }});
            }} catch (_) {{
                observer = null;
            }}
            const count = () => {{
                if (observer) return seen;
                try {{ return performance.getEntriesByType('resource').length; }} catch (_) {{ return 0; }}
            }};
            let last = count();
            let stable = 0;
            let idle = false;
            while (Date.now() - start < budgetMs) {{
                await new Promise(r => setTimeout(r, Math.min(interval, Math.max(0, budgetMs - (Date.now() - start)))));
                const current = count();
                if (document.readyState === 'complete' && current === last) {{
                    stable += interval;
                    if (stable >= idleMs) {{ idle = true; break; }}
                }} else {{
                    stable = 0;
                }}
                last = current;
            }}
            if (observer) observer.disconnect();
            return {{ idle, waitedMs: Date.now() - start }};
        }})()"
    )
}

/// Waits for network quiet within `budget`. Never fails; running out of
/// budget only means the page kept busy.
async fn wait_for_network_idle(page: &Page, budget: Duration) {
    if budget.is_zero() {
        tracing::debug!("no budget left for network-idle wait");
        return;
    }
    let probe = page.evaluate(network_idle_script(budget));
    match tokio::time::timeout(budget + IDLE_PROBE_GRACE, probe).await {
        Ok(Ok(value)) => {
            if let Ok(info) = value.into_value::<serde_json::Value>() {
                tracing::debug!(
                    idle = info.get("idle").and_then(serde_json::Value::as_bool).unwrap_or(false),
                    waited_ms = info.get("waitedMs").and_then(serde_json::Value::as_u64).unwrap_or(0),
                    "network-idle wait finished"
                );
            }
        }
        Ok(Err(e)) => tracing::debug!(error = %e, "network-idle wait failed"),
        Err(_) => tracing::debug!(budget_ms = budget.as_millis(), "network-idle wait ran out of budget"),
    }
}

impl Session for ChromiumSession {
    async fn render(&mut self, url: &str, navigation: Navigation) -> Result<RenderedPage, EngineError> {
        let started = Instant::now();
        tokio::time::timeout(navigation.timeout, self.goto(url))
            .await
            .map_err(|_| EngineError::NavigationTimeout {
                url: url.to_string(),
                timeout_secs: navigation.timeout.as_secs(),
            })??;
        if navigation.wait == LoadSignal::NetworkIdle {
            let budget = idle_budget(navigation.timeout, started.elapsed());
            wait_for_network_idle(&self.page, budget).await;
        }

        tokio::time::sleep(self.settle_delay).await;

        let snapshot_failed = |e: &dyn std::fmt::Display| EngineError::NavigationFailed {
            url: url.to_string(),
            reason: format!("page snapshot failed: {e}"),
        };
        let snapshot: Snapshot = self
            .page
            .evaluate(SNAPSHOT_SCRIPT)
            .await
            .map_err(|e| snapshot_failed(&e))?
            .into_value()
            .map_err(|e| snapshot_failed(&e))?;

        tracing::info!(url, final_url = %snapshot.url, "page rendered");
        Ok(RenderedPage {
            url: snapshot.url,
            html: snapshot.html,
            images: Some(snapshot.images),
            body_text: Some(snapshot.body_text),
        })
    }

    async fn release(mut self) {
        if let Err(e) = self.page.close().await {
            tracing::debug!(error = %e, "page close failed");
        }
        if let Err(e) = self.browser.close().await {
            tracing::warn!(error = %e, "browser close failed");
        }
        if let Err(e) = self.browser.wait().await {
            tracing::debug!(error = %e, "browser wait failed");
        }
        self.handler_task.abort();
        drop(self.profile_dir);
        tracing::info!("browser session released");
    }
}
