//! DHD エクスポート実装
//!
//! ログイン → エクスポート画面 → フィルター入力 → ダウンロード を1ジョブで行う。
//! ジョブごとに専用のブラウザ・ユーザーデータ・ステージングディレクトリを使う。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    DownloadProgressState, EventDownloadProgress, EventDownloadWillBegin,
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::listeners::EventStream;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ExporterConfig;
use crate::error::ExportError;
use crate::traits::Scraper;

use super::storage;
use super::types::{DateRange, SiteConfig};

/// 要素・URLの待機間隔（ミリ秒）
const POLL_INTERVAL_MS: u64 = 250;

/// Chromeがステージングに保存したファイル
#[derive(Debug, Clone)]
struct StagedDownload {
    path: PathBuf,
    suggested_filename: String,
}

/// DHD エクスポーター
pub struct DhdExporter {
    job_id: Uuid,
    config: ExporterConfig,
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
    page: Option<Arc<Page>>,
    user_data_dir: PathBuf,
    staging_dir: PathBuf,
}

impl DhdExporter {
    pub fn new(job_id: Uuid, config: ExporterConfig) -> Self {
        let user_data_dir = std::env::temp_dir().join(format!("dhd-export-{}", job_id));
        let staging_dir = storage::staging_dir(&config.download_path, job_id);
        Self {
            job_id,
            config,
            browser: None,
            handler: None,
            page: None,
            user_data_dir,
            staging_dir,
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    fn get_page(&self) -> Result<&Arc<Page>, ExportError> {
        self.page
            .as_ref()
            .ok_or_else(|| ExportError::BrowserInit("Browser not initialized".into()))
    }

    async fn open(&self, page: &Page, url: &str) -> Result<(), ExportError> {
        debug!(job_id = %self.job_id, "Opening {}", url);
        page.goto(url)
            .await
            .map_err(|e| navigation_error(url, e))?;
        Ok(())
    }

    async fn current_url(&self, page: &Page) -> Result<String, ExportError> {
        let url = page
            .url()
            .await
            .map_err(|e| ExportError::JavaScript(format!("reading current url: {}", e)))?;
        Ok(url.unwrap_or_default())
    }

    /// セレクタに一致する要素が現れるまで待機
    async fn wait_for_element(
        &self,
        page: &Page,
        selector: &str,
        label: &str,
    ) -> Result<(), ExportError> {
        let deadline = Instant::now() + self.config.timeout;
        loop {
            if page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ExportError::ElementNotFound(format!(
                    "{} ({}) not present after {:?}",
                    label, selector, self.config.timeout
                )));
            }
            sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
    }

    /// ログイン後のリダイレクトを待機
    ///
    /// タイムアウト時にまだログイン画面にいれば認証失敗とみなす。
    async fn wait_for_home(&self, page: &Page) -> Result<(), ExportError> {
        let site = &self.config.site;
        let deadline = Instant::now() + self.config.timeout;

        let last_url = loop {
            let url = self.current_url(page).await?;
            if same_page(&url, &site.home_url) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                break url;
            }
            sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        };

        Err(login_failure(&last_url, site, self.config.timeout))
    }

    async fn type_into(
        &self,
        page: &Page,
        selector: &str,
        value: &str,
        label: &str,
    ) -> Result<(), ExportError> {
        self.wait_for_element(page, selector, label).await?;
        page.find_element(selector)
            .await
            .map_err(|e| ExportError::ElementNotFound(format!("{}: {}", label, e)))?
            .click()
            .await
            .map_err(|e| ExportError::JavaScript(format!("focusing {}: {}", label, e)))?
            .type_str(value)
            .await
            .map_err(|e| ExportError::JavaScript(format!("typing into {}: {}", label, e)))?;
        debug!(job_id = %self.job_id, "{} entered", label);
        Ok(())
    }

    /// input/select の値をJavaScriptで設定し input/change イベントを発火
    async fn set_value(
        &self,
        page: &Page,
        selector: &str,
        value: &str,
        label: &str,
    ) -> Result<(), ExportError> {
        self.wait_for_element(page, selector, label).await?;

        let script = set_value_script(selector, value);
        let status: String = page
            .evaluate(script.as_str())
            .await
            .map_err(|e| ExportError::JavaScript(format!("{}: {}", label, e)))?
            .into_value()
            .map_err(|e| ExportError::JavaScript(format!("{}: {}", label, e)))?;

        match status.as_str() {
            "ok" => {
                debug!(job_id = %self.job_id, "{} set to {}", label, value);
                Ok(())
            }
            "missing-option" => Err(ExportError::ElementNotFound(format!(
                "{}: option {:?} not available in {}",
                label, value, selector
            ))),
            _ => Err(ExportError::ElementNotFound(format!(
                "{} ({})",
                label, selector
            ))),
        }
    }

    async fn click(&self, page: &Page, selector: &str, label: &str) -> Result<(), ExportError> {
        self.wait_for_element(page, selector, label).await?;
        page.find_element(selector)
            .await
            .map_err(|e| ExportError::ElementNotFound(format!("{}: {}", label, e)))?
            .click()
            .await
            .map_err(|e| ExportError::Navigation(format!("clicking {}: {}", label, e)))?;
        debug!(job_id = %self.job_id, "{} clicked", label);
        Ok(())
    }

    /// downloadWillBegin → downloadProgress(completed) を待機
    async fn wait_for_download(
        &self,
        will_begin: &mut EventStream<EventDownloadWillBegin>,
        progress: &mut EventStream<EventDownloadProgress>,
    ) -> Result<StagedDownload, ExportError> {
        let timeout = self.config.timeout;
        let deadline = Instant::now() + timeout;

        let begin = timeout_at(deadline, will_begin.next())
            .await
            .map_err(|_| {
                ExportError::Download(format!("no download was triggered within {:?}", timeout))
            })?
            .ok_or_else(|| ExportError::Download("download event stream closed".into()))?;
        info!(
            job_id = %self.job_id,
            "Download started: {} ({})", begin.suggested_filename, begin.url
        );

        loop {
            let event = timeout_at(deadline, progress.next())
                .await
                .map_err(|_| {
                    ExportError::Download(format!(
                        "{} did not finish within {:?}",
                        begin.suggested_filename, timeout
                    ))
                })?
                .ok_or_else(|| ExportError::Download("download event stream closed".into()))?;

            let step = download_step(
                &begin.guid,
                &event.guid,
                &event.state,
                &begin.suggested_filename,
            )?;
            match step {
                DownloadStep::Completed => break,
                DownloadStep::InProgress => {
                    debug!(
                        job_id = %self.job_id,
                        "Downloading... {}/{} bytes", event.received_bytes, event.total_bytes
                    );
                }
                DownloadStep::Ignored => {}
            }
        }

        Ok(StagedDownload {
            path: self.staging_dir.join(&begin.guid),
            suggested_filename: begin.suggested_filename.clone(),
        })
    }

    fn release_dirs(&self) {
        storage::remove_dir_quietly(&self.staging_dir);
        storage::remove_dir_quietly(&self.user_data_dir);
    }
}

#[async_trait]
impl Scraper for DhdExporter {
    async fn initialize(&mut self) -> Result<(), ExportError> {
        info!(job_id = %self.job_id, "Initializing browser...");

        // ダウンロードディレクトリ（とステージング）を作成
        std::fs::create_dir_all(&self.staging_dir)?;
        let staging = self
            .staging_dir
            .canonicalize()
            .unwrap_or_else(|_| self.staging_dir.clone());

        let mut builder = BrowserConfig::builder()
            .user_data_dir(&self.user_data_dir)
            .window_size(1280, 800)
            .request_timeout(self.config.timeout)
            .no_sandbox()
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");

        if let Some(chrome) = &self.config.chrome_executable {
            builder = builder.chrome_executable(chrome);
        }
        if !self.config.headless {
            builder = builder.with_head();
        }
        if self.config.debug {
            builder = builder.arg("--enable-logging=stderr").arg("--v=1");
        }

        let browser_config = builder.build().map_err(ExportError::BrowserInit)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ExportError::BrowserInit(e.to_string()))?;

        // ブラウザイベントハンドラをバックグラウンドで実行
        let job_id = self.job_id;
        self.handler = Some(tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                debug!(%job_id, "Browser event: {:?}", event);
            }
        }));

        // 以降で失敗してもcloseで確実に解放できるよう先に保持する
        let browser = self.browser.insert(browser);

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ExportError::BrowserInit(e.to_string()))?;

        // ダウンロードはGUID名でステージングに保存させる
        let download_params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::AllowAndName)
            .download_path(staging.to_string_lossy().to_string())
            .events_enabled(true)
            .build()
            .map_err(|e| ExportError::BrowserInit(format!("download behavior: {}", e)))?;

        page.execute(download_params)
            .await
            .map_err(|e| ExportError::BrowserInit(format!("download behavior: {}", e)))?;

        self.page = Some(Arc::new(page));

        info!(job_id = %self.job_id, "Browser initialized");
        Ok(())
    }

    async fn login(&mut self) -> Result<(), ExportError> {
        let page = self.get_page()?.clone();
        let site = &self.config.site;
        info!(job_id = %self.job_id, "Starting login as {}", self.config.email);

        self.open(&page, &site.login_url).await?;

        self.type_into(&page, &site.selectors.email, &self.config.email, "email field")
            .await?;
        self.type_into(
            &page,
            &site.selectors.password,
            &self.config.password,
            "password field",
        )
        .await?;
        self.click(&page, &site.selectors.login_submit, "login button")
            .await?;

        self.wait_for_home(&page).await?;

        info!(job_id = %self.job_id, "Login completed");
        Ok(())
    }

    async fn download(&mut self) -> Result<PathBuf, ExportError> {
        let page = self.get_page()?.clone();
        let site = &self.config.site;
        let selectors = &site.selectors;
        info!(job_id = %self.job_id, "Opening export page...");

        self.open(&page, &site.export_url).await?;

        self.set_value(
            &page,
            &selectors.current_state,
            &site.filters.current_state,
            "state filter",
        )
        .await?;
        self.set_value(
            &page,
            &selectors.operation,
            &site.filters.operation,
            "operation filter",
        )
        .await?;

        let range = DateRange::through_today(site.start_date, self.config.clock.as_ref());
        self.set_value(&page, &selectors.date_start, &range.start_value(), "start date")
            .await?;
        self.set_value(&page, &selectors.date_end, &range.end_value(), "end date")
            .await?;
        info!(
            job_id = %self.job_id,
            "Export filters set: {} .. {}", range.start_value(), range.end_value()
        );

        // クリック前に購読しておく
        let mut will_begin = page
            .event_listener::<EventDownloadWillBegin>()
            .await
            .map_err(|e| ExportError::Download(format!("download listener: {}", e)))?;
        let mut progress = page
            .event_listener::<EventDownloadProgress>()
            .await
            .map_err(|e| ExportError::Download(format!("download listener: {}", e)))?;

        self.click(&page, &selectors.export_submit, "export button")
            .await?;

        let staged = self.wait_for_download(&mut will_begin, &mut progress).await?;
        let saved = storage::store_download(
            &staged.path,
            &self.config.download_path,
            &staged.suggested_filename,
            self.job_id,
        )?;

        info!(job_id = %self.job_id, "Export downloaded: {:?}", saved);
        Ok(saved)
    }

    async fn close(&mut self) -> Result<(), ExportError> {
        info!(job_id = %self.job_id, "Closing browser...");

        self.page = None;
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                debug!(job_id = %self.job_id, "Browser close failed: {}", e);
            }
            if let Err(e) = browser.wait().await {
                debug!(job_id = %self.job_id, "Browser wait failed: {}", e);
            }
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        self.release_dirs();

        info!(job_id = %self.job_id, "Browser closed");
        Ok(())
    }

    async fn on_error(&mut self, error: &ExportError) {
        let Some(page) = self.page.clone() else {
            warn!(job_id = %self.job_id, "Export failed before a page was opened: {}", error);
            return;
        };

        let url = self.current_url(&page).await.unwrap_or_default();
        warn!(job_id = %self.job_id, "Export failed at {}: {}", url, error);

        // デバッグスクリーンショット
        if self.config.debug {
            if let Ok(screenshot) = page
                .screenshot(ScreenshotParams::builder().full_page(true).build())
                .await
            {
                let encoded = base64::engine::general_purpose::STANDARD.encode(&screenshot);
                debug!(
                    job_id = %self.job_id,
                    "Failure screenshot: data:image/png;base64,{}", encoded
                );
            }
        }
    }
}

impl Drop for DhdExporter {
    fn drop(&mut self) {
        // closeを経ずに破棄された場合。Browser の Drop が子プロセスを kill する
        if self.browser.take().is_some() {
            if let Some(handler) = self.handler.take() {
                handler.abort();
            }
            self.release_dirs();
        }
    }
}

/// ログイン後の待機がタイムアウトしたときの分類
///
/// ログイン画面に留まっていれば認証失敗、それ以外はナビゲーションのタイムアウト。
fn login_failure(last_url: &str, site: &SiteConfig, timeout: Duration) -> ExportError {
    if same_page(last_url, &site.login_url) {
        ExportError::Auth(format!(
            "still on {} after submitting credentials",
            last_url
        ))
    } else {
        ExportError::NavigationTimeout(format!(
            "expected {} within {:?}, current page is {}",
            site.home_url, timeout, last_url
        ))
    }
}

/// 進捗イベント1件の判定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DownloadStep {
    /// 別のダウンロードのイベント
    Ignored,
    InProgress,
    Completed,
}

fn download_step(
    begin_guid: &str,
    event_guid: &str,
    state: &DownloadProgressState,
    suggested_filename: &str,
) -> Result<DownloadStep, ExportError> {
    if event_guid != begin_guid {
        return Ok(DownloadStep::Ignored);
    }
    match state {
        DownloadProgressState::Completed => Ok(DownloadStep::Completed),
        DownloadProgressState::InProgress => Ok(DownloadStep::InProgress),
        DownloadProgressState::Canceled => Err(ExportError::Download(format!(
            "{} was canceled",
            suggested_filename
        ))),
    }
}

/// CDPのナビゲーションエラーを分類
fn navigation_error(url: &str, e: CdpError) -> ExportError {
    match e {
        CdpError::Timeout => ExportError::NavigationTimeout(format!("{}: {}", url, e)),
        other => ExportError::Navigation(format!("{}: {}", url, other)),
    }
}

/// クエリ・フラグメント・末尾スラッシュを除いて比較
fn same_page(current: &str, expected: &str) -> bool {
    let base = current.split(['?', '#']).next().unwrap_or_default();
    !base.is_empty() && base.trim_end_matches('/') == expected.trim_end_matches('/')
}

fn js_string(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

fn set_value_script(selector: &str, value: &str) -> String {
    format!(
        r#"
        (function(selector, value) {{
            var el = document.querySelector(selector);
            if (!el) {{
                return 'missing-element';
            }}
            if (el.tagName === 'SELECT') {{
                var found = false;
                for (var i = 0; i < el.options.length; i++) {{
                    if (el.options[i].value === value) {{
                        found = true;
                        break;
                    }}
                }}
                if (!found) {{
                    return 'missing-option';
                }}
            }}
            el.focus();
            el.value = value;
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return 'ok';
        }})({}, {})
        "#,
        js_string(selector),
        js_string(value)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exporter_new() {
        let job_id = Uuid::new_v4();
        let config = ExporterConfig::new("user@example.com", "secret")
            .with_download_path("/tmp/dhd-downloads");
        let exporter = DhdExporter::new(job_id, config);

        assert_eq!(exporter.job_id(), job_id);
        assert!(exporter.browser.is_none());
        assert!(exporter.page.is_none());
        assert_eq!(
            exporter.staging_dir,
            PathBuf::from("/tmp/dhd-downloads")
                .join(storage::STAGING_DIR)
                .join(job_id.to_string())
        );
        assert!(exporter
            .user_data_dir
            .ends_with(format!("dhd-export-{}", job_id)));
    }

    #[tokio::test]
    async fn test_login_requires_initialized_browser() {
        let mut exporter = DhdExporter::new(Uuid::new_v4(), ExporterConfig::new("u", "p"));
        let err = exporter.login().await.unwrap_err();
        assert!(matches!(err, ExportError::BrowserInit(_)));
    }

    #[tokio::test]
    async fn test_close_removes_staging_dir() {
        let root = tempfile::tempdir().unwrap();
        let config = ExporterConfig::new("u", "p").with_download_path(root.path());
        let mut exporter = DhdExporter::new(Uuid::new_v4(), config);
        std::fs::create_dir_all(&exporter.staging_dir).unwrap();

        exporter.close().await.unwrap();

        assert!(!exporter.staging_dir.exists());
        assert!(root.path().exists());
    }

    #[test]
    fn test_same_page() {
        let home = "https://platform.dhd-dz.com/home";

        assert!(same_page("https://platform.dhd-dz.com/home", home));
        assert!(same_page("https://platform.dhd-dz.com/home/", home));
        assert!(same_page("https://platform.dhd-dz.com/home?tab=1#top", home));
        assert!(!same_page("https://platform.dhd-dz.com/login", home));
        assert!(!same_page("https://platform.dhd-dz.com/homepage", home));
        assert!(!same_page("", home));
    }

    #[test]
    fn test_login_failure_on_login_page_is_auth() {
        let site = SiteConfig::default();
        let timeout = Duration::from_secs(60);

        let err = login_failure("https://platform.dhd-dz.com/login?error=1", &site, timeout);
        assert!(matches!(err, ExportError::Auth(_)));
        assert!(err.to_string().contains("/login?error=1"));

        let err = login_failure("https://platform.dhd-dz.com/login/", &site, timeout);
        assert!(matches!(err, ExportError::Auth(_)));
    }

    #[test]
    fn test_login_failure_elsewhere_is_timeout() {
        let site = SiteConfig::default();
        let timeout = Duration::from_secs(5);

        let err = login_failure("https://platform.dhd-dz.com/maintenance", &site, timeout);
        assert!(matches!(err, ExportError::NavigationTimeout(_)));
        assert!(err.to_string().contains("https://platform.dhd-dz.com/home"));

        let err = login_failure("", &site, timeout);
        assert!(matches!(err, ExportError::NavigationTimeout(_)));
    }

    #[test]
    fn test_download_step_ignores_other_downloads() {
        for state in [
            DownloadProgressState::InProgress,
            DownloadProgressState::Completed,
            DownloadProgressState::Canceled,
        ] {
            let step = download_step("guid-a", "guid-b", &state, "export.xlsx").unwrap();
            assert_eq!(step, DownloadStep::Ignored);
        }
    }

    #[test]
    fn test_download_step_states() {
        let step = download_step(
            "guid-a",
            "guid-a",
            &DownloadProgressState::InProgress,
            "export.xlsx",
        )
        .unwrap();
        assert_eq!(step, DownloadStep::InProgress);

        let step = download_step(
            "guid-a",
            "guid-a",
            &DownloadProgressState::Completed,
            "export.xlsx",
        )
        .unwrap();
        assert_eq!(step, DownloadStep::Completed);

        let err = download_step(
            "guid-a",
            "guid-a",
            &DownloadProgressState::Canceled,
            "export.xlsx",
        )
        .unwrap_err();
        assert!(matches!(err, ExportError::Download(_)));
        assert_eq!(err.to_string(), "download failed: export.xlsx was canceled");
    }

    #[test]
    fn test_set_value_script_escapes_arguments() {
        let script = set_value_script("input[name='date']", "it's \"quoted\"\n");

        assert!(script.contains(r#"})("input[name='date']", "it's \"quoted\"\n")"#));
        assert!(script.contains("'missing-option'"));
        assert!(script.contains("new Event('change', { bubbles: true })"));
    }

    #[test]
    fn test_navigation_error_kinds() {
        let timeout = navigation_error("https://platform.dhd-dz.com/login", CdpError::Timeout);
        assert!(matches!(timeout, ExportError::NavigationTimeout(_)));

        let other = navigation_error(
            "https://platform.dhd-dz.com/login",
            CdpError::ChromeMessage("net::ERR_NAME_NOT_RESOLVED".into()),
        );
        assert!(matches!(other, ExportError::Navigation(_)));
        assert!(other.to_string().contains("ERR_NAME_NOT_RESOLVED"));
    }

    #[tokio::test]
    #[ignore] // 実環境テスト用: DHD_EMAIL=... DHD_PASSWORD=... cargo test live_export -- --ignored --nocapture
    async fn test_live_export() {
        let email = std::env::var("DHD_EMAIL").expect("DHD_EMAIL not set");
        let password = std::env::var("DHD_PASSWORD").expect("DHD_PASSWORD not set");

        let download_dir = tempfile::tempdir().unwrap();
        let config = ExporterConfig::new(email, password).with_download_path(download_dir.path());
        let mut exporter = DhdExporter::new(Uuid::new_v4(), config);

        let path = exporter.execute().await.expect("export failed");
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
        assert!(!exporter.staging_dir.exists());
    }
}
