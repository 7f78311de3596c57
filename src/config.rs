use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::dhd::{Clock, SiteConfig, SystemClock};

#[derive(Debug, Clone)]
pub struct ExporterConfig {
    pub email: String,
    pub password: String,
    pub download_path: PathBuf,
    pub headless: bool,
    /// 各待機処理（要素・URL・ダウンロード）のタイムアウト
    pub timeout: Duration,
    /// 未指定の場合はchromiumoxideの自動検出に任せる
    pub chrome_executable: Option<PathBuf>,
    /// 失敗時にスクリーンショットをログ出力
    pub debug: bool,
    pub site: SiteConfig,
    pub clock: Arc<dyn Clock>,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            email: String::new(),
            password: String::new(),
            download_path: PathBuf::from("./downloads"),
            headless: true,
            timeout: Duration::from_secs(60),
            chrome_executable: None,
            debug: false,
            site: SiteConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }
}

impl ExporterConfig {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    /// 認証情報だけを差し替えた設定を返す（サービスのテンプレート設定から生成する用途）
    pub fn with_credentials(mut self, email: impl Into<String>, password: impl Into<String>) -> Self {
        self.email = email.into();
        self.password = password.into();
        self
    }

    pub fn with_download_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.download_path = path.into();
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_chrome_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_executable = Some(path.into());
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_site(mut self, site: SiteConfig) -> Self {
        self.site = site;
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }
}
