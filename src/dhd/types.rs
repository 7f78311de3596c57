//! DHD エクスポート関連の型定義

use std::path::Path;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// フォームに入力する日付の書式
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// 対象サイト設定
///
/// URLとセレクタを注入できるようにしておくことで、サイト変更時やテスト時に
/// 制御フローを触らずに差し替えられる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub login_url: String,
    /// ログイン成功後のリダイレクト先
    pub home_url: String,
    pub export_url: String,
    pub selectors: FieldSelectors,
    pub filters: FilterValues,
    /// エクスポート期間の開始日
    pub start_date: NaiveDate,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            login_url: "https://platform.dhd-dz.com/login".to_string(),
            home_url: "https://platform.dhd-dz.com/home".to_string(),
            export_url: "https://platform.dhd-dz.com/export".to_string(),
            selectors: FieldSelectors::default(),
            filters: FilterValues::default(),
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default(),
        }
    }
}

impl SiteConfig {
    /// JSONファイルから読み込む（省略したキーはデフォルト値）
    pub fn from_json_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(std::io::Error::from)
    }
}

/// CSSセレクタ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSelectors {
    pub email: String,
    pub password: String,
    pub login_submit: String,
    pub current_state: String,
    pub operation: String,
    pub date_start: String,
    pub date_end: String,
    pub export_submit: String,
}

impl Default for FieldSelectors {
    fn default() -> Self {
        Self {
            email: "#email".to_string(),
            password: "#password".to_string(),
            login_submit: "#submit-button".to_string(),
            current_state: "#current_state".to_string(),
            operation: "#operation".to_string(),
            date_start: "#date_start".to_string(),
            date_end: "#date_end".to_string(),
            export_submit: "#submit".to_string(),
        }
    }
}

/// エクスポート画面のフィルター値
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterValues {
    /// 配送状態 (デフォルト: "3" = Expédiés)
    pub current_state: String,
    /// 業務種別 (デフォルト: "1" = Livraison)
    pub operation: String,
}

impl Default for FilterValues {
    fn default() -> Self {
        Self {
            current_state: "3".to_string(),
            operation: "1".to_string(),
        }
    }
}

/// 「今日」の取得元
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn today(&self) -> NaiveDate;
}

/// ローカル時刻の今日
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// 固定日付（テスト用）
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// エクスポート期間
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// 開始日から今日まで。今日が開始日より前なら開始日に揃える
    pub fn through_today(start: NaiveDate, clock: &dyn Clock) -> Self {
        let end = clock.today().max(start);
        Self { start, end }
    }

    pub fn start_value(&self) -> String {
        self.start.format(DATE_FORMAT).to_string()
    }

    pub fn end_value(&self) -> String {
        self.end.format(DATE_FORMAT).to_string()
    }
}
