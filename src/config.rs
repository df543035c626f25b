//! スクレイパー設定
//!
//! 設定ファイル（JSON）のキーは `delayMin` / `delayMax` / `timeoutSeconds` /
//! `headless` / `windowSize` / `userAgent` / `backendPath` など。
//! 欠けているキーはデフォルト値で補う。

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ScraperError;

/// 待機時間の上限（秒）
pub const MAX_DELAY_SECS: f64 = 600.0;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 店舗ページの取得に失敗したときの扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailurePolicy {
    /// 行を追加しない
    Skip,
    /// URLと取得日時以外を欠損値で埋めた行を追加する
    RecordBlank,
}

/// 取得する項目のセット
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldSet {
    /// URL・店舗名・電話番号など9項目
    Basic,
    /// 座席数・予算・駐車場などを含む15項目
    Extended,
}

/// ブラウザのウィンドウサイズ（設定ファイルでは `"1920,1080"` 形式）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

impl Default for WindowSize {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

impl TryFrom<String> for WindowSize {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let (w, h) = value
            .split_once(|c| c == ',' || c == 'x')
            .ok_or_else(|| format!("ウィンドウサイズの形式が不正です: {}", value))?;
        let width = w
            .trim()
            .parse()
            .map_err(|_| format!("ウィンドウ幅が不正です: {}", w))?;
        let height = h
            .trim()
            .parse()
            .map_err(|_| format!("ウィンドウ高さが不正です: {}", h))?;
        Ok(Self { width, height })
    }
}

impl From<WindowSize> for String {
    fn from(size: WindowSize) -> Self {
        size.to_string()
    }
}

impl fmt::Display for WindowSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScraperConfig {
    /// リクエスト間の最小待機（秒）
    pub delay_min: f64,
    /// リクエスト間の最大待機（秒）
    pub delay_max: f64,
    pub timeout_seconds: u64,
    pub headless: bool,
    pub window_size: WindowSize,
    pub user_agent: String,
    /// Chrome/Chromium 実行ファイルのパス
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_path: Option<PathBuf>,
    /// 1回の実行で巡回する検索結果ページの上限
    pub max_pages: u32,
    /// 1ページあたりに処理する店舗リンクの上限
    pub links_per_page: usize,
    pub failure_policy: FailurePolicy,
    /// 項目が見つからなかったときの値
    pub sentinel: String,
    pub field_set: FieldSet,
    /// デバッグモード（読み込み失敗時にスクリーンショットをログ出力）
    pub debug: bool,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            delay_min: 2.0,
            delay_max: 5.0,
            timeout_seconds: 15,
            headless: true,
            window_size: WindowSize::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            backend_path: None,
            max_pages: 10,
            links_per_page: 20,
            failure_policy: FailurePolicy::Skip,
            sentinel: "-".to_string(),
            field_set: FieldSet::Basic,
            debug: false,
        }
    }
}

impl ScraperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 設定ファイルを読み込む。ファイルが無ければデフォルト値を返す
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScraperError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("設定ファイルが存在しないためデフォルト値を使用: {:?}", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| ScraperError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        info!("設定ファイルを読み込みました: {:?}", path);
        Ok(config)
    }

    /// 値の範囲を確認する
    pub fn validate(&self) -> Result<(), ScraperError> {
        for (key, value) in [("delayMin", self.delay_min), ("delayMax", self.delay_max)] {
            if !value.is_finite() || !(0.0..=MAX_DELAY_SECS).contains(&value) {
                return Err(ScraperError::Config(format!(
                    "{} は0-{}秒の範囲で指定してください: {}",
                    key, MAX_DELAY_SECS, value
                )));
            }
        }
        if self.timeout_seconds == 0 {
            return Err(ScraperError::Config(
                "timeoutSeconds は1以上を指定してください".into(),
            ));
        }
        if self.links_per_page == 0 {
            return Err(ScraperError::Config(
                "linksPerPage は1以上を指定してください".into(),
            ));
        }
        if self.max_pages == 0 {
            return Err(ScraperError::Config(
                "maxPages は1以上を指定してください".into(),
            ));
        }
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ScraperError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        info!("設定ファイルを保存しました: {:?}", path.as_ref());
        Ok(())
    }

    /// 見つかったブラウザのパスを設定ファイルに書き戻す。
    /// 既存の未知のキーはそのまま残す。
    pub fn remember_backend_path(
        path: impl AsRef<Path>,
        backend_path: &Path,
    ) -> Result<(), ScraperError> {
        let path = path.as_ref();
        let mut document = if path.exists() {
            serde_json::from_str::<serde_json::Value>(&std::fs::read_to_string(path)?)?
        } else {
            serde_json::Value::Object(serde_json::Map::new())
        };

        let object = document.as_object_mut().ok_or_else(|| {
            ScraperError::Config(format!("{}: JSONオブジェクトではありません", path.display()))
        })?;
        object.insert(
            "backendPath".to_string(),
            serde_json::Value::String(backend_path.to_string_lossy().to_string()),
        );

        std::fs::write(path, serde_json::to_string_pretty(&document)?)?;
        info!("ブラウザのパスを設定ファイルに保存: {:?}", backend_path);
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn with_delay(mut self, min_secs: f64, max_secs: f64) -> Self {
        self.delay_min = min_secs;
        self.delay_max = max_secs;
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_seconds = timeout.as_secs();
        self
    }

    pub fn with_backend_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.backend_path = Some(path.into());
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_links_per_page(mut self, links: usize) -> Self {
        self.links_per_page = links;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_field_set(mut self, field_set: FieldSet) -> Self {
        self.field_set = field_set;
        self
    }

    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}
