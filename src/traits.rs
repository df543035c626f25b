use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::browser::Locator;
use crate::config::ScraperConfig;
use crate::error::ScraperError;

/// 要素から読み取ったテキスト
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementText {
    /// 表示テキスト（innerText）
    pub visible: String,
    /// 生のテキスト（textContent）
    pub content: String,
}

impl ElementText {
    pub fn new(visible: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            visible: visible.into(),
            content: content.into(),
        }
    }
}

/// ブラウザセッション（1タブ分の操作）
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// URLを開き、DOMの準備完了を待つ
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), ScraperError>;

    /// 現在のURL
    async fn current_url(&self) -> Result<String, ScraperError>;

    /// 最初に一致した要素のテキスト。一致しなければ `None`
    async fn query_text(&self, locator: &Locator) -> Result<Option<ElementText>, ScraperError>;

    /// 一致したすべてのアンカーの href（ページ上の順序）
    async fn query_hrefs(&self, locator: &Locator) -> Result<Vec<String>, ScraperError>;

    /// 一致する要素がクリック可能な状態で存在するか
    async fn is_clickable(&self, locator: &Locator) -> Result<bool, ScraperError>;

    /// 要素をクリックし、遷移先の準備完了を待つ。要素が無ければ `false`
    async fn click(&mut self, locator: &Locator, timeout: Duration)
        -> Result<bool, ScraperError>;

    /// リソース解放
    async fn close(&mut self) -> Result<(), ScraperError>;

    /// 使用中のブラウザ実行ファイル（判明している場合）
    fn executable(&self) -> Option<&Path> {
        None
    }
}

/// ブラウザセッションを用意するバックエンド
#[async_trait]
pub trait SessionBackend: Send + Sync {
    type Session: BrowserSession + 'static;

    /// セッションを起動する。起動できなければ `BackendUnavailable`
    async fn launch(&self, config: &ScraperConfig) -> Result<Self::Session, ScraperError>;
}

#[async_trait]
impl<T: SessionBackend> SessionBackend for Arc<T> {
    type Session = T::Session;

    async fn launch(&self, config: &ScraperConfig) -> Result<Self::Session, ScraperError> {
        (**self).launch(config).await
    }
}
