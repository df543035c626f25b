//! テスト用のインメモリ・ブラウザ

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::browser::Locator;
use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::gnavi::CancelFlag;
use crate::traits::{BrowserSession, ElementText, SessionBackend};

/// 読み込みに失敗したときにブラウザが表示するページ
pub(crate) const ERROR_PAGE: &str = "chrome-error://chromewebdata/";

#[derive(Debug, Clone, Default)]
pub(crate) struct FakePage {
    texts: HashMap<&'static str, Option<ElementText>>,
    hrefs: HashMap<&'static str, Vec<String>>,
    next: Option<(&'static str, String)>,
}

impl FakePage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn text(mut self, query: &'static str, visible: &str, content: &str) -> Self {
        self.texts
            .insert(query, Some(ElementText::new(visible, content)));
        self
    }

    /// クエリ実行時にエラーを返すセレクタ
    pub(crate) fn broken(mut self, query: &'static str) -> Self {
        self.texts.insert(query, None);
        self
    }

    pub(crate) fn links(mut self, query: &'static str, hrefs: &[&str]) -> Self {
        self.hrefs
            .entry(query)
            .or_default()
            .extend(hrefs.iter().map(|h| h.to_string()));
        self
    }

    pub(crate) fn next(mut self, query: &'static str, url: &str) -> Self {
        self.next = Some((query, url.to_string()));
        self
    }
}

/// セッションの外から訪問履歴と close 回数を確認するためのハンドル
#[derive(Debug, Clone, Default)]
pub(crate) struct SessionProbe {
    visits: Arc<Mutex<Vec<String>>>,
    closes: Arc<AtomicUsize>,
}

impl SessionProbe {
    pub(crate) fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }

    pub(crate) fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

pub(crate) struct FakeSession {
    pages: HashMap<String, FakePage>,
    current: Option<String>,
    failing: HashSet<String>,
    timeouts: HashSet<String>,
    cancel_on_visit: Option<(String, CancelFlag)>,
    executable: Option<PathBuf>,
    probe: SessionProbe,
}

impl FakeSession {
    pub(crate) fn with_pages<'a>(pages: impl IntoIterator<Item = (&'a str, FakePage)>) -> Self {
        Self {
            pages: pages
                .into_iter()
                .map(|(url, page)| (url.to_string(), page))
                .collect(),
            current: None,
            failing: HashSet::new(),
            timeouts: HashSet::new(),
            cancel_on_visit: None,
            executable: None,
            probe: SessionProbe::default(),
        }
    }

    /// 訪問履歴に残さずにページを表示する
    pub(crate) fn open_now(&mut self, url: &str) {
        self.current = Some(url.to_string());
    }

    pub(crate) fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub(crate) fn timing_out(mut self, url: &str) -> Self {
        self.timeouts.insert(url.to_string());
        self
    }

    /// 指定URLを開いた直後にキャンセルフラグを立てる
    pub(crate) fn cancel_on_visit(mut self, url: &str, flag: CancelFlag) -> Self {
        self.cancel_on_visit = Some((url.to_string(), flag));
        self
    }

    pub(crate) fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    pub(crate) fn probe(&self) -> SessionProbe {
        self.probe.clone()
    }

    fn page(&self) -> Option<&FakePage> {
        self.current.as_ref().and_then(|url| self.pages.get(url))
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), ScraperError> {
        self.probe.visits.lock().unwrap().push(url.to_string());

        if let Some((trigger, flag)) = &self.cancel_on_visit {
            if trigger == url {
                flag.cancel();
            }
        }

        if self.timeouts.contains(url) {
            return Err(ScraperError::NavigationTimeout {
                url: url.to_string(),
                timeout_secs: timeout.as_secs(),
            });
        }
        if self.failing.contains(url) || !self.pages.contains_key(url) {
            self.current = Some(ERROR_PAGE.to_string());
            return Err(ScraperError::Navigation(format!("net::ERR_FAILED {}", url)));
        }

        self.current = Some(url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> Result<String, ScraperError> {
        Ok(self.current.clone().unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn query_text(&self, locator: &Locator) -> Result<Option<ElementText>, ScraperError> {
        match self.page().and_then(|page| page.texts.get(locator.query)) {
            Some(Some(text)) => Ok(Some(text.clone())),
            Some(None) => Err(ScraperError::Navigation(format!(
                "query failed: {}",
                locator
            ))),
            None => Ok(None),
        }
    }

    async fn query_hrefs(&self, locator: &Locator) -> Result<Vec<String>, ScraperError> {
        Ok(self
            .page()
            .and_then(|page| page.hrefs.get(locator.query))
            .cloned()
            .unwrap_or_default())
    }

    async fn is_clickable(&self, locator: &Locator) -> Result<bool, ScraperError> {
        Ok(matches!(
            self.page().and_then(|page| page.next.as_ref()),
            Some((query, _)) if *query == locator.query
        ))
    }

    async fn click(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<bool, ScraperError> {
        let target = match self.page().and_then(|page| page.next.as_ref()) {
            Some((query, url)) if *query == locator.query => url.clone(),
            _ => return Ok(false),
        };
        self.goto(&target, timeout).await?;
        Ok(true)
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        self.current = None;
        Ok(())
    }

    fn executable(&self) -> Option<&Path> {
        self.executable.as_deref()
    }
}

/// 1回だけセッションを払い出すバックエンド
pub(crate) struct FakeBackend {
    session: Mutex<Option<FakeSession>>,
}

impl FakeBackend {
    pub(crate) fn new(session: FakeSession) -> Self {
        Self {
            session: Mutex::new(Some(session)),
        }
    }

    pub(crate) fn unavailable() -> Self {
        Self {
            session: Mutex::new(None),
        }
    }
}

#[async_trait]
impl SessionBackend for FakeBackend {
    type Session = FakeSession;

    async fn launch(&self, _config: &ScraperConfig) -> Result<FakeSession, ScraperError> {
        self.session
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| ScraperError::BackendUnavailable("chromium not found".to_string()))
    }
}
