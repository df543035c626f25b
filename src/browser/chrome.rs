//! chromiumoxide によるブラウザセッション

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::traits::{BrowserSession, ElementText, SessionBackend};

use super::selector::{Locator, LocatorKind};

/// readyState 確認のインターバル（ミリ秒）
const READY_CHECK_INTERVAL_MS: u64 = 250;

/// Chrome/Chromium を起動するバックエンド
#[derive(Debug, Clone, Default)]
pub struct ChromeBackend;

impl ChromeBackend {
    pub fn new() -> Self {
        Self
    }

    /// 設定 → CHROME_PATH → CHROMIUM_PATH の順に実行ファイルを探す
    fn resolve_executable(config: &ScraperConfig) -> Option<PathBuf> {
        if let Some(path) = &config.backend_path {
            return Some(path.clone());
        }
        std::env::var("CHROME_PATH")
            .or_else(|_| std::env::var("CHROMIUM_PATH"))
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
    }
}

#[async_trait]
impl SessionBackend for ChromeBackend {
    type Session = ChromeSession;

    async fn launch(&self, config: &ScraperConfig) -> Result<ChromeSession, ScraperError> {
        info!("ブラウザを初期化中...");

        let executable = Self::resolve_executable(config);
        if let Some(path) = &executable {
            if !path.exists() {
                return Err(ScraperError::BackendUnavailable(format!(
                    "ブラウザが見つかりません: {}",
                    path.display()
                )));
            }
        }

        let mut builder = BrowserConfig::builder()
            .window_size(config.window_size.width, config.window_size.height)
            .no_sandbox()
            .request_timeout(Duration::from_secs(config.timeout_seconds.max(30)))
            .arg(format!("--user-agent={}", config.user_agent))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--disable-extensions");

        if let Some(path) = &executable {
            builder = builder.chrome_executable(path);
        }
        if !config.headless {
            builder = builder.with_head();
        }
        if config.debug {
            builder = builder.arg("--enable-logging=stderr").arg("--v=1");
        }

        let browser_config = builder
            .build()
            .map_err(|e| ScraperError::BackendUnavailable(format!("ブラウザ設定エラー: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScraperError::BackendUnavailable(e.to_string()))?;

        // ブラウザイベントハンドラをバックグラウンドで実行
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser event error: {:?}", e);
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScraperError::BackendUnavailable(e.to_string()))?;

        info!("ブラウザ初期化完了");
        Ok(ChromeSession {
            browser: Some(browser),
            page: Some(page),
            handler_task: Some(handler_task),
            executable,
            debug: config.debug,
        })
    }
}

pub struct ChromeSession {
    browser: Option<Browser>,
    page: Option<Page>,
    handler_task: Option<JoinHandle<()>>,
    executable: Option<PathBuf>,
    debug: bool,
}

impl ChromeSession {
    fn get_page(&self) -> Result<&Page, ScraperError> {
        self.page
            .as_ref()
            .ok_or_else(|| ScraperError::Navigation("ブラウザが初期化されていません".into()))
    }

    /// 要素を取得するJavaScript式（見つからなければ null）
    fn element_expr(locator: &Locator) -> Result<String, ScraperError> {
        let query = serde_json::to_string(locator.query)
            .map_err(|e| ScraperError::Navigation(e.to_string()))?;
        Ok(match locator.kind {
            LocatorKind::Css => format!("document.querySelector({})", query),
            LocatorKind::XPath => format!(
                "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
                query
            ),
        })
    }

    /// 一致するすべての要素を配列で返すJavaScript式
    fn elements_expr(locator: &Locator) -> Result<String, ScraperError> {
        let query = serde_json::to_string(locator.query)
            .map_err(|e| ScraperError::Navigation(e.to_string()))?;
        Ok(match locator.kind {
            LocatorKind::Css => format!("Array.from(document.querySelectorAll({}))", query),
            LocatorKind::XPath => format!(
                r#"(() => {{
                    const snapshot = document.evaluate({}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
                    const nodes = [];
                    for (let i = 0; i < snapshot.snapshotLength; i++) nodes.push(snapshot.snapshotItem(i));
                    return nodes;
                }})()"#,
                query
            ),
        })
    }

    async fn eval<T: serde::de::DeserializeOwned>(&self, script: &str) -> Result<T, ScraperError> {
        let page = self.get_page()?;
        let result = page
            .evaluate(script)
            .await
            .map_err(|e| ScraperError::Navigation(e.to_string()))?;
        result
            .into_value::<T>()
            .map_err(|e| ScraperError::Navigation(format!("評価結果の変換エラー: {}", e)))
    }

    /// DOMの準備完了（body が存在し readyState が interactive 以降）を待つ
    async fn wait_ready(&self, url: &str, timeout: Duration) -> Result<(), ScraperError> {
        let start = Instant::now();
        loop {
            let ready: bool = self
                .eval(
                    "document.body !== null && (document.readyState === 'interactive' || document.readyState === 'complete')",
                )
                .await
                .unwrap_or(false);
            if ready {
                debug!("ページ準備完了 ({:?}): {}", start.elapsed(), url);
                return Ok(());
            }

            if start.elapsed() > timeout {
                self.capture_debug_screenshot().await;
                return Err(ScraperError::NavigationTimeout {
                    url: url.to_string(),
                    timeout_secs: timeout.as_secs(),
                });
            }
            sleep(Duration::from_millis(READY_CHECK_INTERVAL_MS)).await;
        }
    }

    async fn capture_debug_screenshot(&self) {
        if !self.debug {
            return;
        }
        let Ok(page) = self.get_page() else {
            return;
        };
        if let Ok(screenshot) = page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
        {
            use base64::Engine;
            let encoded = base64::engine::general_purpose::STANDARD.encode(&screenshot);
            debug!("Timeout screenshot: data:image/png;base64,{}", encoded);
        }
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), ScraperError> {
        let page = self.get_page()?;
        match tokio::time::timeout(timeout, page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(ScraperError::Navigation(format!("{}: {}", url, e))),
            Err(_) => {
                self.capture_debug_screenshot().await;
                return Err(ScraperError::NavigationTimeout {
                    url: url.to_string(),
                    timeout_secs: timeout.as_secs(),
                });
            }
        }
        self.wait_ready(url, timeout).await
    }

    async fn current_url(&self) -> Result<String, ScraperError> {
        self.eval("window.location.href").await
    }

    async fn query_text(&self, locator: &Locator) -> Result<Option<ElementText>, ScraperError> {
        let script = format!(
            r#"(() => {{
                const el = {};
                if (!el) return null;
                return [el.innerText || '', el.textContent || ''];
            }})()"#,
            Self::element_expr(locator)?
        );
        let texts: Option<(String, String)> = self.eval(&script).await?;
        Ok(texts.map(|(visible, content)| ElementText::new(visible, content)))
    }

    async fn query_hrefs(&self, locator: &Locator) -> Result<Vec<String>, ScraperError> {
        let script = format!(
            r#"{}
                .map(el => el.href || (el.getAttribute && el.getAttribute('href')) || '')
                .filter(href => href.length > 0)"#,
            Self::elements_expr(locator)?
        );
        self.eval(&script).await
    }

    async fn is_clickable(&self, locator: &Locator) -> Result<bool, ScraperError> {
        let script = format!(
            r#"(() => {{
                const el = {};
                if (!el) return false;
                const cls = (el.className && el.className.toString()) || '';
                return !el.disabled && el.getAttribute('aria-disabled') !== 'true' && !/\bdisabled\b/.test(cls);
            }})()"#,
            Self::element_expr(locator)?
        );
        self.eval(&script).await
    }

    async fn click(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<bool, ScraperError> {
        if !self.is_clickable(locator).await? {
            return Ok(false);
        }

        let before = self.current_url().await.unwrap_or_default();
        let script = format!(
            r#"(() => {{
                const el = {};
                if (!el) return false;
                el.click();
                return true;
            }})()"#,
            Self::element_expr(locator)?
        );
        let clicked: bool = self.eval(&script).await?;
        if !clicked {
            return Ok(false);
        }

        // 遷移が始まるまで待ってから準備完了を確認
        let start = Instant::now();
        while start.elapsed() < timeout {
            let now = self.current_url().await.unwrap_or_default();
            if now != before {
                break;
            }
            sleep(Duration::from_millis(READY_CHECK_INTERVAL_MS)).await;
        }
        let url = self.current_url().await.unwrap_or(before);
        self.wait_ready(&url, timeout).await?;
        Ok(true)
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        info!("ブラウザを終了中...");

        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                debug!("Failed to close page: {}", e);
            }
        }
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!("ブラウザ終了エラー: {}", e);
            }
            if let Err(e) = browser.wait().await {
                debug!("ブラウザプロセス待機エラー: {}", e);
            }
        }
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
        Ok(())
    }

    fn executable(&self) -> Option<&Path> {
        self.executable.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_selector_is_json_quoted() {
        let expr = ChromeSession::element_expr(&Locator::css("a[href^='tel:']")).unwrap();
        assert_eq!(expr, r#"document.querySelector("a[href^='tel:']")"#);
    }

    #[test]
    fn test_xpath_uses_document_evaluate() {
        let locator = Locator::xpath("//a[contains(normalize-space(.), '次へ')]");
        let single = ChromeSession::element_expr(&locator).unwrap();
        let all = ChromeSession::elements_expr(&locator).unwrap();

        assert!(single.starts_with("document.evaluate(\"//a[contains"));
        assert!(single.contains("FIRST_ORDERED_NODE_TYPE"));
        assert!(all.contains("ORDERED_NODE_SNAPSHOT_TYPE"));
    }

    #[test]
    fn test_configured_executable_takes_precedence() {
        let config = ScraperConfig::new().with_backend_path("/opt/google/chrome/chrome");
        assert_eq!(
            ChromeBackend::resolve_executable(&config),
            Some(PathBuf::from("/opt/google/chrome/chrome"))
        );
    }

    #[tokio::test]
    async fn test_missing_configured_executable_is_unavailable() {
        let config = ScraperConfig::new().with_backend_path("/nonexistent/chromium");
        let result = ChromeBackend::new().launch(&config).await;
        assert!(matches!(result, Err(ScraperError::BackendUnavailable(_))));
    }
}
