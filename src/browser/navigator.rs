//! ページナビゲーター
//!
//! ブラウザセッションを専有し、ページの読み込み・リンク収集・次ページ遷移を行う。
//! 遷移のたびにランダムな待機を入れる（対象サイトへの唯一のレート制限）。

use std::collections::HashSet;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::{ScraperConfig, MAX_DELAY_SECS};
use crate::error::ScraperError;
use crate::traits::BrowserSession;

use super::selector::{self, Locator};

/// 次ページへのリンク
pub const NEXT_PAGE_LOCATORS: &[Locator] = &[
    Locator::css("a[rel='next']"),
    Locator::css("a[class*='next']"),
    Locator::css(".pager_next a"),
    Locator::css(".next a"),
    Locator::xpath("//a[contains(normalize-space(.), '次へ')]"),
];

/// リクエスト間のランダム待機
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    min: Duration,
    max: Duration,
}

impl Pacer {
    /// 負の値・非有限値は0秒、上限を超える値は `MAX_DELAY_SECS` として扱う
    pub fn new(min_secs: f64, max_secs: f64) -> Self {
        let min = clamp_secs(min_secs);
        let max = clamp_secs(max_secs).max(min);
        Self { min, max }
    }

    pub fn from_config(config: &ScraperConfig) -> Self {
        Self::new(config.delay_min, config.delay_max)
    }

    /// `[min, max]` の範囲から待機時間を選ぶ
    pub fn next_delay(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let secs = rand::rng().random_range(self.min.as_secs_f64()..=self.max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }

    pub async fn pause(&self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            debug!("待機: {:?}", delay);
            sleep(delay).await;
        }
    }
}

fn clamp_secs(secs: f64) -> Duration {
    if !secs.is_finite() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs.min(MAX_DELAY_SECS)).unwrap_or(Duration::ZERO)
}

/// 巡回中のページ状態
#[derive(Debug, Clone, Default)]
pub struct PageState {
    pub current_url: String,
    /// 1始まり。検索結果ページを開くまでは0
    pub page_number: u32,
    /// 最後に開いた検索結果ページ
    pub results_url: Option<String>,
    pub discovered_links: HashSet<String>,
    pub visited_links: HashSet<String>,
}

pub struct Navigator<S: BrowserSession> {
    session: S,
    timeout: Duration,
    pacer: Pacer,
    state: PageState,
    closed: bool,
}

impl<S: BrowserSession> Navigator<S> {
    pub fn new(session: S, config: &ScraperConfig) -> Self {
        Self {
            session,
            timeout: config.timeout(),
            pacer: Pacer::from_config(config),
            state: PageState::default(),
            closed: false,
        }
    }

    pub fn state(&self) -> &PageState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut PageState {
        &mut self.state
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// URLを開く。成功・失敗にかかわらず戻る前に待機する
    pub async fn open(&mut self, url: &str) -> Result<(), ScraperError> {
        if self.closed {
            return Err(ScraperError::Navigation(
                "ブラウザは既に終了しています".into(),
            ));
        }

        debug!("ページを開く: {}", url);
        // 失敗してもブラウザは元のページに留まらないため、試行したURLを記録する
        self.state.current_url = url.to_string();
        let result = self.session.goto(url, self.timeout).await;
        self.pacer.pause().await;
        result
    }

    /// 検索結果ページを開き、ページ番号を1から数え直す
    pub async fn open_results(&mut self, url: &str) -> Result<(), ScraperError> {
        self.open(url).await?;
        self.state.results_url = Some(url.to_string());
        self.state.page_number = 1;
        info!("検索結果ページ {}: {}", self.state.page_number, url);
        Ok(())
    }

    /// 各セレクタに一致したアンカーの href を順に集める（重複はそのまま）
    pub async fn find_links(&self, locators: &[Locator]) -> Vec<String> {
        let mut links = Vec::new();
        for locator in locators {
            match self.session.query_hrefs(locator).await {
                Ok(hrefs) => links.extend(hrefs.into_iter().filter(|h| !h.trim().is_empty())),
                Err(e) => debug!("リンク取得エラー ({}): {}", locator, e),
            }
        }
        links
    }

    pub async fn resolve_text(&self, locators: &[Locator]) -> String {
        selector::resolve_text(&self.session, locators).await
    }

    pub async fn has_next_page(&self) -> bool {
        for locator in NEXT_PAGE_LOCATORS {
            match self.session.is_clickable(locator).await {
                Ok(true) => return true,
                Ok(false) => continue,
                Err(e) => debug!("次ページ確認エラー ({}): {}", locator, e),
            }
        }
        false
    }

    /// 次ページへ進む。次ページのリンクが無ければ何もせず `false`
    ///
    /// 店舗ページを表示中なら先に検索結果ページへ戻る。
    pub async fn advance_page(&mut self) -> Result<bool, ScraperError> {
        if let Some(results_url) = self.state.results_url.clone() {
            if self.state.current_url != results_url {
                debug!("検索結果ページへ戻る: {}", results_url);
                self.open(&results_url).await?;
            }
        }

        for locator in NEXT_PAGE_LOCATORS {
            let clicked = match self.session.click(locator, self.timeout).await {
                Ok(clicked) => clicked,
                Err(e @ ScraperError::NavigationTimeout { .. }) => return Err(e),
                Err(e) => {
                    debug!("次ページのクリックに失敗 ({}): {}", locator, e);
                    false
                }
            };
            if !clicked {
                continue;
            }

            self.pacer.pause().await;
            let url = self.session.current_url().await?;
            self.state.current_url = url.clone();
            self.state.results_url = Some(url.clone());
            self.state.page_number += 1;
            info!("検索結果ページ {}: {}", self.state.page_number, url);
            return Ok(true);
        }

        Ok(false)
    }

    /// ブラウザを終了する。2回目以降は何もしない
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self.session.close().await {
            warn!("ブラウザ終了時のエラー: {}", e);
        }
        info!("ブラウザ終了完了");
    }
}
