//! 検索結果ページからの店舗リンク抽出

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use crate::browser::{Locator, Navigator};
use crate::traits::BrowserSession;

/// 店舗リンクの候補
pub const LISTING_LINK_LOCATORS: &[Locator] = &[
    Locator::css(".item-name a"),
    Locator::css(".shop-name a"),
    Locator::css(".restaurant-link a"),
    Locator::css("a[href*='r.gnavi.co.jp/'][href*='/']"),
];

/// 店舗ページではないパス（店舗リンクと同じ見た目で並ぶことがある）
const EXCLUDED_FRAGMENTS: &[&str] = &[
    "/area/",
    "/search",
    "/cate/",
    "/guide",
    "/api/",
    "/plan/",
    "/kuchikomi/",
];

static LISTING_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://r\.gnavi\.co\.jp/[a-zA-Z0-9]+(?:/\w*)?/?(?:[?#].*)?$")
        .expect("valid listing regex")
});

/// 店舗ページのURLか。除外パスの判定を先に行う
pub fn is_listing_url(url: &str) -> bool {
    let url = url.trim();
    if url.is_empty() {
        return false;
    }
    if EXCLUDED_FRAGMENTS.iter().any(|fragment| url.contains(fragment)) {
        return false;
    }
    LISTING_PATH.is_match(url)
}

/// ページ上の順序を保ったまま重複を除き、`limit` 件までに絞る
pub fn dedup_listing_links<I>(hrefs: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    hrefs
        .into_iter()
        .map(|href| href.trim().to_string())
        .filter(|href| is_listing_url(href))
        .filter(|href| seen.insert(href.clone()))
        .take(limit)
        .collect()
}

/// 現在の検索結果ページから店舗URLを抽出する
pub async fn extract_listing_links<S: BrowserSession>(
    navigator: &mut Navigator<S>,
    limit: usize,
) -> Vec<String> {
    let hrefs = navigator.find_links(LISTING_LINK_LOCATORS).await;
    let found = hrefs.len();
    let links = dedup_listing_links(hrefs, limit);

    navigator
        .state_mut()
        .discovered_links
        .extend(links.iter().cloned());

    info!(
        "ページから {} 件の店舗リンクを抽出（候補 {} 件）",
        links.len(),
        found
    );
    links
}
