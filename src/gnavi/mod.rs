//! ぐるなび スクレイパーモジュール
//!
//! 地域・ジャンルから検索結果ページを開き、店舗ページを巡回して
//! 店舗情報を取得する

mod detail;
mod links;
mod locale;
mod scraper;
mod types;

pub use detail::{field_locators, normalize_phone, DetailExtractor, ListingOutcome};
pub use links::{dedup_listing_links, extract_listing_links, is_listing_url, LISTING_LINK_LOCATORS};
pub use locale::{
    build_locality_url, build_region_url, build_search_url, list_genres, list_known_localities,
    list_regions, locality_code, region_code, BASE_URL,
};
pub use scraper::{RunHandle, ScrapeOrchestrator};
pub use types::{
    CancelFlag, Field, ListingRecord, OutputTarget, ProgressEvent, RunReport, RunState, RunStatus,
    ScrapeJob, SearchCriteria, MAX_TARGET_COUNT,
};
