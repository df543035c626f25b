//! 店舗ページからの項目抽出

use std::sync::LazyLock;

use chrono::{FixedOffset, Utc};
use regex::Regex;
use tracing::{debug, warn};

use crate::browser::{Locator, Navigator};
use crate::config::{FailurePolicy, FieldSet, ScraperConfig};
use crate::error::ScraperError;
use crate::traits::BrowserSession;

use super::types::{Field, ListingRecord};

static PHONE_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{2,4}[-\s]?\d{2,4}[-\s]?\d{4})").expect("valid phone regex")
});

/// 項目ごとのセレクタ（具体的なものから順に）
pub fn field_locators(field: Field) -> &'static [Locator] {
    const NAME: &[Locator] = &[
        Locator::css("h1.shop-name"),
        Locator::css("h1[class*='name']"),
        Locator::css(".restaurant-name h1"),
        Locator::css(".shop-title h1"),
        Locator::css(".store-name"),
        Locator::css("h1"),
    ];
    const PHONE: &[Locator] = &[
        Locator::css("a[href^='tel:']"),
        Locator::css(".phone"),
        Locator::css(".tel"),
        Locator::css("[class*='phone']"),
        Locator::css("[class*='tel']"),
    ];
    const ADDRESS: &[Locator] = &[
        Locator::css(".address"),
        Locator::css(".shop-address"),
        Locator::css("[class*='address']"),
        Locator::css(".location"),
    ];
    const GENRE: &[Locator] = &[
        Locator::css(".genre"),
        Locator::css(".category"),
        Locator::css("[class*='genre']"),
        Locator::css("[class*='category']"),
    ];
    const STATION: &[Locator] = &[
        Locator::css(".station"),
        Locator::css(".access"),
        Locator::css("[class*='station']"),
        Locator::css("[class*='access']"),
    ];
    const HOURS: &[Locator] = &[
        Locator::css(".business-hours"),
        Locator::css(".opening-hours"),
        Locator::css("[class*='hours']"),
        Locator::css("[class*='time']"),
    ];
    const CLOSED: &[Locator] = &[
        Locator::css(".holiday"),
        Locator::css(".closed"),
        Locator::css("[class*='holiday']"),
        Locator::css("[class*='closed']"),
    ];
    const SEATS: &[Locator] = &[
        Locator::css(".seats"),
        Locator::css(".capacity"),
        Locator::css("[class*='seat']"),
    ];
    const BUDGET: &[Locator] = &[
        Locator::css(".budget"),
        Locator::css(".price"),
        Locator::css("[class*='budget']"),
        Locator::css("[class*='price']"),
    ];
    const PRIVATE_ROOM: &[Locator] = &[
        Locator::css(".private-room"),
        Locator::css("[class*='private']"),
        Locator::css("[class*='room']"),
    ];
    const SMOKING: &[Locator] = &[
        Locator::css(".smoking"),
        Locator::css("[class*='smoking']"),
        Locator::css("[class*='smoke']"),
    ];
    const PARKING: &[Locator] = &[
        Locator::css(".parking"),
        Locator::css("[class*='parking']"),
        Locator::css("[class*='park']"),
    ];
    const CREDIT_CARD: &[Locator] = &[
        Locator::css(".credit-card"),
        Locator::css("[class*='credit']"),
        Locator::css("[class*='card']"),
    ];

    match field {
        Field::Name => NAME,
        Field::Phone => PHONE,
        Field::Address => ADDRESS,
        Field::Genre => GENRE,
        Field::NearestStation => STATION,
        Field::BusinessHours => HOURS,
        Field::ClosedDays => CLOSED,
        Field::Seats => SEATS,
        Field::Budget => BUDGET,
        Field::PrivateRoom => PRIVATE_ROOM,
        Field::Smoking => SMOKING,
        Field::Parking => PARKING,
        Field::CreditCard => CREDIT_CARD,
        Field::Url | Field::RetrievedAt => &[],
    }
}

/// 電話番号らしい数字の並びを取り出す。無ければ元のテキストを返す
pub fn normalize_phone(raw: &str) -> String {
    PHONE_NUMBER
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| raw.to_string())
}

/// 取得日時（JST）
pub fn retrieved_at_now() -> String {
    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";
    let now = Utc::now();
    match FixedOffset::east_opt(9 * 3600) {
        Some(jst) => now.with_timezone(&jst).format(FORMAT).to_string(),
        None => now.format(FORMAT).to_string(),
    }
}

/// 1店舗の取得結果
#[derive(Debug, Clone)]
pub enum ListingOutcome {
    /// ページを読み込み、項目を解決した
    Fetched(ListingRecord),
    /// 読み込みに失敗し、欠損値で埋めた行として記録した
    RecordedBlank {
        record: ListingRecord,
        error: String,
    },
    /// 読み込みに失敗し、行を追加しなかった
    Skipped { error: String },
}

impl ListingOutcome {
    pub fn record(&self) -> Option<&ListingRecord> {
        match self {
            ListingOutcome::Fetched(record) | ListingOutcome::RecordedBlank { record, .. } => {
                Some(record)
            }
            ListingOutcome::Skipped { .. } => None,
        }
    }

    pub fn into_record(self) -> Option<ListingRecord> {
        match self {
            ListingOutcome::Fetched(record) | ListingOutcome::RecordedBlank { record, .. } => {
                Some(record)
            }
            ListingOutcome::Skipped { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ListingOutcome::Fetched(_) => None,
            ListingOutcome::RecordedBlank { error, .. } | ListingOutcome::Skipped { error } => {
                Some(error)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetailExtractor {
    field_set: FieldSet,
    sentinel: String,
    policy: FailurePolicy,
}

impl DetailExtractor {
    pub fn new(field_set: FieldSet, sentinel: impl Into<String>, policy: FailurePolicy) -> Self {
        Self {
            field_set,
            sentinel: sentinel.into(),
            policy,
        }
    }

    pub fn from_config(config: &ScraperConfig) -> Self {
        Self::new(config.field_set, config.sentinel.clone(), config.failure_policy)
    }

    /// 店舗ページを開いて各項目を解決する。読み込み失敗で実行は止めない
    pub async fn extract_listing<S: BrowserSession>(
        &self,
        navigator: &mut Navigator<S>,
        url: &str,
    ) -> ListingOutcome {
        debug!("店舗詳細取得開始: {}", url);
        navigator.state_mut().visited_links.insert(url.to_string());

        if let Err(e) = navigator.open(url).await {
            return self.on_failure(url, e);
        }

        let mut record =
            ListingRecord::blank(self.field_set, url, retrieved_at_now(), &self.sentinel);
        for field in self.field_set.fields().iter().filter(|f| f.is_scraped()) {
            let text = navigator.resolve_text(field_locators(*field)).await;
            if text.is_empty() {
                continue;
            }
            let value = match field {
                Field::Phone => normalize_phone(&text),
                _ => text,
            };
            record.set(*field, value);
        }

        debug!("店舗情報取得完了: {}", record.name());
        ListingOutcome::Fetched(record)
    }

    fn on_failure(&self, url: &str, error: ScraperError) -> ListingOutcome {
        warn!("店舗詳細取得エラー ({}): {}", url, error);
        let error = error.to_string();
        match self.policy {
            FailurePolicy::Skip => ListingOutcome::Skipped { error },
            FailurePolicy::RecordBlank => ListingOutcome::RecordedBlank {
                record: ListingRecord::blank(
                    self.field_set,
                    url,
                    retrieved_at_now(),
                    &self.sentinel,
                ),
                error,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakePage, FakeSession};

    const SHOP: &str = "https://r.gnavi.co.jp/a123456/";
    const BROKEN: &str = "https://r.gnavi.co.jp/b999999/";

    fn shop_page() -> FakePage {
        FakePage::new()
            .text("h1.shop-name", "炭火焼鳥 とりまる 新宿店", "")
            .text("a[href^='tel:']", "お電話は03-1234-5678です", "")
            .text(".address", "東京都新宿区西新宿1-1-1", "")
            .text("[class*='genre']", "", "焼き鳥")
            .text(".business-hours", "17:00～23:00", "")
            .text("[class*='park']", "無", "")
    }

    fn navigator(config: &ScraperConfig) -> Navigator<FakeSession> {
        let session = FakeSession::with_pages([(SHOP, shop_page())]).failing(BROKEN);
        Navigator::new(session, config)
    }

    #[test]
    fn test_phone_number_is_extracted() {
        assert_eq!(normalize_phone("お電話は03-1234-5678です"), "03-1234-5678");
        assert_eq!(normalize_phone("TEL 050 5555 1234"), "050 5555 1234");
        assert_eq!(normalize_phone("0312345678"), "0312345678");
    }

    #[test]
    fn test_phone_without_digits_is_unchanged() {
        assert_eq!(normalize_phone("非公開"), "非公開");
        assert_eq!(normalize_phone("予約専用番号あり"), "予約専用番号あり");
    }

    #[test]
    fn test_retrieved_at_format() {
        let now = retrieved_at_now();
        assert_eq!(now.len(), 19);
        assert!(chrono::NaiveDateTime::parse_from_str(&now, "%Y-%m-%d %H:%M:%S").is_ok());
    }

    #[tokio::test]
    async fn test_extract_basic_fields() {
        let config = ScraperConfig::new().with_delay(0.0, 0.0);
        let mut nav = navigator(&config);
        let extractor = DetailExtractor::from_config(&config);

        let outcome = extractor.extract_listing(&mut nav, SHOP).await;
        let record = outcome.into_record().unwrap();

        assert_eq!(record.url(), SHOP);
        assert_eq!(record.name(), "炭火焼鳥 とりまる 新宿店");
        assert_eq!(record.get(Field::Phone), Some("03-1234-5678"));
        assert_eq!(record.get(Field::Address), Some("東京都新宿区西新宿1-1-1"));
        assert_eq!(record.get(Field::Genre), Some("焼き鳥"));
        assert_eq!(record.get(Field::ClosedDays), Some("-"));
        assert_eq!(record.get(Field::CreditCard), Some("-"));
        assert_eq!(record.get(Field::Parking), None);
        assert!(!record.get(Field::RetrievedAt).unwrap().is_empty());
        assert!(nav.state().visited_links.contains(SHOP));
    }

    #[tokio::test]
    async fn test_extract_extended_fields_with_empty_sentinel() {
        let config = ScraperConfig::new()
            .with_delay(0.0, 0.0)
            .with_field_set(FieldSet::Extended)
            .with_sentinel("");
        let mut nav = navigator(&config);
        let extractor = DetailExtractor::from_config(&config);

        let record = extractor
            .extract_listing(&mut nav, SHOP)
            .await
            .into_record()
            .unwrap();

        assert_eq!(record.row().len(), 15);
        assert_eq!(record.get(Field::Parking), Some("無"));
        assert_eq!(record.get(Field::Seats), Some(""));
    }

    #[tokio::test]
    async fn test_missing_phone_uses_sentinel() {
        let config = ScraperConfig::new().with_delay(0.0, 0.0);
        let session = FakeSession::with_pages([(SHOP, FakePage::new().text("h1", "店", ""))]);
        let mut nav = Navigator::new(session, &config);

        let record = DetailExtractor::from_config(&config)
            .extract_listing(&mut nav, SHOP)
            .await
            .into_record()
            .unwrap();
        assert_eq!(record.get(Field::Phone), Some("-"));
    }

    #[tokio::test]
    async fn test_failed_listing_is_skipped() {
        let config = ScraperConfig::new()
            .with_delay(0.0, 0.0)
            .with_failure_policy(FailurePolicy::Skip);
        let mut nav = navigator(&config);

        let outcome = DetailExtractor::from_config(&config)
            .extract_listing(&mut nav, BROKEN)
            .await;

        assert!(matches!(outcome, ListingOutcome::Skipped { .. }));
        assert!(outcome.record().is_none());
        assert!(outcome.error().is_some());
    }

    #[tokio::test]
    async fn test_failed_listing_is_recorded_blank() {
        let config = ScraperConfig::new()
            .with_delay(0.0, 0.0)
            .with_failure_policy(FailurePolicy::RecordBlank);
        let mut nav = navigator(&config);

        let outcome = DetailExtractor::from_config(&config)
            .extract_listing(&mut nav, BROKEN)
            .await;

        let record = outcome.record().unwrap();
        assert_eq!(record.url(), BROKEN);
        assert!(!record.get(Field::RetrievedAt).unwrap().is_empty());
        assert_eq!(record.name(), "-");
        assert_eq!(record.get(Field::Phone), Some("-"));
        assert!(outcome.error().is_some());
    }
}
