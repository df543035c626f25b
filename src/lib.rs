//! ぐるなび店舗情報スクレイパー
//!
//! - 都道府県・エリア・ジャンルなどの条件から検索結果ページを巡回
//! - 店舗ページから店舗名・電話番号・住所などを取得
//! - 取得結果を集計シート付きのExcelファイルに保存
//!
//! # tower::Service として使う
//!
//! ```rust,ignore
//! use gnavi_scraper::{ScrapeRequest, ScraperService, SearchCriteria};
//! use tower::Service;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut service = ScraperService::new();
//!
//!     let criteria = SearchCriteria::new("東京都")
//!         .with_locality("新宿")
//!         .with_genre("居酒屋")
//!         .with_target_count(50);
//!     let request = ScrapeRequest::new(criteria)
//!         .with_config_path("scraper_config.json")
//!         .with_output("./output", "ぐるなび_新宿_居酒屋");
//!
//!     let result = service.call(request).await.unwrap();
//!     println!("Saved: {:?} ({} records)", result.output_path, result.records.len());
//! }
//! ```
//!
//! # バックグラウンド実行と停止
//!
//! ```rust,ignore
//! use gnavi_scraper::{ChromeBackend, ScrapeJob, ScrapeOrchestrator, ScraperConfig, SearchCriteria};
//!
//! #[tokio::main]
//! async fn main() {
//!     let orchestrator = ScrapeOrchestrator::new(ChromeBackend::new(), ScraperConfig::new());
//!     let mut handle = orchestrator.spawn(ScrapeJob::new(SearchCriteria::new("大阪府")));
//!
//!     while let Some(event) = handle.next_event().await {
//!         println!("{:?}", event);
//!     }
//!     let report = handle.join().await.unwrap();
//!     println!("{}: {} records", report.status, report.records.len());
//! }
//! ```

pub mod browser;
pub mod config;
pub mod error;
pub mod export;
pub mod gnavi;
pub mod service;
pub mod traits;

#[cfg(test)]
mod testing;

// 主要な型をリエクスポート
pub use browser::{ChromeBackend, ChromeSession, Navigator};
pub use config::{FailurePolicy, FieldSet, ScraperConfig};
pub use error::ScraperError;
pub use export::{resolve_output_path, timestamped_file_name, TabularExporter};
pub use service::{ScrapeRequest, ScrapeResult, ScraperService};
pub use traits::{BrowserSession, SessionBackend};

pub use gnavi::{
    list_genres, list_regions, CancelFlag, Field, ListingRecord, OutputTarget, ProgressEvent,
    RunHandle, RunReport, RunStatus, ScrapeJob, ScrapeOrchestrator, SearchCriteria,
};
