//! ぐるなびスクレイパーの型定義

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::FieldSet;
use crate::error::ScraperError;

/// 取得件数の上限
pub const MAX_TARGET_COUNT: u32 = 1000;

/// 店舗情報の項目
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Url,
    Name,
    Phone,
    Address,
    Genre,
    NearestStation,
    BusinessHours,
    ClosedDays,
    Seats,
    Budget,
    PrivateRoom,
    Smoking,
    Parking,
    CreditCard,
    RetrievedAt,
}

const BASIC_FIELDS: &[Field] = &[
    Field::Url,
    Field::Name,
    Field::Phone,
    Field::Address,
    Field::Genre,
    Field::BusinessHours,
    Field::ClosedDays,
    Field::CreditCard,
    Field::RetrievedAt,
];

const EXTENDED_FIELDS: &[Field] = &[
    Field::Url,
    Field::Name,
    Field::Phone,
    Field::Address,
    Field::Genre,
    Field::NearestStation,
    Field::BusinessHours,
    Field::ClosedDays,
    Field::Seats,
    Field::Budget,
    Field::PrivateRoom,
    Field::Smoking,
    Field::Parking,
    Field::CreditCard,
    Field::RetrievedAt,
];

impl Field {
    /// Excelの列見出し
    pub fn label(self) -> &'static str {
        match self {
            Field::Url => "URL",
            Field::Name => "店舗名",
            Field::Phone => "電話番号",
            Field::Address => "住所",
            Field::Genre => "ジャンル",
            Field::NearestStation => "最寄り駅",
            Field::BusinessHours => "営業時間",
            Field::ClosedDays => "定休日",
            Field::Seats => "座席数",
            Field::Budget => "予算",
            Field::PrivateRoom => "個室",
            Field::Smoking => "禁煙・喫煙",
            Field::Parking => "駐車場",
            Field::CreditCard => "クレジットカード",
            Field::RetrievedAt => "取得日時",
        }
    }

    /// ページから読み取る項目か（URLと取得日時以外）
    pub fn is_scraped(self) -> bool {
        !matches!(self, Field::Url | Field::RetrievedAt)
    }
}

impl FieldSet {
    /// 列の並び順
    pub fn fields(self) -> &'static [Field] {
        match self {
            FieldSet::Basic => BASIC_FIELDS,
            FieldSet::Extended => EXTENDED_FIELDS,
        }
    }
}

/// 1店舗分のレコード。項目セットのすべての項目が必ず値を持つ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRecord {
    field_set: FieldSet,
    values: HashMap<Field, String>,
}

impl ListingRecord {
    /// すべての項目を `sentinel` で埋めたレコード
    pub fn blank(
        field_set: FieldSet,
        url: impl Into<String>,
        retrieved_at: impl Into<String>,
        sentinel: &str,
    ) -> Self {
        let mut values: HashMap<Field, String> = field_set
            .fields()
            .iter()
            .map(|field| (*field, sentinel.to_string()))
            .collect();
        values.insert(Field::Url, url.into());
        values.insert(Field::RetrievedAt, retrieved_at.into());
        Self { field_set, values }
    }

    /// 値を設定する。項目セットに含まれない項目は無視する
    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        if let Some(slot) = self.values.get_mut(&field) {
            *slot = value.into();
        }
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    pub fn field_set(&self) -> FieldSet {
        self.field_set
    }

    pub fn url(&self) -> &str {
        self.get(Field::Url).unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.get(Field::Name).unwrap_or_default()
    }

    /// 列順に並べた値
    pub fn row(&self) -> Vec<String> {
        self.field_set
            .fields()
            .iter()
            .map(|field| self.values.get(field).cloned().unwrap_or_default())
            .collect()
    }
}

/// 検索条件。実行開始後は変更しない
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCriteria {
    /// 都道府県（必須）
    pub region: String,
    /// 市区町村・エリア
    pub locality: Option<String>,
    pub genre: Option<String>,
    pub station: Option<String>,
    pub free_text: Option<String>,
    pub target_count: u32,
}

impl SearchCriteria {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            locality: None,
            genre: None,
            station: None,
            free_text: None,
            target_count: 100,
        }
    }

    pub fn with_locality(mut self, locality: impl Into<String>) -> Self {
        self.locality = Some(locality.into());
        self
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn with_station(mut self, station: impl Into<String>) -> Self {
        self.station = Some(station.into());
        self
    }

    pub fn with_free_text(mut self, text: impl Into<String>) -> Self {
        self.free_text = Some(text.into());
        self
    }

    pub fn with_target_count(mut self, count: u32) -> Self {
        self.target_count = count;
        self
    }

    pub fn validate(&self) -> Result<(), ScraperError> {
        if self.region.trim().is_empty() {
            return Err(ScraperError::InvalidCriteria(
                "都道府県を指定してください".into(),
            ));
        }
        if self.target_count == 0 || self.target_count > MAX_TARGET_COUNT {
            return Err(ScraperError::InvalidCriteria(format!(
                "最大件数は1-{}の範囲で指定してください: {}",
                MAX_TARGET_COUNT, self.target_count
            )));
        }
        Ok(())
    }
}

/// 空白のみの値を `None` として扱う
pub(crate) fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Excelの出力先
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub directory: PathBuf,
    pub file_name: String,
}

impl OutputTarget {
    pub fn new(directory: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            file_name: file_name.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ScraperError> {
        if self.file_name.trim().is_empty() {
            return Err(ScraperError::InvalidCriteria(
                "ファイル名を入力してください".into(),
            ));
        }
        Ok(())
    }
}

/// 1回分の実行内容
#[derive(Debug, Clone)]
pub struct ScrapeJob {
    pub criteria: SearchCriteria,
    /// `None` なら書き出しを行わず、レコードだけを返す
    pub output: Option<OutputTarget>,
}

impl ScrapeJob {
    pub fn new(criteria: SearchCriteria) -> Self {
        Self {
            criteria,
            output: None,
        }
    }

    pub fn with_output(mut self, output: OutputTarget) -> Self {
        self.output = Some(output);
        self
    }

    pub fn validate(&self) -> Result<(), ScraperError> {
        self.criteria.validate()?;
        if let Some(output) = &self.output {
            output.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Idle,
    Running,
    Stopping,
    Completed,
    Cancelled,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunStatus::Idle => "待機中",
            RunStatus::Running => "実行中",
            RunStatus::Stopping => "停止中",
            RunStatus::Completed => "完了",
            RunStatus::Cancelled => "停止されました",
            RunStatus::Failed => "エラー",
        };
        f.write_str(label)
    }
}

/// 実行中の状態（オーケストレーターが専有する）
#[derive(Debug, Clone)]
pub struct RunState {
    pub status: RunStatus,
    pub collected: Vec<ListingRecord>,
    /// 試行した店舗数（スキップしたものを含む）
    pub progress_count: usize,
    pub cancel_requested: bool,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            status: RunStatus::Idle,
            collected: Vec::new(),
            progress_count: 0,
            cancel_requested: false,
        }
    }
}

/// 協調的キャンセル用のフラグ
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 進捗イベント（表示側へ一方向に流す）
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Status(RunStatus),
    PageLoaded {
        page: u32,
        url: String,
        links: usize,
    },
    RecordCollected {
        count: usize,
        target: u32,
        name: String,
    },
    ListingFailed {
        url: String,
        reason: String,
    },
    PageTurned {
        page: u32,
    },
}

/// 実行結果
#[derive(Debug, Clone)]
pub struct RunReport {
    pub status: RunStatus,
    pub records: Vec<ListingRecord>,
    pub pages_visited: u32,
    /// 書き出したExcelファイル
    pub output_path: Option<PathBuf>,
    /// 実行に使ったブラウザ（判明している場合）
    pub backend_path: Option<PathBuf>,
}
