use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("未対応の地域です: {0}")]
    UnsupportedRegion(String),

    #[error("検索条件が不正です: {0}")]
    InvalidCriteria(String),

    #[error("ブラウザを利用できません: {0}")]
    BackendUnavailable(String),

    #[error("タイムアウト: {url} ({timeout_secs}秒以内に読み込みが完了しませんでした)")]
    NavigationTimeout { url: String, timeout_secs: u64 },

    #[error("ナビゲーションエラー: {0}")]
    Navigation(String),

    #[error("保存するデータがありません")]
    EmptyResultSet,

    #[error("Excel書き込みエラー: {0}")]
    ExportWrite(String),

    #[error("設定ファイルエラー: {0}")]
    Config(String),

    #[error("ファイル操作エラー: {0}")]
    FileIO(#[from] std::io::Error),
}

impl From<rust_xlsxwriter::XlsxError> for ScraperError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        ScraperError::ExportWrite(e.to_string())
    }
}

impl From<serde_json::Error> for ScraperError {
    fn from(e: serde_json::Error) -> Self {
        ScraperError::Config(e.to_string())
    }
}
