use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::Service;
use tracing::{info, warn};

use crate::browser::ChromeBackend;
use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::gnavi::{
    CancelFlag, ListingRecord, OutputTarget, RunReport, RunStatus, ScrapeJob, ScrapeOrchestrator,
    SearchCriteria,
};
use crate::traits::SessionBackend;

/// スクレイピングリクエスト
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub job: ScrapeJob,
    /// 明示的な設定。`None` なら `config_path` から読み込む
    pub config: Option<ScraperConfig>,
    /// 設定ファイル（見つかったブラウザのパスもここへ書き戻す）
    pub config_path: Option<PathBuf>,
    pub headless: Option<bool>,
    pub cancel: CancelFlag,
}

impl ScrapeRequest {
    pub fn new(criteria: SearchCriteria) -> Self {
        Self {
            job: ScrapeJob::new(criteria),
            config: None,
            config_path: None,
            headless: None,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_output(mut self, directory: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        self.job = self.job.with_output(OutputTarget::new(directory, file_name));
        self
    }

    pub fn with_config(mut self, config: ScraperConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = Some(headless);
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// 実行に使う設定（明示的な設定 → 設定ファイル → デフォルト）
    pub fn resolve_config(&self) -> Result<ScraperConfig, ScraperError> {
        let config = match (&self.config, &self.config_path) {
            (Some(config), _) => config.clone(),
            (None, Some(path)) => ScraperConfig::load(path)?,
            (None, None) => ScraperConfig::default(),
        };
        Ok(match self.headless {
            Some(headless) => config.with_headless(headless),
            None => config,
        })
    }
}

/// スクレイピング結果
#[derive(Debug)]
pub struct ScrapeResult {
    pub status: RunStatus,
    pub records: Vec<ListingRecord>,
    pub pages_visited: u32,
    pub output_path: Option<PathBuf>,
}

impl From<RunReport> for ScrapeResult {
    fn from(report: RunReport) -> Self {
        Self {
            status: report.status,
            records: report.records,
            pages_visited: report.pages_visited,
            output_path: report.output_path,
        }
    }
}

/// tower::Serviceを実装したスクレイパーサービス
pub struct ScraperService<B = ChromeBackend> {
    backend: Arc<B>,
}

impl ScraperService {
    pub fn new() -> Self {
        Self::with_backend(ChromeBackend::new())
    }
}

impl Default for ScraperService {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> ScraperService<B> {
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }
}

impl<B> Clone for ScraperService<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: SessionBackend + 'static> Service<ScrapeRequest> for ScraperService<B> {
    type Response = ScrapeResult;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ScrapeRequest) -> Self::Future {
        info!(
            "スクレイピングリクエスト受信: region={}, target={}",
            req.job.criteria.region, req.job.criteria.target_count
        );
        let backend = Arc::clone(&self.backend);

        Box::pin(async move {
            let config = req.resolve_config()?;
            let configured_path = config.backend_path.clone();

            let orchestrator = ScrapeOrchestrator::new(backend, config);
            let report = orchestrator.run(req.job, req.cancel, None).await?;

            // 環境変数から見つけたブラウザは次回以降のために設定ファイルへ保存
            if let (None, Some(found), Some(config_path)) =
                (configured_path, &report.backend_path, &req.config_path)
            {
                if let Err(e) = ScraperConfig::remember_backend_path(config_path, found) {
                    warn!("ブラウザのパスを保存できませんでした: {}", e);
                }
            }

            let result = ScrapeResult::from(report);
            info!(
                "スクレイピング完了: status={}, records={}, output={:?}",
                result.status,
                result.records.len(),
                result.output_path
            );
            Ok(result)
        })
    }
}
