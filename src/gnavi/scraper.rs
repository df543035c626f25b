//! スクレイピング実行の制御
//!
//! 検索結果ページを順にたどり、店舗ページを1件ずつ取得する。
//! キャンセルはループの先頭でのみ確認する（読み込み中の遷移は中断しない）。
//! ブラウザはどの終了経路でも必ず閉じる。

use std::path::{Path, PathBuf};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::browser::Navigator;
use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::export::{resolve_output_path, TabularExporter};
use crate::traits::{BrowserSession, SessionBackend};

use super::detail::DetailExtractor;
use super::links::extract_listing_links;
use super::locale::build_search_url;
use super::types::{
    CancelFlag, ListingRecord, OutputTarget, ProgressEvent, RunReport, RunState, RunStatus,
    ScrapeJob, SearchCriteria,
};

/// 進捗の送信先。受信側が閉じていても実行には影響させない
#[derive(Debug, Clone, Default)]
struct Reporter(Option<UnboundedSender<ProgressEvent>>);

impl Reporter {
    fn send(&self, event: ProgressEvent) {
        if let Some(tx) = &self.0 {
            let _ = tx.send(event);
        }
    }

    fn status(&self, state: &mut RunState, status: RunStatus) {
        state.status = status;
        info!("ステータス: {}", status);
        self.send(ProgressEvent::Status(status));
    }
}

pub struct ScrapeOrchestrator<B: SessionBackend> {
    backend: B,
    config: ScraperConfig,
}

impl<B: SessionBackend> ScrapeOrchestrator<B> {
    pub fn new(backend: B, config: ScraperConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    /// 1回分の実行。`progress` にはステータスと進捗が流れる
    pub async fn run(
        &self,
        job: ScrapeJob,
        cancel: CancelFlag,
        progress: Option<UnboundedSender<ProgressEvent>>,
    ) -> Result<RunReport, ScraperError> {
        let reporter = Reporter(progress);
        let mut state = RunState::default();

        match self.execute(&job, &cancel, &reporter, &mut state).await {
            Ok(report) => Ok(report),
            Err(e) => {
                error!("スクレイピングエラー: {}", e);
                reporter.status(&mut state, RunStatus::Failed);
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        job: &ScrapeJob,
        cancel: &CancelFlag,
        reporter: &Reporter,
        state: &mut RunState,
    ) -> Result<RunReport, ScraperError> {
        self.config.validate()?;
        job.validate()?;
        let start_url = build_search_url(&job.criteria)?;

        reporter.status(state, RunStatus::Running);
        info!(
            "スクレイピング開始: {} (目標 {} 件) {}",
            job.criteria.region, job.criteria.target_count, start_url
        );

        let session = self.backend.launch(&self.config).await?;
        let mut navigator = Navigator::new(session, &self.config);

        let crawled = self
            .crawl(
                &mut navigator,
                &job.criteria,
                start_url.as_str(),
                cancel,
                reporter,
                state,
            )
            .await;
        let pages_visited = navigator.state().page_number;
        let backend_path = navigator.session().executable().map(Path::to_path_buf);
        navigator.close().await;
        crawled?;

        let records = std::mem::take(&mut state.collected);
        info!(
            "巡回終了: {} 件取得 / {} 件試行 / {} ページ",
            records.len(),
            state.progress_count,
            pages_visited
        );

        if state.cancel_requested {
            reporter.status(state, RunStatus::Cancelled);
            return Ok(RunReport {
                status: RunStatus::Cancelled,
                records,
                pages_visited,
                output_path: None,
                backend_path,
            });
        }

        let output_path = match &job.output {
            Some(target) => Some(self.export(&records, target).await?),
            None => None,
        };

        reporter.status(state, RunStatus::Completed);
        Ok(RunReport {
            status: RunStatus::Completed,
            records,
            pages_visited,
            output_path,
            backend_path,
        })
    }

    async fn crawl<S: BrowserSession>(
        &self,
        navigator: &mut Navigator<S>,
        criteria: &SearchCriteria,
        start_url: &str,
        cancel: &CancelFlag,
        reporter: &Reporter,
        state: &mut RunState,
    ) -> Result<(), ScraperError> {
        let extractor = DetailExtractor::from_config(&self.config);
        let target = criteria.target_count as usize;
        let max_pages = self.config.max_pages.max(1);

        navigator.open_results(start_url).await?;

        loop {
            if observe_cancel(cancel, reporter, state) {
                return Ok(());
            }

            let page = navigator.state().page_number;
            // 上限は訪問済みを除いた後に適用する
            let links: Vec<String> = extract_listing_links(navigator, usize::MAX)
                .await
                .into_iter()
                .filter(|link| !navigator.state().visited_links.contains(link))
                .take(self.config.links_per_page)
                .collect();
            reporter.send(ProgressEvent::PageLoaded {
                page,
                url: navigator.state().current_url.clone(),
                links: links.len(),
            });
            if links.is_empty() {
                info!("ページ {} に新しい店舗リンクがありません", page);
                return Ok(());
            }

            for link in links {
                if observe_cancel(cancel, reporter, state) {
                    return Ok(());
                }
                if state.collected.len() >= target {
                    break;
                }

                state.progress_count += 1;
                let outcome = extractor.extract_listing(navigator, &link).await;
                if let Some(reason) = outcome.error() {
                    reporter.send(ProgressEvent::ListingFailed {
                        url: link.clone(),
                        reason: reason.to_string(),
                    });
                }
                if let Some(record) = outcome.into_record() {
                    collect(record, criteria.target_count, reporter, state);
                }
            }

            if state.collected.len() >= target {
                info!("目標件数 {} 件に到達", target);
                return Ok(());
            }
            if page >= max_pages {
                info!("ページ上限 ({}) に到達", max_pages);
                return Ok(());
            }
            if observe_cancel(cancel, reporter, state) {
                return Ok(());
            }
            if !navigator.advance_page().await? {
                info!("次のページがありません");
                return Ok(());
            }
            reporter.send(ProgressEvent::PageTurned {
                page: navigator.state().page_number,
            });
        }
    }

    async fn export(
        &self,
        records: &[ListingRecord],
        target: &OutputTarget,
    ) -> Result<PathBuf, ScraperError> {
        let exporter = TabularExporter::new(self.config.sentinel.clone());
        let destination = resolve_output_path(&target.directory, &target.file_name);
        let records = records.to_vec();

        tokio::task::spawn_blocking(move || exporter.export_records(&records, &destination))
            .await
            .map_err(|e| ScraperError::ExportWrite(e.to_string()))?
    }
}

impl<B: SessionBackend + 'static> ScrapeOrchestrator<B> {
    /// バックグラウンドタスクで実行する
    pub fn spawn(self, job: ScrapeJob) -> RunHandle {
        let cancel = CancelFlag::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let flag = cancel.clone();
        let task = tokio::spawn(async move { self.run(job, flag, Some(tx)).await });

        RunHandle {
            cancel,
            events: rx,
            task,
        }
    }
}

fn collect(record: ListingRecord, target: u32, reporter: &Reporter, state: &mut RunState) {
    let name = record.name().to_string();
    state.collected.push(record);
    info!("取得済み: {}/{} - {}", state.collected.len(), target, name);
    reporter.send(ProgressEvent::RecordCollected {
        count: state.collected.len(),
        target,
        name,
    });
}

/// キャンセル要求を確認する。初めて見つけたときに停止中へ移る
fn observe_cancel(cancel: &CancelFlag, reporter: &Reporter, state: &mut RunState) -> bool {
    if !cancel.is_cancelled() {
        return false;
    }
    if !state.cancel_requested {
        state.cancel_requested = true;
        warn!("停止要求を受け付けました");
        reporter.status(state, RunStatus::Stopping);
    }
    true
}

/// 実行中のジョブへのハンドル
pub struct RunHandle {
    cancel: CancelFlag,
    events: UnboundedReceiver<ProgressEvent>,
    task: JoinHandle<Result<RunReport, ScraperError>>,
}

impl RunHandle {
    /// 停止を要求する（次のループ境界で止まる）
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// 次の進捗イベント。実行が終わり、すべて受け取ると `None`
    pub async fn next_event(&mut self) -> Option<ProgressEvent> {
        self.events.recv().await
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn join(self) -> Result<RunReport, ScraperError> {
        self.task
            .await
            .map_err(|e| ScraperError::Navigation(format!("実行タスクが異常終了しました: {}", e)))?
    }
}
