use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::analysis::{self, AnalysisError, AnalysisProvider, AnalysisRequest};
use crate::config::EffectiveConfig;
use crate::core::{AnalysisResult, RunOutcome, RunReport};
use crate::detect::{self, Decision};
use crate::fetch::Fetcher;
use crate::report::{self, ReportContext};
use crate::snapshots::{RunLock, SnapshotStore};

const RUN_SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub timeout: Duration,
    pub dry_run: bool,
    pub show_progress: bool,
}

/// 1回の監視パスを順番どおりに実行するオーケストレータ。
/// 取得 → 比較 → （変更時のみ）保存 → 解析 → レポート → 通知。
pub struct Engine {
    opts: EngineOptions,
    url: String,
    store: SnapshotStore,
    report_dir: PathBuf,
    excerpt_chars: usize,
    provider: Option<Box<dyn AnalysisProvider>>,
    webhook_url: Option<String>,
    fetcher: Fetcher,
}

impl Engine {
    pub fn new(
        cfg: &EffectiveConfig,
        provider: Option<Box<dyn AnalysisProvider>>,
        webhook_url: Option<String>,
        opts: EngineOptions,
    ) -> Result<Self> {
        let store = SnapshotStore::open(&cfg.storage.snapshot_dir)
            .map_err(crate::exit::store_failed_err)?;
        let fetcher = Fetcher::new(opts.timeout)?;
        Ok(Self {
            opts,
            url: cfg.monitor.url.clone(),
            store,
            report_dir: cfg.storage.report_dir.clone(),
            excerpt_chars: cfg.analysis.excerpt_chars,
            provider,
            webhook_url,
            fetcher,
        })
    }

    pub fn run(&self) -> Result<RunReport> {
        // dry-run は読み取りのみなのでロックを取らない
        let _lock = if self.opts.dry_run {
            None
        } else {
            match RunLock::acquire(self.store.dir()).map_err(crate::exit::store_failed_err)? {
                Some(lock) => Some(lock),
                None => {
                    return Err(crate::exit::lock_held(format!(
                        "別の監視実行が進行中です（ロックファイル: {}）。前回の実行が異常終了している場合は、このファイルを削除してから再実行してください。",
                        crate::snapshots::lock_path(self.store.dir()).display()
                    )));
                }
            }
        };

        let pb = self.spinner("ページを取得中...");
        let fetched = self.fetcher.fetch(&self.url);
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        let content = fetched.map_err(crate::exit::fetch_failed_err)?;

        self.process(content)
    }

    fn process(&self, current_content: String) -> Result<RunReport> {
        let fingerprint = crate::digest::fingerprint(&current_content);
        let mut notes = Vec::new();

        let latest = self
            .store
            .latest()
            .map_err(crate::exit::store_failed_err)?;
        let baseline = latest.map(|snapshot| {
            let (hash, recomputed) = detect::baseline_fingerprint(&snapshot);
            if recomputed {
                notes.push(format!(
                    "基準スナップショット（{}）の指紋がメタデータに無いため、本文から再計算しました",
                    snapshot.meta.captured_at
                ));
            }
            (snapshot, hash)
        });

        let decision = detect::detect(&fingerprint, baseline.as_ref().map(|(_, h)| h.as_str()));

        let now = OffsetDateTime::now_utc();
        let generated_at = now
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string());
        let analysis_date = now.date().to_string();
        let ctx = ReportContext {
            generated_at: generated_at.clone(),
            url: self.url.clone(),
        };

        let (outcome, snapshot, analysis_error, notified, paths) = match decision {
            Decision::Unchanged => {
                if self.opts.dry_run {
                    notes.push("変更なし（dry-run のためレポートは更新しません）".to_string());
                    (RunOutcome::DryRun, None, None, false, None)
                } else {
                    // 変更がなくてもレポートは毎回更新する（監視が生きている印）
                    let analysis = AnalysisResult::no_change(analysis_date);
                    let paths = report::save(&self.report_dir, &analysis, &ctx)
                        .map_err(crate::exit::store_failed_err)?;
                    (RunOutcome::Unchanged, None, None, false, Some(paths))
                }
            }
            Decision::InitialCapture | Decision::Changed => {
                if self.opts.dry_run {
                    notes.push(
                        "変更を検出しました（dry-run のため保存・解析しません）".to_string(),
                    );
                    (RunOutcome::DryRun, None, None, false, None)
                } else {
                    // 解析より先に永続化する。解析が失敗しても変更の記録は残り、
                    // 次回は新しい基準との比較になる（再検出・再解析はしない）。
                    let meta = self
                        .store
                        .append(&current_content, &fingerprint, &self.url)
                        .map_err(crate::exit::store_failed_err)?;

                    let prior = match (decision, &baseline) {
                        (Decision::Changed, Some((snapshot, _))) => {
                            Some(snapshot.content.as_str())
                        }
                        _ => None,
                    };

                    match &self.provider {
                        None => {
                            notes.push(
                                "CLAUDE_API_KEYが設定されていないため、解析とレポート更新をスキップしました"
                                    .to_string(),
                            );
                            (
                                RunOutcome::ChangedAnalysisSkipped,
                                Some(meta),
                                Some(AnalysisError::MissingCredential.to_string()),
                                false,
                                None,
                            )
                        }
                        Some(provider) => {
                            let request = AnalysisRequest {
                                prior_excerpt: prior
                                    .map(|content| analysis::excerpt(content, self.excerpt_chars)),
                                current_excerpt: analysis::excerpt(
                                    &current_content,
                                    self.excerpt_chars,
                                ),
                                analysis_date: &analysis_date,
                            };

                            let pb = self.spinner("Claude APIで解析中...");
                            let analyzed = provider.analyze(&request);
                            if let Some(pb) = pb {
                                pb.finish_and_clear();
                            }

                            match analyzed {
                                Ok(analysis) => {
                                    let paths = report::save(&self.report_dir, &analysis, &ctx)
                                        .map_err(crate::exit::store_failed_err)?;

                                    let mut notified = false;
                                    if let Some(webhook) = &self.webhook_url {
                                        let summary = analysis
                                            .change_summary
                                            .as_deref()
                                            .unwrap_or("変更が検出されました");
                                        match crate::notify::send_slack(
                                            webhook, summary, &self.url,
                                        ) {
                                            Ok(()) => notified = true,
                                            Err(err) => notes.push(format!(
                                                "Slack通知に失敗しました: {err:#}"
                                            )),
                                        }
                                    }

                                    let outcome = if decision == Decision::InitialCapture {
                                        RunOutcome::InitialCapture
                                    } else {
                                        RunOutcome::Changed
                                    };
                                    (outcome, Some(meta), None, notified, Some(paths))
                                }
                                Err(err) => {
                                    notes.push(format!(
                                        "解析に失敗したため、このサイクルのレポート更新をスキップしました: {err}"
                                    ));
                                    (
                                        RunOutcome::ChangedAnalysisSkipped,
                                        Some(meta),
                                        Some(err.to_string()),
                                        false,
                                        None,
                                    )
                                }
                            }
                        }
                    }
                }
            }
        };

        Ok(RunReport {
            schema_version: RUN_SCHEMA_VERSION.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at,
            url: self.url.clone(),
            outcome,
            fingerprint,
            snapshot,
            analysis_error,
            notified,
            report_markdown_path: paths.as_ref().map(|p| p.markdown.display().to_string()),
            report_json_path: paths.as_ref().map(|p| p.json.display().to_string()),
            notes,
        })
    }

    fn spinner(&self, message: &'static str) -> Option<indicatif::ProgressBar> {
        use std::io::IsTerminal;
        if !(self.opts.show_progress && std::io::stderr().is_terminal()) {
            return None;
        }
        let pb = indicatif::ProgressBar::new_spinner();
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    }
}
