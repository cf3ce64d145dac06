use serde::{Deserialize, Serialize};

use crate::core::SnapshotMeta;

/// 1回の監視実行の結末。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Unchanged,
    InitialCapture,
    Changed,
    ChangedAnalysisSkipped,
    DryRun,
}

impl RunOutcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            RunOutcome::Unchanged => "unchanged",
            RunOutcome::InitialCapture => "initial_capture",
            RunOutcome::Changed => "changed",
            RunOutcome::ChangedAnalysisSkipped => "changed_analysis_skipped",
            RunOutcome::DryRun => "dry_run",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            RunOutcome::Unchanged => "変更なし",
            RunOutcome::InitialCapture => "初回取得",
            RunOutcome::Changed => "変更を検出",
            RunOutcome::ChangedAnalysisSkipped => "変更を検出（解析は未実施）",
            RunOutcome::DryRun => "dry-run（保存なし）",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub schema_version: String,
    pub tool_version: String,
    pub generated_at: String,
    pub url: String,
    pub outcome: RunOutcome,
    pub fingerprint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<SnapshotMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_error: Option<String>,
    pub notified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_markdown_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_json_path: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}
