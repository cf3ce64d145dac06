use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// 解析の信頼度。欠落時は unknown として扱う。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
    #[default]
    Unknown,
}

impl Confidence {
    pub const fn as_str(self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
            Confidence::Unknown => "unknown",
        }
    }

    pub const fn marker(self) -> &'static str {
        match self {
            Confidence::High => "🟢",
            Confidence::Medium => "🟡",
            Confidence::Low => "🔴",
            Confidence::Unknown => "⚪",
        }
    }
}

/// 必要なアクション1件。JSONキーは解析プロンプトの出力契約に合わせる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionItem {
    #[serde(rename = "対象者", default)]
    pub audience: String,
    #[serde(rename = "アクション", default)]
    pub action: String,
    #[serde(rename = "期限", default)]
    pub deadline: String,
}

/// 解析結果。confidence 以外はすべて省略可能で、部分的な結果も有効。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_date: Option<String>,
    #[serde(default)]
    pub change_detected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_points: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stakeholder_impact: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub important_dates: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action_items: Vec<ActionItem>,
    #[serde(default)]
    pub confidence: Confidence,
}

impl AnalysisResult {
    /// 変更なしの実行で外部呼び出しをせずにローカル生成する結果。
    pub fn no_change(analysis_date: String) -> Self {
        Self {
            analysis_date: Some(analysis_date),
            change_detected: false,
            change_summary: Some("前回チェックから変更はありませんでした。".to_string()),
            confidence: Confidence::High,
            ..Self::default()
        }
    }
}
