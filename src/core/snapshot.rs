use serde::{Deserialize, Serialize};

pub const SNAPSHOT_SCHEMA_VERSION: &str = "1.0";

/// 1回の観測を表す不変レコード。作成後に書き換えない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub schema_version: String,
    /// 表示用のRFC 3339文字列。
    pub captured_at: String,
    /// 並び順と同一性の正とするキー。ファイル名の辞書順には依存しない。
    pub captured_at_unix_nanos: i64,
    pub url: String,
    /// 取得時に計算した指紋。旧形式のメタデータには存在しないことがある。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub meta: SnapshotMeta,
    pub content: String,
}
