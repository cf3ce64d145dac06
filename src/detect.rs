use crate::core::Snapshot;

/// 変更判定の結果。副作用を持たない純粋な比較として切り出してある。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// 履歴が空（初回実行）。
    InitialCapture,
    Changed,
    Unchanged,
}

/// 現在の指紋と基準スナップショットの指紋を比較する。
pub fn detect(current_fingerprint: &str, baseline_fingerprint: Option<&str>) -> Decision {
    match baseline_fingerprint {
        None => Decision::InitialCapture,
        Some(baseline) if baseline == current_fingerprint => Decision::Unchanged,
        Some(_) => Decision::Changed,
    }
}

/// 基準スナップショットの指紋を解決する。メタデータに保存済みの値を正とし、
/// 旧形式で欠落している場合のみ本文から再計算する（戻り値の bool が再計算フラグ）。
pub fn baseline_fingerprint(snapshot: &Snapshot) -> (String, bool) {
    match &snapshot.meta.hash {
        Some(hash) => (hash.clone(), false),
        None => (crate::digest::fingerprint(&snapshot.content), true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{SNAPSHOT_SCHEMA_VERSION, Snapshot, SnapshotMeta};

    fn snapshot(content: &str, hash: Option<&str>) -> Snapshot {
        Snapshot {
            meta: SnapshotMeta {
                schema_version: SNAPSHOT_SCHEMA_VERSION.to_string(),
                captured_at: "2026-01-01T00:00:00Z".to_string(),
                captured_at_unix_nanos: 1,
                url: "https://example.invalid/page".to_string(),
                hash: hash.map(ToOwned::to_owned),
                size_bytes: content.len() as u64,
            },
            content: content.to_string(),
        }
    }

    #[test]
    fn empty_history_is_initial_capture() {
        assert_eq!(detect("abc", None), Decision::InitialCapture);
    }

    #[test]
    fn equal_fingerprints_are_unchanged() {
        assert_eq!(detect("abc", Some("abc")), Decision::Unchanged);
    }

    #[test]
    fn different_fingerprints_are_changed() {
        assert_eq!(detect("abc", Some("def")), Decision::Changed);
    }

    #[test]
    fn baseline_fingerprint_prefers_stored_hash() {
        let snap = snapshot("PAGE_V1", Some("stored-hash"));
        let (hash, recomputed) = baseline_fingerprint(&snap);
        assert_eq!(hash, "stored-hash");
        assert!(!recomputed);
    }

    #[test]
    fn baseline_fingerprint_recomputes_for_legacy_meta() {
        let snap = snapshot("PAGE_V1", None);
        let (hash, recomputed) = baseline_fingerprint(&snap);
        assert_eq!(hash, crate::digest::fingerprint("PAGE_V1"));
        assert!(recomputed);
    }
}
