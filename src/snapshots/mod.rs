use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::{SNAPSHOT_SCHEMA_VERSION, Snapshot, SnapshotMeta};

const LOCK_FILE_NAME: &str = ".lock";

/// 追記専用のスナップショット履歴。
/// 1観測 = 本文ファイル（snapshot-<nanos>.txt）+ メタデータ（snapshot-<nanos>.json）。
/// 並び順の正はメタデータの captured_at_unix_nanos で、ファイル名の辞書順には依存しない。
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).with_context(|| {
            format!(
                "スナップショットディレクトリの作成に失敗しました: {}",
                dir.display()
            )
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// メタデータ一覧を取得時刻の昇順で返す。
    pub fn list(&self) -> Result<Vec<SnapshotMeta>> {
        let entries = fs::read_dir(&self.dir).with_context(|| {
            format!(
                "スナップショットディレクトリの読み取りに失敗しました: {}",
                self.dir.display()
            )
        })?;

        let mut metas = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| {
                format!(
                    "スナップショットディレクトリの走査に失敗しました: {}",
                    self.dir.display()
                )
            })?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.starts_with("snapshot-") || !name.ends_with(".json") {
                continue;
            }
            let path = entry.path();
            let raw = fs::read_to_string(&path).with_context(|| {
                format!(
                    "スナップショットメタデータの読み取りに失敗しました: {}",
                    path.display()
                )
            })?;
            let meta: SnapshotMeta = serde_json::from_str(&raw).with_context(|| {
                format!(
                    "スナップショットメタデータの解析に失敗しました: {}",
                    path.display()
                )
            })?;
            metas.push(meta);
        }

        metas.sort_by_key(|m| m.captured_at_unix_nanos);
        Ok(metas)
    }

    /// 最新のスナップショットを返す。履歴が空なら None（初回実行の正常系）。
    pub fn latest(&self) -> Result<Option<Snapshot>> {
        let mut metas = self.list()?;
        let Some(meta) = metas.pop() else {
            return Ok(None);
        };

        let path = self.content_path(&meta);
        let content = fs::read_to_string(&path).with_context(|| {
            format!(
                "スナップショット本文の読み取りに失敗しました: {}",
                path.display()
            )
        })?;
        Ok(Some(Snapshot { meta, content }))
    }

    /// 新しいスナップショットを永続化する。取得時刻は既存のどの記録よりも
    /// 厳密に大きくなるよう、壁時計が後退・衝突した場合は最小増分で補正する。
    pub fn append(&self, content: &str, fingerprint: &str, url: &str) -> Result<SnapshotMeta> {
        let last_nanos = self.list()?.last().map(|m| m.captured_at_unix_nanos);

        let now = OffsetDateTime::now_utc();
        let mut nanos = now.unix_timestamp_nanos() as i64;
        if let Some(last) = last_nanos
            && nanos <= last
        {
            nanos = last + 1;
        }

        let captured_at = OffsetDateTime::from_unix_timestamp_nanos(i128::from(nanos))
            .unwrap_or(now)
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string());

        let meta = SnapshotMeta {
            schema_version: SNAPSHOT_SCHEMA_VERSION.to_string(),
            captured_at,
            captured_at_unix_nanos: nanos,
            url: url.to_string(),
            hash: Some(fingerprint.to_string()),
            size_bytes: content.len() as u64,
        };

        let content_path = self.content_path(&meta);
        fs::write(&content_path, content).with_context(|| {
            format!(
                "スナップショット本文の書き込みに失敗しました: {}",
                content_path.display()
            )
        })?;

        let meta_path = self.meta_path(&meta);
        let buf = serde_json::to_vec_pretty(&meta)
            .context("スナップショットメタデータのシリアライズに失敗しました")?;
        fs::write(&meta_path, buf).with_context(|| {
            format!(
                "スナップショットメタデータの書き込みに失敗しました: {}",
                meta_path.display()
            )
        })?;

        Ok(meta)
    }

    fn content_path(&self, meta: &SnapshotMeta) -> PathBuf {
        self.dir
            .join(format!("snapshot-{}.txt", meta.captured_at_unix_nanos))
    }

    fn meta_path(&self, meta: &SnapshotMeta) -> PathBuf {
        self.dir
            .join(format!("snapshot-{}.json", meta.captured_at_unix_nanos))
    }
}

pub fn lock_path(dir: &Path) -> PathBuf {
    dir.join(LOCK_FILE_NAME)
}

/// 同時実行を最大1つに抑えるロックファイル。取得できたら drop 時に解放する。
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// ロックを取得する。すでに保持されている場合は Ok(None)。
    pub fn acquire(dir: &Path) -> Result<Option<RunLock>> {
        fs::create_dir_all(dir).with_context(|| {
            format!(
                "ロック用ディレクトリの作成に失敗しました: {}",
                dir.display()
            )
        })?;

        let path = dir.join(LOCK_FILE_NAME);
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                let _ = writeln!(file, "{}", std::process::id());
                Ok(Some(RunLock { path }))
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
            Err(err) => Err(err).with_context(|| {
                format!("ロックファイルの作成に失敗しました: {}", path.display())
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
