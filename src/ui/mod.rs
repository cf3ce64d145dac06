use anyhow::Error;
use std::io::{self, Write};
use unicode_width::UnicodeWidthChar;

use crate::core::{RunReport, SnapshotMeta};

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub stdin_is_tty: bool,
    pub stdout_is_tty: bool,
    pub stderr_is_tty: bool,
    pub quiet: bool,
    pub verbose: bool,
}

pub fn eprintln_error(err: &Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "エラー:");
    let _ = writeln!(stderr, "  {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "原因:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }

    let _ = writeln!(stderr, "次に:");
    let _ = writeln!(
        stderr,
        "  - 詳細を見るには `--verbose` を付けて再実行してください"
    );
    let _ = writeln!(
        stderr,
        "  - 利用可能なコマンド/オプションは `mlitwatch --help` を参照してください"
    );
}

pub fn print_run(report: &RunReport, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }

    let mut out = io::stdout().lock();
    let _ = writeln!(out, "結果: {}", report.outcome.label());
    let _ = writeln!(out, "対象URL: {}", report.url);
    let _ = writeln!(out, "ハッシュ値: {}...", fingerprint_prefix(&report.fingerprint));

    if let Some(snapshot) = &report.snapshot {
        let _ = writeln!(
            out,
            "スナップショット保存: {} ({})",
            snapshot.captured_at,
            format_bytes(snapshot.size_bytes)
        );
    }
    if let Some(path) = &report.report_markdown_path {
        let _ = writeln!(out, "レポート生成: {path}");
    }
    if report.notified {
        let _ = writeln!(out, "Slack通知送信完了");
    }
    if let Some(err) = &report.analysis_error {
        let _ = writeln!(out, "解析: スキップ（{err}）");
    }
    for note in &report.notes {
        let _ = writeln!(out, "- {note}");
    }
}

pub fn print_status(meta: Option<&SnapshotMeta>, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }

    let mut out = io::stdout().lock();
    match meta {
        None => {
            let _ = writeln!(out, "スナップショットはまだありません（初回実行前）");
        }
        Some(meta) => {
            let _ = writeln!(out, "最新スナップショット:");
            let _ = writeln!(out, "  取得日時: {}", meta.captured_at);
            let _ = writeln!(out, "  対象URL: {}", meta.url);
            let _ = writeln!(out, "  サイズ: {}", format_bytes(meta.size_bytes));
            match &meta.hash {
                Some(hash) => {
                    let _ = writeln!(out, "  ハッシュ値: {}...", fingerprint_prefix(hash));
                }
                None => {
                    let _ = writeln!(out, "  ハッシュ値: （旧形式のため未記録）");
                }
            }
        }
    }
}

pub fn print_history(metas: &[SnapshotMeta], cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }

    let mut out = io::stdout().lock();
    if metas.is_empty() {
        let _ = writeln!(out, "スナップショットはまだありません（初回実行前）");
        return;
    }

    let _ = writeln!(out, "スナップショット履歴（{}件）:", metas.len());

    let headers = ["取得日時", "サイズ", "ハッシュ値"];
    let mut rows: Vec<[String; 3]> = Vec::with_capacity(metas.len());
    for meta in metas {
        rows.push([
            meta.captured_at.clone(),
            format_bytes(meta.size_bytes),
            meta.hash
                .as_deref()
                .map(|h| format!("{}...", fingerprint_prefix(h)))
                .unwrap_or_else(|| "（未記録）".to_string()),
        ]);
    }

    let mut widths = [0_usize; 3];
    for (i, header) in headers.iter().enumerate() {
        widths[i] = display_width(header);
    }
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(display_width(cell));
        }
    }

    let _ = writeln!(
        out,
        "{}  {}  {}",
        pad_end(headers[0], widths[0]),
        pad_end(headers[1], widths[1]),
        headers[2]
    );
    for row in &rows {
        let _ = writeln!(
            out,
            "{}  {}  {}",
            pad_end(&row[0], widths[0]),
            pad_end(&row[1], widths[1]),
            row[2]
        );
    }
}

fn fingerprint_prefix(fingerprint: &str) -> &str {
    let end = fingerprint
        .char_indices()
        .nth(16)
        .map(|(i, _)| i)
        .unwrap_or(fingerprint.len());
    &fingerprint[..end]
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let b = bytes as f64;
    if b < KB {
        return format!("{bytes} B");
    }
    if b < MB {
        return format!("{:.1} KiB", b / KB);
    }
    if b < GB {
        return format!("{:.1} MiB", b / MB);
    }
    format!("{:.1} GiB", b / GB)
}

fn pad_end(s: &str, width: usize) -> String {
    let w = display_width(s);
    if w >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - w))
}

fn display_width(s: &str) -> usize {
    s.chars().map(|c| c.width().unwrap_or(0)).sum()
}
