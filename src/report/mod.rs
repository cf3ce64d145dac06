use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::AnalysisResult;

pub const REPORT_SCHEMA_VERSION: &str = "1.0";
pub const MARKDOWN_FILE_NAME: &str = "index.md";
pub const JSON_FILE_NAME: &str = "latest.json";

/// レンダリングに埋め込む固定コンテキスト。
/// 同じ解析結果と同じコンテキストからは常にバイト同一の出力になる。
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub generated_at: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
struct MachineReport<'a> {
    schema_version: &'static str,
    tool_version: &'static str,
    generated_at: &'a str,
    url: &'a str,
    analysis: &'a AnalysisResult,
}

#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub markdown: PathBuf,
    pub json: PathBuf,
}

/// 人間可読のMarkdownレポート。欠落フィールドの節は出力しない。
pub fn render_markdown(analysis: &AnalysisResult, ctx: &ReportContext) -> String {
    let mut md = format!(
        "# 物流効率化法 監視レポート\n\n\
         **最終更新**: {generated_at}  \n\
         **対象URL**: [{url}]({url})\n\n\
         ---\n\n\
         ## 📋 解析結果\n\n\
         ### 変更検知\n\n",
        generated_at = ctx.generated_at,
        url = ctx.url,
    );

    if analysis.change_detected {
        md.push_str("🆕 **変更が検出されました**\n\n");
    } else {
        md.push_str("✨ 変更なし（前回から更新なし）\n\n");
    }

    if let Some(summary) = &analysis.change_summary {
        md.push_str(&format!("### 変更概要\n\n{summary}\n\n"));
    }

    if !analysis.key_points.is_empty() {
        md.push_str("### 重要ポイント\n\n");
        for (i, point) in analysis.key_points.iter().enumerate() {
            md.push_str(&format!("{}. {point}\n", i + 1));
        }
        md.push('\n');
    }

    if !analysis.stakeholder_impact.is_empty() {
        md.push_str("## 👥 対象者別の影響\n\n");
        for (stakeholder, impact) in &analysis.stakeholder_impact {
            md.push_str(&format!("### {stakeholder}\n\n{impact}\n\n"));
        }
    }

    if !analysis.important_dates.is_empty() {
        md.push_str("## 📅 重要な日程\n\n");
        md.push_str("| 項目 | 日付 |\n");
        md.push_str("|------|------|\n");
        for (item, date) in &analysis.important_dates {
            md.push_str(&format!("| {item} | {date} |\n"));
        }
        md.push('\n');
    }

    if !analysis.action_items.is_empty() {
        md.push_str("## ✅ 必要なアクション\n\n");
        md.push_str("| 対象者 | アクション | 期限 |\n");
        md.push_str("|--------|-----------|------|\n");
        for item in &analysis.action_items {
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                cell(&item.audience),
                cell(&item.action),
                cell(&item.deadline)
            ));
        }
        md.push('\n');
    }

    md.push_str(&format!(
        "## 📊 解析信頼度\n\n{marker} **{level}**\n\n",
        marker = analysis.confidence.marker(),
        level = analysis.confidence.as_str().to_uppercase(),
    ));

    md.push_str("---\n\n");
    md.push_str(&format!(
        "*このレポートは自動生成されました。最新情報は必ず[公式サイト]({url})でご確認ください。*\n",
        url = ctx.url,
    ));

    md
}

/// 機械可読のJSONミラー。
pub fn render_json(analysis: &AnalysisResult, ctx: &ReportContext) -> Result<String> {
    let report = MachineReport {
        schema_version: REPORT_SCHEMA_VERSION,
        tool_version: env!("CARGO_PKG_VERSION"),
        generated_at: &ctx.generated_at,
        url: &ctx.url,
        analysis,
    };
    let mut buf = serde_json::to_string_pretty(&report)
        .context("レポート(JSON)のシリアライズに失敗しました")?;
    buf.push('\n');
    Ok(buf)
}

/// 両形式のレポートを固定パスへ上書き保存する。毎回全体を再生成する。
pub fn save(dir: &Path, analysis: &AnalysisResult, ctx: &ReportContext) -> Result<ReportPaths> {
    std::fs::create_dir_all(dir).with_context(|| {
        format!(
            "レポートディレクトリの作成に失敗しました: {}",
            dir.display()
        )
    })?;

    let markdown = dir.join(MARKDOWN_FILE_NAME);
    std::fs::write(&markdown, render_markdown(analysis, ctx)).with_context(|| {
        format!(
            "レポート(Markdown)の書き込みに失敗しました: {}",
            markdown.display()
        )
    })?;

    let json = dir.join(JSON_FILE_NAME);
    std::fs::write(&json, render_json(analysis, ctx)?).with_context(|| {
        format!(
            "レポート(JSON)の書き込みに失敗しました: {}",
            json.display()
        )
    })?;

    Ok(ReportPaths { markdown, json })
}

fn cell(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}
