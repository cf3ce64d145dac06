use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::AnalysisResult;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// 解析依頼。抜粋はリクエストサイズ制限に収めるため呼び出し側で切り詰める。
#[derive(Debug, Clone)]
pub struct AnalysisRequest<'a> {
    /// 前回本文の抜粋。初回取得では None。
    pub prior_excerpt: Option<&'a str>,
    pub current_excerpt: &'a str,
    pub analysis_date: &'a str,
}

#[derive(Debug)]
pub enum AnalysisError {
    /// CLAUDE_API_KEY が未設定。解析ステップのみ停止する。
    MissingCredential,
    /// 通信・認証・プロバイダ側の失敗。
    Provider(anyhow::Error),
    /// 応答からJSONを取り出せない、または構造が解釈できない。
    MalformedResponse { message: String, raw: String },
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::MissingCredential => {
                write!(f, "CLAUDE_API_KEYが設定されていません")
            }
            AnalysisError::Provider(err) => {
                write!(f, "解析プロバイダの呼び出しに失敗しました: {err}")
            }
            AnalysisError::MalformedResponse { message, .. } => {
                write!(f, "解析応答の解釈に失敗しました: {message}")
            }
        }
    }
}

impl std::error::Error for AnalysisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AnalysisError::Provider(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

/// 意味的な差分要約の提供者。テストではローカルのスタブに差し替える。
pub trait AnalysisProvider {
    fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<AnalysisResult, AnalysisError>;
}

/// Anthropic Messages API を使う本番プロバイダ。
pub struct ClaudeProvider {
    api_key: String,
    model: String,
    max_tokens: u32,
    client: reqwest::blocking::Client,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl ClaudeProvider {
    pub fn new(api_key: String, model: String, max_tokens: u32, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("解析用HTTPクライアントの作成に失敗しました")?;
        Ok(Self {
            api_key,
            model,
            max_tokens,
            client,
        })
    }
}

impl AnalysisProvider for ClaudeProvider {
    fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<AnalysisResult, AnalysisError> {
        let prompt = build_prompt(request);
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: 0.0,
            messages: vec![Message {
                role: "user",
                content: &prompt,
            }],
        };

        let response = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .map_err(|err| AnalysisError::Provider(err.into()))?;
        let response = response
            .error_for_status()
            .map_err(|err| AnalysisError::Provider(err.into()))?;
        let parsed: MessagesResponse = response
            .json()
            .map_err(|err| AnalysisError::Provider(err.into()))?;

        let text = parsed
            .content
            .iter()
            .find(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .unwrap_or("");
        parse_analysis_text(text)
    }
}

/// 応答テキストから最初の `{` と最後の `}` に挟まれたJSONを取り出して解釈する。
pub fn parse_analysis_text(text: &str) -> Result<AnalysisResult, AnalysisError> {
    let start = text.find('{');
    let end = text.rfind('}');
    let (Some(start), Some(end)) = (start, end) else {
        return Err(AnalysisError::MalformedResponse {
            message: "JSON形式の抽出に失敗しました".to_string(),
            raw: text.to_string(),
        });
    };
    if end < start {
        return Err(AnalysisError::MalformedResponse {
            message: "JSON形式の抽出に失敗しました".to_string(),
            raw: text.to_string(),
        });
    }

    serde_json::from_str(&text[start..=end]).map_err(|err| AnalysisError::MalformedResponse {
        message: err.to_string(),
        raw: text.to_string(),
    })
}

/// 文字数上限で抜粋を切り出す（文字境界を守る）。
pub fn excerpt(content: &str, max_chars: usize) -> &str {
    match content.char_indices().nth(max_chars) {
        Some((index, _)) => &content[..index],
        None => content,
    }
}

pub fn build_prompt(request: &AnalysisRequest<'_>) -> String {
    let (prompt_type, old_excerpt) = match request.prior_excerpt {
        Some(prior) => ("差分解析", prior),
        None => ("初回取得", "なし（初回）"),
    };

    format!(
        r#"あなたは国土交通省の物流効率化法に詳しい実務専門家です。

【タスク】
物流効率化法のウェブページを解析し、重要な情報を抽出してください。

【{prompt_type}】

旧版（抜粋）:
{old_excerpt}

新版（抜粋）:
{current}

【出力形式】
以下のJSON形式で出力してください：

{{
  "analysis_date": "{date}",
  "change_detected": true/false,
  "change_summary": "変更の概要を3〜5行で説明",
  "key_points": [
    "重要ポイント1",
    "重要ポイント2",
    "重要ポイント3"
  ],
  "stakeholder_impact": {{
    "荷主": "荷主への影響",
    "運送事業者": "運送事業者への影響",
    "軽トラック事業者": "軽トラック事業者への影響"
  }},
  "important_dates": {{
    "施行日": "YYYY-MM-DD",
    "その他重要日": "YYYY-MM-DD"
  }},
  "action_items": [
    {{
      "対象者": "荷主/運送事業者/軽トラック事業者",
      "アクション": "具体的な行動",
      "期限": "YYYY-MM-DD"
    }}
  ],
  "confidence": "high/medium/low"
}}

【注意】
- 推測の場合は confidence を "low" に設定
- 日付が不明な場合は "未定" と記載
- 根拠が明確な情報のみを記載"#,
        current = request.current_excerpt,
        date = request.analysis_date,
    )
}
