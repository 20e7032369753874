use async_trait::async_trait;
use serde_json::{Map, Value};

use super::client::CompletionClient;
use super::prompts;
use super::{ExtractError, IntentExtractor};
use crate::domain::filter::MarketplaceFilter;

/// AI の JSON オブジェクトをマーケットプレイスのフィールド名へ写す。
///
/// 欠損・null・空値は省略し、既定値で埋めない。
fn filter_from_object(object: &Map<String, Value>) -> MarketplaceFilter {
    let field = |key: &str| object.get(key).filter(|v| !v.is_null());

    let duration = field("duration").and_then(|value| {
        let days = positive_days(value);
        if days.is_none() {
            log::debug!("dropping duration {value}: not a positive whole number of days");
        }
        days
    });

    MarketplaceFilter {
        category: field("equipment_type").and_then(non_empty_text),
        location: field("location").and_then(non_empty_text),
        duration,
        max_price: field("budget").and_then(positive_amount),
        features: field("features").map(feature_list).unwrap_or_default(),
    }
}

fn non_empty_text(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// 正の整数だけを日数として受け付ける（丸めはしない）
fn positive_days(value: &Value) -> Option<u32> {
    let days = match value {
        Value::Number(n) => match n.as_u64() {
            Some(days) => u32::try_from(days).ok(),
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f <= u32::MAX as f64)
                .map(|f| f as u32),
        },
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };
    days.filter(|days| *days > 0)
}

fn positive_amount(value: &Value) -> Option<f64> {
    let amount = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    amount.filter(|amount| amount.is_finite() && *amount > 0.0)
}

fn feature_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(non_empty_text).collect(),
        Value::String(_) => non_empty_text(value).into_iter().collect(),
        _ => Vec::new(),
    }
}

/// テキスト中で最初に括弧が釣り合う `{...}` 部分文字列を返す。
///
/// 閉じない `{` は読み飛ばして次の `{` から探し直す。
/// JSON 文字列リテラル内の括弧とエスケープは数えない。
pub fn find_json_object(text: &str) -> Option<&str> {
    let mut from = 0;
    while let Some(pos) = text[from..].find('{') {
        let start = from + pos;
        if let Some(len) = balanced_len(&text[start..]) {
            return Some(&text[start..start + len]);
        }
        from = start + 1;
    }
    None
}

/// `{` で始まる `text` の、釣り合う `}` までのバイト長
fn balanced_len(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// 補完テキストをフィルタに変換する: JSON 部分の検出 → パース → フィールド対応付け
///
/// 同じキーが重複した場合は後の値を使う。
pub fn parse_extraction(text: &str) -> Result<MarketplaceFilter, ExtractError> {
    let json = find_json_object(text)
        .ok_or_else(|| ExtractError::Parse("no JSON object in completion".to_string()))?;

    let value: Value = serde_json::from_str(json)
        .map_err(|e| ExtractError::Parse(format!("invalid JSON in completion: {e}")))?;

    match value {
        Value::Object(object) => Ok(filter_from_object(&object)),
        _ => Err(ExtractError::Parse("completion JSON is not an object".to_string())),
    }
}

/// 生成 AI で書き起こしから検索フィルタを抽出する。
///
/// 失敗時に自分ではフォールバックしない（呼び出し側の責務）。
pub struct AiIntentExtractor<C> {
    client: C,
    name: String,
}

impl<C: CompletionClient> AiIntentExtractor<C> {
    pub fn new(client: C) -> Self {
        let name = format!("ai:{}", client.name());
        Self { client, name }
    }
}

#[async_trait]
impl<C: CompletionClient> IntentExtractor for AiIntentExtractor<C> {
    async fn extract(&self, transcript: &str) -> Result<MarketplaceFilter, ExtractError> {
        let prompt = prompts::build_intent_prompt(transcript);
        log::debug!("intent prompt: {} chars", prompt.len());

        let completion = self.client.complete(&prompt).await?;
        parse_extraction(&completion)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
