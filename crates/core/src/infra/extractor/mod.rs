pub mod ai;
pub mod client;
pub mod keyword;
pub mod prompts;

pub use ai::AiIntentExtractor;
pub use client::{CompletionClient, CompletionError, GeminiClient};
pub use keyword::{extract_basic, KeywordExtractor};

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::filter::{FilterSource, MarketplaceFilter};
use crate::domain::settings::VoiceSearchSettings;

/// 抽出エラー。呼び出し側（オーケストレータ）がフォールバックの判断に使う。
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Extractor not configured: {0}")]
    NotConfigured(String),
    #[error("Completion request failed: {0}")]
    Transport(String),
    #[error("Unparseable completion: {0}")]
    Parse(String),
    #[error("Extraction timeout")]
    Timeout,
}

impl From<CompletionError> for ExtractError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::InvalidResponse(msg) => Self::Parse(msg),
            other => Self::Transport(other.to_string()),
        }
    }
}

/// 書き起こしから検索フィルタを抽出する trait
#[async_trait]
pub trait IntentExtractor: Send + Sync {
    async fn extract(&self, transcript: &str) -> Result<MarketplaceFilter, ExtractError>;

    fn name(&self) -> &str;

    /// 成功時の結果にどの経路のタグを付けるか
    fn source(&self) -> FilterSource {
        FilterSource::Ai
    }
}

/// 設定から抽出器を構築する（API キーがあれば生成 AI、なければキーワード）
pub fn create_intent_extractor(settings: &VoiceSearchSettings) -> Arc<dyn IntentExtractor> {
    match settings.ai_api_key.as_deref() {
        Some(api_key) => match GeminiClient::new(
            settings.ai_endpoint.clone(),
            settings.ai_model.clone(),
            api_key.to_string(),
        ) {
            Ok(client) => {
                log::info!("AI intent extractor selected (model={})", settings.ai_model);
                Arc::new(AiIntentExtractor::new(client))
            }
            Err(e) => {
                log::warn!("AI client unavailable ({e}), using keyword extractor");
                Arc::new(KeywordExtractor)
            }
        },
        None => {
            log::warn!("No AI API key configured, using keyword extractor");
            Arc::new(KeywordExtractor)
        }
    }
}
