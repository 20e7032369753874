use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// テキスト補完 API のエラー
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("HTTP request failed: {0}")]
    Request(String),
    #[error("rate limited")]
    RateLimited,
    #[error("completion API error: {status} - {body}")]
    Status { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// 生成 AI のテキスト補完エンドポイント
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// プロンプトを送り、ストリーミングなしで全文を受け取る。
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;

    fn name(&self) -> &str;
}

/// Google Generative Language API (generateContent) クライアント
pub struct GeminiClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GeminiClient {
    pub fn new(endpoint: String, model: String, api_key: String) -> Result<Self, CompletionError> {
        // 全体のタイムアウトは呼び出し側の設定で掛ける
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| CompletionError::Request(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model,
            api_key,
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    fn build_request(prompt: &str) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
        }
    }

    /// 最初の候補のテキストパートを連結する
    fn collect_text(response: GenerateContentResponse) -> Result<String, CompletionError> {
        let content = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .ok_or_else(|| CompletionError::InvalidResponse("no candidates in response".into()))?;

        let text = content
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(CompletionError::InvalidResponse(
                "empty completion text".to_string(),
            ));
        }
        Ok(text)
    }
}

#[async_trait]
impl CompletionClient for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::build_request(prompt))
            .send()
            .await
            .map_err(|e| CompletionError::Request(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CompletionError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::InvalidResponse(format!("response parse error: {e}")))?;

        Self::collect_text(parsed)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GeminiClient {
        GeminiClient::new(
            "https://example.test/v1beta/".into(),
            "gemini-1.5-flash".into(),
            "test-key".into(),
        )
        .unwrap()
    }

    #[test]
    fn test_url_uses_model() {
        assert_eq!(
            client().url(),
            "https://example.test/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn test_request_shape() {
        let json = serde_json::to_value(GeminiClient::build_request("hello")).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
    }

    #[test]
    fn test_collect_text_joins_parts() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":"},{"text":"1}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(GeminiClient::collect_text(response).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn test_collect_text_without_candidates() {
        let response: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        let err = GeminiClient::collect_text(response).unwrap_err();
        assert!(matches!(err, CompletionError::InvalidResponse(_)));
    }

    #[test]
    fn test_collect_text_empty_parts() {
        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[{"content":{"parts":[]}}]}"#).unwrap();
        assert!(GeminiClient::collect_text(response).is_err());
    }

    #[test]
    fn test_client_name() {
        let c = client();
        assert_eq!(c.name(), "gemini");
        assert!(c.url().contains("gemini-1.5-flash"));
    }
}
