use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::stt::RecognitionConfig;

pub const DEFAULT_AI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_AI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// 音声検索の設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSearchSettings {
    /// 認識言語
    pub language: String,
    /// 中間結果の通知
    pub interim_results: bool,
    /// 生成 AI のモデル ID
    pub ai_model: String,
    /// 生成 AI API のベース URL
    pub ai_endpoint: String,
    /// 生成 AI の API キー。未設定ならキーワード抽出のみ。
    pub ai_api_key: Option<String>,
    /// AI 抽出のタイムアウト秒数（None = 無制限）
    pub ai_timeout_secs: Option<u64>,
}

impl Default for VoiceSearchSettings {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            interim_results: true,
            ai_model: DEFAULT_AI_MODEL.to_string(),
            ai_endpoint: DEFAULT_AI_ENDPOINT.to_string(),
            ai_api_key: None,
            ai_timeout_secs: Some(30),
        }
    }
}

impl VoiceSearchSettings {
    /// 環境変数で既定値を上書きする。
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(key) = lookup("GEMINI_API_KEY").filter(|k| !k.trim().is_empty()) {
            self.ai_api_key = Some(key);
        }
        if let Some(model) = lookup("FARMSETU_AI_MODEL").filter(|m| !m.is_empty()) {
            self.ai_model = model;
        }
        if let Some(endpoint) = lookup("FARMSETU_AI_ENDPOINT").filter(|e| !e.is_empty()) {
            self.ai_endpoint = endpoint;
        }
        if let Some(raw) = lookup("FARMSETU_AI_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(0) => self.ai_timeout_secs = None,
                Ok(secs) => self.ai_timeout_secs = Some(secs),
                Err(_) => log::warn!("ignoring invalid FARMSETU_AI_TIMEOUT_SECS: {raw}"),
            }
        }
        if let Some(lang) = lookup("FARMSETU_SPEECH_LANG").filter(|l| !l.is_empty()) {
            self.language = lang;
        }
        self
    }

    pub fn ai_timeout(&self) -> Option<Duration> {
        self.ai_timeout_secs.map(Duration::from_secs)
    }

    pub fn recognition_config(&self) -> RecognitionConfig {
        RecognitionConfig {
            language: self.language.clone(),
            interim_results: self.interim_results,
            ..RecognitionConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let s = VoiceSearchSettings::default();
        assert_eq!(s.ai_model, DEFAULT_AI_MODEL);
        assert!(s.ai_api_key.is_none());
        assert_eq!(s.ai_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(s.recognition_config(), RecognitionConfig::default());
    }

    #[test]
    fn overrides_apply() {
        let s = VoiceSearchSettings::default().with_overrides(lookup_from(&[
            ("GEMINI_API_KEY", "secret"),
            ("FARMSETU_AI_MODEL", "gemini-pro"),
            ("FARMSETU_AI_TIMEOUT_SECS", "5"),
            ("FARMSETU_SPEECH_LANG", "en-IN"),
        ]));
        assert_eq!(s.ai_api_key.as_deref(), Some("secret"));
        assert_eq!(s.ai_model, "gemini-pro");
        assert_eq!(s.ai_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(s.recognition_config().language, "en-IN");
    }

    #[test]
    fn zero_timeout_disables_it() {
        let s = VoiceSearchSettings::default()
            .with_overrides(lookup_from(&[("FARMSETU_AI_TIMEOUT_SECS", "0")]));
        assert_eq!(s.ai_timeout(), None);
    }

    #[test]
    fn invalid_timeout_and_blank_key_are_ignored() {
        let s = VoiceSearchSettings::default().with_overrides(lookup_from(&[
            ("FARMSETU_AI_TIMEOUT_SECS", "soon"),
            ("GEMINI_API_KEY", "   "),
        ]));
        assert_eq!(s.ai_timeout_secs, Some(30));
        assert!(s.ai_api_key.is_none());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let s: VoiceSearchSettings =
            serde_json::from_str(r#"{"ai_model":"gemini-pro"}"#).unwrap();
        assert_eq!(s.ai_model, "gemini-pro");
        assert_eq!(s.language, "en-US");
        assert_eq!(s.ai_timeout_secs, Some(30));
    }
}
