use serde::Serialize;

use super::stt::{RecognitionError, RecognitionErrorKind};

/// 音声検索の共通エラーコード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    #[serde(rename = "E_CAPABILITY")]
    Capability,
    #[serde(rename = "E_NO_SPEECH")]
    NoSpeech,
    #[serde(rename = "E_AUDIO_CAPTURE")]
    AudioCapture,
    #[serde(rename = "E_PERMISSION")]
    Permission,
    #[serde(rename = "E_NETWORK")]
    Network,
    #[serde(rename = "E_RECOGNITION")]
    Recognition,
    #[serde(rename = "E_INVALID_STATE")]
    InvalidState,
    #[serde(rename = "E_INTERNAL")]
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Capability => "E_CAPABILITY",
            Self::NoSpeech => "E_NO_SPEECH",
            Self::AudioCapture => "E_AUDIO_CAPTURE",
            Self::Permission => "E_PERMISSION",
            Self::Network => "E_NETWORK",
            Self::Recognition => "E_RECOGNITION",
            Self::InvalidState => "E_INVALID_STATE",
            Self::Internal => "E_INTERNAL",
        }
    }
}

/// 呼び出し側に返すエラー（イベントペイロード兼用）
#[derive(Debug, Clone, Serialize)]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    pub recoverable: bool,
}

impl AppError {
    /// 音声認識機能が存在しない環境。リトライしても回復しない。
    pub fn capability(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Capability,
            message: msg.into(),
            recoverable: false,
        }
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidState,
            message: msg.into(),
            recoverable: true,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Internal,
            message: msg.into(),
            recoverable: false,
        }
    }
}

impl From<RecognitionError> for AppError {
    fn from(err: RecognitionError) -> Self {
        let code = match err.kind {
            RecognitionErrorKind::NoSpeechDetected => ErrorCode::NoSpeech,
            RecognitionErrorKind::AudioCaptureFailed => ErrorCode::AudioCapture,
            RecognitionErrorKind::PermissionDenied => ErrorCode::Permission,
            RecognitionErrorKind::NetworkError => ErrorCode::Network,
            // Aborted はキャンセル扱いで通常ここには来ない
            RecognitionErrorKind::Aborted => ErrorCode::Internal,
            RecognitionErrorKind::Unknown(_) => ErrorCode::Recognition,
        };
        let recoverable = err.is_recoverable();
        Self {
            code,
            message: err.to_string(),
            recoverable,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}
