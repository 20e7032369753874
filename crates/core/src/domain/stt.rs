use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

// ─── RecognitionConfig ───────────────────────────────────────────

/// 音声認識セッションの設定。1 発話・非連続・中間結果ありが標準。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionConfig {
    /// 認識言語 (BCP 47)
    pub language: String,
    /// 連続認識するかどうか
    pub continuous: bool,
    /// 中間結果を通知するかどうか
    pub interim_results: bool,
    /// 1 結果あたりの候補数
    pub max_alternatives: u32,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            language: "en-US".into(),
            continuous: false,
            interim_results: true,
            max_alternatives: 1,
        }
    }
}

// ─── Transcript ──────────────────────────────────────────────────

/// 音声認識の書き起こし結果。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    /// false の場合は暫定結果（まだ変わりうる）
    pub is_final: bool,
}

impl Transcript {
    pub fn final_text(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_final: true }
    }
}

// ─── RecognitionEvent ────────────────────────────────────────────

/// ホスト側の認識エンジンが送ってくる生イベント。
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    /// 認識結果（暫定 or 確定）
    Result { text: String, is_final: bool },
    /// エンジン固有のエラーコード（例: "no-speech", "not-allowed"）
    Error { code: String },
    /// セッション終了
    End,
}

// ─── RecognitionError ────────────────────────────────────────────

/// 認識エラー種別。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecognitionErrorKind {
    /// 発話が検出されなかった
    NoSpeechDetected,
    /// マイクからの取り込みに失敗
    AudioCaptureFailed,
    /// マイク権限が拒否された
    PermissionDenied,
    /// 認識サービスとの通信失敗
    NetworkError,
    /// 中断（キャンセル扱い）
    Aborted,
    /// 未知のエラー。エンジンの生コードを保持する。
    Unknown(String),
}

impl RecognitionErrorKind {
    /// ホストのエラーコードを種別に変換する。
    pub fn from_code(code: &str) -> Self {
        match code {
            "no-speech" => Self::NoSpeechDetected,
            "audio-capture" => Self::AudioCaptureFailed,
            "not-allowed" | "service-not-allowed" => Self::PermissionDenied,
            "network" => Self::NetworkError,
            "aborted" => Self::Aborted,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// 認識セッションで発生するエラー。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionError {
    pub kind: RecognitionErrorKind,
    pub detail: String,
}

impl RecognitionError {
    pub fn new(kind: RecognitionErrorKind, detail: impl Into<String>) -> Self {
        Self { kind, detail: detail.into() }
    }

    pub fn from_code(code: &str) -> Self {
        Self::new(
            RecognitionErrorKind::from_code(code),
            format!("speech recognition error: {code}"),
        )
    }

    pub fn no_speech() -> Self {
        Self::new(RecognitionErrorKind::NoSpeechDetected, "No speech detected")
    }

    pub fn is_aborted(&self) -> bool {
        self.kind == RecognitionErrorKind::Aborted
    }

    /// ユーザー操作なしでの再試行に意味があるかどうか
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self.kind,
            RecognitionErrorKind::PermissionDenied | RecognitionErrorKind::AudioCaptureFailed
        )
    }
}

impl std::fmt::Display for RecognitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RecognitionError::{:?}: {}", self.kind, self.detail)
    }
}

impl std::error::Error for RecognitionError {}

// ─── SpeechRecognizer trait ──────────────────────────────────────

/// ホストの音声認識機能（ブラウザの SpeechRecognition 等）への接点。
///
/// `start` は呼び出し元をブロックせず、認識はホスト側で非同期に進む。
/// 結果とエラーは `events` に順番通り送られる。
pub trait SpeechRecognizer: Send + Sync {
    /// 実行環境が音声認識を提供しているかどうか。
    fn is_supported(&self) -> bool;

    /// 1 セッションの認識を開始する。
    fn start(
        &self,
        config: &RecognitionConfig,
        events: mpsc::UnboundedSender<RecognitionEvent>,
    ) -> Result<(), RecognitionError>;

    /// 進行中のセッションを中断する。ホストは "aborted" エラーを送ってよい。
    fn abort(&self);

    /// エンジン名 (例: "web-speech", "scripted")。
    fn name(&self) -> &str;
}

// ─── Tests ───────────────────────────────────────────────────────
