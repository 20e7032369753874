use serde::Serialize;

use super::error::AppError;

/// 音声検索 1 回分の状態
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceSearchState {
    Idle,
    Listening,
    Extracting,
    FallbackExtracting,
    Done,
    Failed { code: String, message: String },
}

impl VoiceSearchState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Extracting => "extracting",
            Self::FallbackExtracting => "fallback_extracting",
            Self::Done => "done",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. })
    }
}

/// 音声検索の状態機械。呼び出しごとに新しく作り、共有しない。
#[derive(Debug, Clone)]
pub struct VoiceSearchMachine {
    session_id: String,
    state: VoiceSearchState,
}

impl VoiceSearchMachine {
    pub fn new(session_id: String) -> Self {
        Self {
            session_id,
            state: VoiceSearchState::Idle,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> &VoiceSearchState {
        &self.state
    }

    fn move_to(&mut self, next: VoiceSearchState, now: String) -> StateTransition {
        let prev = self.state.as_str().to_string();
        self.state = next;
        log::debug!(
            "voice search {}: {} -> {}",
            self.session_id,
            prev,
            self.state.as_str()
        );
        StateTransition {
            session_id: self.session_id.clone(),
            prev_state: prev,
            new_state: self.state.clone(),
            at: now,
        }
    }

    fn rejected(&self, op: &str) -> AppError {
        AppError::invalid_state(format!(
            "{op} is not allowed in {} state",
            self.state.as_str()
        ))
    }

    /// Idle→Listening
    pub fn start_listening(&mut self, now: String) -> Result<StateTransition, AppError> {
        match self.state {
            VoiceSearchState::Idle => Ok(self.move_to(VoiceSearchState::Listening, now)),
            _ => Err(self.rejected("start_listening")),
        }
    }

    /// 確定結果の受信: Listening→Extracting
    pub fn on_final_transcript(&mut self, now: String) -> Result<StateTransition, AppError> {
        match self.state {
            VoiceSearchState::Listening => Ok(self.move_to(VoiceSearchState::Extracting, now)),
            _ => Err(self.rejected("on_final_transcript")),
        }
    }

    /// 認識エラー（中断以外）: Listening→Failed
    pub fn on_recognition_error(
        &mut self,
        err: &AppError,
        now: String,
    ) -> Result<StateTransition, AppError> {
        match self.state {
            VoiceSearchState::Listening => Ok(self.move_to(
                VoiceSearchState::Failed {
                    code: err.code.as_str().to_string(),
                    message: err.message.clone(),
                },
                now,
            )),
            _ => Err(self.rejected("on_recognition_error")),
        }
    }

    /// 明示的なキャンセル（stop または aborted）: Listening→Idle
    ///
    /// 抽出開始後はキャンセルできない。
    pub fn cancel(&mut self, now: String) -> Result<StateTransition, AppError> {
        match self.state {
            VoiceSearchState::Listening => Ok(self.move_to(VoiceSearchState::Idle, now)),
            _ => Err(self.rejected("cancel")),
        }
    }

    /// AI 抽出成功: Extracting→Done
    pub fn on_ai_success(&mut self, now: String) -> Result<StateTransition, AppError> {
        match self.state {
            VoiceSearchState::Extracting => Ok(self.move_to(VoiceSearchState::Done, now)),
            _ => Err(self.rejected("on_ai_success")),
        }
    }

    /// AI 抽出失敗: Extracting→FallbackExtracting
    pub fn on_ai_failure(&mut self, now: String) -> Result<StateTransition, AppError> {
        match self.state {
            VoiceSearchState::Extracting => {
                Ok(self.move_to(VoiceSearchState::FallbackExtracting, now))
            }
            _ => Err(self.rejected("on_ai_failure")),
        }
    }

    /// キーワード抽出完了: FallbackExtracting→Done
    pub fn on_fallback_done(&mut self, now: String) -> Result<StateTransition, AppError> {
        match self.state {
            VoiceSearchState::FallbackExtracting => Ok(self.move_to(VoiceSearchState::Done, now)),
            _ => Err(self.rejected("on_fallback_done")),
        }
    }
}

/// 状態遷移イベントペイロード
#[derive(Debug, Clone, Serialize)]
pub struct StateTransition {
    pub session_id: String,
    pub prev_state: String,
    pub new_state: VoiceSearchState,
    /// 遷移時刻 (RFC 3339)
    pub at: String,
}
