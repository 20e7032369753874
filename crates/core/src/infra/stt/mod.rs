mod scripted;

pub use scripted::{ScriptStep, ScriptedRecognizer};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Notify};

use crate::domain::error::AppError;
use crate::domain::stt::{
    RecognitionConfig, RecognitionError, RecognitionEvent, SpeechRecognizer, Transcript,
};

/// 認識セッションから呼び出し側へ渡す正規化済みの更新。
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    /// 暫定結果（0 回以上）
    Interim(String),
    /// 確定結果（終端）
    Final(Transcript),
    /// 中断以外の認識エラー（終端）
    Failed(RecognitionError),
    /// stop() または aborted による中断（終端）
    Cancelled,
}

impl SessionUpdate {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Interim(_))
    }
}

/// ホストの音声認識をラップし、イベントを 3 種類の結果に正規化するアダプタ。
pub struct TranscriptionAdapter {
    recognizer: Arc<dyn SpeechRecognizer>,
    config: RecognitionConfig,
}

impl TranscriptionAdapter {
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>, config: RecognitionConfig) -> Self {
        Self { recognizer, config }
    }

    pub fn engine_name(&self) -> &str {
        self.recognizer.name()
    }

    /// 音声認識が使えない環境ではエラーを返す（何もしないで成功はしない）。
    pub fn check_support(&self) -> Result<(), AppError> {
        if self.recognizer.is_supported() {
            Ok(())
        } else {
            Err(AppError::capability(format!(
                "speech recognition is not supported by engine '{}'",
                self.recognizer.name()
            )))
        }
    }

    /// 1 発話分の認識セッションを開始する。呼び出し元はブロックされない。
    pub fn start(&self) -> Result<RecognitionSession, AppError> {
        self.check_support()?;

        let (tx, rx) = mpsc::unbounded_channel();
        self.recognizer.start(&self.config, tx)?;
        log::debug!(
            "recognition started: engine={} lang={}",
            self.recognizer.name(),
            self.config.language
        );

        Ok(RecognitionSession {
            events: rx,
            stop: StopHandle {
                signal: Arc::new(StopSignal::default()),
                recognizer: self.recognizer.clone(),
            },
            finished: false,
        })
    }
}

#[derive(Default)]
struct StopSignal {
    stopped: AtomicBool,
    finished: AtomicBool,
    notify: Notify,
}

/// 進行中の認識セッションを止めるハンドル。別タスクからも呼べる。
#[derive(Clone)]
pub struct StopHandle {
    signal: Arc<StopSignal>,
    recognizer: Arc<dyn SpeechRecognizer>,
}

impl StopHandle {
    /// 停止を要求する。以後そのセッションの暫定・確定結果は観測されない。
    ///
    /// 終端の更新を返し終えたセッションに対しては何もしない。
    pub fn stop(&self) {
        if self.signal.finished.load(Ordering::SeqCst) {
            return;
        }
        if !self.signal.stopped.swap(true, Ordering::SeqCst) {
            self.signal.notify.notify_one();
            self.recognizer.abort();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.signal.stopped.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopHandle")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// 1 回分の認識セッション。終端の更新はちょうど 1 回だけ返る。
pub struct RecognitionSession {
    events: mpsc::UnboundedReceiver<RecognitionEvent>,
    stop: StopHandle,
    finished: bool,
}

impl RecognitionSession {
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// 次の更新を待つ。終端の更新を返した後は None。
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        loop {
            if self.finished {
                return None;
            }
            if self.stop.is_stopped() {
                return Some(self.finish(SessionUpdate::Cancelled));
            }

            let event = tokio::select! {
                biased;
                _ = self.stop.signal.notify.notified() => continue,
                event = self.events.recv() => event,
            };

            // recv と stop が競合した場合は stop を優先する
            if self.stop.is_stopped() {
                return Some(self.finish(SessionUpdate::Cancelled));
            }

            let update = match event {
                Some(RecognitionEvent::Result { text, is_final: false }) => {
                    return Some(SessionUpdate::Interim(text));
                }
                Some(RecognitionEvent::Result { text, is_final: true }) => {
                    if text.trim().is_empty() {
                        SessionUpdate::Failed(RecognitionError::no_speech())
                    } else {
                        SessionUpdate::Final(Transcript::final_text(text))
                    }
                }
                Some(RecognitionEvent::Error { code }) => {
                    let err = RecognitionError::from_code(&code);
                    if err.is_aborted() {
                        log::debug!("recognition aborted by host, treating as cancellation");
                        SessionUpdate::Cancelled
                    } else {
                        SessionUpdate::Failed(err)
                    }
                }
                // 結果なしで終了 = 発話なし
                Some(RecognitionEvent::End) | None => {
                    SessionUpdate::Failed(RecognitionError::no_speech())
                }
            };
            return Some(self.finish(update));
        }
    }

    fn finish(&mut self, update: SessionUpdate) -> SessionUpdate {
        self.finished = true;
        self.stop.signal.finished.store(true, Ordering::SeqCst);
        update
    }
}

impl Drop for RecognitionSession {
    fn drop(&mut self) {
        // 未終了のまま破棄されたらマイクを解放させる
        if !self.finished {
            self.stop.recognizer.abort();
        }
    }
}
