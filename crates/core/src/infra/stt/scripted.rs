use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::domain::stt::{
    RecognitionConfig, RecognitionError, RecognitionErrorKind, RecognitionEvent, SpeechRecognizer,
};

/// スクリプトの 1 ステップ。`delay` 待ってから `event` を送る。
#[derive(Debug, Clone)]
pub struct ScriptStep {
    pub delay: Duration,
    pub event: RecognitionEvent,
}

impl ScriptStep {
    pub fn now(event: RecognitionEvent) -> Self {
        Self { delay: Duration::ZERO, event }
    }

    pub fn after(delay: Duration, event: RecognitionEvent) -> Self {
        Self { delay, event }
    }
}

struct ActiveRun {
    tx: mpsc::UnboundedSender<RecognitionEvent>,
    aborted: Arc<AtomicBool>,
}

/// 決まったイベント列を再生する認識エンジン。
/// オフライン実行やテストで実マイクの代わりに使う。
pub struct ScriptedRecognizer {
    supported: bool,
    script: Vec<ScriptStep>,
    active: Mutex<Option<ActiveRun>>,
    starts: AtomicUsize,
    aborts: AtomicUsize,
}

impl ScriptedRecognizer {
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self {
            supported: true,
            script,
            active: Mutex::new(None),
            starts: AtomicUsize::new(0),
            aborts: AtomicUsize::new(0),
        }
    }

    /// 暫定結果を順に出してから確定結果で終わる 1 発話。
    pub fn utterance(interims: &[&str], final_text: &str) -> Self {
        let mut script: Vec<ScriptStep> = interims
            .iter()
            .map(|text| {
                ScriptStep::now(RecognitionEvent::Result {
                    text: text.to_string(),
                    is_final: false,
                })
            })
            .collect();
        script.push(ScriptStep::now(RecognitionEvent::Result {
            text: final_text.to_string(),
            is_final: true,
        }));
        script.push(ScriptStep::now(RecognitionEvent::End));
        Self::new(script)
    }

    /// ホストのエラーコードで終わるセッション。
    pub fn failing(code: &str) -> Self {
        Self::new(vec![
            ScriptStep::now(RecognitionEvent::Error { code: code.to_string() }),
            ScriptStep::now(RecognitionEvent::End),
        ])
    }

    /// 音声認識を持たない環境。
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new(Vec::new())
        }
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn abort_count(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }
}

impl SpeechRecognizer for ScriptedRecognizer {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn start(
        &self,
        config: &RecognitionConfig,
        events: mpsc::UnboundedSender<RecognitionEvent>,
    ) -> Result<(), RecognitionError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|e| {
            RecognitionError::new(
                RecognitionErrorKind::Unknown("no-runtime".into()),
                format!("scripted recognizer needs a tokio runtime: {e}"),
            )
        })?;

        let aborted = Arc::new(AtomicBool::new(false));
        // 前のセッションが残っていれば置き換える
        *self.active.lock() = Some(ActiveRun {
            tx: events.clone(),
            aborted: aborted.clone(),
        });
        self.starts.fetch_add(1, Ordering::SeqCst);
        log::debug!(
            "scripted recognizer: replaying {} steps (lang={})",
            self.script.len(),
            config.language
        );

        let script = self.script.clone();
        handle.spawn(async move {
            for step in script {
                if !step.delay.is_zero() {
                    tokio::time::sleep(step.delay).await;
                }
                if aborted.load(Ordering::SeqCst) || events.send(step.event).is_err() {
                    return;
                }
            }
        });
        Ok(())
    }

    fn abort(&self) {
        self.aborts.fetch_add(1, Ordering::SeqCst);
        if let Some(run) = self.active.lock().take() {
            run.aborted.store(true, Ordering::SeqCst);
            // ブラウザと同様に aborted エラーの後に end を送る
            let _ = run.tx.send(RecognitionEvent::Error {
                code: "aborted".to_string(),
            });
            let _ = run.tx.send(RecognitionEvent::End);
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_script_in_order() {
        let recognizer = ScriptedRecognizer::utterance(&["trac"], "tractor");
        let (tx, mut rx) = mpsc::unbounded_channel();
        recognizer.start(&RecognitionConfig::default(), tx).unwrap();

        assert_eq!(
            rx.recv().await,
            Some(RecognitionEvent::Result { text: "trac".into(), is_final: false })
        );
        assert_eq!(
            rx.recv().await,
            Some(RecognitionEvent::Result { text: "tractor".into(), is_final: true })
        );
        assert_eq!(rx.recv().await, Some(RecognitionEvent::End));
        assert_eq!(recognizer.start_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn abort_emits_aborted_and_halts_script() {
        let recognizer = ScriptedRecognizer::new(vec![ScriptStep::after(
            Duration::from_secs(5),
            RecognitionEvent::Result { text: "late".into(), is_final: true },
        )]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        recognizer.start(&RecognitionConfig::default(), tx).unwrap();
        recognizer.abort();

        assert_eq!(
            rx.recv().await,
            Some(RecognitionEvent::Error { code: "aborted".into() })
        );
        assert_eq!(rx.recv().await, Some(RecognitionEvent::End));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(recognizer.abort_count(), 1);
    }

    #[test]
    fn start_without_runtime_fails() {
        let recognizer = ScriptedRecognizer::utterance(&[], "tractor");
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = recognizer.start(&RecognitionConfig::default(), tx).unwrap_err();
        assert_eq!(err.kind, RecognitionErrorKind::Unknown("no-runtime".into()));
    }

    #[test]
    fn unsupported_reports_itself() {
        assert!(!ScriptedRecognizer::unsupported().is_supported());
        assert!(ScriptedRecognizer::failing("network").is_supported());
        assert_eq!(ScriptedRecognizer::unsupported().name(), "scripted");
    }
}
