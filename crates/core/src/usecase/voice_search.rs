use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::domain::error::AppError;
use crate::domain::filter::{FilterSource, MarketplaceFilter, VoiceSearchResult};
use crate::domain::session::{StateTransition, VoiceSearchMachine};
use crate::domain::settings::VoiceSearchSettings;
use crate::domain::stt::SpeechRecognizer;
use crate::infra::extractor::{create_intent_extractor, extract_basic, ExtractError, IntentExtractor};
use crate::infra::metrics::{Metrics, MetricsSummary, Phase};
use crate::infra::stt::{RecognitionSession, SessionUpdate, StopHandle, TranscriptionAdapter};

/// 音声検索から通知されるイベント
#[derive(Debug, Clone)]
pub enum VoiceSearchEvent {
    /// 状態遷移
    StateChanged(StateTransition),
    /// 認識途中の暫定クエリ（フィルタ抽出はまだしない）
    PartialQuery(String),
    /// 確定した書き起こし
    FinalTranscript(String),
    /// フィルタ抽出完了
    FiltersExtracted {
        filters: MarketplaceFilter,
        source: FilterSource,
    },
}

/// 音声検索 1 回分の終わり方
#[derive(Debug, Clone)]
pub enum VoiceSearchOutcome {
    Completed(VoiceSearchResult),
    /// Listening 中に stop された（結果なし）
    Cancelled,
}

/// AI 抽出の結果タグだけでフィルタを決める。失敗ならキーワード抽出に切り替える。
pub fn select_filters(
    ai_result: Result<MarketplaceFilter, ExtractError>,
    transcript: &str,
) -> (MarketplaceFilter, FilterSource) {
    match ai_result {
        Ok(filters) => (filters, FilterSource::Ai),
        Err(_) => (extract_basic(transcript), FilterSource::Keyword),
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// 音声検索オーケストレータ: 認識 → AI 抽出 → (失敗時) キーワード抽出
pub struct VoiceSearchOrchestrator {
    adapter: TranscriptionAdapter,
    extractor: Arc<dyn IntentExtractor>,
    ai_timeout: Option<Duration>,
    metrics: Arc<Metrics>,
    event_tx: Option<mpsc::UnboundedSender<VoiceSearchEvent>>,
    current_stop: Mutex<Option<StopHandle>>,
}

impl VoiceSearchOrchestrator {
    pub fn new(
        recognizer: Arc<dyn SpeechRecognizer>,
        extractor: Arc<dyn IntentExtractor>,
        settings: &VoiceSearchSettings,
    ) -> Self {
        Self {
            adapter: TranscriptionAdapter::new(recognizer, settings.recognition_config()),
            extractor,
            ai_timeout: settings.ai_timeout(),
            metrics: Arc::new(Metrics::new()),
            event_tx: None,
            current_stop: Mutex::new(None),
        }
    }

    /// 設定から抽出器も組み立てる
    pub fn from_settings(
        recognizer: Arc<dyn SpeechRecognizer>,
        settings: &VoiceSearchSettings,
    ) -> Self {
        let extractor = create_intent_extractor(settings);
        Self::new(recognizer, extractor, settings)
    }

    /// イベント通知先を設定する
    pub fn with_events(mut self, event_tx: mpsc::UnboundedSender<VoiceSearchEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn metrics(&self) -> MetricsSummary {
        self.metrics.summary()
    }

    /// 対応チェックをして認識を始める。返した `VoiceSearch` が 1 回分の状態をすべて持つ。
    pub fn begin(&self) -> Result<VoiceSearch, AppError> {
        let session = match self.adapter.start() {
            Ok(session) => session,
            Err(e) => {
                log::warn!("voice search could not start: {e}");
                self.metrics.inc_error(e.code);
                return Err(e);
            }
        };

        let session_id = uuid::Uuid::new_v4().to_string();
        let mut search = VoiceSearch {
            machine: VoiceSearchMachine::new(session_id),
            session,
            extractor: self.extractor.clone(),
            ai_timeout: self.ai_timeout,
            metrics: self.metrics.clone(),
            event_tx: self.event_tx.clone(),
        };
        search.advance(|m, now| m.start_listening(now))?;

        *self.current_stop.lock() = Some(search.stop_handle());
        self.metrics.inc_searches_started();
        log::info!(
            "voice search {} listening (engine={}, extractor={})",
            search.session_id(),
            self.adapter.engine_name(),
            self.extractor.name()
        );
        Ok(search)
    }

    /// 音声検索を 1 回実行する（`begin()` + `run()`）
    pub async fn perform_voice_search(&self) -> Result<VoiceSearchOutcome, AppError> {
        self.begin()?.run().await
    }

    /// 直近に開始した検索の聞き取りを止める。抽出が始まっていれば何もしない。
    pub fn stop_listening(&self) {
        if let Some(handle) = self.current_stop.lock().take() {
            handle.stop();
        }
    }
}

/// 音声検索 1 回分のセッション。呼び出しごとに作られ、他と状態を共有しない。
pub struct VoiceSearch {
    machine: VoiceSearchMachine,
    session: RecognitionSession,
    extractor: Arc<dyn IntentExtractor>,
    ai_timeout: Option<Duration>,
    metrics: Arc<Metrics>,
    event_tx: Option<mpsc::UnboundedSender<VoiceSearchEvent>>,
}

impl VoiceSearch {
    pub fn session_id(&self) -> &str {
        self.machine.session_id()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.session.stop_handle()
    }

    fn emit(&self, event: VoiceSearchEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }

    fn advance(
        &mut self,
        step: impl FnOnce(&mut VoiceSearchMachine, String) -> Result<StateTransition, AppError>,
    ) -> Result<(), AppError> {
        let transition = step(&mut self.machine, now())?;
        self.emit(VoiceSearchEvent::StateChanged(transition));
        Ok(())
    }

    /// 終端まで進める。認識エラーのみ Err で返し、AI の失敗は表に出さない。
    pub async fn run(mut self) -> Result<VoiceSearchOutcome, AppError> {
        let listen_started = Instant::now();
        let terminal = loop {
            match self.session.next_update().await {
                Some(SessionUpdate::Interim(text)) => {
                    self.emit(VoiceSearchEvent::PartialQuery(text));
                }
                Some(update) => break update,
                None => break SessionUpdate::Cancelled,
            }
        };
        debug_assert!(terminal.is_terminal());
        self.metrics
            .record_latency(Phase::Listen, listen_started.elapsed().as_millis() as u64);

        let transcript = match terminal {
            SessionUpdate::Final(transcript) => transcript.text,
            SessionUpdate::Failed(err) => {
                let err: AppError = err.into();
                log::warn!("voice search {} failed: {err}", self.session_id());
                self.advance(|m, now| m.on_recognition_error(&err, now))?;
                self.metrics.inc_error(err.code);
                return Err(err);
            }
            SessionUpdate::Cancelled | SessionUpdate::Interim(_) => {
                self.advance(|m, now| m.cancel(now))?;
                self.metrics.inc_searches_cancelled();
                log::info!("voice search {} cancelled", self.session_id());
                return Ok(VoiceSearchOutcome::Cancelled);
            }
        };

        self.advance(|m, now| m.on_final_transcript(now))?;
        self.emit(VoiceSearchEvent::FinalTranscript(transcript.clone()));

        let extract_started = Instant::now();
        let ai_result = self.extract_with_ai(&transcript).await;
        if let Err(e) = &ai_result {
            log::warn!(
                "AI extraction failed for {} ({}), falling back to keywords: {e}",
                self.session_id(),
                self.extractor.name()
            );
        }

        let fell_back = ai_result.is_err();
        let (filters, mut source) = select_filters(ai_result, &transcript);
        if fell_back {
            self.advance(|m, now| m.on_ai_failure(now))?;
            self.advance(|m, now| m.on_fallback_done(now))?;
            self.metrics.inc_fallback_extractions();
        } else {
            // AI キー未設定時はキーワード抽出器が一次抽出器になる
            source = self.extractor.source();
            self.advance(|m, now| m.on_ai_success(now))?;
            if source == FilterSource::Ai {
                self.metrics.inc_ai_extractions();
            }
        }
        self.metrics
            .record_latency(Phase::Extract, extract_started.elapsed().as_millis() as u64);
        self.metrics.inc_searches_completed();

        self.emit(VoiceSearchEvent::FiltersExtracted {
            filters: filters.clone(),
            source,
        });
        log::info!(
            "voice search {} done via {:?}: {} filter param(s)",
            self.session_id(),
            source,
            filters.to_query_params().len()
        );

        Ok(VoiceSearchOutcome::Completed(VoiceSearchResult {
            session_id: self.session_id().to_string(),
            transcript,
            filters,
            source,
        }))
    }

    async fn extract_with_ai(&self, transcript: &str) -> Result<MarketplaceFilter, ExtractError> {
        let extraction = self.extractor.extract(transcript);
        match self.ai_timeout {
            Some(limit) => tokio::time::timeout(limit, extraction)
                .await
                .map_err(|_| ExtractError::Timeout)?,
            None => extraction.await,
        }
    }
}
