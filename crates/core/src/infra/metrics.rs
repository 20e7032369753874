use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::Serialize;

use crate::domain::error::ErrorCode;

/// フェーズごとに保持する直近の計測数
const LATENCY_WINDOW: usize = 1000;

/// 計測対象のフェーズ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// 認識開始から終端の更新まで
    Listen,
    /// 確定結果からフィルタ確定まで（フォールバック込み）
    Extract,
}

/// 音声検索のローカルメトリクス
#[derive(Default)]
pub struct Metrics {
    inner: Mutex<MetricsState>,
}

#[derive(Default)]
struct MetricsState {
    searches_started: u64,
    searches_completed: u64,
    searches_cancelled: u64,
    ai_extractions: u64,
    fallback_extractions: u64,
    errors: ErrorCounts,
    listen_ms: VecDeque<u64>,
    extract_ms: VecDeque<u64>,
}

impl MetricsState {
    fn window(&mut self, phase: Phase) -> &mut VecDeque<u64> {
        match phase {
            Phase::Listen => &mut self.listen_ms,
            Phase::Extract => &mut self.extract_ms,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ErrorCounts {
    pub capability: u64,
    pub permission: u64,
    pub recognition: u64,
    pub internal: u64,
}

/// 直近ウィンドウ内のレイテンシ統計
#[derive(Debug, Clone, Serialize)]
pub struct LatencyStats {
    pub samples: usize,
    pub avg_ms: f64,
    pub max_ms: u64,
}

impl LatencyStats {
    fn from_window(window: &VecDeque<u64>) -> Option<Self> {
        let max_ms = *window.iter().max()?;
        let total: u64 = window.iter().sum();
        Some(Self {
            samples: window.len(),
            avg_ms: total as f64 / window.len() as f64,
            max_ms,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub searches_started: u64,
    pub searches_completed: u64,
    pub searches_cancelled: u64,
    pub ai_extractions: u64,
    pub fallback_extractions: u64,
    /// 完了した検索のうちキーワード抽出に落ちた割合
    pub fallback_rate: Option<f64>,
    pub error_counts: ErrorCounts,
    pub listen_latency: Option<LatencyStats>,
    pub extract_latency: Option<LatencyStats>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_searches_started(&self) {
        self.inner.lock().searches_started += 1;
    }

    pub fn inc_searches_completed(&self) {
        self.inner.lock().searches_completed += 1;
    }

    pub fn inc_searches_cancelled(&self) {
        self.inner.lock().searches_cancelled += 1;
    }

    pub fn inc_ai_extractions(&self) {
        self.inner.lock().ai_extractions += 1;
    }

    /// AI 抽出が失敗しキーワード抽出に落ちた回数
    pub fn inc_fallback_extractions(&self) {
        self.inner.lock().fallback_extractions += 1;
    }

    pub fn inc_error(&self, code: ErrorCode) {
        let mut state = self.inner.lock();
        let errors = &mut state.errors;
        match code {
            ErrorCode::Capability => errors.capability += 1,
            ErrorCode::Permission => errors.permission += 1,
            ErrorCode::NoSpeech
            | ErrorCode::AudioCapture
            | ErrorCode::Network
            | ErrorCode::Recognition => errors.recognition += 1,
            ErrorCode::InvalidState | ErrorCode::Internal => errors.internal += 1,
        }
    }

    pub fn record_latency(&self, phase: Phase, duration_ms: u64) {
        let mut state = self.inner.lock();
        let window = state.window(phase);
        if window.len() == LATENCY_WINDOW {
            window.pop_front();
        }
        window.push_back(duration_ms);
    }

    pub fn summary(&self) -> MetricsSummary {
        let state = self.inner.lock();
        let fallback_rate = (state.searches_completed > 0)
            .then(|| state.fallback_extractions as f64 / state.searches_completed as f64);

        MetricsSummary {
            searches_started: state.searches_started,
            searches_completed: state.searches_completed,
            searches_cancelled: state.searches_cancelled,
            ai_extractions: state.ai_extractions,
            fallback_extractions: state.fallback_extractions,
            fallback_rate,
            error_counts: state.errors.clone(),
            listen_latency: LatencyStats::from_window(&state.listen_ms),
            extract_latency: LatencyStats::from_window(&state.extract_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let m = Metrics::new();
        m.inc_searches_started();
        m.inc_searches_started();
        m.inc_searches_completed();
        m.inc_fallback_extractions();
        m.inc_error(ErrorCode::Capability);
        m.inc_error(ErrorCode::Permission);
        m.inc_error(ErrorCode::NoSpeech);
        m.inc_error(ErrorCode::Network);

        let s = m.summary();
        assert_eq!(s.searches_started, 2);
        assert_eq!(s.searches_completed, 1);
        assert_eq!(s.fallback_extractions, 1);
        assert_eq!(s.ai_extractions, 0);
        assert_eq!(s.fallback_rate, Some(1.0));
        assert_eq!(s.error_counts.capability, 1);
        assert_eq!(s.error_counts.permission, 1);
        assert_eq!(s.error_counts.recognition, 2);
        assert_eq!(s.error_counts.internal, 0);
    }

    #[test]
    fn test_no_completed_searches_has_no_rate() {
        let s = Metrics::new().summary();
        assert_eq!(s.fallback_rate, None);
        assert!(s.listen_latency.is_none());
        assert!(s.extract_latency.is_none());
    }

    #[test]
    fn test_latency_stats_per_phase() {
        let m = Metrics::new();
        m.record_latency(Phase::Listen, 1200);
        m.record_latency(Phase::Listen, 800);
        m.record_latency(Phase::Extract, 300);

        let s = m.summary();
        let listen = s.listen_latency.unwrap();
        assert_eq!(listen.samples, 2);
        assert!((listen.avg_ms - 1000.0).abs() < f64::EPSILON);
        assert_eq!(listen.max_ms, 1200);
        assert_eq!(s.extract_latency.unwrap().samples, 1);
    }

    #[test]
    fn test_latency_window_drops_oldest() {
        let m = Metrics::new();
        m.record_latency(Phase::Extract, 50_000);
        for _ in 0..LATENCY_WINDOW {
            m.record_latency(Phase::Extract, 10);
        }
        let stats = m.summary().extract_latency.unwrap();
        assert_eq!(stats.samples, LATENCY_WINDOW);
        assert_eq!(stats.max_ms, 10);
    }
}
