//! 音声で農機レンタルを検索するためのコア: 音声認識 → 検索意図の抽出 → 検索フィルタ
pub mod domain;
pub mod infra;
pub mod usecase;
