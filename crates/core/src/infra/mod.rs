pub mod extractor;
pub mod metrics;
pub mod stt;
