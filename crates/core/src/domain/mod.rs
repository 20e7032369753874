pub mod error;
pub mod filter;
pub mod session;
pub mod settings;
pub mod stt;
