pub mod voice_search;

pub use voice_search::{
    select_filters, VoiceSearch, VoiceSearchEvent, VoiceSearchOrchestrator, VoiceSearchOutcome,
};
