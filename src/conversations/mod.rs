// src/conversations/mod.rs
pub mod models;
pub mod service;

pub use models::{
    AbComparison, ConversationSummary, Message, ModelPairAnalytics, NewAbComparison, NewMessage,
    Preference,
};
pub use service::ConversationService;
