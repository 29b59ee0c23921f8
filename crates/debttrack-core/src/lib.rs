//! DebtTrack Core
//!
//! The library behind the DebtTrack bot: a channel abstraction with the
//! Telegram binding, the conversation engine with its per-chat session
//! context, the detail-view renderer, and the CSV export encoder. The
//! binary crate wires a channel to the engine; everything here is
//! transport-delivery agnostic.

pub mod channel;
pub mod engine;
pub mod export;
pub mod paths;

pub use engine::{Engine, Reply};
