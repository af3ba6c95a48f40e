//! finch-workflow — staged state-update pipelines
//!
//! A small state-in/state-out graph runner and the two demo pipelines built
//! on it: a linear greeting pipeline and an emotion-routing pipeline. One
//! state type flows through the nodes of a graph; conditional edges pick the
//! branch. Deliberately sequential — no parallel branches, no persistence.

pub mod emotion;
pub mod graph;
pub mod greeting;

pub use emotion::{Emotion, EmotionAnalyzer, EmotionState, KeywordAnalyzer, build_emotion_graph};
pub use graph::{CompilationError, CompiledGraph, END, StateGraph};
pub use greeting::{GreetingState, build_greeting_graph};
