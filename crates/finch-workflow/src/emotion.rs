//! Emotion-routing pipeline — classify, then branch on the result

use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

use crate::graph::{CompilationError, CompiledGraph, END, StateGraph};

/// Classified emotion of a user message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emotion {
    Positive,
    Negative,
    Neutral,
}

impl Emotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        }
    }

    /// Normalize a free-text label. Accepts prefixes ("pos", "negative."),
    /// strips quote/backtick noise, and falls back to neutral.
    pub fn parse(text: &str) -> Self {
        let t = text
            .trim()
            .trim_matches(|c| c == '\'' || c == '"' || c == '`' || c == ' ')
            .trim_end_matches('.')
            .to_lowercase();
        if t.starts_with("pos") {
            Self::Positive
        } else if t.starts_with("neg") {
            Self::Negative
        } else {
            Self::Neutral
        }
    }
}

/// Classifies the emotion of a message
pub trait EmotionAnalyzer: Send + Sync {
    fn analyze(&self, message: &str) -> Emotion;
}

/// Keyword-count heuristic. Ties and empty input come out neutral.
pub struct KeywordAnalyzer;

const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "happy", "love", "excellent", "wonderful", "excited", "glad",
];
const NEGATIVE_WORDS: &[&str] = &[
    "bad", "sad", "hard", "tired", "hate", "awful", "terrible", "struggling",
];

impl EmotionAnalyzer for KeywordAnalyzer {
    fn analyze(&self, message: &str) -> Emotion {
        let lower = message.to_lowercase();
        let positive = POSITIVE_WORDS
            .iter()
            .filter(|w| lower.contains(*w))
            .count();
        let negative = NEGATIVE_WORDS
            .iter()
            .filter(|w| lower.contains(*w))
            .count();
        if positive > negative {
            Emotion::Positive
        } else if negative > positive {
            Emotion::Negative
        } else {
            Emotion::Neutral
        }
    }
}

/// Shared state for the emotion pipeline
#[derive(Debug, Clone, Default)]
pub struct EmotionState {
    pub user_message: String,
    pub emotion: String,
    pub response: String,
}

/// analyze → route by emotion → one of three response nodes → end
pub fn build_emotion_graph(
    analyzer: Arc<dyn EmotionAnalyzer>,
) -> Result<CompiledGraph<EmotionState>, CompilationError> {
    let mut graph = StateGraph::new();

    graph.add_node("analyze_emotion", move |mut state: EmotionState| {
        let analyzer = analyzer.clone();
        async move {
            let emotion = analyzer.analyze(&state.user_message);
            debug!("Analyzed emotion: {}", emotion.as_str());
            state.emotion = emotion.as_str().to_string();
            Ok(state)
        }
    });

    graph.add_node("positive_response", |mut state: EmotionState| async move {
        state.response =
            "That's great to hear! Keep that positive energy going!".to_string();
        Ok(state)
    });
    graph.add_node("negative_response", |mut state: EmotionState| async move {
        state.response =
            "That sounds rough. I'm here whenever you want to talk about it.".to_string();
        Ok(state)
    });
    graph.add_node("neutral_response", |mut state: EmotionState| async move {
        state.response = "I see. Is there anything else on your mind?".to_string();
        Ok(state)
    });

    graph.set_entry("analyze_emotion");
    graph.add_conditional_edges("analyze_emotion", |state: &EmotionState| {
        match Emotion::parse(&state.emotion) {
            Emotion::Positive => "positive_response".to_string(),
            Emotion::Negative => "negative_response".to_string(),
            Emotion::Neutral => "neutral_response".to_string(),
        }
    });
    graph.add_edge("positive_response", END);
    graph.add_edge("negative_response", END);
    graph.add_edge("neutral_response", END);

    graph.compile()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prefixes() {
        assert_eq!(Emotion::parse("positive"), Emotion::Positive);
        assert_eq!(Emotion::parse(" 'Negative.' "), Emotion::Negative);
        assert_eq!(Emotion::parse("neu"), Emotion::Neutral);
        assert_eq!(Emotion::parse("gibberish"), Emotion::Neutral);
        assert_eq!(Emotion::parse(""), Emotion::Neutral);
    }

    #[test]
    fn test_keyword_analyzer() {
        let analyzer = KeywordAnalyzer;
        assert_eq!(analyzer.analyze("Today was a great day!"), Emotion::Positive);
        assert_eq!(
            analyzer.analyze("Everything is so hard lately"),
            Emotion::Negative
        );
        assert_eq!(analyzer.analyze("It is Tuesday"), Emotion::Neutral);
        // Tie breaks neutral
        assert_eq!(analyzer.analyze("good but also bad"), Emotion::Neutral);
    }

    async fn run(message: &str) -> EmotionState {
        let graph = build_emotion_graph(Arc::new(KeywordAnalyzer)).unwrap();
        graph
            .invoke(EmotionState {
                user_message: message.to_string(),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_positive_route() {
        let out = run("I feel really happy today!").await;
        assert_eq!(out.emotion, "positive");
        assert!(out.response.contains("great to hear"));
    }

    #[tokio::test]
    async fn test_negative_route() {
        let out = run("I'm so tired and everything is awful").await;
        assert_eq!(out.emotion, "negative");
        assert!(out.response.contains("rough"));
    }

    #[tokio::test]
    async fn test_neutral_route() {
        let out = run("Just another day.").await;
        assert_eq!(out.emotion, "neutral");
        assert!(out.response.contains("anything else"));
    }

    struct FixedAnalyzer(Emotion);
    impl EmotionAnalyzer for FixedAnalyzer {
        fn analyze(&self, _: &str) -> Emotion {
            self.0
        }
    }

    #[tokio::test]
    async fn test_custom_analyzer_drives_routing() {
        let graph = build_emotion_graph(Arc::new(FixedAnalyzer(Emotion::Negative))).unwrap();
        let out = graph
            .invoke(EmotionState {
                user_message: "wonderful".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(out.emotion, "negative");
    }
}
