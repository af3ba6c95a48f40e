//! Greeting pipeline — two nodes, straight line

use anyhow::Result;
use tracing::debug;

use crate::graph::{CompilationError, CompiledGraph, END, StateGraph};

/// Shared state for the greeting pipeline
#[derive(Debug, Clone, Default)]
pub struct GreetingState {
    pub name: String,
    pub greeting: String,
    pub processed_message: String,
}

async fn generate_greeting(mut state: GreetingState) -> Result<GreetingState> {
    let name = if state.name.is_empty() {
        "friend"
    } else {
        state.name.as_str()
    };
    state.greeting = format!("Hello, {}! Nice to meet you.", name);
    debug!("Generated greeting: {}", state.greeting);
    Ok(state)
}

async fn process_message(mut state: GreetingState) -> Result<GreetingState> {
    state.processed_message = format!("{} Have a great day!", state.greeting);
    debug!("Processed message: {}", state.processed_message);
    Ok(state)
}

/// greeting → processing → end
pub fn build_greeting_graph() -> Result<CompiledGraph<GreetingState>, CompilationError> {
    let mut graph = StateGraph::new();
    graph.add_node("greeting", generate_greeting);
    graph.add_node("processing", process_message);
    graph.set_entry("greeting");
    graph.add_edge("greeting", "processing");
    graph.add_edge("processing", END);
    graph.compile()
}
