//! State graph — nodes, edges, and a sequential runner

use anyhow::{Result, anyhow};
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use thiserror::Error;
use tracing::debug;

/// Sentinel edge target ending the run
pub const END: &str = "__end__";

/// Runaway guard for graphs that accidentally cycle
const MAX_STEPS: usize = 100;

type NodeFn<S> = Box<dyn Fn(S) -> BoxFuture<'static, Result<S>> + Send + Sync>;
type RouterFn<S> = Box<dyn Fn(&S) -> String + Send + Sync>;

enum Edge<S> {
    Direct(String),
    Conditional(RouterFn<S>),
}

#[derive(Debug, Error)]
pub enum CompilationError {
    #[error("Graph has no entry node")]
    NoEntry,
    #[error("Entry node '{0}' is not defined")]
    UnknownEntry(String),
    #[error("Edge from '{0}' targets unknown node '{1}'")]
    UnknownEdgeTarget(String, String),
    #[error("Edge from unknown node '{0}'")]
    UnknownEdgeSource(String),
}

/// Builder for a state graph
pub struct StateGraph<S> {
    nodes: HashMap<String, NodeFn<S>>,
    edges: HashMap<String, Edge<S>>,
    entry: Option<String>,
}

impl<S: Send + 'static> StateGraph<S> {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: HashMap::new(),
            entry: None,
        }
    }

    /// Register a node: receives the state, returns the updated state
    pub fn add_node<F, Fut>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Fn(S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<S>> + Send + 'static,
    {
        self.nodes.insert(
            name.to_string(),
            Box::new(move |s| -> BoxFuture<'static, Result<S>> { Box::pin(f(s)) }),
        );
        self
    }

    /// Set the node the run starts from
    pub fn set_entry(&mut self, name: &str) -> &mut Self {
        self.entry = Some(name.to_string());
        self
    }

    /// Unconditional edge; `END` finishes the run
    pub fn add_edge(&mut self, from: &str, to: &str) -> &mut Self {
        self.edges
            .insert(from.to_string(), Edge::Direct(to.to_string()));
        self
    }

    /// Conditional edge: the router inspects the state and names the next
    /// node (or `END`). Router targets are checked when the run reaches them.
    pub fn add_conditional_edges<R>(&mut self, from: &str, router: R) -> &mut Self
    where
        R: Fn(&S) -> String + Send + Sync + 'static,
    {
        self.edges
            .insert(from.to_string(), Edge::Conditional(Box::new(router)));
        self
    }

    /// Validate the graph and produce a runnable form
    pub fn compile(self) -> Result<CompiledGraph<S>, CompilationError> {
        let entry = self.entry.ok_or(CompilationError::NoEntry)?;
        if !self.nodes.contains_key(&entry) {
            return Err(CompilationError::UnknownEntry(entry));
        }
        for (from, edge) in &self.edges {
            if !self.nodes.contains_key(from) {
                return Err(CompilationError::UnknownEdgeSource(from.clone()));
            }
            if let Edge::Direct(to) = edge {
                if to != END && !self.nodes.contains_key(to) {
                    return Err(CompilationError::UnknownEdgeTarget(
                        from.clone(),
                        to.clone(),
                    ));
                }
            }
        }
        Ok(CompiledGraph {
            nodes: self.nodes,
            edges: self.edges,
            entry,
        })
    }
}

impl<S: Send + 'static> Default for StateGraph<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// A compiled, runnable state graph
pub struct CompiledGraph<S> {
    nodes: HashMap<String, NodeFn<S>>,
    edges: HashMap<String, Edge<S>>,
    entry: String,
}

impl<S: Send + 'static> CompiledGraph<S> {
    /// Run the graph to completion, threading the state through each node
    pub async fn invoke(&self, mut state: S) -> Result<S> {
        let mut current = self.entry.clone();

        for _ in 0..MAX_STEPS {
            debug!("Running node: {}", current);
            let node = self
                .nodes
                .get(&current)
                .ok_or_else(|| anyhow!("Unknown node: {}", current))?;
            state = node(state).await?;

            let next = match self.edges.get(&current) {
                None => return Ok(state),
                Some(Edge::Direct(to)) => to.clone(),
                Some(Edge::Conditional(router)) => router(&state),
            };
            if next == END {
                return Ok(state);
            }
            if !self.nodes.contains_key(&next) {
                return Err(anyhow!(
                    "Router from '{}' named unknown node '{}'",
                    current,
                    next
                ));
            }
            current = next;
        }

        Err(anyhow!("Graph exceeded {} steps — cycle?", MAX_STEPS))
    }
}
