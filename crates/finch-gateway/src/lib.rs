//! finch-gateway — HTTP control surface for the scoring agent
//!
//! Three endpoints: a health check, a listing of the MCP server's tools, and
//! a scoring endpoint that streams pipeline progress back as server-sent
//! events. Each request gets its own MCP session; the subprocess lives only
//! as long as the request that spawned it.

pub mod events;
pub mod score;
pub mod server;

pub use events::ScoreEvent;
pub use score::{ScoreRequest, run_score_pipeline};
pub use server::GatewayServer;
