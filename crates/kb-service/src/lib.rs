//! kb-service - Service facade
//!
//! Wires the knowledge base, the embedding provider and the hybrid engine
//! together and exposes them as tool-style operations.
//!
//! # Operations
//!
//! - `kb_search` - Ranked hybrid search
//! - `kb_search_debug` - Compact source/score/preview listing
//! - `kb_stats` - Knowledge base statistics
//! - `kb_reload` - Rebuild from archives and swap in
//! - `kb_reembed` - Re-embed every chunk, swap in, optionally persist

mod service;

pub use service::{DebugHit, KbService, SearchParams, ServiceInfo, ToolInfo, ToolResult};
