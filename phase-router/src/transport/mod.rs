//! Streaming transport abstraction.
//!
//! A transport opens one session per phase request and yields incremental
//! messages in arrival order. The stream is finite and not restartable; a
//! mid-stream failure arrives as an `Err` item, never as a special message.

pub mod cli;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::error::TransportError;
use crate::registry::InvocationCommand;
use crate::request::PhaseRequest;

pub use cli::CliTransport;

/// Token counts reported by the backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

/// Final record of a session; the only source of phase metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalResult {
    pub cost_usd: Option<f64>,
    pub duration_ms: u64,
    pub turn_count: u32,
    pub success: bool,
    pub result_text: Option<String>,
    pub usage: Option<TokenUsage>,
}

/// One incremental unit of a streaming session
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    TextChunk(String),
    ActionInvocation {
        name: String,
        parameters: serde_json::Value,
    },
    TerminalResult(TerminalResult),
}

pub type MessageStream =
    Pin<Box<dyn Stream<Item = Result<StreamMessage, TransportError>> + Send>>;

/// Language-model invocation transport
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a streaming session for `request`, started with `command`
    async fn open_stream(
        &self,
        request: &PhaseRequest,
        command: &InvocationCommand,
    ) -> Result<MessageStream, TransportError>;
}
