//! Subprocess transport for Claude-Code-compatible CLIs.
//!
//! Runs the resolved command in `stream-json` mode and turns each stdout line
//! into zero or more [`StreamMessage`]s. Stderr is collected in the background
//! and reported only when the process exits non-zero without a result record.

use async_stream::try_stream;
use async_trait::async_trait;
use futures::Stream;
use serde::Deserialize;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;

use super::{MessageStream, StreamMessage, TerminalResult, TokenUsage, Transport};
use crate::error::TransportError;
use crate::registry::InvocationCommand;
use crate::request::PhaseRequest;

/// Transport that spawns the backend CLI once per phase
#[derive(Debug, Clone, Default)]
pub struct CliTransport;

impl CliTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for CliTransport {
    async fn open_stream(
        &self,
        request: &PhaseRequest,
        command: &InvocationCommand,
    ) -> Result<MessageStream, TransportError> {
        let args = build_args(request, command);
        tracing::debug!(
            program = %command.program,
            phase = %request.phase,
            backend = %request.backend,
            "transport.cli.spawn"
        );

        let mut child = Command::new(&command.program)
            .args(&args)
            .current_dir(&request.working_directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TransportError::Spawn {
                program: command.program.clone(),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Other("backend stdout was not captured".into()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| TransportError::Other("backend stderr was not captured".into()))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        Ok(Box::pin(read_session(child, stdout, stderr_task)))
    }
}

/// Arguments appended to the resolved command
pub fn build_args(request: &PhaseRequest, command: &InvocationCommand) -> Vec<String> {
    let mut args = command.args.clone();
    args.extend([
        "--print".to_string(),
        request.prompt_text.clone(),
        "--output-format".to_string(),
        "stream-json".to_string(),
        "--verbose".to_string(),
        "--max-turns".to_string(),
        request.max_turns.to_string(),
        "--permission-mode".to_string(),
        request.permission_policy.as_str().to_string(),
        "--allowedTools".to_string(),
        request.allowed_tools(),
    ]);
    if let Some(model) = &request.model {
        args.push("--model".to_string());
        args.push(model.clone());
    }
    for dir in &request.extra_directories {
        args.push("--add-dir".to_string());
        args.push(dir.display().to_string());
    }
    args
}

fn read_session(
    mut child: Child,
    stdout: ChildStdout,
    stderr_task: JoinHandle<String>,
) -> impl Stream<Item = Result<StreamMessage, TransportError>> + Send {
    try_stream! {
        let mut lines = BufReader::new(stdout).lines();
        let mut saw_result = false;

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_line(line) {
                Ok(messages) => {
                    for message in messages {
                        if matches!(message, StreamMessage::TerminalResult(_)) {
                            saw_result = true;
                        }
                        yield message;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "transport.cli.unparsed_line");
                }
            }
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();
        if !status.success() && !saw_result {
            Err::<(), TransportError>(TransportError::ProcessExit {
                code: status.code(),
                stderr: stderr.trim().to_string(),
            })?;
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CliEvent {
    Assistant { message: AssistantBody },
    Result(ResultBody),
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AssistantBody {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ResultBody {
    #[serde(default)]
    is_error: bool,
    #[serde(default)]
    duration_ms: u64,
    #[serde(default)]
    num_turns: u32,
    total_cost_usd: Option<f64>,
    result: Option<String>,
    usage: Option<TokenUsage>,
}

/// Parse one `stream-json` line.
///
/// Assistant messages expand to one message per text or tool-use block;
/// system and user records yield nothing.
pub fn parse_line(line: &str) -> Result<Vec<StreamMessage>, serde_json::Error> {
    let event: CliEvent = serde_json::from_str(line)?;
    let messages = match event {
        CliEvent::Assistant { message } => message
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(StreamMessage::TextChunk(text)),
                ContentBlock::ToolUse { name, input } => Some(StreamMessage::ActionInvocation {
                    name,
                    parameters: input,
                }),
                ContentBlock::Other => None,
            })
            .collect(),
        CliEvent::Result(body) => vec![StreamMessage::TerminalResult(TerminalResult {
            cost_usd: body.total_cost_usd,
            duration_ms: body.duration_ms,
            turn_count: body.num_turns,
            success: !body.is_error,
            result_text: body.result,
            usage: body.usage,
        })],
        CliEvent::Other => Vec::new(),
    };
    Ok(messages)
}
