//! Streaming types for pipeline runs.
//!
//! Defines stream modes, events, and StreamWriter for value, update, message, and custom
//! streaming. Used by the stage graph and nodes that emit
//! incremental results.
//!
//! # StreamWriter
//!
//! The `StreamWriter` struct provides a convenient API for nodes and tools to emit
//! custom streaming events. It encapsulates the stream sender and mode checking logic.
//!
//! ```rust,ignore
//! use pipeline::stream::{StreamWriter, StreamMode};
//!
//! // In a node's run_with_context method:
//! async fn run_with_context(&self, state: S, ctx: &RunContext<S>) -> Result<(S, Next), AgentError> {
//!     let writer = StreamWriter::from_context(ctx);
//!     
//!     // Send custom data (only if Custom mode is enabled)
//!     writer.emit_custom(serde_json::json!({"progress": 50})).await;
//!     
//!     // Send message chunk (only if Messages mode is enabled)
//!     writer.emit_message("Hello", "think").await;
//!     
//!     Ok((state, Next::Continue))
//! }
//! ```

use serde_json::Value;
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::mpsc;

// ============================================================================
// ToolStreamWriter - Type-erased writer for tools
// ============================================================================

/// A writer for emitting custom streaming events from tools.
///
/// This is a type-erased wrapper that doesn't require the state type `S`,
/// making it suitable for use in tools which are state-agnostic. Tools can
/// use this to emit progress updates, intermediate results, or any custom
/// JSON data during execution.
///
/// # Example
///
/// ```rust,ignore
/// use pipeline::stream::ToolStreamWriter;
/// use serde_json::json;
///
/// async fn my_tool(writer: &ToolStreamWriter) -> String {
///     // Emit progress updates
///     writer.emit_custom(json!({"status": "starting"}));
///     
///     // Do work...
///     
///     writer.emit_custom(json!({"status": "done", "result_count": 42}));
///     "Tool completed".to_string()
/// }
/// ```
///
/// # Thread Safety
///
/// `ToolStreamWriter` is `Clone + Send + Sync`, so it can be safely shared
/// across async tasks or threads.
#[derive(Clone)]
pub struct ToolStreamWriter {
    /// Function that emits a custom event. Returns true if sent successfully.
    emit_fn: Arc<dyn Fn(Value) -> bool + Send + Sync>,
}

impl ToolStreamWriter {
    /// Creates a new ToolStreamWriter with the given emit function.
    ///
    /// The emit function should return `true` if the event was sent successfully,
    /// `false` otherwise (e.g., if streaming is not enabled or channel is full).
    ///
    /// # Arguments
    ///
    /// * `emit_fn` - Function that handles emitting custom events
    pub fn new(emit_fn: impl Fn(Value) -> bool + Send + Sync + 'static) -> Self {
        Self {
            emit_fn: Arc::new(emit_fn),
        }
    }

    /// Creates a no-op ToolStreamWriter that does nothing.
    ///
    /// Useful when streaming is not enabled but code still needs a writer.
    pub fn noop() -> Self {
        Self {
            emit_fn: Arc::new(|_| false),
        }
    }

    /// Emits a custom JSON payload.
    ///
    /// Returns `true` if the event was sent successfully, `false` otherwise.
    /// This is a non-blocking operation that uses `try_send` internally.
    ///
    /// # Arguments
    ///
    /// * `value` - The JSON value to emit
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use serde_json::json;
    ///
    /// let sent = writer.emit_custom(json!({"progress": 50}));
    /// if sent {
    ///     println!("Progress update sent");
    /// }
    /// ```
    pub fn emit_custom(&self, value: Value) -> bool {
        (self.emit_fn)(value)
    }

    /// Checks if this writer is a no-op (always returns false).
    ///
    /// This can be used to skip expensive computations when streaming
    /// is not enabled.
    pub fn is_noop(&self) -> bool {
        // We can't truly check if it's a noop, but we can try sending
        // a null value and see if it returns false. However, this is
        // not reliable as the channel might be full. Instead, we just
        // document that users should check stream mode before expensive ops.
        false
    }
}

impl Debug for ToolStreamWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolStreamWriter")
            .field("emit_fn", &"<fn>")
            .finish()
    }
}

impl Default for ToolStreamWriter {
    fn default() -> Self {
        Self::noop()
    }
}

/// Stream mode selector: which kinds of events to emit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamMode {
    /// Emit full state after each node completes.
    Values,
    /// Emit incremental updates with node id and state.
    Updates,
    /// Emit message chunks (LLM streaming).
    Messages,
    /// Emit custom JSON payloads from nodes or tools.
    Custom,
    /// Emit checkpoint events when checkpoints are created.
    Checkpoints,
    /// Emit task start/end events for each node execution.
    Tasks,
    /// Emit both checkpoints and tasks events (debug mode).
    Debug,
}

/// Metadata attached to streamed messages.
#[derive(Clone, Debug)]
pub struct StreamMetadata {
    /// Pipeline stage that produced the message.
    pub stage: String,
}

/// Checkpoint event emitted when a checkpoint is created.
///
/// Contains the checkpoint id, metadata, and optionally the state snapshot.
/// This aligns with graph-based checkpoint streaming format.
#[derive(Clone, Debug)]
pub struct CheckpointEvent<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    /// Unique checkpoint identifier.
    pub checkpoint_id: String,
    /// Timestamp when checkpoint was created.
    pub timestamp: String,
    /// Step number in the graph execution (-1 for input, 0+ for loop).
    pub step: i64,
    /// The state snapshot at this checkpoint.
    pub state: S,
    /// Thread ID associated with this checkpoint.
    pub thread_id: Option<String>,
    /// Checkpoint namespace (for subgraphs).
    pub checkpoint_ns: Option<String>,
}

/// One chunk of streamed message content.
#[derive(Clone, Debug)]
pub struct MessageChunk {
    pub content: String,
}

/// Adapter that converts `MessageChunk` into `StreamEvent::Messages` and sends to `stream_tx`.
///
/// Used by ThinkNode (and similar nodes) to avoid manual channel setup and forward loops.
/// Call `channel()` to get (chunk_tx, chunk_rx), pass `chunk_tx` to `invoke_stream`, then
/// `forward(chunk_rx)` alongside it with `tokio::join!` so all chunks are forwarded before return.
pub struct ChunkToStreamSender<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    stream_tx: mpsc::Sender<StreamEvent<S>>,
    node_id: String,
}

impl<S> ChunkToStreamSender<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    pub fn new(stream_tx: mpsc::Sender<StreamEvent<S>>, node_id: impl Into<String>) -> Self {
        Self {
            stream_tx,
            node_id: node_id.into(),
        }
    }

    /// Returns (chunk_tx, chunk_rx). Pass chunk_tx to `invoke_stream`, then await
    /// `forward(chunk_rx)` together with invoke_stream via `tokio::join!` so forwarding
    /// completes before the caller returns.
    pub fn channel(&self) -> (mpsc::Sender<MessageChunk>, mpsc::Receiver<MessageChunk>) {
        mpsc::channel::<MessageChunk>(128)
    }

    /// Forwards chunks from `chunk_rx` to `stream_tx` as `StreamEvent::Messages`.
    /// Completes when `chunk_rx` is closed (e.g. when invoke_stream drops its sender).
    pub async fn forward(
        &self,
        mut chunk_rx: mpsc::Receiver<MessageChunk>,
    ) {
        let stream_tx = self.stream_tx.clone();
        let node_id = self.node_id.clone();
        while let Some(chunk) = chunk_rx.recv().await {
            let event = StreamEvent::Messages {
                chunk,
                metadata: StreamMetadata {
                    stage: node_id.clone(),
                },
            };
            let _ = stream_tx.send(event).await;
        }
    }
}

/// Streamed event emitted while running a graph.
#[derive(Clone, Debug)]
pub enum StreamEvent<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    /// Full state snapshot after a node finishes.
    Values(S),
    /// Incremental update with the node id and state after that node.
    Updates { node_id: String, state: S },
    /// Message chunk emitted by a node (e.g. ThinkNode streaming LLM output).
    Messages {
        chunk: MessageChunk,
        metadata: StreamMetadata,
    },
    /// Custom JSON payload for arbitrary streaming data.
    Custom(Value),
    /// Checkpoint event emitted when a checkpoint is created.
    Checkpoint(CheckpointEvent<S>),
    /// Task start event emitted when a node begins execution.
    TaskStart {
        /// Node ID that is starting execution.
        node_id: String,
    },
    /// Task end event emitted when a node finishes execution.
    TaskEnd {
        /// Node ID that finished execution.
        node_id: String,
        /// Result of the task: Ok(()) for success, Err(message) for failure.
        result: Result<(), String>,
    },
    /// ToT (Tree of Thoughts): expand node produced multiple candidates.
    TotExpand {
        /// Short summaries of each candidate thought for display.
        candidates: Vec<String>,
    },
    /// ToT: evaluate node chose one candidate and assigned scores.
    TotEvaluate {
        /// Index of the chosen candidate.
        chosen: usize,
        /// Score per candidate (same order as candidates).
        scores: Vec<f32>,
    },
    /// ToT: backtrack node is returning to a previous depth.
    TotBacktrack {
        /// Human-readable reason for backtracking.
        reason: String,
        /// Depth we are backtracking to.
        to_depth: u32,
    },
    /// GoT (Graph of Thoughts): plan_graph node produced a DAG.
    GotPlan {
        /// Number of nodes in the task graph.
        node_count: usize,
        /// Number of edges (dependencies).
        edge_count: usize,
        /// Optional summary of node ids for display.
        node_ids: Vec<String>,
    },
    /// GoT: execute_graph started executing a task node.
    GotNodeStart {
        /// Task node id.
        node_id: String,
    },
    /// GoT: execute_graph completed a task node.
    GotNodeComplete {
        /// Task node id.
        node_id: String,
        /// Short summary of result (e.g. first 200 chars).
        result_summary: String,
    },
    /// GoT: execute_graph marked a task node as failed.
    GotNodeFailed {
        /// Task node id.
        node_id: String,
        /// Error message.
        error: String,
    },
    /// AGoT: a node was expanded into a subgraph (dynamic DAG extension).
    GotExpand {
        /// Node id that triggered the expansion.
        node_id: String,
        /// Number of new nodes added.
        nodes_added: usize,
        /// Number of new edges added.
        edges_added: usize,
    },
    /// LLM token usage for the last completion (e.g. after think node).
    /// Emitted when the provider returns usage (e.g. OpenAI); consumers can print when verbose.
    Usage {
        /// Tokens in the prompt (input).
        prompt_tokens: u32,
        /// Tokens in the completion (output).
        completion_tokens: u32,
        /// Total tokens (prompt + completion).
        total_tokens: u32,
    },
}

/// A writer for emitting streaming events from nodes and tools.
///
/// `StreamWriter` encapsulates the stream sender and mode checking, providing
/// a convenient API for nodes and tools to emit custom events without manually
/// checking `stream_mode` and handling the sender.
///
/// # Usage
///
/// Nodes should create a `StreamWriter` from the `RunContext` and use it to
/// emit events during execution:
///
/// ```rust,ignore
/// use pipeline::stream::StreamWriter;
///
/// async fn run_with_context(&self, state: S, ctx: &RunContext<S>) -> Result<(S, Next), AgentError> {
///     let writer = StreamWriter::from_context(ctx);
///     
///     // Emit progress (only sent if Custom mode is enabled)
///     writer.emit_custom(serde_json::json!({"status": "processing"})).await;
///     
///     // Do work...
///     
///     writer.emit_custom(serde_json::json!({"status": "done"})).await;
///     Ok((state, Next::Continue))
/// }
/// ```
///
/// # Thread Safety
///
/// `StreamWriter` is `Clone + Send + Sync`, so it can be safely shared across
/// async tasks or threads. Multiple writers can emit events concurrently.
#[derive(Clone)]
pub struct StreamWriter<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    /// The sender for stream events (None if streaming is not active).
    tx: Option<mpsc::Sender<StreamEvent<S>>>,
    /// The enabled stream modes.
    modes: Arc<HashSet<StreamMode>>,
}

impl<S> StreamWriter<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    /// Creates a new StreamWriter with the given sender and modes.
    ///
    /// # Arguments
    ///
    /// * `tx` - Optional sender for stream events
    /// * `modes` - Set of enabled stream modes
    pub fn new(tx: Option<mpsc::Sender<StreamEvent<S>>>, modes: HashSet<StreamMode>) -> Self {
        Self {
            tx,
            modes: Arc::new(modes),
        }
    }

    /// Creates a StreamWriter that does nothing (no-op writer).
    ///
    /// Useful when streaming is not enabled but code still needs a writer.
    pub fn noop() -> Self {
        Self {
            tx: None,
            modes: Arc::new(HashSet::new()),
        }
    }

    /// Checks if a specific stream mode is enabled.
    pub fn is_mode_enabled(&self, mode: StreamMode) -> bool {
        self.modes.contains(&mode)
    }

    /// Emits a custom JSON payload.
    ///
    /// Only sends if `StreamMode::Custom` is enabled and a sender is available.
    /// Returns `true` if the event was sent, `false` otherwise.
    ///
    /// # Arguments
    ///
    /// * `value` - The JSON value to emit
    pub async fn emit_custom(&self, value: Value) -> bool {
        if !self.modes.contains(&StreamMode::Custom) {
            return false;
        }
        if let Some(tx) = &self.tx {
            tx.send(StreamEvent::Custom(value)).await.is_ok()
        } else {
            false
        }
    }

    /// Emits a custom JSON payload (non-blocking version).
    ///
    /// Uses `try_send` instead of `send`, which does not await.
    /// Useful in sync contexts or when you don't want to block.
    ///
    /// Returns `true` if the event was sent, `false` otherwise.
    pub fn try_emit_custom(&self, value: Value) -> bool {
        if !self.modes.contains(&StreamMode::Custom) {
            return false;
        }
        if let Some(tx) = &self.tx {
            tx.try_send(StreamEvent::Custom(value)).is_ok()
        } else {
            false
        }
    }

    /// Emits a message chunk (LLM token).
    ///
    /// Only sends if `StreamMode::Messages` is enabled and a sender is available.
    /// Returns `true` if the event was sent, `false` otherwise.
    ///
    /// # Arguments
    ///
    /// * `content` - The message chunk content
    /// * `node_id` - The node ID that produced this message
    pub async fn emit_message(
        &self,
        content: impl Into<String>,
        node_id: impl Into<String>,
    ) -> bool {
        if !self.modes.contains(&StreamMode::Messages) {
            return false;
        }
        if let Some(tx) = &self.tx {
            let event = StreamEvent::Messages {
                chunk: MessageChunk {
                    content: content.into(),
                },
                metadata: StreamMetadata {
                    stage: node_id.into(),
                },
            };
            tx.send(event).await.is_ok()
        } else {
            false
        }
    }

    /// Emits a message chunk (non-blocking version).
    ///
    /// Uses `try_send` instead of `send`.
    pub fn try_emit_message(&self, content: impl Into<String>, node_id: impl Into<String>) -> bool {
        if !self.modes.contains(&StreamMode::Messages) {
            return false;
        }
        if let Some(tx) = &self.tx {
            let event = StreamEvent::Messages {
                chunk: MessageChunk {
                    content: content.into(),
                },
                metadata: StreamMetadata {
                    stage: node_id.into(),
                },
            };
            tx.try_send(event).is_ok()
        } else {
            false
        }
    }

    /// Emits a full state value.
    ///
    /// Only sends if `StreamMode::Values` is enabled and a sender is available.
    /// Returns `true` if the event was sent, `false` otherwise.
    ///
    /// Note: This is typically used by the graph execution loop, not by nodes directly.
    pub async fn emit_values(&self, state: S) -> bool {
        if !self.modes.contains(&StreamMode::Values) {
            return false;
        }
        if let Some(tx) = &self.tx {
            tx.send(StreamEvent::Values(state)).await.is_ok()
        } else {
            false
        }
    }

    /// Emits an incremental update.
    ///
    /// Only sends if `StreamMode::Updates` is enabled and a sender is available.
    /// Returns `true` if the event was sent, `false` otherwise.
    ///
    /// Note: This is typically used by the graph execution loop, not by nodes directly.
    pub async fn emit_updates(&self, node_id: impl Into<String>, state: S) -> bool {
        if !self.modes.contains(&StreamMode::Updates) {
            return false;
        }
        if let Some(tx) = &self.tx {
            let event = StreamEvent::Updates {
                node_id: node_id.into(),
                state,
            };
            tx.send(event).await.is_ok()
        } else {
            false
        }
    }

    /// Emits a checkpoint event.
    ///
    /// Only sends if `StreamMode::Checkpoints` or `StreamMode::Debug` is enabled and a sender is available.
    /// Returns `true` if the event was sent, `false` otherwise.
    ///
    /// Note: This is typically used by the graph execution loop after saving a checkpoint.
    ///
    /// # Arguments
    ///
    /// * `checkpoint_id` - Unique identifier for this checkpoint
    /// * `timestamp` - Timestamp when checkpoint was created
    /// * `step` - Step number in the graph execution (-1 for input, 0+ for loop)
    /// * `state` - The state snapshot at this checkpoint
    /// * `thread_id` - Optional thread ID
    /// * `checkpoint_ns` - Optional checkpoint namespace (for subgraphs)
    pub async fn emit_checkpoint(
        &self,
        checkpoint_id: impl Into<String>,
        timestamp: impl Into<String>,
        step: i64,
        state: S,
        thread_id: Option<String>,
        checkpoint_ns: Option<String>,
    ) -> bool {
        if !self.modes.contains(&StreamMode::Checkpoints)
            && !self.modes.contains(&StreamMode::Debug)
        {
            return false;
        }
        if let Some(tx) = &self.tx {
            let event = StreamEvent::Checkpoint(CheckpointEvent {
                checkpoint_id: checkpoint_id.into(),
                timestamp: timestamp.into(),
                step,
                state,
                thread_id,
                checkpoint_ns,
            });
            tx.send(event).await.is_ok()
        } else {
            false
        }
    }

    /// Emits a task start event.
    ///
    /// Only sends if `StreamMode::Tasks` or `StreamMode::Debug` is enabled and a sender is available.
    /// Returns `true` if the event was sent, `false` otherwise.
    ///
    /// Note: This is typically used by the graph execution loop before running a node.
    ///
    /// # Arguments
    ///
    /// * `node_id` - The ID of the node that is starting execution
    pub async fn emit_task_start(&self, node_id: impl Into<String>) -> bool {
        if !self.modes.contains(&StreamMode::Tasks) && !self.modes.contains(&StreamMode::Debug) {
            return false;
        }
        if let Some(tx) = &self.tx {
            let event = StreamEvent::TaskStart {
                node_id: node_id.into(),
            };
            tx.send(event).await.is_ok()
        } else {
            false
        }
    }

    /// Emits a task end event.
    ///
    /// Only sends if `StreamMode::Tasks` or `StreamMode::Debug` is enabled and a sender is available.
    /// Returns `true` if the event was sent, `false` otherwise.
    ///
    /// Note: This is typically used by the graph execution loop after running a node.
    ///
    /// # Arguments
    ///
    /// * `node_id` - The ID of the node that finished execution
    /// * `result` - Ok(()) for success, Err(message) for failure
    pub async fn emit_task_end(
        &self,
        node_id: impl Into<String>,
        result: Result<(), String>,
    ) -> bool {
        if !self.modes.contains(&StreamMode::Tasks) && !self.modes.contains(&StreamMode::Debug) {
            return false;
        }
        if let Some(tx) = &self.tx {
            let event = StreamEvent::TaskEnd {
                node_id: node_id.into(),
                result,
            };
            tx.send(event).await.is_ok()
        } else {
            false
        }
    }

    /// Returns the raw sender if available.
    ///
    /// This allows advanced use cases where direct access to the sender is needed.
    pub fn sender(&self) -> Option<&mpsc::Sender<StreamEvent<S>>> {
        self.tx.as_ref()
    }

    /// Returns a reference to the enabled modes.
    pub fn modes(&self) -> &HashSet<StreamMode> {
        &self.modes
    }
}

impl<S> Debug for StreamWriter<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamWriter")
            .field("has_sender", &self.tx.is_some())
            .field("modes", &self.modes)
            .finish()
    }
}
