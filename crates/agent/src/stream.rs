//! Streaming runs.
//!
//! `run_streaming` moves the agent onto a tokio task and hands back a
//! [`RunStream`]. Step lines arrive as [`RunEvent`]s through a bounded
//! channel. The run stops early when:
//!
//! - the consumer calls [`RunStream::cancel`] (ends FINISHED)
//! - the consumer drops the stream (ends FINISHED)
//! - no event reaches the consumer within the idle timeout (ends ERROR)
//! - the consumer stops reading and the channel stays full (ends ERROR)
//!
//! Interrupts are observed at step boundaries; an in-flight model or tool
//! call is allowed to finish and its outcome is discarded.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use stepwise_core::agent::AgentState;
use stepwise_core::error::RunError;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::runner::Agent;
use crate::sink::{Interrupt, OutcomeSink};
use crate::strategy::StepStrategy;
use crate::stream_event::RunEvent;

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// How a streaming run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionReason {
    Completed,
    Cancelled,
    Disconnected,
    TimedOut,
    ConsumerStalled,
}

impl CompletionReason {
    fn from_interrupt(interrupt: Option<Interrupt>) -> Self {
        match interrupt {
            None => Self::Completed,
            Some(Interrupt::Cancelled) => Self::Cancelled,
            Some(Interrupt::Disconnected) => Self::Disconnected,
            Some(Interrupt::TimedOut) => Self::TimedOut,
            Some(Interrupt::ConsumerStalled) => Self::ConsumerStalled,
        }
    }
}

pub type CompletionCallback = Box<dyn FnOnce(CompletionReason) + Send + 'static>;

pub struct StreamOptions {
    /// Longest the consumer waits for an event, and the longest the run
    /// waits for room in the channel
    pub idle_timeout: Duration,

    pub channel_capacity: usize,

    on_complete: Option<CompletionCallback>,
}

impl StreamOptions {
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Called exactly once with the reason the run ended.
    pub fn on_complete(mut self, callback: impl FnOnce(CompletionReason) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            on_complete: None,
        }
    }
}

impl std::fmt::Debug for StreamOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamOptions")
            .field("idle_timeout", &self.idle_timeout)
            .field("channel_capacity", &self.channel_capacity)
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

/// First interrupt raised by either side. Later ones are ignored.
#[derive(Clone, Default)]
struct InterruptSlot(Arc<Mutex<Option<Interrupt>>>);

impl InterruptSlot {
    fn raise(&self, interrupt: Interrupt) {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get_or_insert(interrupt);
    }

    fn get(&self) -> Option<Interrupt> {
        *self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// The completion callback, fired by whichever side sees the end first.
#[derive(Clone)]
struct CompletionHook(Arc<Mutex<Option<CompletionCallback>>>);

impl CompletionHook {
    fn new(callback: Option<CompletionCallback>) -> Self {
        Self(Arc::new(Mutex::new(callback)))
    }

    /// Runs the callback unless it already ran.
    fn fire(&self, reason: CompletionReason) {
        let callback = self
            .0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(callback) = callback {
            callback(reason);
        }
    }
}

struct ChannelSink {
    tx: mpsc::Sender<RunEvent>,
    cancel: CancellationToken,
    slot: InterruptSlot,
    send_timeout: Duration,
}

impl ChannelSink {
    async fn send(&self, event: RunEvent) -> Result<(), Interrupt> {
        match self.tx.send_timeout(event, self.send_timeout).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(self.slot.get().unwrap_or(Interrupt::ConsumerStalled)),
            Err(SendTimeoutError::Closed(_)) => Err(self.slot.get().unwrap_or(Interrupt::Disconnected)),
        }
    }
}

#[async_trait::async_trait]
impl OutcomeSink for ChannelSink {
    fn interrupted(&self) -> Option<Interrupt> {
        if let Some(interrupt) = self.slot.get() {
            return Some(interrupt);
        }
        if self.cancel.is_cancelled() {
            return Some(Interrupt::Cancelled);
        }
        if self.tx.is_closed() {
            return Some(Interrupt::Disconnected);
        }
        None
    }

    async fn deliver_step(&mut self, step: u32, line: String) -> Result<(), Interrupt> {
        self.send(RunEvent::Step {
            step,
            content: line,
        })
        .await
    }

    async fn deliver_error(&mut self, message: String) -> Result<(), Interrupt> {
        self.send(RunEvent::Error { message }).await
    }

    async fn finish(&mut self, state: AgentState, steps: u32) -> Result<(), Interrupt> {
        self.send(RunEvent::Done { state, steps }).await
    }
}

/// The consumer side of a streaming run.
///
/// Dropping it disconnects the run.
pub struct RunStream<S> {
    rx: mpsc::Receiver<RunEvent>,
    cancel: CancellationToken,
    slot: InterruptSlot,
    hook: CompletionHook,
    idle_timeout: Duration,
    handle: JoinHandle<Agent<S>>,
    exhausted: bool,
}

impl<S> RunStream<S> {
    /// Next event, or `None` once the run has ended.
    ///
    /// If nothing arrives within the idle timeout the run is cancelled, the
    /// completion callback fires, and an error event is returned in place of
    /// the missing one. The agent itself reaches ERROR once its in-flight
    /// step returns.
    pub async fn recv(&mut self) -> Option<RunEvent> {
        if self.exhausted {
            return None;
        }

        match tokio::time::timeout(self.idle_timeout, self.rx.recv()).await {
            Ok(Some(event)) => {
                if matches!(event, RunEvent::Done { .. }) {
                    self.exhausted = true;
                }
                Some(event)
            }
            Ok(None) => {
                self.exhausted = true;
                None
            }
            Err(_) => {
                warn!(timeout = ?self.idle_timeout, "Stream idle, cancelling run");
                self.slot.raise(Interrupt::TimedOut);
                self.cancel.cancel();
                self.hook.fire(CompletionReason::from_interrupt(self.slot.get()));
                self.exhausted = true;
                Some(RunEvent::Error {
                    message: format!("No event within {:?}, run cancelled", self.idle_timeout),
                })
            }
        }
    }

    /// Stop the run at the next step boundary. It ends FINISHED.
    pub fn cancel(&self) {
        self.slot.raise(Interrupt::Cancelled);
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drain any remaining events and wait for the run to end.
    pub async fn join(mut self) -> Result<Agent<S>, JoinError> {
        while self.recv().await.is_some() {}
        self.handle.await
    }
}

impl<S: StepStrategy + 'static> Agent<S> {
    /// Start the run on a background task and stream its step lines.
    ///
    /// Preconditions are checked before anything is spawned; on failure the
    /// agent is dropped untouched. Use [`Agent::check_ready`] first to keep
    /// it. Must be called from within a tokio runtime.
    pub fn run_streaming(
        mut self,
        prompt: &str,
        mut options: StreamOptions,
    ) -> Result<RunStream<S>, RunError> {
        if options.channel_capacity == 0 {
            return Err(RunError::Misconfigured(
                "stream channel capacity must be at least 1".into(),
            ));
        }
        if options.idle_timeout.is_zero() {
            return Err(RunError::Misconfigured(
                "stream idle timeout must be positive".into(),
            ));
        }
        self.begin(prompt)?;

        let (tx, rx) = mpsc::channel(options.channel_capacity);
        let cancel = CancellationToken::new();
        let slot = InterruptSlot::default();
        let hook = CompletionHook::new(options.on_complete.take());

        let mut sink = ChannelSink {
            tx,
            cancel: cancel.clone(),
            slot: slot.clone(),
            send_timeout: options.idle_timeout,
        };

        let task_hook = hook.clone();
        let handle = tokio::spawn(async move {
            let interrupt = self.drive(&mut sink).await;
            let reason = CompletionReason::from_interrupt(interrupt);
            info!(state = %self.state(), ?reason, "Streaming run complete");
            task_hook.fire(reason);
            self
        });

        Ok(RunStream {
            rx,
            cancel,
            slot,
            hook,
            idle_timeout: options.idle_timeout,
            handle,
            exhausted: false,
        })
    }
}
