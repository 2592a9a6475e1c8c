//! The chat session state machine.
//!
//! A [`ChatSession`] owns the transcript, the text the user is typing, and the
//! single in-flight request. `send_message` performs the synchronous half of a
//! send (append the user message, clear the input, raise the busy flag) and
//! spawns the network call; `wait_for_response` applies its outcome.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::RequestFailed;
use crate::service::QaService;
use crate::state::{Message, SessionState, Speaker};

/// Shown when the service answered without an answer
pub const NO_RESPONSE_PLACEHOLDER: &str = "(no response returned)";

/// Shown for every failed request, whatever the cause
pub const REQUEST_FAILED_MESSAGE: &str = "Something went wrong, please try again later.";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

type PendingAnswer = JoinHandle<Result<Option<String>, RequestFailed>>;

/// Announced to subscribers after each step of a send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The user message was appended and the input cleared
    UserMessageAppended,
    /// The request to the service is in flight
    RequestIssued,
    /// The agent reply (or the error message) was appended
    ResponseApplied { failed: bool },
}

/// What `send_message` did with the pending input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Nothing but whitespace to send
    EmptyInput,
    /// A previous request has not resolved yet
    Busy,
}

/// A transcript entry ready for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscriptEntry<'a> {
    pub role: Speaker,
    pub speaker: &'static str,
    pub content: &'a str,
}

/// Read-only projection of the session for rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView<'a> {
    pub entries: Vec<TranscriptEntry<'a>>,
    pub responding: bool,
    pub pending_input: &'a str,
}

pub struct ChatSession {
    state: SessionState,
    service: Arc<dyn QaService>,
    timeout: Duration,
    in_flight: Option<PendingAnswer>,
    subscribers: Vec<mpsc::UnboundedSender<SessionEvent>>,
}

impl ChatSession {
    pub fn new(service: Arc<dyn QaService>) -> Self {
        Self {
            state: SessionState::new(),
            service,
            timeout: DEFAULT_TIMEOUT,
            in_flight: None,
            subscribers: Vec::new(),
        }
    }

    /// Bound every request by `timeout`; expiry counts as a failed request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Receive a [`SessionEvent`] after every state change.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn transcript(&self) -> &[Message] {
        &self.state.transcript
    }

    pub fn pending_input(&self) -> &str {
        &self.state.pending_input
    }

    pub fn pending_input_mut(&mut self) -> &mut String {
        &mut self.state.pending_input
    }

    pub fn set_pending_input(&mut self, input: impl Into<String>) {
        self.state.pending_input = input.into();
    }

    pub fn is_awaiting_response(&self) -> bool {
        self.state.awaiting_response
    }

    pub fn view(&self) -> SessionView<'_> {
        SessionView {
            entries: self
                .state
                .transcript
                .iter()
                .map(|message| TranscriptEntry {
                    role: message.role,
                    speaker: message.role.label(),
                    content: &message.content,
                })
                .collect(),
            responding: self.state.awaiting_response,
            pending_input: &self.state.pending_input,
        }
    }

    /// Send the pending input as a question.
    ///
    /// Must be called from within a tokio runtime: the request runs on a
    /// spawned task. Whitespace-only input and sends made while a request is
    /// in flight leave the session untouched.
    pub fn send_message(&mut self) -> SendOutcome {
        if !self.state.has_sendable_input() {
            return SendOutcome::EmptyInput;
        }
        if self.state.awaiting_response {
            tracing::debug!("ignoring send while a request is in flight");
            return SendOutcome::Busy;
        }

        let question = std::mem::take(&mut self.state.pending_input);
        self.state.transcript.push(Message::user(question.clone()));
        self.state.awaiting_response = true;
        self.notify(SessionEvent::UserMessageAppended);

        // Snapshot now so later mutations can't leak into this request
        let history = self.state.transcript.clone();
        let service = Arc::clone(&self.service);
        let timeout = self.timeout;

        tracing::info!(history_len = history.len(), "sending question");
        self.in_flight = Some(tokio::spawn(async move {
            match tokio::time::timeout(timeout, service.ask(&question, &history)).await {
                Ok(result) => result,
                Err(_) => Err(RequestFailed::Timeout(timeout)),
            }
        }));
        self.notify(SessionEvent::RequestIssued);

        SendOutcome::Sent
    }

    /// Wait for the in-flight request and apply its outcome.
    ///
    /// Returns `false` immediately if nothing is in flight. Cancel-safe: if
    /// the returned future is dropped before completion the request stays in
    /// flight and a later call picks it up.
    pub async fn wait_for_response(&mut self) -> bool {
        let result = match self.in_flight.as_mut() {
            Some(task) => task.await,
            None => return false,
        };
        self.in_flight = None;

        let result = result.unwrap_or_else(|e| Err(RequestFailed::Aborted(e.to_string())));
        self.apply_response(result);
        true
    }

    fn apply_response(&mut self, result: Result<Option<String>, RequestFailed>) {
        let (content, failed) = match result {
            Ok(answer) => {
                let content = answer
                    .filter(|a| !a.is_empty())
                    .unwrap_or_else(|| NO_RESPONSE_PLACEHOLDER.to_string());
                (content, false)
            }
            Err(e) => {
                tracing::warn!(error = %e, "question-answering request failed");
                (REQUEST_FAILED_MESSAGE.to_string(), true)
            }
        };

        self.state.transcript.push(Message::agent(content));
        self.state.awaiting_response = false;
        tracing::debug!(failed, transcript_len = self.state.transcript.len(), "response applied");
        self.notify(SessionEvent::ResponseApplied { failed });
    }

    fn notify(&mut self, event: SessionEvent) {
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        if let Some(task) = self.in_flight.take() {
            tracing::debug!("session closed with a request in flight, discarding its response");
            task.abort();
        }
    }
}
