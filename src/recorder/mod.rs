//! Diagnostic recorder for aggregate discovery.
//!
//! The recorder accumulates informational, warning and error messages under a
//! nested naming context (e.g. `sales:agg_c_14_sales_fact:unit_sales`). Errors
//! are counted against a ceiling; once the ceiling is reached `report_error`
//! fails so the caller can abort the current star.
//!
//! # Example
//!
//! ```
//! use aggnav::recorder::MessageRecorder;
//!
//! let mut recorder = MessageRecorder::new();
//! {
//!     let mut scope = recorder.scoped("sales");
//!     scope.report_warning("no rule groups");
//! }
//! assert_eq!(recorder.warning_count(), 1);
//! assert_eq!(recorder.context(), "");
//! ```

use std::fmt;
use std::ops::{Deref, DerefMut};

use serde::Serialize;
use thiserror::Error;

/// Result type for recorder operations.
pub type RecorderResult<T> = Result<T, RecorderError>;

/// Raised when the recorder's error ceiling is reached.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecorderError {
    #[error("too many errors ({count}, limit {limit}), last at '{context}'")]
    LimitExceeded {
        count: usize,
        limit: usize,
        context: String,
    },
}

/// Severity of a recorded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(level)
    }
}

/// A single recorded message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub severity: Severity,
    /// Colon-joined context at the time the message was reported.
    pub context: String,
    pub text: String,
    /// Opaque caller data attached to the message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.context.is_empty() {
            write!(f, "{}", self.text)
        } else {
            write!(f, "{}: {}", self.context, self.text)
        }
    }
}

/// Accumulates discovery diagnostics and escalates on too many errors.
///
/// A recorder is scoped to one discovery run of one star and is never shared
/// between runs.
#[derive(Debug, Clone)]
pub struct MessageRecorder {
    contexts: Vec<String>,
    messages: Vec<Message>,
    error_limit: usize,
    info_count: usize,
    warning_count: usize,
    error_count: usize,
}

impl Default for MessageRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageRecorder {
    /// Error ceiling used by [`MessageRecorder::new`].
    pub const DEFAULT_ERROR_LIMIT: usize = 10;

    pub fn new() -> Self {
        Self::with_error_limit(Self::DEFAULT_ERROR_LIMIT)
    }

    /// Create a recorder that fails once `error_limit` errors are reported.
    ///
    /// A limit of zero is treated as one.
    pub fn with_error_limit(error_limit: usize) -> Self {
        Self {
            contexts: Vec::new(),
            messages: Vec::new(),
            error_limit: error_limit.max(1),
            info_count: 0,
            warning_count: 0,
            error_count: 0,
        }
    }

    pub fn error_limit(&self) -> usize {
        self.error_limit
    }

    // =========================================================================
    // Context
    // =========================================================================

    /// Push a name onto the context path.
    ///
    /// Callers must balance this with [`pop_context`](Self::pop_context);
    /// prefer [`scoped`](Self::scoped), which pops on drop.
    pub fn push_context(&mut self, name: impl Into<String>) {
        self.contexts.push(name.into());
    }

    pub fn pop_context(&mut self) -> Option<String> {
        self.contexts.pop()
    }

    /// The current context path, joined with `:`.
    pub fn context(&self) -> String {
        self.contexts.join(":")
    }

    /// Push a context that is popped when the returned guard is dropped.
    pub fn scoped(&mut self, name: impl Into<String>) -> ContextGuard<'_> {
        self.push_context(name);
        ContextGuard { recorder: self }
    }

    // =========================================================================
    // Reporting
    // =========================================================================

    pub fn report_info(&mut self, text: impl Into<String>) {
        self.record(Severity::Info, text.into(), None);
    }

    pub fn report_info_with(&mut self, text: impl Into<String>, payload: serde_json::Value) {
        self.record(Severity::Info, text.into(), Some(payload));
    }

    pub fn report_warning(&mut self, text: impl Into<String>) {
        self.record(Severity::Warning, text.into(), None);
    }

    pub fn report_warning_with(&mut self, text: impl Into<String>, payload: serde_json::Value) {
        self.record(Severity::Warning, text.into(), Some(payload));
    }

    /// Record an error.
    ///
    /// The message is always kept. Returns `Err` once the error count reaches
    /// the ceiling.
    pub fn report_error(&mut self, text: impl Into<String>) -> RecorderResult<()> {
        self.record(Severity::Error, text.into(), None);
        self.check_limit()
    }

    pub fn report_error_with(
        &mut self,
        text: impl Into<String>,
        payload: serde_json::Value,
    ) -> RecorderResult<()> {
        self.record(Severity::Error, text.into(), Some(payload));
        self.check_limit()
    }

    fn record(&mut self, severity: Severity, text: String, payload: Option<serde_json::Value>) {
        match severity {
            Severity::Info => self.info_count += 1,
            Severity::Warning => self.warning_count += 1,
            Severity::Error => self.error_count += 1,
        }
        self.messages.push(Message {
            severity,
            context: self.context(),
            text,
            payload,
        });
    }

    fn check_limit(&self) -> RecorderResult<()> {
        if self.error_count >= self.error_limit {
            return Err(RecorderError::LimitExceeded {
                count: self.error_count,
                limit: self.error_limit,
                context: self.context(),
            });
        }
        Ok(())
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn has_warnings(&self) -> bool {
        self.warning_count > 0
    }

    pub fn has_information(&self) -> bool {
        self.info_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn info_count(&self) -> usize {
        self.info_count
    }

    /// All messages in the order they were reported.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Messages of one severity, in report order.
    pub fn messages_of(&self, severity: Severity) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(move |m| m.severity == severity)
    }

    /// Take the recorded messages, leaving the counts untouched.
    pub fn take_messages(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.messages)
    }

    /// Reset messages, counts and context. The error ceiling is kept.
    pub fn clear(&mut self) {
        self.contexts.clear();
        self.messages.clear();
        self.info_count = 0;
        self.warning_count = 0;
        self.error_count = 0;
    }

    /// Flush every message to the log: infos, then warnings, then errors.
    pub fn log_messages(&self) {
        for message in self.messages_of(Severity::Info) {
            tracing::info!(context = %message.context, "{}", message.text);
        }
        for message in self.messages_of(Severity::Warning) {
            tracing::warn!(context = %message.context, "{}", message.text);
        }
        for message in self.messages_of(Severity::Error) {
            tracing::error!(context = %message.context, "{}", message.text);
        }
    }
}

/// Pops its context from the recorder when dropped.
///
/// Dereferences to the recorder so reports made through the guard carry the
/// guarded context.
pub struct ContextGuard<'a> {
    recorder: &'a mut MessageRecorder,
}

impl Deref for ContextGuard<'_> {
    type Target = MessageRecorder;

    fn deref(&self) -> &Self::Target {
        self.recorder
    }
}

impl DerefMut for ContextGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.recorder
    }
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        self.recorder.pop_context();
    }
}
