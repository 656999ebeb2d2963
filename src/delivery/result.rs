use std::collections::BTreeMap;
use std::fmt;

/// Severity of one result. Lower is more severe, so `level < Level::Warn`
/// reads as "needs attention".
#[cfg_attr(feature = "with-serde", derive(serde::Serialize))]
#[cfg_attr(feature = "with-serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Fatal,
    Error,
    Warn,
    Info,
    Debug,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fatal => "fatal",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
        })
    }
}

/// What happened. Every recipient ends with exactly one terminal outcome;
/// `AttemptFailed` reports a candidate server that was given up on.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize))]
#[cfg_attr(feature = "with-serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The server took responsibility for the recipient.
    Accepted,
    /// The server refused the recipient inside an otherwise working session.
    Rejected,
    /// No server could be found for the recipient's domain.
    Unresolved,
    /// Every candidate server failed before the recipient could be attributed.
    Failed,
    AttemptFailed,
}

impl Outcome {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::AttemptFailed)
    }
}

/// Structured context: `recipient`, `domain`, `server`, `code`.
pub type Fields = BTreeMap<String, String>;

#[cfg_attr(feature = "with-serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResult {
    pub level: Level,
    pub outcome: Outcome,
    pub message: String,
    /// Underlying failure, set whenever the outcome is not `Accepted`.
    #[cfg_attr(feature = "with-serde", serde(skip_serializing_if = "Option::is_none"))]
    pub error: Option<String>,
    pub fields: Fields,
}

impl SendResult {
    pub(crate) fn new(level: Level, outcome: Outcome, message: impl Into<String>) -> Self {
        Self {
            level,
            outcome,
            message: message.into(),
            error: None,
            fields: Fields::new(),
        }
    }

    pub(crate) fn with_error(mut self, error: impl fmt::Display) -> Self {
        self.error = Some(error.to_string());
        self
    }

    pub(crate) fn field(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.fields.insert(key.to_string(), value.to_string());
        self
    }

    pub fn recipient(&self) -> Option<&str> {
        self.fields.get("recipient").map(String::as_str)
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome.is_terminal()
    }
}

impl fmt::Display for SendResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.message)?;
        if let Some(error) = &self.error {
            write!(f, ": {error}")?;
        }
        Ok(())
    }
}
