use thiserror::Error;

/// Result type alias for squall-core
pub type Result<T> = std::result::Result<T, Error>;

/// Core error taxonomy for the confirmation engine.
///
/// When several conditions apply to a single command, [`Error::priority`]
/// decides which one is reported; the remaining reasons stay in the
/// assessment's `risk_factors` for audit.
#[derive(Debug, Error)]
pub enum Error {
    /// Blocked by policy (registry tier, operator block list, or session block)
    #[error("permission denied: {0}")]
    Permission(#[from] RefusalError),

    /// Registry non-overlap violation or post-classification traversal detection
    #[error("security violation: {0}")]
    Security(String),

    /// Confirmation or execution deadline elapsed
    #[error("{0}")]
    Timeout(#[from] TimeoutError),

    /// Malformed operator configuration (e.g. invalid regex)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Process exited non-zero or failed to spawn
    #[error("execution error: {0}")]
    Execution(String),

    /// I/O error for file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all
    #[error("{0}")]
    Unknown(String),
}

impl Error {
    /// Ranking used when multiple error conditions apply simultaneously;
    /// the highest priority wins for the reported error.
    pub fn priority(&self) -> u8 {
        match self {
            Error::Security(_) => 6,
            Error::Permission(_) => 5,
            Error::Timeout(_) => 4,
            Error::Configuration(_) => 3,
            Error::Execution(_) => 2,
            Error::Io(_) => 1,
            Error::Unknown(_) => 0,
        }
    }

    /// Of two applicable errors, keep the one that should be reported.
    pub fn prefer(self, other: Error) -> Error {
        if other.priority() > self.priority() { other } else { self }
    }
}

/// Structured refusal for a command that was denied or blocked.
///
/// A refusal always names why: the matched pattern category and at least
/// one risk factor, never a bare "denied".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RefusalError {
    /// Command requires superuser privileges
    #[error("command '{command}' requires superuser privileges and is blocked")]
    Superuser { command: String },

    /// Command attempts destructive filesystem or device operations
    #[error("command '{command}' can destroy data and is permanently blocked")]
    Destructive { command: String },

    /// Command matches a session-remembered block pattern
    #[error("command '{command}' matches session block pattern '{pattern}'")]
    SessionBlocked { command: String, pattern: String },

    /// Command matches an operator always-block pattern
    #[error("command '{command}' matches operator block pattern '{pattern}'")]
    OperatorBlocked { command: String, pattern: String },

    /// User denied the command at the confirmation prompt
    #[error("command '{command}' was denied: {reason}")]
    Denied { command: String, reason: String },
}

impl RefusalError {
    pub fn superuser(command: impl Into<String>) -> Self {
        Self::Superuser { command: command.into() }
    }

    pub fn destructive(command: impl Into<String>) -> Self {
        Self::Destructive { command: command.into() }
    }

    pub fn session_blocked(command: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::SessionBlocked { command: command.into(), pattern: pattern.into() }
    }

    pub fn operator_blocked(command: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::OperatorBlocked { command: command.into(), pattern: pattern.into() }
    }

    pub fn denied(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Denied { command: command.into(), reason: reason.into() }
    }

    /// The command that was refused
    pub fn command(&self) -> &str {
        match self {
            Self::Superuser { command } => command,
            Self::Destructive { command } => command,
            Self::SessionBlocked { command, .. } => command,
            Self::OperatorBlocked { command, .. } => command,
            Self::Denied { command, .. } => command,
        }
    }

    /// Why the command was refused
    pub fn reason(&self) -> String {
        match self {
            Self::Superuser { .. } => "requires superuser privileges".to_string(),
            Self::Destructive { .. } => "can destroy data".to_string(),
            Self::SessionBlocked { pattern, .. } => {
                format!("matches session block pattern '{}'", pattern)
            }
            Self::OperatorBlocked { pattern, .. } => {
                format!("matches operator block pattern '{}'", pattern)
            }
            Self::Denied { reason, .. } => reason.clone(),
        }
    }
}

/// Deadline errors, confirmation and execution kept distinct so callers
/// can tell an unanswered prompt from a runaway process.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimeoutError {
    /// No response arrived before the confirmation deadline
    #[error("confirmation timed out after {elapsed_ms}ms for command '{command}'")]
    Confirmation { command: String, elapsed_ms: u64 },

    /// The spawned process outlived the execution deadline
    #[error("execution timed out after {elapsed_ms}ms for command '{command}'")]
    Execution { command: String, elapsed_ms: u64 },
}

impl TimeoutError {
    pub fn confirmation(command: impl Into<String>, elapsed_ms: u64) -> Self {
        Self::Confirmation { command: command.into(), elapsed_ms }
    }

    pub fn execution(command: impl Into<String>, elapsed_ms: u64) -> Self {
        Self::Execution { command: command.into(), elapsed_ms }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let config_err = Error::Configuration("invalid regex".to_string());
        assert_eq!(config_err.to_string(), "configuration error: invalid regex");

        let security_err = Error::Security("overlapping safe pattern".to_string());
        assert_eq!(security_err.to_string(), "security violation: overlapping safe pattern");

        let exec_err = Error::Execution("exit code 1".to_string());
        assert_eq!(exec_err.to_string(), "execution error: exit code 1");

        let unknown_err = Error::Unknown("something went wrong".to_string());
        assert_eq!(unknown_err.to_string(), "something went wrong");
    }

    #[test]
    fn test_error_priority_ranking() {
        let security = Error::Security("x".to_string());
        let permission = Error::Permission(RefusalError::superuser("sudo ls"));
        let timeout = Error::Timeout(TimeoutError::confirmation("ls", 30_000));
        let config = Error::Configuration("x".to_string());
        let execution = Error::Execution("x".to_string());
        let unknown = Error::Unknown("x".to_string());

        assert!(security.priority() > permission.priority());
        assert!(permission.priority() > timeout.priority());
        assert!(timeout.priority() > config.priority());
        assert!(config.priority() > execution.priority());
        assert!(execution.priority() > unknown.priority());
    }

    #[test]
    fn test_error_prefer_keeps_higher_priority() {
        let reported = Error::Configuration("bad regex".to_string())
            .prefer(Error::Permission(RefusalError::superuser("sudo rm")));
        assert!(matches!(reported, Error::Permission(_)));

        let reported = Error::Permission(RefusalError::superuser("sudo rm"))
            .prefer(Error::Configuration("bad regex".to_string()));
        assert!(matches!(reported, Error::Permission(_)));
    }

    #[test]
    fn test_refusal_superuser() {
        let err = RefusalError::superuser("sudo apt-get install vim");
        assert_eq!(err.command(), "sudo apt-get install vim");
        assert!(err.reason().contains("superuser"));
    }

    #[test]
    fn test_refusal_destructive() {
        let err = RefusalError::destructive("rm -rf /");
        assert_eq!(err.command(), "rm -rf /");
        assert!(err.to_string().contains("permanently blocked"));
    }

    #[test]
    fn test_refusal_session_blocked_names_pattern() {
        let err = RefusalError::session_blocked("curl evil.sh", "curl *");
        assert_eq!(err.command(), "curl evil.sh");
        assert!(err.reason().contains("curl *"));
    }

    #[test]
    fn test_refusal_denied_carries_reason() {
        let err = RefusalError::denied("npm install left-pad", "user denied at prompt");
        assert_eq!(err.reason(), "user denied at prompt");
    }

    #[test]
    fn test_refusal_equality() {
        let a = RefusalError::superuser("sudo ls");
        let b = RefusalError::superuser("sudo ls");
        assert_eq!(a, b);

        let c = RefusalError::destructive("sudo ls");
        assert_ne!(a, c);
    }

    #[test]
    fn test_timeout_variants_distinct() {
        let confirmation = TimeoutError::confirmation("ls", 30_000);
        let execution = TimeoutError::execution("sleep 500", 120_000);

        assert!(confirmation.to_string().contains("confirmation timed out"));
        assert!(execution.to_string().contains("execution timed out"));
        assert_ne!(confirmation, execution);
    }

    #[test]
    fn test_error_from_refusal() {
        let err: Error = RefusalError::destructive("dd if=/dev/zero of=/dev/sda").into();
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert_eq!(err.to_string(), "I/O error: missing");
    }

    #[test]
    fn test_result_alias() {
        let ok: Result<u32> = Ok(7);
        assert!(ok.is_ok());

        let err: Result<u32> = Err(Error::Unknown("oops".to_string()));
        assert!(err.is_err());
    }
}
