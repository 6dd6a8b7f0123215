use std::path::PathBuf;

/// Result type alias for ripple operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for ripple operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration errors
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Project registry could not be read or parsed
    #[error("project registry '{path}': {message}")]
    Registry { path: PathBuf, message: String },

    /// Task graph errors (unknown task, unknown dependency, cycle)
    #[error("task graph error: {message}")]
    TaskGraph { message: String },

    /// Version control errors
    #[error("git {operation} failed: {message}")]
    Vcs { operation: String, message: String },

    /// Cache backend errors
    #[error("cache {operation} failed for key '{key}': {message}")]
    Cache {
        operation: String,
        key: String,
        message: String,
    },

    /// Archive packing/unpacking errors
    #[error("archive '{path}': {message}")]
    Archive { path: PathBuf, message: String },

    /// Command execution errors
    #[error("{}", format_command_error(.command, .message, .exit_code))]
    CommandExecution {
        command: String,
        message: String,
        exit_code: Option<i32>,
    },

    /// File system operations
    #[error("file system {operation} operation failed for '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// TOML configuration could not be parsed
    #[error("TOML error in '{path}': {message}")]
    Toml { path: PathBuf, message: String },

    /// Network-related errors
    #[error("network error for '{endpoint}': {message}")]
    Network { endpoint: String, message: String },

    /// The run was cancelled before the operation completed
    #[error("operation '{operation}' was cancelled")]
    Cancelled { operation: String },
}

fn format_command_error(command: &str, message: &str, exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("command '{command}' failed with exit code {code}: {message}"),
        None => format!("command '{command}' failed: {message}"),
    }
}

// Conversion implementations
impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::FileSystem {
            path: PathBuf::new(),
            operation: "unknown".to_string(),
            source: error,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Json {
            message: error.to_string(),
            source: error,
        }
    }
}

// Helper methods for creating errors with context
impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create a registry error
    #[must_use]
    pub fn registry(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Registry {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a task graph error
    #[must_use]
    pub fn task_graph(message: impl Into<String>) -> Self {
        Error::TaskGraph {
            message: message.into(),
        }
    }

    /// Create a version control error
    #[must_use]
    pub fn vcs(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Vcs {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a cache backend error
    #[must_use]
    pub fn cache(
        operation: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Cache {
            operation: operation.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create an archive error
    #[must_use]
    pub fn archive(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Archive {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a command execution error
    #[must_use]
    pub fn command_execution(
        command: impl Into<String>,
        message: impl Into<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Error::CommandExecution {
            command: command.into(),
            message: message.into(),
            exit_code,
        }
    }

    /// Create a file system error with context
    #[must_use]
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::FileSystem {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }

    /// Create a TOML parse error
    #[must_use]
    pub fn toml(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Toml {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a network error
    #[must_use]
    pub fn network(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Network {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create a cancellation error
    #[must_use]
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Error::Cancelled {
            operation: operation.into(),
        }
    }

    /// Configuration-class errors abort the run; everything else degrades.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Configuration { .. }
                | Error::Registry { .. }
                | Error::TaskGraph { .. }
                | Error::Toml { .. }
        )
    }

    /// Errors worth retrying (network hiccups, transient I/O).
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Network { .. } | Error::FileSystem { .. })
    }
}

// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to a Result
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a lazy message
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let base_error = e.into();
            Error::Configuration {
                message: format!("{}: {}", message.into(), base_error),
            }
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let base_error = e.into();
            Error::Configuration {
                message: format!("{}: {}", f(), base_error),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_display() {
        let err = Error::command_execution("make build", "exited", Some(2));
        assert_eq!(
            err.to_string(),
            "command 'make build' failed with exit code 2: exited"
        );

        let err = Error::command_execution("make build", "spawn failed", None);
        assert_eq!(err.to_string(), "command 'make build' failed: spawn failed");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::configuration("missing").is_fatal());
        assert!(Error::registry("project_map.json", "not found").is_fatal());
        assert!(Error::task_graph("cycle").is_fatal());
        assert!(!Error::vcs("diff", "bad ref").is_fatal());
        assert!(!Error::cache("fetch", "abc", "timeout").is_fatal());
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::network("http://cache", "reset").is_transient());
        assert!(!Error::cache("fetch", "abc", "404").is_transient());
    }

    #[test]
    fn test_context_wraps_message() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "gone",
        ));
        let err = result.context("loading registry").unwrap_err();
        assert!(err.to_string().contains("loading registry"));
        assert!(err.to_string().contains("gone"));
    }
}
