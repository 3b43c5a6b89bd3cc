use std::fmt;

use serde::Serialize;

#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    ConnectionError = 2,
    TimeoutError = 3,
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::GeneralError => write!(f, "general error"),
            Self::ConnectionError => write!(f, "connection error"),
            Self::TimeoutError => write!(f, "timeout error"),
        }
    }
}

#[derive(Debug)]
pub struct AppError {
    pub message: String,
    pub code: ExitCode,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

impl AppError {
    #[must_use]
    pub fn no_session() -> Self {
        Self {
            message: "No active session. Run 'workspace-cli connect <URL>' to record \
                      an established connection."
                .into(),
            code: ExitCode::ConnectionError,
        }
    }

    #[must_use]
    pub fn invalid_endpoint(url: &str, detail: &str) -> Self {
        Self {
            message: format!("Invalid endpoint URL '{url}': {detail}"),
            code: ExitCode::GeneralError,
        }
    }

    #[must_use]
    pub fn missing_token_input() -> Self {
        Self {
            message: "No token provided. Pass the token as an argument or pipe it via \
                      stdin with '-'."
                .into(),
            code: ExitCode::GeneralError,
        }
    }

    #[must_use]
    pub fn to_json(&self) -> String {
        let output = ErrorOutput {
            error: &self.message,
            code: self.code as u8,
        };
        serde_json::to_string(&output).unwrap_or_else(|_| {
            format!(
                r#"{{"error":"{}","code":{}}}"#,
                self.message, self.code as u8
            )
        })
    }

    pub fn print_json_stderr(&self) {
        eprintln!("{}", self.to_json());
    }
}

#[derive(Serialize)]
struct ErrorOutput<'a> {
    error: &'a str,
    code: u8,
}
