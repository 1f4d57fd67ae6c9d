//! Error classifier — maps raw failures to a small taxonomy with hints.
//!
//! Discovery, health checks and the launcher all funnel their failures
//! through here. Matching is a case-insensitive substring scan over an
//! ordered rule list; the first rule that matches wins, so the order of
//! `RULES` is the precedence:
//!
//!   connection refused → timeout → DNS → 401 → 403 → model not found → binary missing
//!
//! Rust error chains are flattened (`outer: inner: ...`) before matching
//! so that the io/hyper source of a reqwest error is visible to the rules.

use serde::Serialize;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Name of the external agent binary, as it appears in spawn errors.
/// Only free-text messages are matched against it; the launcher detects a
/// missing program of any configured name from the io error kind.
pub const AGENT_BINARY_MARKER: &str = "claude";

// ── Taxonomy ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ConnectionRefused,
    ConnectionTimeout,
    DnsResolutionFailed,
    AuthMissing,
    AuthInvalid,
    ProviderNotFound,
    ProviderUnavailable,
    ModelNotFound,
    ModelFetchFailed,
    BinaryNotFound,
    ProcessFailed,
    ConfigParseError,
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConnectionRefused => "CONNECTION_REFUSED",
            ErrorCode::ConnectionTimeout => "CONNECTION_TIMEOUT",
            ErrorCode::DnsResolutionFailed => "DNS_RESOLUTION_FAILED",
            ErrorCode::AuthMissing => "AUTH_MISSING",
            ErrorCode::AuthInvalid => "AUTH_INVALID",
            ErrorCode::ProviderNotFound => "PROVIDER_NOT_FOUND",
            ErrorCode::ProviderUnavailable => "PROVIDER_UNAVAILABLE",
            ErrorCode::ModelNotFound => "MODEL_NOT_FOUND",
            ErrorCode::ModelFetchFailed => "MODEL_FETCH_FAILED",
            ErrorCode::BinaryNotFound => "BINARY_NOT_FOUND",
            ErrorCode::ProcessFailed => "PROCESS_FAILED",
            ErrorCode::ConfigParseError => "CONFIG_PARSE_ERROR",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }

    /// Short human summary used as the message prefix.
    pub fn summary(&self) -> &'static str {
        match self {
            ErrorCode::ConnectionRefused => "Connection refused",
            ErrorCode::ConnectionTimeout => "Connection timed out",
            ErrorCode::DnsResolutionFailed => "Could not resolve host",
            ErrorCode::AuthMissing => "No auth token configured",
            ErrorCode::AuthInvalid => "Authentication failed",
            ErrorCode::ProviderNotFound => "Provider not found",
            ErrorCode::ProviderUnavailable => "Provider unavailable",
            ErrorCode::ModelNotFound => "Model not found",
            ErrorCode::ModelFetchFailed => "Failed to fetch models",
            ErrorCode::BinaryNotFound => "Claude Code is not installed",
            ErrorCode::ProcessFailed => "Agent process failed",
            ErrorCode::ConfigParseError => "Invalid config file",
            ErrorCode::Unknown => "Unexpected error",
        }
    }

    /// Fixed remediation hint for this code.
    pub fn hint(&self) -> Option<&'static str> {
        let hint = match self {
            ErrorCode::ConnectionRefused => {
                "Check that the server is running and the URL is correct."
            }
            ErrorCode::ConnectionTimeout => {
                "The server took too long to respond. Check your network or raise the timeout in the config."
            }
            ErrorCode::DnsResolutionFailed => {
                "Check the hostname in the base URL and your network connection."
            }
            ErrorCode::AuthMissing => {
                "Set the provider's auth token environment variable or add an authToken to the config."
            }
            ErrorCode::AuthInvalid => {
                "Check that your API key is valid and has access to this provider."
            }
            ErrorCode::ProviderNotFound => {
                "Run `claunch health` to see the available providers."
            }
            ErrorCode::ProviderUnavailable => {
                "The provider returned an error. Try again later or pick another provider."
            }
            ErrorCode::ModelNotFound => {
                "Run `claunch models <provider>` to list the available models."
            }
            ErrorCode::ModelFetchFailed => {
                "Model discovery failed. Check connectivity, or enable offlineMode to use the cached list."
            }
            ErrorCode::BinaryNotFound => {
                "Install Claude Code with `npm install -g @anthropic-ai/claude-code` and make sure it is on PATH."
            }
            ErrorCode::ProcessFailed => {
                "The agent exited with an error. Re-run with --debug for details."
            }
            ErrorCode::ConfigParseError => {
                "Fix the JSON in the config file or run `claunch config init --force`."
            }
            ErrorCode::Unknown => return None,
        };
        Some(hint)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Classified Error ────────────────────────────────────────────────

/// A failure with its taxonomy code, hint and optional underlying cause.
///
/// Built once by the classifier (or directly by a component that already
/// knows the code) and never mutated afterwards.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ClassifiedError {
    code: ErrorCode,
    message: String,
    hint: Option<&'static str>,
    #[source]
    cause: Option<Arc<dyn StdError + Send + Sync>>,
}

impl ClassifiedError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            hint: code.hint(),
            cause: None,
        }
    }

    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn hint(&self) -> Option<&'static str> {
        self.hint
    }

    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// Full cause chain, outermost first. Printed only in debug mode.
    pub fn cause_chain(&self) -> Vec<String> {
        let mut chain = Vec::new();
        let mut next = self
            .cause
            .as_deref()
            .map(|c| c as &(dyn StdError + 'static));
        while let Some(err) = next {
            chain.push(err.to_string());
            next = err.source();
        }
        chain
    }
}

// ── Rules ───────────────────────────────────────────────────────────

type Matcher = fn(&str) -> bool;

/// Ordered rule list. First match wins.
const RULES: &[(ErrorCode, Matcher)] = &[
    (ErrorCode::ConnectionRefused, is_connection_refused),
    (ErrorCode::ConnectionTimeout, is_timeout),
    (ErrorCode::DnsResolutionFailed, is_dns_failure),
    (ErrorCode::AuthInvalid, is_unauthorized),
    (ErrorCode::AuthInvalid, is_forbidden),
    (ErrorCode::ModelNotFound, is_model_not_found),
    (ErrorCode::BinaryNotFound, is_binary_missing),
];

fn is_connection_refused(lower: &str) -> bool {
    ["econnrefused", "connection refused"]
        .iter()
        .any(|p| lower.contains(p))
}

fn is_timeout(lower: &str) -> bool {
    ["etimedout", "timeout", "timed out"]
        .iter()
        .any(|p| lower.contains(p))
}

fn is_dns_failure(lower: &str) -> bool {
    [
        "enotfound",
        "getaddrinfo",
        "dns error",
        "failed to lookup address",
        "name or service not known",
        "nodename nor servname",
    ]
    .iter()
    .any(|p| lower.contains(p))
}

fn is_unauthorized(lower: &str) -> bool {
    lower.contains("401") || lower.contains("unauthorized")
}

fn is_forbidden(lower: &str) -> bool {
    lower.contains("403") || lower.contains("forbidden")
}

fn is_model_not_found(lower: &str) -> bool {
    if lower.contains("404") {
        return true;
    }
    // "model ... not found"
    match lower.find("model") {
        Some(idx) => lower[idx + "model".len()..].contains("not found"),
        None => false,
    }
}

fn is_binary_missing(lower: &str) -> bool {
    let missing = ["enoent", "no such file or directory", "cannot find binary path"]
        .iter()
        .any(|p| lower.contains(p));
    missing && lower.contains(AGENT_BINARY_MARKER)
}

// ── Classification ──────────────────────────────────────────────────

/// Classify a raw message. The message is kept verbatim for `UNKNOWN`
/// and prefixed with the code's summary otherwise.
pub fn classify_message(raw: &str) -> ClassifiedError {
    let lower = raw.to_lowercase();
    for (code, matches) in RULES {
        if matches(&lower) {
            return ClassifiedError::new(*code, format!("{}: {}", code.summary(), raw));
        }
    }
    ClassifiedError::new(ErrorCode::Unknown, raw)
}

/// Classify an error value, matching against its whole source chain and
/// keeping the original as `cause`.
pub fn classify<E>(err: E) -> ClassifiedError
where
    E: StdError + Send + Sync + 'static,
{
    let flattened = flatten_chain(&err);
    classify_message(&flattened).with_cause(err)
}

/// Classify a transport error from reqwest. Timeouts are recognised
/// structurally; the rest is matched on the message with the request URL
/// stripped, so hosts, ports and paths never pick the code.
pub fn classify_http(err: reqwest::Error) -> ClassifiedError {
    let err = err.without_url();
    if err.is_timeout() {
        let raw = flatten_chain(&err);
        return ClassifiedError::new(
            ErrorCode::ConnectionTimeout,
            format!("{}: {}", ErrorCode::ConnectionTimeout.summary(), raw),
        )
        .with_cause(err);
    }
    classify(err)
}

/// Classify anything printable (values that are not `Error`s are
/// classified on their string form).
pub fn classify_display(value: &dyn fmt::Display) -> ClassifiedError {
    classify_message(&value.to_string())
}

/// Classify an `anyhow::Error`, keeping it as the cause.
pub fn classify_anyhow(err: anyhow::Error) -> ClassifiedError {
    let flattened = format!("{:#}", err);
    let boxed: Box<dyn StdError + Send + Sync + 'static> = err.into();
    let mut classified = classify_message(&flattened);
    classified.cause = Some(Arc::from(boxed));
    classified
}

/// Join an error and its sources as `outer: inner: ...`, skipping
/// sources whose text is already contained in the previous level.
pub fn flatten_chain(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut prev = out.clone();
    let mut next = err.source();
    while let Some(src) = next {
        let text = src.to_string();
        if !prev.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        prev = text;
        next = src.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_connection_refused() {
        let err = classify_message("connect ECONNREFUSED 127.0.0.1:11434");
        assert_eq!(err.code(), ErrorCode::ConnectionRefused);
        assert!(err.hint().unwrap().contains("server is running"));
        assert!(err.message().contains("ECONNREFUSED 127.0.0.1:11434"));
    }

    #[test]
    fn test_http_401_is_auth_invalid() {
        assert_eq!(classify_message("HTTP 401: Unauthorized").code(), ErrorCode::AuthInvalid);
        assert_eq!(classify_message("HTTP 403: Forbidden").code(), ErrorCode::AuthInvalid);
    }

    #[test]
    fn test_dns_failure() {
        let err = classify_message("getaddrinfo ENOTFOUND foo.bar");
        assert_eq!(err.code(), ErrorCode::DnsResolutionFailed);
        assert_eq!(
            classify_message("dns error: failed to lookup address information").code(),
            ErrorCode::DnsResolutionFailed
        );
    }

    #[test]
    fn test_unknown_keeps_message_verbatim() {
        let err = classify_message("something weird happened");
        assert_eq!(err.code(), ErrorCode::Unknown);
        assert_eq!(err.message(), "something weird happened");
        assert!(err.hint().is_none());
    }

    #[test]
    fn test_first_rule_wins() {
        // timeout is checked before 404
        let err = classify_message("timeout while fetching model list (404)");
        assert_eq!(err.code(), ErrorCode::ConnectionTimeout);

        // refused beats timeout
        let err = classify_message("ECONNREFUSED after timeout");
        assert_eq!(err.code(), ErrorCode::ConnectionRefused);
    }

    #[test]
    fn test_model_not_found() {
        assert_eq!(
            classify_message("The model `glm-9` was not found").code(),
            ErrorCode::ModelNotFound
        );
        assert_eq!(classify_message("HTTP 404: Not Found").code(), ErrorCode::ModelNotFound);
        // "not found" alone is not enough
        assert_eq!(classify_message("file not found").code(), ErrorCode::Unknown);
    }

    #[test]
    fn test_binary_missing() {
        assert_eq!(
            classify_message("spawn claude ENOENT").code(),
            ErrorCode::BinaryNotFound
        );
        assert_eq!(
            classify_message("spawn node ENOENT").code(),
            ErrorCode::Unknown
        );
    }

    #[test]
    fn test_classify_error_uses_source_chain() {
        #[derive(Debug, Error)]
        #[error("error sending request")]
        struct Outer(#[source] io::Error);

        let inner = io::Error::new(io::ErrorKind::ConnectionRefused, "Connection refused (os error 111)");
        let err = classify(Outer(inner));
        assert_eq!(err.code(), ErrorCode::ConnectionRefused);
        assert!(err.cause().is_some());
        assert_eq!(err.cause_chain().len(), 2);
    }

    #[test]
    fn test_classify_display_coerces_non_errors() {
        assert_eq!(classify_display(&401).code(), ErrorCode::AuthInvalid);
        assert_eq!(classify_display(&"ETIMEDOUT").code(), ErrorCode::ConnectionTimeout);
    }

    #[test]
    fn test_classify_anyhow_keeps_context() {
        let err = anyhow::anyhow!("Connection refused").context("probing ollama-local");
        let classified = classify_anyhow(err);
        assert_eq!(classified.code(), ErrorCode::ConnectionRefused);
        assert!(classified.message().contains("probing ollama-local"));
    }

    #[test]
    fn test_every_code_but_unknown_has_hint() {
        let codes = [
            ErrorCode::ConnectionRefused,
            ErrorCode::ConnectionTimeout,
            ErrorCode::DnsResolutionFailed,
            ErrorCode::AuthMissing,
            ErrorCode::AuthInvalid,
            ErrorCode::ProviderNotFound,
            ErrorCode::ProviderUnavailable,
            ErrorCode::ModelNotFound,
            ErrorCode::ModelFetchFailed,
            ErrorCode::BinaryNotFound,
            ErrorCode::ProcessFailed,
            ErrorCode::ConfigParseError,
        ];
        for code in codes {
            assert!(code.hint().is_some(), "{} should carry a hint", code);
        }
    }
}
