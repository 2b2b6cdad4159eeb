//! Errors - エラー型と分類
//!
//! # 分類
//! - Transport: ホストへの HTTP 通信そのものの失敗
//! - Status: ホストが成功以外のステータスを返した
//! - Metadata: next レスポンスのヘッダ検証失敗（init error として報告）
//! - Handler: ユーザーコードのエラー（invocation error として報告）
//! - Body: レスポンスボディの読み取り・クローズ失敗
//! - Panic: handler の panic（メッセージを持つものだけ）

use std::num::ParseIntError;

use thiserror::Error;

/// handler が返すエラーの原因（Send + Sync で保持）
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// ErrorSignal はホストへ渡すエラータグ
///
/// `HandlerError::with_signal` で付与すると、報告時に
/// `Lambda-Runtime-Function-Error-Type` ヘッダと `errorType` がこの値になる。
/// 付与しなければ `Runtime.InitError` / `Runtime.InvokeError` が使われる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorSignal {
    header: String,
    error_type: String,
}

impl ErrorSignal {
    pub fn new(header: impl Into<String>, error_type: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            error_type: error_type.into(),
        }
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn error_type(&self) -> &str {
        &self.error_type
    }
}

/// HandlerError はユーザー handler のエラー
///
/// Display はメッセージのみ。ホストに送る `errorMessage` や
/// `json_envelope` の `error` フィールドはこの文字列になる。
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    #[source]
    source: Option<BoxError>,
    signal: Option<ErrorSignal>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
            signal: None,
        }
    }

    /// 既存のエラーをそのままメッセージにして包む
    pub fn from_error<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: err.to_string(),
            source: Some(Box::new(err)),
            signal: None,
        }
    }

    /// ホストに渡すヘッダタグと型タグを付与
    pub fn with_signal(mut self, header: impl Into<String>, error_type: impl Into<String>) -> Self {
        self.signal = Some(ErrorSignal::new(header, error_type));
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn signal(&self) -> Option<&ErrorSignal> {
        self.signal.as_ref()
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::from_error(err)
    }
}

/// MetadataError は next レスポンスのヘッダ検証エラー
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("missing required header {0}: no header values found for that key")]
    MissingHeader(&'static str),

    #[error("required header {0} is empty")]
    EmptyHeader(&'static str),

    #[error("header {0} is not a visible ASCII string")]
    InvalidHeader(&'static str),

    #[error("deadline header is not a valid unix ms string: {value:?}")]
    InvalidDeadline {
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("deadline {0}ms is outside the representable time range")]
    DeadlineOutOfRange(i64),
}

/// ConfigError は起動時設定のエラー
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),

    #[error("environment variable {0} is empty")]
    EmptyEnv(&'static str),
}

/// TransportError は HTTP クライアント層の失敗
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self(err.to_string())
    }
}

/// RuntimeError はランタイムループ全体のエラー
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("{message}; {operation}")]
    Transport { operation: String, message: String },

    #[error("{} status code ({status}) {operation}\n{body}", status_label(.status))]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error("{source}; submitting response for request: {request_id}")]
    ResponseSubmission {
        request_id: String,
        #[source]
        source: Box<RuntimeError>,
    },

    #[error("response body {operation}: {message}")]
    Body { operation: String, message: String },

    #[error("failed to encode error report: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("handler panicked: {0}")]
    Panic(String),
}

impl RuntimeError {
    /// 報告時に使うタグ。handler が付与したものだけが該当する
    pub fn signal(&self) -> Option<&ErrorSignal> {
        match self {
            RuntimeError::Handler(err) => err.signal(),
            _ => None,
        }
    }

    pub fn transport(operation: impl Into<String>, err: impl std::fmt::Display) -> Self {
        RuntimeError::Transport {
            operation: operation.into(),
            message: err.to_string(),
        }
    }
}

fn status_label(status: &u16) -> &'static str {
    match *status {
        202 => "accepted",
        400 => "bad request",
        403 => "forbidden",
        500 => "container error",
        _ => "invalid",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::accepted(202, "accepted status code (202)")]
    #[case::bad_request(400, "bad request status code (400)")]
    #[case::forbidden(403, "forbidden status code (403)")]
    #[case::container(500, "container error status code (500)")]
    #[case::other(507, "invalid status code (507)")]
    fn status_error_names_the_code_and_keeps_the_body(#[case] status: u16, #[case] prefix: &str) {
        let err = RuntimeError::Status {
            operation: "post init error".to_string(),
            status,
            body: "data".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with(prefix), "{msg}");
        assert!(msg.ends_with("\ndata"));
    }

    #[test]
    fn signal_is_only_taken_from_handler_errors() {
        let tagged = RuntimeError::from(HandlerError::new("boom").with_signal("Custom.Header", "Custom.Type"));
        let signal = tagged.signal().unwrap();
        assert_eq!(signal.header(), "Custom.Header");
        assert_eq!(signal.error_type(), "Custom.Type");

        let plain = RuntimeError::from(HandlerError::new("boom"));
        assert!(plain.signal().is_none());
        assert!(RuntimeError::Panic("boom".into()).signal().is_none());
    }

    #[test]
    fn response_submission_wraps_the_transport_failure() {
        let err = RuntimeError::ResponseSubmission {
            request_id: "req".to_string(),
            source: Box::new(RuntimeError::transport("post response", "connection reset")),
        };
        assert_eq!(
            err.to_string(),
            "connection reset; post response; submitting response for request: req"
        );
    }
}
