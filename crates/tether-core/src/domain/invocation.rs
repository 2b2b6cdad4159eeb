//! Invocation - 1 回の呼び出しのメタデータとコンテキスト
//!
//! next レスポンスのヘッダから毎回新しく組み立て、handler には
//! `InvocationContext` 経由で不変な値として渡す。サイクルが終わったら
//! ランタイムが破棄するので、次の呼び出しに持ち越されることはない。

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use serde::Serialize;

use super::errors::MetadataError;

pub const HEADER_REQUEST_ID: &str = "Lambda-Runtime-Aws-Request-Id";
pub const HEADER_DEADLINE: &str = "Lambda-Runtime-Deadline-Ms";
pub const HEADER_FUNCTION_ARN: &str = "Lambda-Runtime-Invoked-Function-Arn";
pub const HEADER_TRACE_ID: &str = "Lambda-Runtime-Trace-Id";
pub const HEADER_CLIENT_CONTEXT: &str = "Lambda-Runtime-Client-Context";
pub const HEADER_COGNITO_IDENTITY: &str = "Lambda-Runtime-Cognito-Identity";

/// InvocationMetadata は next レスポンスのヘッダから取り出した値
///
/// 必須: trace_id, request_id, deadline, function_arn
/// 任意: client_context, cognito_identity（無ければ空文字）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationMetadata {
    pub trace_id: String,
    pub request_id: String,
    pub deadline: DateTime<Utc>,
    pub function_arn: String,
    pub client_context: String,
    pub cognito_identity: String,
}

impl InvocationMetadata {
    /// ヘッダを検証して組み立てる。同じヘッダが複数あれば先頭の値を使う
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, MetadataError> {
        let trace_id = required(headers, HEADER_TRACE_ID)?;
        let request_id = required(headers, HEADER_REQUEST_ID)?;
        let deadline = deadline(headers)?;
        let function_arn = required(headers, HEADER_FUNCTION_ARN)?;

        Ok(Self {
            trace_id,
            request_id,
            deadline,
            function_arn,
            client_context: optional(headers, HEADER_CLIENT_CONTEXT),
            cognito_identity: optional(headers, HEADER_COGNITO_IDENTITY),
        })
    }

    /// `now` から deadline までの残り時間。過ぎていれば None
    ///
    /// 参考値であって、ランタイムはこれで handler を打ち切らない。
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<std::time::Duration> {
        (self.deadline - now).to_std().ok()
    }
}

fn required(headers: &HeaderMap, key: &'static str) -> Result<String, MetadataError> {
    let value = headers.get(key).ok_or(MetadataError::MissingHeader(key))?;
    let value = value
        .to_str()
        .map_err(|_| MetadataError::InvalidHeader(key))?;
    if value.is_empty() {
        return Err(MetadataError::EmptyHeader(key));
    }
    Ok(value.to_owned())
}

/// 任意ヘッダは ASCII に限らないので UTF-8 として読む（不正なバイトは置換）
fn optional(headers: &HeaderMap, key: &'static str) -> String {
    headers
        .get(key)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .unwrap_or_default()
}

fn deadline(headers: &HeaderMap) -> Result<DateTime<Utc>, MetadataError> {
    let raw = required(headers, HEADER_DEADLINE)?;
    let millis: i64 = raw
        .parse()
        .map_err(|source| MetadataError::InvalidDeadline {
            value: raw.clone(),
            source,
        })?;
    DateTime::<Utc>::from_timestamp_millis(millis).ok_or(MetadataError::DeadlineOutOfRange(millis))
}

/// InvocationContext は handler に渡す呼び出し単位のコンテキスト
#[derive(Debug, Clone)]
pub struct InvocationContext {
    metadata: InvocationMetadata,
}

impl InvocationContext {
    pub fn new(metadata: InvocationMetadata) -> Self {
        Self { metadata }
    }

    pub fn metadata(&self) -> &InvocationMetadata {
        &self.metadata
    }

    pub fn request_id(&self) -> &str {
        &self.metadata.request_id
    }

    pub fn trace_id(&self) -> &str {
        &self.metadata.trace_id
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.metadata.deadline
    }

    /// 現在時刻から deadline までの残り時間
    pub fn remaining_time(&self) -> Option<std::time::Duration> {
        self.metadata.remaining(Utc::now())
    }
}
