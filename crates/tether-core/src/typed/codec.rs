//! Codec - JSON の変換とエラー処理
//!
//! # ErrorHandler
//! - `pass_through`（デフォルト）: エラーをそのまま返す → ホストには invocation error
//! - `json_envelope`: `{"error": "<message>"}` を正常な出力として返す
//!   → ホストには成功したレスポンスとして届く

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::{HandlerError, Payload};

/// ErrorHandler は adapter 内で起きたエラーを出力かエラーに変換する
pub type ErrorHandler = fn(HandlerError) -> Result<Payload, HandlerError>;

pub struct JsonCodec;

impl JsonCodec {
    pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, HandlerError> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn encode<T: Serialize>(value: &T) -> Result<Bytes, HandlerError> {
        Ok(serde_json::to_vec(value)?.into())
    }
}

pub fn pass_through(err: HandlerError) -> Result<Payload, HandlerError> {
    Err(err)
}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorEnvelope {
    error: String,
}

pub fn json_envelope(err: HandlerError) -> Result<Payload, HandlerError> {
    let envelope = ErrorEnvelope {
        error: err.to_string(),
    };
    Ok(Payload::new(JsonCodec::encode(&envelope)?))
}
