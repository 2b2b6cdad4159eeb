//! RuntimeApi port - ホストの invocation API の抽象化
//!
//! # 操作
//! - next_invocation: 次の呼び出しを取得（GET .../invocation/next）
//! - post_init_error: request id が決まる前のエラーを報告
//! - post_invocation_error: 呼び出し中のエラーを報告
//! - post_invocation_response: handler の出力を送信
//!
//! ホストから受け取ったレスポンスボディは、どの経路でも必ず 1 回
//! `ApiResponse::close` すること。

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;

use crate::domain::{Payload, RuntimeError};

/// ResponseBody はホストから受け取ったレスポンスボディ
///
/// `bytes()` は残りを全部読む。2 回目以降は空を返す。
#[async_trait]
pub trait ResponseBody: Send {
    async fn bytes(&mut self) -> Result<Bytes, RuntimeError>;

    /// ボディを解放する。失敗はサイクルのエラーとして扱われる
    async fn close(self: Box<Self>) -> Result<(), RuntimeError>;
}

/// メモリ上に読み込み済みのボディ
#[derive(Debug, Default)]
pub struct BufferedBody {
    data: Option<Bytes>,
}

impl BufferedBody {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: Some(data.into()),
        }
    }
}

#[async_trait]
impl ResponseBody for BufferedBody {
    async fn bytes(&mut self) -> Result<Bytes, RuntimeError> {
        Ok(self.data.take().unwrap_or_default())
    }

    async fn close(self: Box<Self>) -> Result<(), RuntimeError> {
        Ok(())
    }
}

/// ApiResponse はホストからの生のレスポンス
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    body: Box<dyn ResponseBody>,
}

impl ApiResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Box<dyn ResponseBody>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn buffered(status: StatusCode, headers: HeaderMap, data: impl Into<Bytes>) -> Self {
        Self::new(status, headers, Box::new(BufferedBody::new(data)))
    }

    pub async fn read_body(&mut self) -> Result<Bytes, RuntimeError> {
        self.body.bytes().await
    }

    /// ボディをテキストとして読む。読めなければ空文字（エラー文言用）
    pub async fn read_text(&mut self) -> String {
        match self.read_body().await {
            Ok(data) => String::from_utf8_lossy(&data).into_owned(),
            Err(_) => String::new(),
        }
    }

    pub async fn close(self) -> Result<(), RuntimeError> {
        self.body.close().await
    }
}

impl std::fmt::Debug for ApiResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// RuntimeApi はホストとのプロトコル操作
///
/// 1 操作につき 1 回だけ試行する（リトライしない）。
#[async_trait]
pub trait RuntimeApi: Send + Sync {
    async fn next_invocation(&self) -> Result<ApiResponse, RuntimeError>;

    async fn post_init_error(&self, err: &RuntimeError) -> Result<ApiResponse, RuntimeError>;

    async fn post_invocation_error(
        &self,
        request_id: &str,
        err: &RuntimeError,
    ) -> Result<ApiResponse, RuntimeError>;

    async fn post_invocation_response(
        &self,
        request_id: &str,
        payload: Payload,
    ) -> Result<ApiResponse, RuntimeError>;
}
