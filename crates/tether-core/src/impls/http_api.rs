//! HttpRuntimeApi - HTTP によるホスト API 実装
//!
//! # ステータスの扱い
//! - エラー報告（init / invocation）は 2xx のうち 202 Accepted 以外だけを成功とする。
//!   202 もエラーとして呼び出し元に返す（ボディの文言付き）。
//! - レスポンス送信は 2xx を成功とする。送信そのものが失敗した場合は
//!   invocation error として 1 回だけ報告し、その結果を返す。

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use tracing::{debug, warn};

use crate::app::config::{Endpoints, RuntimeConfig};
use crate::domain::{DEFAULT_CONTENT_TYPE, MAX_INVOKE_SIZE, Payload, RuntimeError};
use crate::ports::{ApiRequest, ApiResponse, HttpClient, RuntimeApi};

pub const HEADER_ERROR_TYPE: &str = "Lambda-Runtime-Function-Error-Type";
pub const DEFAULT_INIT_ERROR: &str = "Runtime.InitError";
pub const DEFAULT_INVOKE_ERROR: &str = "Runtime.InvokeError";

/// ホストに送るエラー本文。stackTrace は常に空
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorReport<'a> {
    error_message: String,
    error_type: &'a str,
    stack_trace: Vec<String>,
}

pub struct HttpRuntimeApi<C> {
    endpoints: Endpoints,
    client: C,
}

impl<C: HttpClient> HttpRuntimeApi<C> {
    pub fn new(config: &RuntimeConfig, client: C) -> Self {
        Self {
            endpoints: config.endpoints(),
            client,
        }
    }

    async fn post_error(
        &self,
        operation: String,
        url: String,
        err: &RuntimeError,
        default_tag: &'static str,
    ) -> Result<ApiResponse, RuntimeError> {
        warn!(%operation, error = %err, "reporting error to host");

        let (header, error_type) = match err.signal() {
            Some(signal) => (signal.header(), signal.error_type()),
            None => (default_tag, default_tag),
        };
        let body = serde_json::to_vec(&ErrorReport {
            error_message: err.to_string(),
            error_type,
            stack_trace: Vec::new(),
        })?;

        let mut headers = HeaderMap::new();
        let header = HeaderValue::from_str(header).unwrap_or_else(|_| {
            warn!(%operation, header, "error header tag is not a valid header value; using default");
            HeaderValue::from_static(default_tag)
        });
        headers.insert(HEADER_ERROR_TYPE, header);

        let mut response = self
            .client
            .send(ApiRequest::post(url, headers, body))
            .await
            .map_err(|e| RuntimeError::transport(format!("error submitting {operation} request"), e))?;

        if response.status.is_success() && response.status != StatusCode::ACCEPTED {
            return Ok(response);
        }

        let body = response.read_text().await;
        let status = response.status.as_u16();
        if let Err(e) = response.close().await {
            warn!(%operation, error = %e, "failed to close rejected report body");
        }
        Err(RuntimeError::Status {
            operation,
            status,
            body,
        })
    }
}

#[async_trait]
impl<C: HttpClient> RuntimeApi for HttpRuntimeApi<C> {
    async fn next_invocation(&self) -> Result<ApiResponse, RuntimeError> {
        debug!(url = %self.endpoints.next, "waiting for next invocation");
        self.client
            .send(ApiRequest::get(&self.endpoints.next))
            .await
            .map_err(|e| RuntimeError::transport("fetching next invocation", e))
    }

    async fn post_init_error(&self, err: &RuntimeError) -> Result<ApiResponse, RuntimeError> {
        self.post_error(
            "post init error".to_string(),
            self.endpoints.init_error.clone(),
            err,
            DEFAULT_INIT_ERROR,
        )
        .await
    }

    async fn post_invocation_error(
        &self,
        request_id: &str,
        err: &RuntimeError,
    ) -> Result<ApiResponse, RuntimeError> {
        self.post_error(
            format!("post invocation error for request: {request_id}"),
            self.endpoints.error(request_id),
            err,
            DEFAULT_INVOKE_ERROR,
        )
        .await
    }

    async fn post_invocation_response(
        &self,
        request_id: &str,
        payload: Payload,
    ) -> Result<ApiResponse, RuntimeError> {
        let content_type = payload.content_type().unwrap_or(DEFAULT_CONTENT_TYPE);
        let content_type = HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, content_type);

        if payload.exceeds_invoke_limit() {
            warn!(
                request_id,
                size = payload.body().len(),
                limit = MAX_INVOKE_SIZE,
                "response payload exceeds the host invoke limit"
            );
        }
        debug!(request_id, "submitting invocation response");
        let request = ApiRequest::post(self.endpoints.response(request_id), headers, payload.into_body());

        match self.client.send(request).await {
            Ok(response) if response.status.is_success() => Ok(response),
            Ok(mut response) => {
                let body = response.read_text().await;
                let status = response.status.as_u16();
                if let Err(e) = response.close().await {
                    warn!(request_id, error = %e, "failed to close rejected response body");
                }
                Err(RuntimeError::Status {
                    operation: format!("post invocation response for request: {request_id}"),
                    status,
                    body,
                })
            }
            Err(e) => {
                let err = RuntimeError::ResponseSubmission {
                    request_id: request_id.to_string(),
                    source: Box::new(RuntimeError::transport("post invocation response", e)),
                };
                self.post_invocation_error(request_id, &err).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{HandlerError, TransportError};
    use bytes::Bytes;
    use rstest::rstest;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// 送られたリクエストを記録し、用意した結果を順に返す
    struct ScriptedClient {
        replies: Mutex<VecDeque<Result<(u16, &'static str), &'static str>>>,
        sent: Mutex<Vec<ApiRequest>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<Result<(u16, &'static str), &'static str>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn sent(&self) -> Vec<ApiRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpClient for ScriptedClient {
        async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
            self.sent.lock().unwrap().push(request);
            match self.replies.lock().unwrap().pop_front() {
                Some(Ok((status, body))) => Ok(ApiResponse::buffered(
                    StatusCode::from_u16(status).unwrap(),
                    HeaderMap::new(),
                    body,
                )),
                Some(Err(msg)) => Err(TransportError(msg.to_string())),
                None => Err(TransportError("no scripted reply".to_string())),
            }
        }
    }

    fn api(client: &Arc<ScriptedClient>) -> HttpRuntimeApi<Arc<ScriptedClient>> {
        HttpRuntimeApi::new(&RuntimeConfig::new("domain"), Arc::clone(client))
    }

    fn report(request: &ApiRequest) -> serde_json::Value {
        serde_json::from_slice(request.body.as_ref().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn next_invocation_gets_the_next_url() {
        let client = Arc::new(ScriptedClient::new(vec![Ok((200, "{}"))]));
        let resp = api(&client).next_invocation().await.unwrap();
        assert_eq!(resp.status, StatusCode::OK);

        let sent = client.sent();
        assert_eq!(sent[0].method, reqwest::Method::GET);
        assert_eq!(sent[0].url, "http://domain/2018-06-01/runtime/invocation/next");
    }

    #[tokio::test]
    async fn next_invocation_surfaces_transport_failure() {
        let client = Arc::new(ScriptedClient::new(vec![Err("connection refused")]));
        let err = api(&client).next_invocation().await.unwrap_err();
        assert!(matches!(err, RuntimeError::Transport { .. }));
        assert!(err.to_string().contains("connection refused"));
    }

    #[rstest]
    #[case::accepted(202)]
    #[case::forbidden(403)]
    #[case::container_error(500)]
    #[case::unknown(507)]
    #[tokio::test]
    async fn init_error_rejections_carry_the_body(#[case] status: u16) {
        let client = Arc::new(ScriptedClient::new(vec![Ok((status, "data"))]));
        let err = api(&client)
            .post_init_error(&RuntimeError::Panic("boom".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Status { status: s, .. } if s == status));
        assert!(err.to_string().contains("data"));
    }

    #[rstest]
    #[case::accepted(202)]
    #[case::bad_request(400)]
    #[case::forbidden(403)]
    #[case::container_error(500)]
    #[case::unknown(507)]
    #[tokio::test]
    async fn invocation_error_rejections_carry_the_body(#[case] status: u16) {
        let client = Arc::new(ScriptedClient::new(vec![Ok((status, "data"))]));
        let err = api(&client)
            .post_invocation_error("req", &RuntimeError::Panic("boom".into()))
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("data"), "{msg}");
        assert!(msg.contains("req"), "{msg}");
    }

    #[tokio::test]
    async fn init_error_uses_default_tags() {
        let client = Arc::new(ScriptedClient::new(vec![Ok((200, ""))]));
        api(&client)
            .post_init_error(&RuntimeError::Panic("boom".into()))
            .await
            .unwrap();

        let sent = client.sent();
        assert_eq!(sent[0].url, "http://domain/2018-06-01/runtime/init/error");
        assert_eq!(sent[0].headers[HEADER_ERROR_TYPE], DEFAULT_INIT_ERROR);
        assert_eq!(
            report(&sent[0]),
            serde_json::json!({
                "errorMessage": "handler panicked: boom",
                "errorType": "Runtime.InitError",
                "stackTrace": [],
            })
        );
    }

    #[tokio::test]
    async fn invocation_error_honours_error_signal() {
        let client = Arc::new(ScriptedClient::new(vec![Ok((200, ""))]));
        let err = RuntimeError::from(HandlerError::new("boom").with_signal("Custom.Header", "Custom.Type"));
        api(&client).post_invocation_error("req", &err).await.unwrap();

        let sent = client.sent();
        assert_eq!(sent[0].url, "http://domain/2018-06-01/runtime/invocation/req/error");
        assert_eq!(sent[0].headers[HEADER_ERROR_TYPE], "Custom.Header");
        let body = report(&sent[0]);
        assert_eq!(body["errorType"], "Custom.Type");
        assert_eq!(body["errorMessage"], "boom");
    }

    #[tokio::test]
    async fn invocation_error_defaults_to_invoke_error_tag() {
        let client = Arc::new(ScriptedClient::new(vec![Ok((200, ""))]));
        api(&client)
            .post_invocation_error("req", &RuntimeError::from(HandlerError::new("boom")))
            .await
            .unwrap();

        let sent = client.sent();
        assert_eq!(sent[0].headers[HEADER_ERROR_TYPE], DEFAULT_INVOKE_ERROR);
        assert_eq!(report(&sent[0])["errorType"], DEFAULT_INVOKE_ERROR);
    }

    #[tokio::test]
    async fn response_defaults_to_json_content_type() {
        let client = Arc::new(ScriptedClient::new(vec![Ok((202, ""))]));
        api(&client)
            .post_invocation_response("req", Payload::new("{}"))
            .await
            .unwrap();

        let sent = client.sent();
        assert_eq!(sent[0].url, "http://domain/2018-06-01/runtime/invocation/req/response");
        assert_eq!(sent[0].headers[CONTENT_TYPE], DEFAULT_CONTENT_TYPE);
        assert_eq!(sent[0].body, Some(Bytes::from_static(b"{}")));
    }

    #[tokio::test]
    async fn response_honours_explicit_content_type() {
        let client = Arc::new(ScriptedClient::new(vec![Ok((202, ""))]));
        api(&client)
            .post_invocation_response("req", Payload::with_content_type("hi", "text/plain"))
            .await
            .unwrap();

        assert_eq!(client.sent()[0].headers[CONTENT_TYPE], "text/plain");
    }

    #[tokio::test]
    async fn response_rejection_is_a_status_error() {
        let client = Arc::new(ScriptedClient::new(vec![Ok((413, "too large"))]));
        let err = api(&client)
            .post_invocation_response("req", Payload::new("{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::Status { status: 413, .. }));
        assert!(err.to_string().contains("too large"));
    }

    #[tokio::test]
    async fn response_transport_failure_is_reported_once_as_invocation_error() {
        let client = Arc::new(ScriptedClient::new(vec![Err("connection reset"), Ok((202, "accepted"))]));
        let err = api(&client)
            .post_invocation_response("req", Payload::new("{}"))
            .await
            .unwrap_err();

        // 戻り値は報告の結果（202 なのでエラー）
        assert!(matches!(err, RuntimeError::Status { status: 202, .. }));

        let sent = client.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].url, "http://domain/2018-06-01/runtime/invocation/req/error");
        let message = report(&sent[1])["errorMessage"].as_str().unwrap().to_string();
        assert!(message.contains("connection reset"), "{message}");
        assert!(message.contains("submitting response for request: req"), "{message}");
    }

    #[tokio::test]
    async fn response_transport_failure_returns_report_success() {
        let client = Arc::new(ScriptedClient::new(vec![Err("connection reset"), Ok((200, ""))]));
        let resp = api(&client)
            .post_invocation_response("req", Payload::new("{}"))
            .await
            .unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(client.sent().len(), 2);
    }
}
