//! ReqwestClient - reqwest による HttpClient 実装

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;

use crate::domain::{RuntimeError, TransportError};
use crate::ports::{ApiRequest, ApiResponse, HttpClient, ResponseBody};

/// next はロングポーリングなので timeout は設定しない
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(concat!("tether/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        Ok(ApiResponse::new(
            status,
            headers,
            Box::new(ReqwestBody {
                response: Some(response),
            }),
        ))
    }
}

struct ReqwestBody {
    response: Option<reqwest::Response>,
}

#[async_trait]
impl ResponseBody for ReqwestBody {
    async fn bytes(&mut self) -> Result<Bytes, RuntimeError> {
        match self.response.take() {
            Some(response) => response.bytes().await.map_err(|e| RuntimeError::Body {
                operation: "read".to_string(),
                message: e.to_string(),
            }),
            None => Ok(Bytes::new()),
        }
    }

    async fn close(self: Box<Self>) -> Result<(), RuntimeError> {
        // 読み残しは drop でコネクションごと捨てる
        drop(self.response);
        Ok(())
    }
}
