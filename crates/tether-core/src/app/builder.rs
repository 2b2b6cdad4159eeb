//! RuntimeBuilder - ランタイムの構築とワイヤリング
//!
//! # Fail-fast 設計
//! - handler 未登録なら build() が BuildError を返す
//! - RuntimeApi を渡さなければ環境変数から設定を読み、HTTP 実装を作る
//!   （設定が無ければここで失敗する）

use std::ops::ControlFlow;
use std::sync::Arc;

use super::config::RuntimeConfig;
use super::runtime::{FatalPolicy, Runtime, TracePropagator};
use crate::domain::{ConfigError, RuntimeError, TransportError};
use crate::impls::{HttpRuntimeApi, ReqwestClient};
use crate::ports::RuntimeApi;
use crate::typed::Handler;

/// RuntimeBuilder はランタイムを構築
///
/// # 使用例
/// ```ignore
/// let runtime = RuntimeBuilder::new()
///     .handler(wrap(MyHandler))
///     .trace_propagator(|trace_id| debug!(trace_id, "invocation trace"))
///     .build()?;
/// ```
#[derive(Default)]
pub struct RuntimeBuilder {
    handler: Option<Arc<dyn Handler>>,
    api: Option<Arc<dyn RuntimeApi>>,
    config: Option<RuntimeConfig>,
    fatal: Option<FatalPolicy>,
    trace: Option<TracePropagator>,
}

/// BuildError はランタイム構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no handler registered; call RuntimeBuilder::handler before build")]
    MissingHandler,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to create HTTP client: {0}")]
    Client(#[from] TransportError),
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handler(mut self, handler: impl Handler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// ホスト API を直接渡す（テストや独自トランスポート用）
    pub fn api(mut self, api: Arc<dyn RuntimeApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// 環境変数の代わりに使う設定
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn fatal_policy(
        mut self,
        fatal: impl Fn(&RuntimeError) -> ControlFlow<()> + Send + Sync + 'static,
    ) -> Self {
        self.fatal = Some(Box::new(fatal));
        self
    }

    pub fn trace_propagator(mut self, trace: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.trace = Some(Box::new(trace));
        self
    }

    pub fn build(self) -> Result<Runtime, BuildError> {
        let handler = self.handler.ok_or(BuildError::MissingHandler)?;

        let api = match self.api {
            Some(api) => api,
            None => {
                let config = match self.config {
                    Some(config) => config,
                    None => RuntimeConfig::from_env()?,
                };
                Arc::new(HttpRuntimeApi::new(&config, ReqwestClient::new()?))
            }
        };

        let mut runtime = Runtime::new(api, handler);
        if let Some(fatal) = self.fatal {
            runtime = runtime.with_fatal_policy(fatal);
        }
        if let Some(trace) = self.trace {
            runtime = runtime.with_trace_propagator(trace);
        }
        Ok(runtime)
    }
}
