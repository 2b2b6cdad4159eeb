//! Config - ランタイム設定
//!
//! ホストのドメイン（`host:port`）だけを環境変数から取る。
//! エンドポイント URL はそこから組み立てる。

use crate::domain::ConfigError;

pub const ENV_RUNTIME_API: &str = "AWS_LAMBDA_RUNTIME_API";
pub const API_VERSION: &str = "2018-06-01";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    runtime_api: String,
}

impl RuntimeConfig {
    pub fn new(runtime_api: impl Into<String>) -> Self {
        Self {
            runtime_api: runtime_api.into(),
        }
    }

    /// `AWS_LAMBDA_RUNTIME_API` から読む
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意の lookup から読む（テストで環境変数を書き換えずに済む）
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let domain = lookup(ENV_RUNTIME_API).ok_or(ConfigError::MissingEnv(ENV_RUNTIME_API))?;
        if domain.trim().is_empty() {
            return Err(ConfigError::EmptyEnv(ENV_RUNTIME_API));
        }
        Ok(Self::new(domain.trim()))
    }

    pub fn runtime_api(&self) -> &str {
        &self.runtime_api
    }

    pub fn endpoints(&self) -> Endpoints {
        let base = format!("http://{}/{API_VERSION}/runtime", self.runtime_api);
        Endpoints {
            invocation_prefix: format!("{base}/invocation/"),
            next: format!("{base}/invocation/next"),
            init_error: format!("{base}/init/error"),
        }
    }
}

/// Endpoints はホスト API の URL 一式
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub invocation_prefix: String,
    pub next: String,
    pub init_error: String,
}

impl Endpoints {
    pub fn response(&self, request_id: &str) -> String {
        format!("{}{request_id}/response", self.invocation_prefix)
    }

    pub fn error(&self, request_id: &str) -> String {
        format!("{}{request_id}/error", self.invocation_prefix)
    }
}
