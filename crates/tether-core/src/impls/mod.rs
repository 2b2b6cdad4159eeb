//! Impls - ports の実装
//!
//! - **HttpRuntimeApi**: HTTP による RuntimeApi 実装
//! - **ReqwestClient**: reqwest による HttpClient 実装

pub mod http_api;
pub mod reqwest_client;

pub use self::http_api::HttpRuntimeApi;
pub use self::reqwest_client::ReqwestClient;
