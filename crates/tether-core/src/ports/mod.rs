//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! ランタイムループはホスト API を `RuntimeApi` 越しにしか触らず、
//! HTTP の実装は `HttpClient` 越しに差し替えられます。

pub mod http_client;
pub mod runtime_api;

pub use self::http_client::{ApiRequest, HttpClient};
pub use self::runtime_api::{ApiResponse, BufferedBody, ResponseBody, RuntimeApi};
