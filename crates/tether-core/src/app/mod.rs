//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてランタイムを組み立てます。
//!
//! # 主要コンポーネント
//! - **RuntimeBuilder**: ランタイムの構築とワイヤリング
//! - **Runtime**: 呼び出しループ（fetch→validate→invoke→submit→reset）
//! - **RuntimeConfig**: ホストのドメインとエンドポイント

pub mod builder;
pub mod config;
pub mod runtime;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, RuntimeBuilder};
pub use self::config::{Endpoints, RuntimeConfig};
pub use self::runtime::{CycleOutcome, FatalPolicy, Runtime, TracePropagator, fail_fast};
