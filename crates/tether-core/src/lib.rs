//! tether-core
//!
//! Invocation-loop runtime client for a serverless execution host.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（invocation metadata, payload, errors）
//! - **ports**: 抽象化レイヤー（RuntimeApi, HttpClient）
//! - **app**: アプリケーションロジック（builder, runtime, config）
//! - **typed**: handler の契約と型付き adapter（Handler, TypedHandler, wrap）
//! - **impls**: 実装（HttpRuntimeApi, ReqwestClient）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod typed;

pub use app::{Runtime, RuntimeBuilder, RuntimeConfig};
pub use domain::{
    ErrorSignal, HandlerError, InvocationContext, InvocationMetadata, Payload, RuntimeError,
};
pub use typed::{
    Handler, TypedHandler, handler_fn, json_envelope, pass_through, typed_fn, wrap, wrap_input,
};

/// ランタイムを構築して走らせる。戻らない
///
/// 構築に失敗するか、ループが止まったらプロセスを終了コード 1 で終わらせる。
pub async fn start(builder: RuntimeBuilder) {
    let mut runtime = match builder.build() {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!(error = %err, "failed to build runtime");
            std::process::exit(1);
        }
    };

    let err = runtime.run().await;
    tracing::error!(error = %err, "runtime stopped");
    std::process::exit(1);
}
