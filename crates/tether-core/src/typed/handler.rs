//! Handler trait - 呼び出しを処理する Handler の定義
//!
//! # 二層構造
//! - **内部（bytes）**: `Handler` trait - object-safe、ランタイムが保持する
//! - **表層（Typed）**: `TypedHandler<In, Out>` trait - JSON で型付けされた入出力
//!
//! `wrap()` が `TypedHandler` を `Handler` に変換する（Type erasure）。

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::codec::{ErrorHandler, JsonCodec, pass_through};
use crate::domain::{HandlerError, InvocationContext, Payload};

/// Handler は 1 回の呼び出しの入力 bytes を出力 `Payload` に変換する
///
/// 出力の content type を指定したければ `Payload::with_content_type` を、
/// ホストに渡すエラータグを指定したければ `HandlerError::with_signal` を返す。
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: InvocationContext, input: Bytes) -> Result<Payload, HandlerError>;
}

/// TypedHandler は JSON で復元した `In` を受け取り `Out` を返す
///
/// # 使用例
/// ```ignore
/// struct Greeter;
///
/// #[async_trait]
/// impl TypedHandler<Greeting, Reply> for Greeter {
///     async fn handle(&self, _ctx: InvocationContext, input: Greeting) -> Result<Reply, HandlerError> {
///         Ok(Reply { message: format!("hello {}", input.name) })
///     }
/// }
///
/// let handler = wrap(Greeter).with_error_handler(json_envelope);
/// ```
#[async_trait]
pub trait TypedHandler<In, Out>: Send + Sync
where
    In: DeserializeOwned + Send + 'static,
    Out: Serialize + Send + 'static,
{
    async fn handle(&self, ctx: InvocationContext, input: In) -> Result<Out, HandlerError>;
}

/// 非同期クロージャを `Handler` にする
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(InvocationContext, Bytes) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Payload, HandlerError>> + Send,
{
    HandlerFn { f }
}

pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(InvocationContext, Bytes) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Payload, HandlerError>> + Send,
{
    async fn handle(&self, ctx: InvocationContext, input: Bytes) -> Result<Payload, HandlerError> {
        (self.f)(ctx, input).await
    }
}

/// 非同期クロージャを `TypedHandler` にする
pub fn typed_fn<In, Out, F, Fut>(f: F) -> TypedFn<F, In, Out>
where
    F: Fn(InvocationContext, In) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Out, HandlerError>> + Send,
{
    TypedFn {
        f,
        _marker: PhantomData,
    }
}

pub struct TypedFn<F, In, Out> {
    f: F,
    _marker: PhantomData<fn(In) -> Out>,
}

#[async_trait]
impl<F, Fut, In, Out> TypedHandler<In, Out> for TypedFn<F, In, Out>
where
    In: DeserializeOwned + Send + 'static,
    Out: Serialize + Send + 'static,
    F: Fn(InvocationContext, In) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Out, HandlerError>> + Send,
{
    async fn handle(&self, ctx: InvocationContext, input: In) -> Result<Out, HandlerError> {
        (self.f)(ctx, input).await
    }
}

/// `TypedHandler` を `Handler` に変換する。エラー処理は `pass_through`
pub fn wrap<In, Out, H>(handler: H) -> TypedAdapter<In, Out, H>
where
    H: TypedHandler<In, Out>,
    In: DeserializeOwned + Send + 'static,
    Out: Serialize + Send + 'static,
{
    TypedAdapter {
        handler,
        on_error: pass_through,
        _marker: PhantomData,
    }
}

/// TypedAdapter は decode → handle → encode を行う `Handler`
///
/// どの段階のエラーも `ErrorHandler` を通る。
pub struct TypedAdapter<In, Out, H> {
    handler: H,
    on_error: ErrorHandler,
    _marker: PhantomData<fn(In) -> Out>,
}

impl<In, Out, H> TypedAdapter<In, Out, H> {
    /// エラー処理を差し替える（`json_envelope` など）
    pub fn with_error_handler(mut self, on_error: ErrorHandler) -> Self {
        self.on_error = on_error;
        self
    }
}

#[async_trait]
impl<In, Out, H> Handler for TypedAdapter<In, Out, H>
where
    H: TypedHandler<In, Out>,
    In: DeserializeOwned + Send + 'static,
    Out: Serialize + Send + 'static,
{
    async fn handle(&self, ctx: InvocationContext, input: Bytes) -> Result<Payload, HandlerError> {
        let input: In = match JsonCodec::decode(&input) {
            Ok(input) => input,
            Err(err) => return (self.on_error)(err),
        };

        let output = match self.handler.handle(ctx, input).await {
            Ok(output) => output,
            Err(err) => return (self.on_error)(err),
        };

        match JsonCodec::encode(&output) {
            Ok(data) => Ok(Payload::new(data)),
            Err(err) => (self.on_error)(err),
        }
    }
}

/// 出力を持たない `TypedHandler` を `Handler` に変換する
///
/// 出力はエンコードせず、レスポンスボディは空になる（`null` ではない）。
pub fn wrap_input<In, H>(handler: H) -> InputAdapter<In, H>
where
    H: TypedHandler<In, ()>,
    In: DeserializeOwned + Send + 'static,
{
    InputAdapter {
        handler,
        on_error: pass_through,
        _marker: PhantomData,
    }
}

/// InputAdapter は decode → handle だけを行う `Handler`
pub struct InputAdapter<In, H> {
    handler: H,
    on_error: ErrorHandler,
    _marker: PhantomData<fn(In)>,
}

impl<In, H> InputAdapter<In, H> {
    pub fn with_error_handler(mut self, on_error: ErrorHandler) -> Self {
        self.on_error = on_error;
        self
    }
}

#[async_trait]
impl<In, H> Handler for InputAdapter<In, H>
where
    H: TypedHandler<In, ()>,
    In: DeserializeOwned + Send + 'static,
{
    async fn handle(&self, ctx: InvocationContext, input: Bytes) -> Result<Payload, HandlerError> {
        let input: In = match JsonCodec::decode(&input) {
            Ok(input) => input,
            Err(err) => return (self.on_error)(err),
        };

        match self.handler.handle(ctx, input).await {
            Ok(()) => Ok(Payload::empty()),
            Err(err) => (self.on_error)(err),
        }
    }
}
