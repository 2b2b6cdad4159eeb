//! Typed - handler の契約と型付き adapter
//!
//! # 二層構造
//! - **表層（Typed）**: `TypedHandler<In, Out>` trait - JSON で型安全
//! - **内部（bytes）**: `Handler` trait - object-safe, type erasure
//!
//! ランタイムは `Handler` しか知らない。`wrap()` が境界を埋める。

pub mod codec;
pub mod handler;

// 主要な trait/型 を再エクスポート
pub use self::codec::{ErrorHandler, JsonCodec, json_envelope, pass_through};
pub use self::handler::{
    Handler, HandlerFn, InputAdapter, TypedAdapter, TypedFn, TypedHandler, handler_fn, typed_fn,
    wrap, wrap_input,
};
