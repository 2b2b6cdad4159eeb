//! Domain model (invocation metadata, payloads, errors).

pub mod errors;
pub mod invocation;
pub mod payload;

pub use self::errors::{
    BoxError, ConfigError, ErrorSignal, HandlerError, MetadataError, RuntimeError, TransportError,
};
pub use self::invocation::{InvocationContext, InvocationMetadata};
pub use self::payload::{DEFAULT_CONTENT_TYPE, MAX_INVOKE_SIZE, Payload};
