//! Payload - handler の出力
//!
//! content type を明示したい handler は `Payload::with_content_type` を返す。
//! 指定が無ければ送信時に `application/json` が使われる。

use bytes::Bytes;

pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// ホストが同期呼び出しで受け付けるペイロードの上限（6 MiB）
pub const MAX_INVOKE_SIZE: usize = 6_291_456;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    body: Bytes,
    content_type: Option<String>,
}

impl Payload {
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            content_type: None,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_content_type(body: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            content_type: Some(content_type.into()),
        }
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// 明示された content type（無ければ None）
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// `MAX_INVOKE_SIZE` を超えているか。超えていてもホストが拒否するだけで送信はする
    pub fn exceeds_invoke_limit(&self) -> bool {
        self.body.len() > MAX_INVOKE_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_payload_has_no_content_type() {
        let payload = Payload::new(&b"{}"[..]);
        assert_eq!(payload.content_type(), None);
        assert_eq!(payload.body().as_ref(), b"{}");
    }

    #[test]
    fn explicit_content_type_is_kept() {
        let payload = Payload::with_content_type("hello", "text/plain");
        assert_eq!(payload.content_type(), Some("text/plain"));
        assert_eq!(payload.into_body(), Bytes::from_static(b"hello"));
    }

    #[test]
    fn invoke_limit_is_inclusive() {
        assert!(!Payload::new(vec![b'a'; MAX_INVOKE_SIZE]).exceeds_invoke_limit());
        assert!(Payload::new(vec![b'a'; MAX_INVOKE_SIZE + 1]).exceeds_invoke_limit());
        assert!(!Payload::empty().exceeds_invoke_limit());
    }
}
