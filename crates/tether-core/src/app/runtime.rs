//! Runtime - 呼び出しループ
//!
//! # フロー（1 サイクル）
//! 1. RuntimeApi::next_invocation() で次の呼び出しを取得
//! 2. ヘッダから InvocationMetadata を検証・抽出
//! 3. InvocationContext を作って Handler を実行
//! 4. next のレスポンスボディを close
//! 5. エラーなら post_invocation_error、成功なら post_invocation_response
//! 6. reset() でメタデータを破棄
//!
//! 1, 2 の失敗は request id が無いので init error として報告する。
//! 同時に処理する呼び出しは常に 1 つだけ。deadline は handler に見せるだけで、
//! ランタイムは handler を打ち切らない（止まった handler はループも止める）。

use std::any::Any;
use std::ops::ControlFlow;
use std::sync::Arc;

use tracing::{Instrument, Span, error, field, info_span, warn};

use crate::domain::{HandlerError, InvocationContext, InvocationMetadata, RuntimeError};
use crate::ports::{ApiResponse, RuntimeApi};
use crate::typed::Handler;

/// サイクル失敗時にループを続けるか決めるコールバック
pub type FatalPolicy = Box<dyn Fn(&RuntimeError) -> ControlFlow<()> + Send + Sync>;

/// 呼び出しごとの trace id を受け取るコールバック
///
/// プロセス全体の環境変数には書かない。下流のツールに渡したい場合は
/// 組み込む側がここで行う。
pub type TracePropagator = Box<dyn Fn(&str) + Send + Sync>;

/// デフォルトの FatalPolicy: ログを出して止める
pub fn fail_fast() -> FatalPolicy {
    Box::new(|err| {
        error!(error = %err, "invocation cycle failed; stopping runtime");
        ControlFlow::Break(())
    })
}

/// 1 サイクルの結果
#[derive(Debug)]
pub enum CycleOutcome {
    Continue,
    Fatal(RuntimeError),
    Panicked(PanicPayload),
}

/// handler の panic の中身
pub struct PanicPayload(Box<dyn Any + Send + 'static>);

impl PanicPayload {
    /// 文字列の panic だけをエラーとして扱う
    pub fn message(&self) -> Option<&str> {
        if let Some(msg) = self.0.downcast_ref::<&'static str>() {
            Some(*msg)
        } else if let Some(msg) = self.0.downcast_ref::<String>() {
            Some(msg.as_str())
        } else {
            None
        }
    }
}

impl std::fmt::Debug for PanicPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PanicPayload").field(&self.message()).finish()
    }
}

enum Interrupt {
    Error(RuntimeError),
    Panic(PanicPayload),
}

impl From<RuntimeError> for Interrupt {
    fn from(err: RuntimeError) -> Self {
        Interrupt::Error(err)
    }
}

pub struct Runtime {
    api: Arc<dyn RuntimeApi>,
    handler: Arc<dyn Handler>,
    metadata: Option<InvocationMetadata>,
    fatal: FatalPolicy,
    trace: Option<TracePropagator>,
}

impl Runtime {
    pub fn new(api: Arc<dyn RuntimeApi>, handler: Arc<dyn Handler>) -> Self {
        Self {
            api,
            handler,
            metadata: None,
            fatal: fail_fast(),
            trace: None,
        }
    }

    pub fn with_fatal_policy(mut self, fatal: FatalPolicy) -> Self {
        self.fatal = fatal;
        self
    }

    pub fn with_trace_propagator(mut self, trace: TracePropagator) -> Self {
        self.trace = Some(trace);
        self
    }

    /// 現在処理中の呼び出しのメタデータ（サイクルの外では None）
    pub fn metadata(&self) -> Option<&InvocationMetadata> {
        self.metadata.as_ref()
    }

    /// FatalPolicy が止めるまでサイクルを繰り返す
    ///
    /// 止めた原因のエラーを返す。handler の panic は FatalPolicy の判断に
    /// かかわらず必ずループを終わらせる。
    pub async fn run(&mut self) -> RuntimeError {
        loop {
            match self.next().await {
                CycleOutcome::Continue => {}
                CycleOutcome::Fatal(err) => {
                    if (self.fatal)(&err).is_break() {
                        self.reset();
                        return err;
                    }
                }
                CycleOutcome::Panicked(payload) => {
                    let err = self.recover(payload).await;
                    // panic の後は policy が Continue を返してもループを終える
                    if (self.fatal)(&err).is_continue() {
                        warn!(error = %err, "handler panicked; stopping runtime despite the fatal policy");
                    }
                    self.reset();
                    return err;
                }
            }
            self.reset();
        }
    }

    /// 1 サイクル分を実行する
    pub async fn next(&mut self) -> CycleOutcome {
        let span = info_span!("invocation", request_id = field::Empty, trace_id = field::Empty);
        match self.cycle(&span).instrument(span.clone()).await {
            Ok(()) => CycleOutcome::Continue,
            Err(Interrupt::Error(err)) => CycleOutcome::Fatal(err),
            Err(Interrupt::Panic(payload)) => CycleOutcome::Panicked(payload),
        }
    }

    /// メタデータを破棄する。次のサイクルの検証失敗を init error として扱うため
    pub fn reset(&mut self) {
        self.metadata = None;
    }

    async fn cycle(&mut self, span: &Span) -> Result<(), Interrupt> {
        let mut next = match self.api.next_invocation().await {
            Ok(next) => next,
            Err(err) => {
                self.report_init(&err).await;
                return Err(err.into());
            }
        };

        let metadata = match InvocationMetadata::from_headers(&next.headers) {
            Ok(metadata) => metadata,
            Err(err) => {
                close_quietly(next, "next invocation").await;
                let err = RuntimeError::from(err);
                self.report_init(&err).await;
                return Err(err.into());
            }
        };

        span.record("request_id", metadata.request_id.as_str());
        span.record("trace_id", metadata.trace_id.as_str());
        if let Some(propagate) = &self.trace {
            propagate(&metadata.trace_id);
        }
        let request_id = metadata.request_id.clone();
        self.metadata = Some(metadata.clone());

        let input = match next.read_body().await {
            Ok(input) => input,
            Err(err) => {
                close_quietly(next, "next invocation").await;
                self.report_invocation(&request_id, &err).await;
                return Err(err.into());
            }
        };

        let ctx = InvocationContext::new(metadata);
        let handler = Arc::clone(&self.handler);
        let joined = tokio::spawn(async move { handler.handle(ctx, input).await }.in_current_span()).await;

        let closed = next.close().await;

        let result = match joined {
            Ok(result) => result,
            Err(join_err) => match join_err.try_into_panic() {
                Ok(payload) => return Err(Interrupt::Panic(PanicPayload(payload))),
                Err(join_err) => Err(HandlerError::new(join_err.to_string())),
            },
        };

        closed?;

        match result {
            Err(err) => {
                let err = RuntimeError::Handler(err);
                self.report_invocation(&request_id, &err).await;
                Err(err.into())
            }
            Ok(payload) => {
                let response = self.api.post_invocation_response(&request_id, payload).await?;
                response.close().await?;
                Ok(())
            }
        }
    }

    /// panic を（メッセージがあれば）ホストに報告する
    ///
    /// 文字列以外の panic はホストに報告しない。
    async fn recover(&self, payload: PanicPayload) -> RuntimeError {
        let Some(message) = payload.message() else {
            warn!("handler panicked with a non-string payload; host not notified");
            return RuntimeError::Panic("non-string panic payload".to_string());
        };

        let err = RuntimeError::Panic(message.to_string());
        match &self.metadata {
            Some(metadata) => self.report_invocation(&metadata.request_id, &err).await,
            None => self.report_init(&err).await,
        }
        err
    }

    async fn report_init(&self, err: &RuntimeError) {
        settle(self.api.post_init_error(err).await, "init error").await;
    }

    async fn report_invocation(&self, request_id: &str, err: &RuntimeError) {
        settle(
            self.api.post_invocation_error(request_id, err).await,
            "invocation error",
        )
        .await;
    }
}

/// エラー報告の結果を片付ける。失敗はログに残す
async fn settle(report: Result<ApiResponse, RuntimeError>, kind: &str) {
    match report {
        Ok(response) => close_quietly(response, kind).await,
        Err(err) => error!(error = %err, kind, "failed to report error to host"),
    }
}

async fn close_quietly(response: ApiResponse, kind: &str) {
    if let Err(err) = response.close().await {
        warn!(error = %err, kind, "failed to close host response body");
    }
}
