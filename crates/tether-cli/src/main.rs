use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use tether_core::{
    HandlerError, InvocationContext, RuntimeBuilder, TypedHandler, json_envelope, wrap,
};

#[derive(Debug, Deserialize)]
struct Greeting {
    name: String,
}

#[derive(Debug, Serialize)]
struct Reply {
    message: String,
    request_id: String,
}

/// サンプル handler: 名前を受け取って挨拶を返す
struct GreetHandler;

#[async_trait]
impl TypedHandler<Greeting, Reply> for GreetHandler {
    async fn handle(&self, ctx: InvocationContext, input: Greeting) -> Result<Reply, HandlerError> {
        if input.name.trim().is_empty() {
            return Err(HandlerError::new("name must not be empty"));
        }

        let remaining = ctx.remaining_time();
        info!(name = %input.name, ?remaining, "greeting");

        Ok(Reply {
            message: format!("Hello, {}!", input.name),
            request_id: ctx.request_id().to_string(),
        })
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // エラーは {"error": "..."} として正常応答で返す
    let handler = wrap(GreetHandler).with_error_handler(json_envelope);

    let builder = RuntimeBuilder::new()
        .handler(handler)
        .trace_propagator(|trace_id| debug!(trace_id, "invocation trace"));

    tether_core::start(builder).await;
}
