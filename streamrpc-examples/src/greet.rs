//! Greet service.
//!
//! `GreetManyTimes` and `GreetWithDeadline` simulate slow work in units of
//! [`GreetService::unit`], checking for cancellation once per unit.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use streamrpc::RegistryBuilder;
use streamrpc::core::{CallContext, Receiver, Sender, Status};

pub const GREET: &str = "greet.GreetService/Greet";
pub const GREET_MANY_TIMES: &str = "greet.GreetService/GreetManyTimes";
pub const LONG_GREET: &str = "greet.GreetService/LongGreet";
pub const GREET_EVERYONE: &str = "greet.GreetService/GreetEveryone";
pub const GREET_WITH_DEADLINE: &str = "greet.GreetService/GreetWithDeadline";

/// Number of greetings produced by `GreetManyTimes`.
pub const GREETING_COUNT: usize = 10;
/// Work units performed by `GreetWithDeadline` before it answers.
pub const DEADLINE_WORK_UNITS: usize = 3;

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct Greeting {
    #[prost(string, tag = "1")]
    pub first_name: String,
    #[prost(string, tag = "2")]
    pub last_name: String,
}

impl Greeting {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct GreetRequest {
    #[prost(message, optional, tag = "1")]
    pub greeting: Option<Greeting>,
}

impl From<Greeting> for GreetRequest {
    fn from(greeting: Greeting) -> Self {
        Self {
            greeting: Some(greeting),
        }
    }
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct GreetResponse {
    #[prost(string, tag = "1")]
    pub result: String,
}

/// Greet service configuration.
#[derive(Clone, Copy, Debug)]
pub struct GreetService {
    /// Duration of one simulated work unit.
    pub unit: Duration,
}

impl Default for GreetService {
    fn default() -> Self {
        Self {
            unit: Duration::from_secs(1),
        }
    }
}

impl GreetService {
    pub fn with_unit(unit: Duration) -> Self {
        Self { unit }
    }

    /// Add the greet operations to `builder`.
    pub fn register(self, builder: RegistryBuilder) -> RegistryBuilder {
        let unit = self.unit;
        builder
            .unary(GREET, greet)
            .server_streaming(
                GREET_MANY_TIMES,
                move |req: GreetRequest, ctx: CallContext, tx: Sender<GreetResponse>| {
                    greet_many_times(unit, req, ctx, tx)
                },
            )
            .client_streaming(LONG_GREET, long_greet)
            .bidi_streaming(GREET_EVERYONE, greet_everyone)
            .unary(
                GREET_WITH_DEADLINE,
                move |req: GreetRequest, ctx: CallContext| greet_with_deadline(unit, req, ctx),
            )
    }
}

fn full_name(req: &GreetRequest) -> Result<String, Status> {
    let greeting = req
        .greeting
        .as_ref()
        .ok_or_else(|| Status::invalid_argument("missing greeting"))?;
    Ok(format!("{} {}", greeting.first_name, greeting.last_name))
}

/// Sleep for one work unit, or fail with the cancellation reason.
async fn work_unit(ctx: &CallContext, unit: Duration) -> Result<(), Status> {
    ctx.run_until_cancelled(tokio::time::sleep(unit)).await
}

pub async fn greet(req: GreetRequest, _ctx: CallContext) -> Result<GreetResponse, Status> {
    tracing::info!(greeting = ?req.greeting, "Greet invoked");
    Ok(GreetResponse {
        result: format!("Hello {}", full_name(&req)?),
    })
}

pub async fn greet_many_times(
    unit: Duration,
    req: GreetRequest,
    ctx: CallContext,
    tx: Sender<GreetResponse>,
) -> Result<(), Status> {
    tracing::info!(greeting = ?req.greeting, "GreetManyTimes invoked");
    let name = full_name(&req)?;
    for i in 0..GREETING_COUNT {
        tx.send(GreetResponse {
            result: format!("Hello {} {}", name, i),
        })
        .await?;
        if i + 1 < GREETING_COUNT {
            work_unit(&ctx, unit).await?;
        }
    }
    Ok(())
}

pub async fn long_greet(
    mut rx: Receiver<GreetRequest>,
    _ctx: CallContext,
) -> Result<GreetResponse, Status> {
    tracing::info!("LongGreet invoked with a streaming request");
    let mut result = String::new();
    while let Some(req) = rx.receive().await? {
        result.push_str(&format!("Hello {}! ", full_name(&req)?));
    }
    Ok(GreetResponse { result })
}

pub async fn greet_everyone(
    mut rx: Receiver<GreetRequest>,
    tx: Sender<GreetResponse>,
    _ctx: CallContext,
) -> Result<(), Status> {
    tracing::info!("GreetEveryone invoked with a streaming request");
    while let Some(req) = rx.receive().await? {
        tx.send(GreetResponse {
            result: format!("Hello {}! ", full_name(&req)?),
        })
        .await?;
    }
    Ok(())
}

/// Answers after [`DEADLINE_WORK_UNITS`] units of work, unless the call is
/// cancelled or its deadline passes first.
pub async fn greet_with_deadline(
    unit: Duration,
    req: GreetRequest,
    ctx: CallContext,
) -> Result<GreetResponse, Status> {
    tracing::info!(greeting = ?req.greeting, "GreetWithDeadline invoked");
    for _ in 0..DEADLINE_WORK_UNITS {
        if let Err(status) = work_unit(&ctx, unit).await {
            tracing::info!(code = %status.code(), "GreetWithDeadline stopped early");
            return Err(status);
        }
    }
    Ok(GreetResponse {
        result: format!("Hello {}", full_name(&req)?),
    })
}
