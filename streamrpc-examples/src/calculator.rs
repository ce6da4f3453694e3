//! Calculator service: one operation for each call shape.
//!
//! | Operation | Shape |
//! |-----------|-------|
//! | `Sum` | unary |
//! | `PrimeNumberDecomposition` | server streaming |
//! | `ComputeAverage` | client streaming |
//! | `FindMaximum` | bidi streaming |
//! | `SquareRoot` | unary |

use serde::{Deserialize, Serialize};
use streamrpc::RegistryBuilder;
use streamrpc::core::{CallContext, Receiver, Sender, Status};

pub const SUM: &str = "calculator.CalculatorService/Sum";
pub const PRIME_NUMBER_DECOMPOSITION: &str =
    "calculator.CalculatorService/PrimeNumberDecomposition";
pub const COMPUTE_AVERAGE: &str = "calculator.CalculatorService/ComputeAverage";
pub const FIND_MAXIMUM: &str = "calculator.CalculatorService/FindMaximum";
pub const SQUARE_ROOT: &str = "calculator.CalculatorService/SquareRoot";

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct SumRequest {
    #[prost(int64, tag = "1")]
    pub a: i64,
    #[prost(int64, tag = "2")]
    pub b: i64,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct SumResponse {
    #[prost(int64, tag = "1")]
    pub sum: i64,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct PrimeNumberDecompositionRequest {
    #[prost(int64, tag = "1")]
    pub number: i64,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct PrimeNumberDecompositionResponse {
    #[prost(int64, tag = "1")]
    pub prime_factor: i64,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct ComputeAverageRequest {
    #[prost(int64, tag = "1")]
    pub number: i64,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct ComputeAverageResponse {
    #[prost(double, tag = "1")]
    pub average: f64,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct FindMaximumRequest {
    #[prost(int64, tag = "1")]
    pub number: i64,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct FindMaximumResponse {
    #[prost(int64, tag = "1")]
    pub maximum: i64,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct SquareRootRequest {
    #[prost(int64, tag = "1")]
    pub number: i64,
}

#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
pub struct SquareRootResponse {
    #[prost(double, tag = "1")]
    pub number_root: f64,
}

/// Add the calculator operations to `builder`.
pub fn register(builder: RegistryBuilder) -> RegistryBuilder {
    builder
        .unary(SUM, sum)
        .server_streaming(PRIME_NUMBER_DECOMPOSITION, prime_number_decomposition)
        .client_streaming(COMPUTE_AVERAGE, compute_average)
        .bidi_streaming(FIND_MAXIMUM, find_maximum)
        .unary(SQUARE_ROOT, square_root)
}

pub async fn sum(req: SumRequest, _ctx: CallContext) -> Result<SumResponse, Status> {
    tracing::info!(a = req.a, b = req.b, "Sum invoked");
    let sum = req
        .a
        .checked_add(req.b)
        .ok_or_else(|| Status::invalid_argument(format!("{} + {} overflows", req.a, req.b)))?;
    Ok(SumResponse { sum })
}

/// Streams the prime factors of `number` in ascending order, with
/// multiplicity. Numbers below 2 have none.
pub async fn prime_number_decomposition(
    req: PrimeNumberDecompositionRequest,
    ctx: CallContext,
    tx: Sender<PrimeNumberDecompositionResponse>,
) -> Result<(), Status> {
    tracing::info!(number = req.number, "PrimeNumberDecomposition invoked");
    if req.number < 0 {
        return Err(Status::invalid_argument(format!(
            "cannot decompose a negative number: {}",
            req.number
        )));
    }

    let mut remaining = req.number;
    let mut divisor: i64 = 2;
    while divisor <= remaining / divisor {
        if remaining % divisor == 0 {
            remaining /= divisor;
            tx.send(PrimeNumberDecompositionResponse {
                prime_factor: divisor,
            })
            .await?;
        } else {
            divisor += 1;
            // Trial division of a large prime is long; stay cancellable.
            if divisor % 65_536 == 0 {
                ctx.check()?;
                tokio::task::yield_now().await;
            }
        }
    }
    if remaining > 1 {
        tx.send(PrimeNumberDecompositionResponse {
            prime_factor: remaining,
        })
        .await?;
    }
    Ok(())
}

pub async fn compute_average(
    mut rx: Receiver<ComputeAverageRequest>,
    _ctx: CallContext,
) -> Result<ComputeAverageResponse, Status> {
    tracing::info!("ComputeAverage invoked with a streaming request");
    let mut total: i128 = 0;
    let mut count: u64 = 0;
    while let Some(req) = rx.receive().await? {
        total += i128::from(req.number);
        count += 1;
    }
    if count == 0 {
        return Err(Status::invalid_argument("no numbers received"));
    }
    Ok(ComputeAverageResponse {
        average: total as f64 / count as f64,
    })
}

/// Emits every new running maximum. The first number is always one.
pub async fn find_maximum(
    mut rx: Receiver<FindMaximumRequest>,
    tx: Sender<FindMaximumResponse>,
    _ctx: CallContext,
) -> Result<(), Status> {
    tracing::info!("FindMaximum invoked with a streaming request");
    let mut maximum: Option<i64> = None;
    while let Some(req) = rx.receive().await? {
        if maximum.is_none_or(|max| req.number > max) {
            maximum = Some(req.number);
            tx.send(FindMaximumResponse {
                maximum: req.number,
            })
            .await?;
        }
    }
    Ok(())
}

pub async fn square_root(
    req: SquareRootRequest,
    _ctx: CallContext,
) -> Result<SquareRootResponse, Status> {
    tracing::info!(number = req.number, "SquareRoot invoked");
    if req.number < 0 {
        return Err(Status::invalid_argument(format!(
            "received a negative number: {}",
            req.number
        )));
    }
    Ok(SquareRootResponse {
        number_root: (req.number as f64).sqrt(),
    })
}
