//! Calculator service demo.
//!
//! Starts an in-process server with the calculator operations and calls
//! each of them once.
//!
//! Run with: cargo run --bin calculator [number-to-decompose]
//! Set STREAMRPC_TLS=true and STREAMRPC_SECRET=... to require credentials.

use anyhow::Context;
use futures::StreamExt;
use streamrpc::Registry;
use streamrpc_examples::calculator::{self, *};
use streamrpc_examples::{SecuritySettings, connect};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let number: i64 = match std::env::args().nth(1) {
        Some(arg) => arg.parse().context("number to decompose must be an integer")?,
        None => 120,
    };

    let settings = SecuritySettings::from_env()?;
    let registry = calculator::register(Registry::builder()).build()?;
    let server = settings.server(registry)?;
    let client = connect(&server, &settings);

    println!("=== Calculator Service ===");
    for operation in server.registry().operations() {
        println!("  - {}", operation);
    }
    println!();

    let sum: SumResponse = client.call_unary(SUM, SumRequest { a: 3, b: 10 }).await?;
    println!("Sum(3, 10) = {}", sum.sum);

    let mut factors = client
        .call_server_stream::<_, PrimeNumberDecompositionResponse>(
            PRIME_NUMBER_DECOMPOSITION,
            PrimeNumberDecompositionRequest { number },
        )
        .await?;
    let mut found = Vec::new();
    while let Some(factor) = factors.message().await? {
        found.push(factor.prime_factor);
    }
    println!("PrimeNumberDecomposition({}) = {:?}", number, found);

    let numbers = tokio_stream::iter([1, 2, 3, 4].map(|number| ComputeAverageRequest { number }));
    let average: ComputeAverageResponse = client
        .call_client_stream_from(COMPUTE_AVERAGE, numbers)
        .await?;
    println!("ComputeAverage([1, 2, 3, 4]) = {}", average.average);

    let call = client
        .call_bidi_stream::<FindMaximumRequest, FindMaximumResponse>(FIND_MAXIMUM)
        .await?;
    let inputs = [1, 5, 3, 6, 2, 20];
    let maxima = call
        .collect(futures::stream::iter(inputs.map(|number| FindMaximumRequest { number })))
        .await?;
    let maxima: Vec<i64> = maxima.into_iter().map(|res| res.maximum).collect();
    println!("FindMaximum({:?}) = {:?}", inputs, maxima);

    for number in [16, -1] {
        match client
            .call_unary::<_, SquareRootResponse>(SQUARE_ROOT, SquareRootRequest { number })
            .await
        {
            Ok(res) => println!("SquareRoot({}) = {}", number, res.number_root),
            Err(status) => println!("SquareRoot({}) failed: {}", number, status),
        }
    }

    // Drain a long decomposition only partially; dropping the stream cancels it.
    let mut partial = client
        .call_server_stream::<_, PrimeNumberDecompositionResponse>(
            PRIME_NUMBER_DECOMPOSITION,
            PrimeNumberDecompositionRequest { number: 1 << 40 },
        )
        .await?;
    let first: Vec<i64> = (&mut partial)
        .take(3)
        .filter_map(|item| async move { item.ok().map(|res| res.prime_factor) })
        .collect()
        .await;
    drop(partial);
    println!("First factors of 2^40: {:?} (rest cancelled)", first);

    Ok(())
}
