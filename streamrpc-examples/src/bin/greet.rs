//! Greet service demo.
//!
//! Run with: cargo run --bin greet [unit-millis]
//!
//! The optional argument sets the duration of one simulated work unit
//! (default 1000 ms). GreetWithDeadline is called twice: once with enough
//! time and once with a deadline shorter than its work.

use std::time::Duration;

use anyhow::Context;
use futures::StreamExt;
use streamrpc::{Registry, parse_timeout_ms};
use streamrpc_client::CallOptions;
use streamrpc_examples::greet::*;
use streamrpc_examples::{SecuritySettings, connect};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let unit = match std::env::args().nth(1) {
        Some(arg) => {
            parse_timeout_ms(&arg).context("unit must be a positive number of milliseconds")?
        }
        None => Duration::from_secs(1),
    };

    let settings = SecuritySettings::from_env()?;
    let registry = GreetService::with_unit(unit)
        .register(Registry::builder())
        .build()?;
    let server = settings.server(registry)?;
    let client = connect(&server, &settings);

    println!("=== Greet Service (unit = {:?}) ===", unit);

    let ada = || GreetRequest::from(Greeting::new("Ada", "Lovelace"));

    let res: GreetResponse = client.call_unary(GREET, ada()).await?;
    println!("Greet: {}", res.result);

    let mut greetings = client
        .call_server_stream::<_, GreetResponse>(GREET_MANY_TIMES, ada())
        .await?;
    while let Some(res) = greetings.next().await {
        println!("GreetManyTimes: {}", res?.result);
    }

    let people = vec![
        Greeting::new("Ada", "Lovelace"),
        Greeting::new("Alan", "Turing"),
        Greeting::new("Grace", "Hopper"),
    ];

    let res: GreetResponse = client
        .call_client_stream_from(
            LONG_GREET,
            futures::stream::iter(people.clone().into_iter().map(GreetRequest::from)),
        )
        .await?;
    println!("LongGreet: {}", res.result);

    // Feed GreetEveryone from a channel, one person per work unit.
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        for person in people {
            if tx.send(GreetRequest::from(person)).await.is_err() {
                break;
            }
            tokio::time::sleep(unit).await;
        }
    });
    let call = client
        .call_bidi_stream::<GreetRequest, GreetResponse>(GREET_EVERYONE)
        .await?;
    call.drive(ReceiverStream::new(rx), |res| {
        println!("GreetEveryone: {}", res.result);
    })
    .await?;

    for timeout in [unit * 5, unit] {
        let result = client
            .call_unary_with_options::<_, GreetResponse>(
                GREET_WITH_DEADLINE,
                ada(),
                CallOptions::new().timeout(timeout),
            )
            .await;
        match result {
            Ok(res) => println!("GreetWithDeadline({:?}): {}", timeout, res.result),
            Err(status) => println!("GreetWithDeadline({:?}) failed: {}", timeout, status),
        }
    }

    Ok(())
}
