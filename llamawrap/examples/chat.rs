//! Interactive streaming chat with a local model.
//!
//! Starts `ollama serve` if it is not already running, makes sure the model
//! is installed, then reads lines from stdin and streams each reply.
//!
//!   cargo run --example chat -p llamawrap -- [model]
//!
//! Ctrl-C stops the current reply. An empty line or EOF quits.

use std::io::Write;

use llamawrap::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let model = std::env::args().nth(1).unwrap_or_else(|| "llama3".to_string());

    // 1. Make sure a server is running. Only a server we started gets stopped at the end.
    let supervisor = ServerSupervisor::new();
    let server = supervisor.start().await?;
    tracing::info!(pid = server.pid(), owned = server.is_owned(), "server ready");

    // 2. Pull the model if needed.
    let client = OllamaClient::from_env()?;
    let mut last_status = String::new();
    ensure_model_available(&client, &model, true, |progress| {
        if progress.status != last_status {
            eprintln!("{}", progress.status);
            last_status = progress.status;
        }
    })
    .await?;

    // 3. Chat until an empty line.
    let session = Session::new(client).model(model);
    let mut transcript = Transcript::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            break;
        }

        let token = CancellationToken::new();
        let on_ctrl_c = token.clone();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_ctrl_c.cancel();
            }
        });

        let mut turn = session
            .chat_stream(&transcript, Message::user(input), &token)
            .await;
        while let Some(view) = turn.next().await {
            print!("{}", view.fragment);
            std::io::stdout().flush()?;
        }
        println!();
        watcher.abort();

        transcript = match turn.finish().await {
            Ok(next) => next,
            Err(failure) => {
                eprintln!("[{}]", failure.error);
                failure.transcript
            }
        };
    }

    supervisor.stop(server).await?;
    Ok(())
}
