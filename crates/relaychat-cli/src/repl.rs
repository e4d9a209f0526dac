//! Interactive and one-shot conversations on top of `ChatClient`.

use std::io::Write;

use anyhow::Result;
use colored::Colorize;
use relaychat_client::{ChatClient, SendError, Session, Turn, TurnSnapshot};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use crate::cli::OutputFormat;
use crate::render::{TurnRenderer, write_events};

#[derive(Debug, PartialEq, Eq)]
pub enum Input<'a> {
    Empty,
    Quit,
    Status,
    Help,
    Message(&'a str),
}

pub fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    match line {
        "" => Input::Empty,
        "/quit" | "/exit" => Input::Quit,
        "/status" => Input::Status,
        "/help" => Input::Help,
        text => Input::Message(text),
    }
}

/// Render snapshots while `send` runs, then flush whatever is left.
///
/// When `interrupt` resolves first the send is dropped, which settles the
/// turn as cancelled and returns the session to `Ready`.
pub async fn run_turn<W: Write>(
    client: &ChatClient,
    session: &Session,
    text: &str,
    snapshots: &mut broadcast::Receiver<TurnSnapshot>,
    renderer: &mut TurnRenderer,
    out: &mut W,
    interrupt: impl Future<Output = ()>,
) -> Result<Turn> {
    let outcome = {
        let send = client.send(session, text);
        tokio::pin!(send);
        tokio::pin!(interrupt);

        let mut listening = true;
        loop {
            tokio::select! {
                biased;
                received = snapshots.recv(), if listening => match received {
                    Ok(snapshot) => write_events(&renderer.apply(&snapshot), out)?,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Renderer fell behind, continuing from latest");
                    }
                    Err(RecvError::Closed) => listening = false,
                },
                result = &mut send => break Some(result),
                () = &mut interrupt => break None,
            }
        }
    };
    drain(snapshots, renderer, out)?;

    match outcome {
        Some(result) => Ok(result?),
        None => {
            tracing::info!(session_id = %session.session_id, "Turn interrupted");
            client
                .turns()
                .pop()
                .ok_or_else(|| anyhow::anyhow!("Turn interrupted before it started"))
        }
    }
}

/// Resolves on Ctrl-C. Never resolves where the signal cannot be watched.
pub async fn ctrl_c_pressed() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Render everything already published.
pub fn drain<W: Write>(
    snapshots: &mut broadcast::Receiver<TurnSnapshot>,
    renderer: &mut TurnRenderer,
    out: &mut W,
) -> Result<()> {
    loop {
        match snapshots.try_recv() {
            Ok(snapshot) => write_events(&renderer.apply(&snapshot), out)?,
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty | TryRecvError::Closed) => return Ok(()),
        }
    }
}

pub async fn run_chat(client: &ChatClient, user_id: &str) -> Result<()> {
    let mut snapshots = client.subscribe();
    let mut session = client.initialize(user_id).await?;
    tracing::info!(session_id = %session.session_id, user_id, "Chat started");

    let mut renderer = TurnRenderer::default();
    let mut out = std::io::stdout();
    drain(&mut snapshots, &mut renderer, &mut out)?;
    println!("{}", "Type /help for commands.".dimmed());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let outcome = loop {
        print!("{} ", "you>".green().bold());
        out.flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                None
            }
        };
        let Some(line) = line else {
            break Ok(());
        };

        match parse_input(&line) {
            Input::Empty => continue,
            Input::Quit => break Ok(()),
            Input::Help => print_help(),
            Input::Status => match client.status(&session).await {
                Ok(status) => println!(
                    "{} {} {}",
                    "session".dimmed(),
                    session.session_id,
                    status.status.bold()
                ),
                Err(err) => println!("{} {}", "Status unavailable:".yellow(), err),
            },
            Input::Message(text) => {
                let turn = run_turn(
                    client,
                    &session,
                    text,
                    &mut snapshots,
                    &mut renderer,
                    &mut out,
                    ctrl_c_pressed(),
                )
                .await;
                match turn {
                    Ok(_) => {}
                    Err(err) => match err.downcast_ref::<SendError>() {
                        Some(send_err) => println!("{} {}", "Not sent:".yellow(), send_err),
                        None => break Err(err),
                    },
                }
            }
        }
    };

    client.close(&mut session).await;
    tracing::info!("Chat closed");
    outcome
}

/// Ask one question. Returns the finished turn.
pub async fn ask(
    client: &ChatClient,
    user_id: &str,
    text: &str,
    format: OutputFormat,
) -> Result<Turn> {
    let mut snapshots = client.subscribe();
    let mut session = client.initialize(user_id).await?;

    let result = match format {
        OutputFormat::Text => {
            let mut renderer = TurnRenderer::default();
            let mut out = std::io::stdout();
            // Skip the greeting; only the answer is printed.
            while snapshots.try_recv().is_ok() {}
            run_turn(
                client,
                &session,
                text,
                &mut snapshots,
                &mut renderer,
                &mut out,
                ctrl_c_pressed(),
            )
            .await
        }
        OutputFormat::Json => client
            .send(&session, text)
            .await
            .map_err(anyhow::Error::from)
            .and_then(|turn| {
                println!("{}", serde_json::to_string_pretty(&turn)?);
                Ok(turn)
            }),
    };

    client.close(&mut session).await;
    result
}

fn print_help() {
    println!("  {}    ask a question", "<text>".bold());
    println!("  {}  show the session status", "/status".bold());
    println!("  {}    end the conversation", "/quit".bold());
}
