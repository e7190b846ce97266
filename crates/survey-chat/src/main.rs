//! Takes the startup survey in the terminal.

#[macro_use]
extern crate tracing;

use std::env;
use std::io::Write as _;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use survey_chat::core::wire::SuggestionGroups;
use survey_chat::core::{FAILURE_MESSAGE, GREETING, SessionError, SubmitError};
use survey_chat::{PolicyKind, SessionBuilder};
use survey_chat_client::DEFAULT_SERVER_URL;
use survey_chat_model::Role;
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;

enum SessionEvent {
    Delta(String),
    Idle,
    Ending,
    Interrupted,
}

const BAR_CHAR: &str = "▎";
const SUGGEST_COMMAND: &str = "/suggest";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let server_url = env::var("SURVEY_CHAT_SERVER_URL")
        .unwrap_or_else(|_| DEFAULT_SERVER_URL.to_owned());
    let policy: PolicyKind = match env::var("SURVEY_CHAT_POLICY")
        .unwrap_or_default()
        .parse()
    {
        Ok(policy) => policy,
        Err(err) => {
            eprintln!("SURVEY_CHAT_POLICY: {err}");
            return;
        }
    };
    debug!("using {server_url} with the {policy:?} policy");

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    let session = SessionBuilder::with_server_url(&server_url)
        .with_policy(policy)
        .on_delta({
            let event_tx = event_tx.clone();
            move |delta| {
                event_tx.send(SessionEvent::Delta(delta.to_owned())).ok();
            }
        })
        .on_idle({
            let event_tx = event_tx.clone();
            move || {
                event_tx.send(SessionEvent::Idle).ok();
            }
        })
        .on_state_change({
            let event_tx = event_tx.clone();
            move |snapshot| {
                if snapshot.is_ending {
                    event_tx.send(SessionEvent::Ending).ok();
                }
            }
        })
        .build();

    tokio::spawn({
        let event_tx = event_tx.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                event_tx.send(SessionEvent::Interrupted).ok();
            }
        }
    });

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    println!(
        "{}",
        format!("Type {SUGGEST_COMMAND} for answer ideas, Ctrl-C to leave.").dimmed()
    );
    print_assistant(GREETING);
    let mut ending = false;

    'outer: loop {
        if ending {
            println!(
                "\n{}{}",
                BAR_CHAR.bright_green(),
                "Survey completing - thank you for your time! 🙏".bright_green()
            );
            break;
        }

        print!("> ");
        std::io::stdout().flush().ok();

        let line = select! {
            line = read_line() => line,
            Some(event) = event_rx.recv() => {
                match event {
                    SessionEvent::Interrupted => {
                        println!();
                        break 'outer;
                    }
                    SessionEvent::Ending => {
                        println!();
                        ending = true;
                    }
                    _ => {}
                }
                continue;
            }
        };
        let Some(line) = line else {
            break;
        };
        let line = line.trim();

        if line == SUGGEST_COMMAND {
            print_suggestions(&session.suggest().await);
            continue;
        }
        if !line.is_empty() {
            session.note_keystroke();
        }
        match session.submit(line).await {
            Ok(()) => {}
            Err(SessionError::Rejected(SubmitError::Empty)) => continue,
            Err(SessionError::Rejected(SubmitError::Ending)) => {
                ending = true;
                continue;
            }
            Err(err) => {
                eprintln!("{}", err.bright_red());
                break;
            }
        }

        let mut progress_bar = None;
        let mut streamed = String::new();

        loop {
            if streamed.is_empty() {
                progress_bar
                    .get_or_insert_with(|| {
                        let progress_bar = ProgressBar::new_spinner();
                        progress_bar.set_style(progress_style.clone());
                        progress_bar.set_message("🤔 Thinking...");
                        progress_bar
                    })
                    .inc(1);
            }

            let sleep = sleep(Duration::from_millis(100));
            let event = select! {
                event = event_rx.recv() => {
                    let Some(event) = event else {
                        break 'outer;
                    };
                    event
                },
                _ = sleep => {
                    continue;
                }
            };

            // Finish the progress bar before printing anything else.
            if let Some(progress_bar) = progress_bar.take() {
                progress_bar.finish_and_clear();
            }

            match event {
                SessionEvent::Delta(delta) => {
                    if streamed.is_empty() {
                        print!("{}🤖 ", BAR_CHAR.bright_cyan());
                    }
                    print!("{}", delta.bright_white());
                    std::io::stdout().flush().ok();
                    streamed.push_str(&delta);
                }
                SessionEvent::Ending => {
                    ending = true;
                }
                SessionEvent::Idle => {
                    break;
                }
                SessionEvent::Interrupted => {
                    println!();
                    break 'outer;
                }
            }
        }

        finish_reply(&session, &streamed).await;
    }

    // Leaving before the survey ended saves what was said so far.
    session.close().await;
}

// The reply shown so far may have been replaced, e.g. by the apology of a
// failed request.
async fn finish_reply(session: &survey_chat::Session, streamed: &str) {
    let reply = match session.snapshot().await {
        Ok(snapshot) => snapshot
            .turns
            .iter()
            .rev()
            .find(|turn| turn.role() == Role::Assistant)
            .map(|turn| turn.content().to_owned()),
        Err(err) => {
            error!("failed to read the session: {err}");
            None
        }
    };
    match reply {
        Some(reply) if reply != streamed => {
            if !streamed.is_empty() {
                println!();
            }
            if reply == FAILURE_MESSAGE {
                println!("{}⚠️  {}", BAR_CHAR.bright_red(), reply.bright_red());
            } else {
                print_assistant(&reply);
            }
        }
        _ => println!(),
    }
    println!();
}

fn print_assistant(text: &str) {
    println!("{}🤖 {}", BAR_CHAR.bright_cyan(), text.bright_white());
    println!();
}

fn print_suggestions(groups: &SuggestionGroups) {
    if groups.groups.is_empty() {
        println!("{}", "No suggestions for this question.".dimmed());
        return;
    }
    for group in &groups.groups {
        let chips: Vec<String> = group
            .suggestions
            .iter()
            .map(|suggestion| format!("[{suggestion}]"))
            .collect();
        println!(
            "{}{} {}",
            BAR_CHAR.bright_yellow(),
            group.category.bold(),
            chips.join(" ").bright_yellow()
        );
    }
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
