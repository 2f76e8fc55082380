use anyhow::{Context, Result};
use clap::Parser;
use sahab::ai::StreamClient;
use sahab::config::Config;
use sahab::error::SubmitError;
use sahab::session::{ChatSession, TurnOutcome};
use sahab::transcript::LIMIT_NOTICE;
use sahab::types::Language;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

const SUGGESTIONS: [&str; 3] = [
    "What is Section 420 of IPC?",
    "How do I file an RTI?",
    "Explain \"Bail\" simply.",
];

const DISCLAIMER: &str = "SAHAB provides general information, not legal advice. Please refer to official legal documents for verified information.";

/// Terminal chat with the SAHAB legal assistant.
#[derive(Debug, Parser)]
#[command(name = "sahab", version, about)]
struct Cli {
    /// Base URL of the chat API (the endpoint is <url>/chat)
    #[arg(long)]
    api_url: Option<String>,

    /// Answer language, e.g. English, Hindi, Tamil
    #[arg(long)]
    language: Option<Language>,

    /// Use the non-streaming endpoint
    #[arg(long)]
    no_stream: bool,

    /// Default log level when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(url) = self.api_url {
            config.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(language) = self.language {
            config.language = language;
        }
        if self.no_stream {
            config.streaming = false;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Prompt(&'a str),
    Language(&'a str),
    End,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Command<'_> {
    let trimmed = line.trim();
    match trimmed.split_once(char::is_whitespace) {
        Some(("/lang", name)) => Command::Language(name.trim()),
        _ => match trimmed {
            "/end" => Command::End,
            "/help" => Command::Help,
            "/quit" | "/exit" => Command::Quit,
            _ => Command::Prompt(line),
        },
    }
}

/// Logs go to stderr so they never interleave with the streamed answer.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sahab={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_welcome(language: Language) {
    println!("Namaste! I am SAHAB.");
    println!(
        "I can assist you with the Indian Penal Code, legal definitions, and Department of Justice services."
    );
    println!();
    println!("Try asking:");
    for suggestion in SUGGESTIONS {
        println!("  {suggestion}");
    }
    println!();
    println!("Answer language: {language}. Type /help for commands.");
    println!("{DISCLAIMER}");
}

fn print_help() {
    let languages: Vec<&str> = Language::ALL.iter().map(|l| l.name()).collect();
    println!("/lang <name>  switch answer language ({})", languages.join(", "));
    println!("/end          end this session and start over");
    println!("/help         show this help");
    println!("/quit         leave");
    println!("Ctrl+C while an answer is streaming stops it.");
}

async fn run_turn(session: &mut ChatSession<StreamClient>, prompt: &str) {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let mut stdout = std::io::stdout();
    let mut print_delta = |delta: &str| {
        let _ = write!(stdout, "{delta}");
        let _ = stdout.flush();
    };
    let result = session
        .submit_observed(prompt, &cancel, &mut print_delta)
        .await;
    watcher.abort();

    match result {
        Ok(TurnOutcome::Completed(_)) => println!(),
        Ok(TurnOutcome::Cancelled(_)) => println!(" [stopped]"),
        Ok(TurnOutcome::Failed { .. }) => {
            if let Some(notice) = session.transcript().last() {
                println!("\n{}", notice.content);
            }
        }
        Err(SubmitError::LimitReached { .. }) => {
            println!("Usage Limit Reached");
            println!("{LIMIT_NOTICE}");
            println!("Type /end to start a new session or /quit to leave.");
        }
        // Blank input is ignored without comment.
        Err(SubmitError::Empty) => {}
        Err(err @ SubmitError::InFlight) => println!("{err}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::from_env().context("invalid configuration")?;
    cli.apply(&mut config);
    init_tracing(&config.log_level);

    let client = StreamClient::new(&config).context("failed to build HTTP client")?;
    tracing::info!(endpoint = client.endpoint(), streaming = config.streaming, "starting");
    let mut session = ChatSession::new(client, config.language);
    print_welcome(session.language());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().context("failed to write prompt")?;

        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read input")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };

        match parse_command(&line) {
            Command::Quit => break,
            Command::Help => print_help(),
            Command::End => {
                session.end();
                println!("Session ended.\n");
                print_welcome(session.language());
            }
            Command::Language(name) => match name.parse::<Language>() {
                Ok(language) => {
                    session.set_language(language);
                    println!("Answer language: {language}");
                }
                Err(err) => println!("{err}"),
            },
            Command::Prompt(prompt) => run_turn(&mut session, prompt).await,
        }
    }

    Ok(())
}
