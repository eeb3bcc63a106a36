//! Debatecast CLI - Narrated AI Debates
//!
//! A command-line front end for a hosted AI debate service: start or open a
//! debate, ask questions, and listen to each side argue it out.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use debatecast_core::config::{self, Config};
use debatecast_core::speech::text::recording_filename;
use debatecast_core::{
    CredentialSupplier, DebateError, DebatePipeline, Epoch, HeuristicVoicePolicy, HttpTurnClient,
    KokoroEngine, NarrationOutcome, NarrationRecorder, PacedTextEngine, Phase, PipelineEvent,
    SessionId, SpeakerRole, SpeechEngine, SpeechQueue, StaticToken, Statement, TurnClient,
    TurnReport,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "debatecast",
    version,
    about = "Narrated AI debates",
    long_about = "A CLI for running debates on a hosted AI debate service and listening to each turn as it happens."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (defaults to $DEBATECAST_CONFIG, then built-in settings)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print statements without synthesizing audio
    #[arg(long, global = true)]
    no_audio: bool,

    /// Where to save the narration recording
    #[arg(short, long, global = true, value_name = "WAV")]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Start a new debate
    Start {
        /// The topic to debate
        #[arg(value_name = "TOPIC")]
        topic: String,
    },
    /// Open one of your existing debates
    Open {
        /// Debate id, as shown by `list`
        #[arg(value_name = "ID")]
        id: String,
    },
    /// List your debates
    List,
}

/// A line typed at the interactive prompt.
#[derive(Debug, Clone, PartialEq)]
enum UserCommand {
    Question(String),
    Start(String),
    Closing,
    Judge,
    Stop,
    Refresh,
    Reset,
    Quit,
    Help,
    Unknown(String),
    Empty,
}

impl UserCommand {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        match line {
            "" => UserCommand::Empty,
            "/closing" => UserCommand::Closing,
            "/judge" => UserCommand::Judge,
            "/stop" => UserCommand::Stop,
            "/refresh" => UserCommand::Refresh,
            "/reset" => UserCommand::Reset,
            "/quit" | "/exit" => UserCommand::Quit,
            "/help" => UserCommand::Help,
            other if other.starts_with("/start ") => {
                UserCommand::Start(other["/start ".len()..].trim().to_string())
            }
            other if other.starts_with('/') => UserCommand::Unknown(other.to_string()),
            question => UserCommand::Question(question.to_string()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debatecast=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.clone())?;

    let token = env::var("DEBATECAST_TOKEN").ok().filter(|t| !t.trim().is_empty());
    if token.is_none() {
        eprintln!(
            "{}",
            "Warning: DEBATECAST_TOKEN not set. Requests will be sent without credentials.".yellow()
        );
    }
    let credentials = token.map(|t| Arc::new(StaticToken::new(t)) as Arc<dyn CredentialSupplier>);
    let client: Arc<dyn TurnClient> = Arc::new(HttpTurnClient::new(&config.server, credentials)?);

    let initial = match cli.command {
        Command::List => return list_debates(client.as_ref()).await,
        Command::Start { topic } => Action::Start(topic),
        Command::Open { id } => Action::Open(SessionId::new(id)),
    };

    let (engine, recorder) = create_engine(&config, cli.no_audio).await;
    let queue = Arc::new(SpeechQueue::new(
        engine,
        Box::new(HeuristicVoicePolicy::new(config.voices.clone())),
        Epoch::new(),
        &config.speech,
    ));
    let _voice_watcher = queue.watch_voices();

    let pipeline = Arc::new(
        DebatePipeline::new(client, queue, config.announcements.clone())
            .with_callback(create_console_callback()),
    );

    print_banner("Debatecast", &config.server.base_url);
    print_help();

    if let Action::Start(topic) = &initial {
        println!("{} {}", "Topic:".bold(), topic.bright_white());
    }
    let mut running = spawn_action(pipeline.clone(), initial);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        let action = match UserCommand::parse(&line) {
            UserCommand::Empty => continue,
            UserCommand::Quit => break,
            UserCommand::Help => {
                print_help();
                continue;
            }
            UserCommand::Unknown(command) => {
                eprintln!("{} Unknown command '{}'.", "Error:".red().bold(), command);
                print_help();
                continue;
            }
            UserCommand::Stop => {
                pipeline.stop_narration();
                continue;
            }
            UserCommand::Reset => {
                pipeline.reset();
                println!("{}", "Debate reset. /start <topic> to begin another.".yellow());
                continue;
            }
            UserCommand::Start(topic) => Action::Start(topic),
            UserCommand::Question(question) => Action::Question(question),
            UserCommand::Closing => Action::Closing,
            UserCommand::Judge => Action::Judge,
            UserCommand::Refresh => Action::Refresh,
        };

        if !running.is_finished() {
            println!(
                "{}",
                "Still narrating. Wait for the turn to finish, or /stop to skip the current statement."
                    .yellow()
            );
            continue;
        }
        running = spawn_action(pipeline.clone(), action);
    }

    let topic = pipeline.session().map(|s| s.topic).unwrap_or_default();
    pipeline.reset();
    running.abort();

    if let Some(recorder) = recorder {
        save_recording(&recorder, cli.output, &topic)?;
    }

    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!("{}", "  Debate closed.".bright_green().bold());
    println!("{}", "═".repeat(70).bright_blue());
    println!();

    Ok(())
}

/// Actions that go through the debate service.
enum Action {
    Start(String),
    Open(SessionId),
    Question(String),
    Closing,
    Judge,
    Refresh,
}

fn load_config(path: Option<PathBuf>) -> Result<Config, DebateError> {
    let path = path.or_else(|| env::var("DEBATECAST_CONFIG").ok().map(PathBuf::from));
    let mut config = match path {
        Some(path) => Config::load(&path)?,
        None => config::default_config(),
    };
    if let Ok(base) = env::var("DEBATECAST_API_BASE") {
        config.server.base_url = base;
    }
    Ok(config)
}

/// Build the speech engine, falling back to text-only narration if the
/// synthesizer cannot start.
async fn create_engine(
    config: &Config,
    no_audio: bool,
) -> (Arc<dyn SpeechEngine>, Option<Arc<NarrationRecorder>>) {
    if no_audio {
        return (Arc::new(PacedTextEngine::default()), None);
    }

    println!("{}", "Initializing text-to-speech engine...".bright_blue());
    match KokoroEngine::new(&config.speech).await {
        Ok(engine) => {
            let recorder = engine.recorder();
            (Arc::new(engine), Some(recorder))
        }
        Err(e) => {
            warn!(error = %e, "Speech synthesis unavailable");
            eprintln!(
                "{}",
                format!("Warning: {}. Continuing without audio.", e).yellow()
            );
            (Arc::new(PacedTextEngine::default()), None)
        }
    }
}

async fn list_debates(client: &dyn TurnClient) -> Result<(), Box<dyn std::error::Error>> {
    let debates = client.list_sessions().await?;

    print_banner("Your Debates", &format!("{} total", debates.len()));
    if debates.is_empty() {
        println!("  {}", "No debates yet. Start one with `debatecast start <TOPIC>`.".dimmed());
    }
    for debate in &debates {
        let status = match &debate.winner {
            Some(winner) => format!("won by {}", winner.to_uppercase()).green(),
            None => "in progress".yellow(),
        };
        println!(
            "  {} {} {}",
            format!("#{}", debate.id).bright_cyan().bold(),
            debate.topic.bright_white(),
            format!("({})", status).dimmed()
        );
    }
    println!();
    Ok(())
}

/// Run an action in the background so `/stop` stays responsive while it narrates.
fn spawn_action(pipeline: Arc<DebatePipeline>, action: Action) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let refresh = matches!(action, Action::Refresh | Action::Open(_));
        let result = match action {
            Action::Start(topic) => pipeline.start(&topic).await,
            Action::Open(id) => pipeline.open_session(id).await,
            Action::Question(question) => pipeline.submit_question(&question).await,
            Action::Closing => pipeline.request_closing().await,
            Action::Judge => pipeline.request_judgment().await,
            Action::Refresh => pipeline.reconcile().await,
        };

        match result {
            Ok(report) => {
                if refresh && report.narrated == 0 {
                    print_transcript(&pipeline.transcript());
                }
                print_next_step(&pipeline, &report);
            }
            // Abandoned by a reset; nothing to report.
            Err(e) if e.is_stale() => {}
            Err(DebateError::Busy) => {
                println!("{}", "Still working on the previous turn.".yellow());
            }
            Err(DebateError::InvalidInput(message)) => {
                println!("{}", message.yellow());
            }
            // Service failures are already shown through the event callback.
            Err(e) => {
                if let Some(hint) = failure_hint(&e) {
                    println!("{}", hint.red());
                }
                if let Some(question) = pipeline.draft_question() {
                    println!(
                        "{} {}",
                        "Your question was kept; send it again to retry:".yellow(),
                        question.bright_white()
                    );
                }
            }
        }
    })
}

/// Extra guidance for failures that retrying alone will not fix.
fn failure_hint(error: &DebateError) -> Option<&'static str> {
    if error.is_auth() {
        Some("Authentication failed. Set a fresh DEBATECAST_TOKEN and restart.")
    } else {
        None
    }
}

fn print_next_step(pipeline: &DebatePipeline, report: &TurnReport) {
    if report.failed > 0 {
        println!(
            "{}",
            format!("  ({} statement(s) could not be narrated)", report.failed).dimmed()
        );
    }
    println!("{}", "─".repeat(70).dimmed());
    if pipeline.is_judged() {
        println!("{}", "The debate has been judged. /quit to leave.".bright_green());
    } else if pipeline.is_ended() {
        println!("{}", "Closing arguments are in. /judge for the verdict.".bright_green());
    } else if pipeline.needs_question() {
        println!(
            "{}",
            "Ask the debaters a question, or /closing to wrap up.".bright_green()
        );
    }
}

fn print_transcript(transcript: &[Statement]) {
    for statement in transcript {
        print_statement(&statement.speaker, &statement.text);
    }
}

fn print_statement(speaker: &str, text: &str) {
    let name = match SpeakerRole::from_speaker(speaker) {
        SpeakerRole::Other => speaker,
        role => role.display_name(),
    };
    println!("{} {}", "▶".bright_cyan(), name.bright_cyan().bold());
    for line in textwrap(text, 66).lines() {
        println!("  {}", line);
    }
    println!();
}

fn print_banner(title: &str, subtitle: &str) {
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!("{}", format!("  {}", title.bold()).bright_blue().bold());
    println!("  {}", subtitle.dimmed());
    println!("{}", "═".repeat(70).bright_blue());
    println!();
}

fn print_help() {
    println!("{}", "Commands:".bold());
    println!("  {}  ask both sides a question", "<text>".bright_cyan());
    println!("  {}  start a new debate", "/start <topic>".bright_cyan());
    println!("  {}  request closing arguments", "/closing".bright_cyan());
    println!("  {}  request the verdict", "/judge".bright_cyan());
    println!("  {}  skip the statement being read", "/stop".bright_cyan());
    println!("  {}  reload the debate from the server", "/refresh".bright_cyan());
    println!("  {}  drop the current debate", "/reset".bright_cyan());
    println!("  {}  save the recording and exit", "/quit".bright_cyan());
    println!();
}

fn save_recording(
    recorder: &NarrationRecorder,
    output: Option<PathBuf>,
    topic: &str,
) -> Result<(), DebateError> {
    if recorder.is_empty() {
        return Ok(());
    }
    let path = output.unwrap_or_else(|| PathBuf::from(recording_filename(topic)));
    println!("{}", "Saving narration...".bright_blue());
    recorder.save_wav(&path)?;
    println!(
        "{} {} ({:.1}s)",
        "Recording saved to".bright_green(),
        path.display().to_string().bold(),
        recorder.duration_secs()
    );
    Ok(())
}

/// Create a callback that prints pipeline events to the console.
fn create_console_callback() -> Box<dyn Fn(PipelineEvent) + Send + Sync> {
    Box::new(move |event| match event {
        PipelineEvent::PhaseChanged { phase } => match phase {
            Phase::Opening | Phase::ClosingArguments | Phase::AwaitingVerdict | Phase::Judged => {
                println!();
                println!("{}", "═".repeat(70).bright_magenta());
                println!(
                    "{}",
                    format!("  📢 {}", phase.display_name()).bright_magenta().bold()
                );
                println!("{}", "═".repeat(70).bright_magenta());
                println!();
            }
            _ => {}
        },
        PipelineEvent::NarrationStarted { speaker, text } => {
            print_statement(&speaker, &text);
        }
        PipelineEvent::NarrationFinished { outcome, .. } => match outcome {
            NarrationOutcome::Failed(reason) => {
                println!("  {}", format!("(narration failed: {})", reason).yellow());
            }
            NarrationOutcome::Cancelled => {
                println!("  {}", "(skipped)".dimmed());
            }
            NarrationOutcome::Completed | NarrationOutcome::Skipped => {}
        },
        PipelineEvent::Error { message } => {
            eprintln!("{} {}", "Error:".red().bold(), message);
        }
        PipelineEvent::StateChanged { .. } | PipelineEvent::StatementRevealed { .. } => {}
    })
}

/// Simple text wrapping function.
fn textwrap(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut current_line_len = 0;

    for word in text.split_whitespace() {
        if current_line_len + word.len() + 1 > width && current_line_len > 0 {
            result.push('\n');
            current_line_len = 0;
        }
        if current_line_len > 0 {
            result.push(' ');
            current_line_len += 1;
        }
        result.push_str(word);
        current_line_len += word.len();
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(UserCommand::parse("  /closing "), UserCommand::Closing);
        assert_eq!(UserCommand::parse("/judge"), UserCommand::Judge);
        assert_eq!(UserCommand::parse("/exit"), UserCommand::Quit);
        assert_eq!(
            UserCommand::parse("/start  Tabs vs spaces"),
            UserCommand::Start("Tabs vs spaces".to_string())
        );
        assert_eq!(UserCommand::parse(""), UserCommand::Empty);
        assert_eq!(
            UserCommand::parse("/dance"),
            UserCommand::Unknown("/dance".to_string())
        );
        assert_eq!(
            UserCommand::parse("Is remote work better?"),
            UserCommand::Question("Is remote work better?".to_string())
        );
    }

    #[test]
    fn test_auth_failures_get_a_hint() {
        let hint = failure_hint(&DebateError::Auth("token expired".to_string())).unwrap();
        assert!(hint.contains("DEBATECAST_TOKEN"));
        assert_eq!(failure_hint(&DebateError::Busy), None);
        assert_eq!(
            failure_hint(&DebateError::Remote {
                category: debatecast_core::StatusCategory::Server,
                message: "boom".to_string(),
            }),
            None
        );
    }

    #[test]
    fn test_textwrap() {
        let wrapped = textwrap("one two three four five", 9);
        assert_eq!(wrapped, "one two\nthree\nfour five");
    }
}
