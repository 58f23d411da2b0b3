use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chatdeck::agent::LlmAgent;
use chatdeck::config::Config;
use chatdeck::conversation::ConversationIdentity;
use chatdeck::events::TuiEvent;
use chatdeck::session::{ChatSession, Session};
use chatdeck::storage::FileShareStore;
use chatdeck::ui::conversation::{ChatPanel, PanelAction, Progress, Renderable, SubmissionController, SubmitOutcome};
use clap::{Parser, Subcommand};
use crossterm::event::{DisableBracketedPaste, EnableBracketedPaste, Event, EventStream, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use futures::StreamExt;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing_subscriber::EnvFilter;

const TICK: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(name = "chatdeck")]
#[command(version)]
#[command(about = "Terminal chat client for streaming conversational agents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect conversations shared from this machine
    Shared {
        #[command(subcommand)]
        command: SharedCommands,
    },
    /// Ask one question and stream the answer to stdout
    Ask {
        #[arg(required = true)]
        prompt: Vec<String>,
    },
}

#[derive(Subcommand)]
enum SharedCommands {
    /// List shared conversations
    List,
    /// Print a shared conversation
    Show { id: String },
}

fn init_logging(config: &Config) -> Result<()> {
    std::fs::create_dir_all(&config.chatdeck_home)
        .context("Failed to create chatdeck home directory")?;
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.log_path())
        .context("Failed to open log file")?;

    let filter = EnvFilter::try_from_env("CHATDECK_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn share_store(config: &Config) -> FileShareStore {
    FileShareStore::new(config.share_dir(), config.share.base_url.clone())
}

fn list_shared(config: &Config) -> Result<()> {
    let snapshots = share_store(config).list()?;
    if snapshots.is_empty() {
        println!("📭 Nothing shared yet. Use /share inside chatdeck to publish a conversation.");
        return Ok(());
    }

    println!("🔗 Shared conversations:\n");
    for snapshot in snapshots {
        println!(
            "  • {}  {} ({} messages)",
            snapshot.id,
            snapshot.title,
            snapshot.messages.len()
        );
    }
    Ok(())
}

fn show_shared(config: &Config, id: &str) -> Result<()> {
    let snapshot = share_store(config).load(id)?;
    println!("# {}\n", snapshot.title);
    println!("{}", snapshot.transcript());
    Ok(())
}

async fn ask(config: &Config, prompt: String) -> Result<()> {
    let agent = LlmAgent::from_config(config)?;
    let chat = ChatSession::new(Some(Session::from_config(config)), ConversationIdentity::default());
    let mut controller = SubmissionController::new(chat, Arc::new(agent));

    let mut input = prompt;
    let ids = match controller.submit(&mut input).await? {
        SubmitOutcome::Accepted(ids) => ids,
        SubmitOutcome::Failed(_, error) => return Err(error.into()),
        SubmitOutcome::Ignored => bail!("Nothing to ask"),
        other => bail!("Unexpected submission outcome: {:?}", other),
    };

    let mut stdout = io::stdout();
    let mut printed = 0;
    while let Some(progress) = controller.next_increment().await {
        if let Some(entry) = controller.messages().get(&ids.assistant_entry_id) {
            match &entry.renderable {
                Renderable::Text(text) if text.len() > printed => {
                    write!(stdout, "{}", &text[printed..])?;
                    stdout.flush()?;
                    printed = text.len();
                }
                Renderable::Fragment(fragment) if matches!(progress, Progress::Completed) => {
                    writeln!(stdout, "[{}] {}", fragment.kind, fragment.props)?;
                }
                _ => {}
            }
        }

        if let Progress::Failed(error) = progress {
            writeln!(stdout)?;
            return Err(error.into());
        }
    }

    writeln!(stdout)?;
    Ok(())
}

async fn run_tui(config: &Config) -> Result<()> {
    let agent = LlmAgent::from_config(config)?;
    let mut panel = ChatPanel::new(
        config,
        Session::from_config(config),
        Arc::new(agent),
        Arc::new(share_store(config)),
    );

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = event_loop(&mut terminal, &mut panel).await;

    panel.teardown();
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableBracketedPaste, LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    panel: &mut ChatPanel,
) -> Result<()> {
    let mut events = EventStream::new();
    let mut tick = tokio::time::interval(TICK);

    loop {
        terminal.draw(|frame| frame.render_widget(&*panel, frame.size()))?;

        let event = tokio::select! {
            maybe_event = events.next() => match maybe_event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => TuiEvent::Key(key),
                Some(Ok(Event::Paste(text))) => TuiEvent::Paste(text),
                Some(Ok(Event::Resize(w, h))) => TuiEvent::Resize(w, h),
                Some(Ok(_)) => continue,
                Some(Err(error)) => return Err(error.into()),
                None => return Ok(()),
            },
            progress = panel.next_increment(), if panel.has_pending() => {
                tracing::trace!(?progress, "stream progress");
                continue;
            }
            _ = tick.tick() => TuiEvent::Tick,
        };

        if panel.handle_event(event).await == PanelAction::Exit {
            tracing::info!("exiting chat");
            return Ok(());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;
    init_logging(&config)?;

    match cli.command {
        None => run_tui(&config).await,
        Some(Commands::Shared { command: SharedCommands::List }) => list_shared(&config),
        Some(Commands::Shared { command: SharedCommands::Show { id } }) => show_shared(&config, &id),
        Some(Commands::Ask { prompt }) => ask(&config, prompt.join(" ")).await,
    }
}
