use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use assistant_config::{expand_tilde, Config, ConfigManager};
use assistant_core::{
    ChatApi, ChatStateStore, HttpChatApi, MockChatApi, Role, SequentialIds, StaleResponsePolicy,
    SubmissionOutcome, SubmissionWorkflow, SubmitOutcome, WorkflowConfig,
};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

mod app;
mod logging;
mod ui;

use app::{App, Focus};

const PAGE_LINES: usize = 10;

#[derive(Parser)]
#[command(name = "assistant")]
#[command(about = "Terminal chat assistant")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(long, env = "ASSISTANT_CONFIG")]
    config: Option<String>,

    /// Override the chat service base URL
    #[arg(long)]
    api_url: Option<String>,

    /// Serve canned replies instead of calling the service
    #[arg(long)]
    mock: bool,

    /// Override the user id sent on session creation
    #[arg(long)]
    user_id: Option<String>,

    /// Drop replies for chats that are no longer selected
    #[arg(long)]
    discard_stale: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message in a fresh chat and print the transcript
    Send {
        message: String,
    },
    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Print the config file location
    Path,
    /// Print one effective value by dotted key (e.g. api.base_url)
    Get {
        key: String,
    },
    /// Set one value by dotted key and save the file
    Set {
        key: String,
        value: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let path = match &cli.config {
        Some(raw) => expand_tilde(raw).context("Could not resolve config path")?,
        None => ConfigManager::default_config_path()?,
    };

    if let Some(Commands::Config {
        command: ConfigCommands::Path,
    }) = &cli.command
    {
        println!("{}", path.display());
        return Ok(());
    }

    // Until the configured subscriber is up, warnings from loading go to stderr
    let startup_log = logging::init_startup();

    let manager = ConfigManager::load(&path)
        .await
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    if let Some(Commands::Config {
        command: ConfigCommands::Set { key, value },
    }) = &cli.command
    {
        manager
            .set_value(key, value)
            .await
            .with_context(|| format!("Failed to set {}", key))?;
        println!("{} = {} (saved to {})", key, value, manager.path().display());
        return Ok(());
    }

    manager.apply_env_overrides().await;
    {
        // Flags apply to this run only and are never saved
        let shared = manager.get();
        let mut config = shared.write().await;
        apply_cli_overrides(&mut config, &cli);
    }
    let config = manager.snapshot().await;
    drop(startup_log);

    match cli.command {
        Some(Commands::Config {
            command: ConfigCommands::Show,
        }) => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Some(Commands::Config {
            command: ConfigCommands::Get { key },
        }) => {
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unknown or unset key: {}", key))?;
            println!("{}", value);
            Ok(())
        }
        Some(Commands::Config {
            command: ConfigCommands::Path | ConfigCommands::Set { .. },
        }) => Ok(()),
        Some(Commands::Send { message }) => {
            ConfigManager::validate(&config)?;
            logging::init_stderr(config.logging.level)?;
            run_send(&config, &message).await
        }
        None => {
            ConfigManager::validate(&config)?;
            let _guard = match log_file(&config) {
                Some(file) => Some(logging::init_file(config.logging.level, &file)?),
                None => None,
            };
            run_tui(&config).await
        }
    }
}

fn apply_cli_overrides(config: &mut Config, cli: &Cli) {
    if let Some(url) = &cli.api_url {
        config.api.base_url = url.clone();
    }
    if cli.mock {
        config.api.use_mock = true;
    }
    if let Some(user_id) = &cli.user_id {
        config.api.user_id = user_id.clone();
    }
    if cli.discard_stale {
        config.widget.discard_stale_responses = true;
    }
}

fn log_file(config: &Config) -> Option<PathBuf> {
    config.logging.file.as_deref().and_then(expand_tilde)
}

/// Build the workflow for the configured backend; returns it with a status label
fn build_workflow(config: &Config) -> anyhow::Result<(Arc<SubmissionWorkflow>, String)> {
    let (api, label): (Arc<dyn ChatApi>, String) = if config.api.use_mock {
        tracing::info!("Using mock chat API");
        (Arc::new(MockChatApi::new()), "mock".to_string())
    } else {
        let timeout = Duration::from_secs(config.api.timeout_seconds);
        let api = HttpChatApi::with_timeout(&config.api.base_url, timeout)?;
        tracing::info!("Using chat API at {}", api.base_url());
        let label = api.base_url().to_string();
        (Arc::new(api), label)
    };

    let policy = if config.widget.discard_stale_responses {
        StaleResponsePolicy::DiscardInactive
    } else {
        StaleResponsePolicy::AlwaysApply
    };

    let workflow = SubmissionWorkflow::new(
        api,
        Arc::new(ChatStateStore::new()),
        Arc::new(SequentialIds::new()),
        WorkflowConfig::new(config.api.user_id.clone()).with_stale_policy(policy),
    );
    Ok((Arc::new(workflow), label))
}

async fn run_send(config: &Config, message: &str) -> anyhow::Result<()> {
    let (workflow, _) = build_workflow(config)?;

    match workflow.submit(message).await {
        SubmitOutcome::Ignored => bail!("Message is empty"),
        SubmitOutcome::SessionFailed { error } => {
            Err(error).context("Failed to create a chat session")
        }
        SubmitOutcome::Discarded { .. } => bail!("Reply was discarded"),
        SubmitOutcome::Settled { chat_id, outcome } => {
            for msg in workflow.store().get_messages(&chat_id) {
                let who = match msg.role {
                    Role::User => "you",
                    Role::Assistant => "assistant",
                };
                println!("{}: {}", who, msg.content);
            }
            if outcome == SubmissionOutcome::Failure {
                bail!("Chat request failed");
            }
            Ok(())
        }
    }
}

async fn run_tui(config: &Config) -> anyhow::Result<()> {
    let (workflow, label) = build_workflow(config)?;
    let mut app = App::new(workflow, label);

    // Restore the terminal even if drawing panics
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        default_hook(info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = &res {
        tracing::error!("TUI exited with error: {:?}", err);
    }
    res
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> anyhow::Result<()> {
    let tick_rate = Duration::from_millis(100);

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if crossterm::event::poll(tick_rate)? {
            if let Event::Key(key) = crossterm::event::read()? {
                if key.kind == KeyEventKind::Press && handle_key_event(app, key) {
                    return Ok(());
                }
            }
        }

        app.process_events();

        // Let spawned submissions make progress between polls
        tokio::task::yield_now().await;
    }
}

/// Returns true when the app should quit
fn handle_key_event(app: &mut App, key: KeyEvent) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);

    if ctrl && key.code == KeyCode::Char('c') {
        return true;
    }

    if !app.open {
        match key.code {
            KeyCode::Char('o') if ctrl => app.toggle_open(),
            KeyCode::Enter => app.toggle_open(),
            KeyCode::Char('q') => return true,
            _ => {}
        }
        return false;
    }

    match key.code {
        KeyCode::Esc => app.close(),
        KeyCode::Char('o') if ctrl => app.toggle_open(),
        KeyCode::Char('n') if ctrl => app.new_chat(),
        KeyCode::Char('t') if ctrl => app.quick_validate(),
        KeyCode::Char(c @ '1'..='9') if alt => {
            app.pick_suggestion(c as usize - '1' as usize);
        }
        KeyCode::Tab => app.toggle_focus(),
        KeyCode::PageUp => app.scroll_up(PAGE_LINES),
        KeyCode::PageDown => app.scroll_down(PAGE_LINES),
        code => match app.focus {
            Focus::Sidebar => match code {
                KeyCode::Up => app.cursor_up(),
                KeyCode::Down => app.cursor_down(),
                KeyCode::Enter => app.activate_sidebar(),
                _ => {}
            },
            Focus::Prompt => match code {
                KeyCode::Enter => app.submit(),
                KeyCode::Up => app.scroll_up(1),
                KeyCode::Down => app.scroll_down(1),
                KeyCode::Char(c) if !ctrl && !alt => app.push_input(c),
                KeyCode::Backspace => app.pop_input(),
                _ => {}
            },
        },
    }
    false
}
