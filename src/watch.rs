//! `catalog-admin watch`: keeps the catalog fresh while the terminal is open.
//!
//! Terminal focus stands in for page visibility: focus lost hides the host,
//! focus regained shows it again. Refresh outcomes arrive through the
//! policy's observer and are printed as they happen.

use anyhow::Result;
use catalog_admin::catalog::{CatalogStats, CategoryManager};
use catalog_admin::refresh::{
    ChannelObserver, RefreshEvent, RefreshHandle, RefreshPolicyConfig, StalenessRefreshPolicy,
    Visibility,
};
use chrono::Local;
use crossterm::event::{
    DisableFocusChange, EnableFocusChange, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use futures::StreamExt;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::mpsc;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

enum Action {
    Continue,
    Quit,
}

/// Run the watch loop until the user quits or a termination signal arrives.
///
/// The policy is deactivated on every exit path, including errors from the
/// terminal.
pub async fn run(manager: Arc<CategoryManager>, policy_config: RefreshPolicyConfig) -> Result<()> {
    let (visibility_tx, visibility_rx) = mpsc::channel::<Visibility>(8);
    let (event_tx, mut event_rx) = mpsc::channel::<RefreshEvent>(32);

    let policy = StalenessRefreshPolicy::new(policy_config, manager.cache().clone())?
        .with_observer(ChannelObserver::new(event_tx));
    let handle = policy.activate(visibility_rx);

    // Restore the terminal before the default hook prints the panic
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), DisableFocusChange);
        original_hook(panic_info);
    }));

    let result = match setup_terminal() {
        Ok(()) => {
            let result = event_loop(&manager, &handle, &visibility_tx, &mut event_rx).await;
            if let Err(e) = restore_terminal() {
                tracing::warn!(error = %e, "Failed to restore terminal");
            }
            result
        }
        Err(e) => Err(e),
    };

    handle.deactivate().await;
    result
}

async fn event_loop(
    manager: &CategoryManager,
    handle: &RefreshHandle,
    visibility_tx: &mpsc::Sender<Visibility>,
    event_rx: &mut mpsc::Receiver<RefreshEvent>,
) -> Result<()> {
    let mut event_stream = crossterm::event::EventStream::new();

    #[cfg(unix)]
    let mut sigterm = signal(SignalKind::terminate())?;
    #[cfg(unix)]
    let mut sigint = signal(SignalKind::interrupt())?;

    say("Watching catalog. r: refresh  s: status  q: quit")?;
    print_summary(manager).await?;

    loop {
        #[cfg(unix)]
        let sigterm_fut = sigterm.recv();
        #[cfg(not(unix))]
        let sigterm_fut = std::future::pending::<Option<()>>();

        #[cfg(unix)]
        let sigint_fut = sigint.recv();
        #[cfg(not(unix))]
        let sigint_fut = std::future::pending::<Option<()>>();

        tokio::select! {
            biased;

            _ = sigterm_fut => {
                tracing::info!("Received SIGTERM, shutting down gracefully");
                break;
            }

            _ = sigint_fut => {
                tracing::info!("Received SIGINT, shutting down gracefully");
                break;
            }

            maybe_event = event_stream.next() => match maybe_event {
                Some(Ok(Event::Key(key))) => {
                    if let Action::Quit = handle_key(manager, handle, key).await? {
                        break;
                    }
                }
                Some(Ok(Event::FocusGained)) => send_visibility(visibility_tx, Visibility::Visible),
                Some(Ok(Event::FocusLost)) => send_visibility(visibility_tx, Visibility::Hidden),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => break,
            },

            Some(event) = event_rx.recv() => {
                handle_refresh_event(manager, &event).await?;
            }
        }
    }

    Ok(())
}

async fn handle_key(manager: &CategoryManager, handle: &RefreshHandle, key: KeyEvent) -> Result<Action> {
    if key.kind != KeyEventKind::Press {
        return Ok(Action::Continue);
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return Ok(Action::Quit),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(Action::Quit),
        KeyCode::Char('r') => {
            say("Refreshing...")?;
            if let Err(e) = manager.manual_refresh(handle).await {
                say(&format!("Error: {e}"))?;
            }
        }
        KeyCode::Char('s') => {
            let state = if handle.is_stale() {
                "Data may be outdated"
            } else {
                "Data is fresh"
            };
            say(state)?;
        }
        _ => {}
    }
    Ok(Action::Continue)
}

async fn handle_refresh_event(manager: &CategoryManager, event: &RefreshEvent) -> Result<()> {
    match event {
        RefreshEvent::Triggered(trigger) => {
            tracing::debug!(?trigger, "Refresh triggered");
        }
        RefreshEvent::Skipped => say("Data still fresh, refresh skipped")?,
        RefreshEvent::Completed { groups } => {
            say(&format!("Refreshed {groups} data groups"))?;
            print_summary(manager).await?;
        }
        RefreshEvent::Failed { group, error } => {
            say(&format!("Refresh of {group} failed: {error}"))?;
        }
    }
    Ok(())
}

fn send_visibility(tx: &mpsc::Sender<Visibility>, visibility: Visibility) {
    if let Err(e) = tx.try_send(visibility) {
        tracing::debug!(error = %e, ?visibility, "Dropping visibility change");
    }
}

/// One line of counts. Fetch errors are printed, not returned.
async fn print_summary(manager: &CategoryManager) -> Result<()> {
    say(&summary_line(&manager.stats().await))?;
    Ok(())
}

fn summary_line(stats: &Result<CatalogStats>) -> String {
    match stats {
        Ok(stats) => format!(
            "{} categories ({} active), {} subcategories ({} active), {} products",
            stats.total_categories,
            stats.active_categories,
            stats.total_subcategories,
            stats.active_subcategories,
            stats.total_products
        ),
        Err(e) => format!("Could not load catalog: {e:#}"),
    }
}

/// Print a timestamped line. Raw mode needs explicit carriage returns.
fn say(message: &str) -> io::Result<()> {
    let mut out = io::stdout().lock();
    write!(out, "[{}] {}\r\n", Local::now().format("%H:%M:%S"), message)?;
    out.flush()
}

fn setup_terminal() -> Result<()> {
    enable_raw_mode()?;
    if let Err(e) = execute!(io::stdout(), EnableFocusChange) {
        let _ = disable_raw_mode();
        return Err(e.into());
    }
    Ok(())
}

fn restore_terminal() -> Result<()> {
    execute!(io::stdout(), DisableFocusChange)?;
    disable_raw_mode()?;
    Ok(())
}
