/// Primordia terminal dashboard
///
/// Shows satellite, news and market signals per region and the divergence between them.
/// Configuration comes from `PRIMORDIA_*` environment variables, logs go to `PRIMORDIA_LOG_FILE`.
use std::{
    error::Error,
    io::{self, Stdout},
    sync::Arc,
    time::Duration,
};

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use primordia_dashboard::{
    DashboardHandle, Settings,
    logging::init_logging,
    ui::{UiState, command_for_key, render},
};
use primordia_data::SignalClient;
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{info, warn};

const TICK_RATE: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging(Settings::log_file_from_env().as_deref())?;
    let settings = Settings::from_env();

    let client = SignalClient::new(settings.client.clone())?;
    info!(
        base_url = %client.base_url(),
        poll_interval = ?settings.poll.interval,
        map = settings.map_token.is_some(),
        "starting primordia dashboard"
    );

    {
        let client = client.clone();
        tokio::spawn(async move {
            match client.health().await {
                Ok(health) if health.is_ok() => info!(status = %health.status, "backend healthy"),
                Ok(health) => warn!(status = %health.status, "backend reports degraded health"),
                Err(error) => warn!(%error, "backend health check failed"),
            }
        });
    }

    // Setup panic hook to restore terminal on crash
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic_info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let handle = DashboardHandle::spawn(Arc::new(client), &settings);
    let result = run_app(&mut terminal, &handle, settings.map_token.is_some());

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    handle.shutdown().await;
    info!("primordia dashboard exited");

    result.map_err(Into::into)
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    handle: &DashboardHandle,
    map_enabled: bool,
) -> io::Result<()> {
    let mut ui = UiState::default();
    let mut state = handle.subscribe();

    loop {
        let snapshot = state.borrow_and_update().clone();
        terminal.draw(|f| render(f, &snapshot, &ui, map_enabled))?;

        if event::poll(TICK_RATE)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
            && let Some(command) = command_for_key(key, &mut ui, &snapshot)
        {
            handle.send(command);
        }

        if ui.quit {
            return Ok(());
        }
    }
}
