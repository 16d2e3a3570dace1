//! Actor that owns the [`DashboardState`] and executes the reducer's [`Effect`]s.
//!
//! A single tokio task is the only writer of the state. Commands arrive over an unbounded mpsc
//! channel, snapshots are published through a [`watch`] channel after every transition, and each
//! network call runs as a task in a [`JoinSet`] whose output is fed back into the reducer.

use crate::{
    config::{Preferences, Settings},
    state::{DashboardEvent, DashboardState, Effect, Panel},
};
use primordia_data::{SignalSource, model::RegionId};
use std::{path::PathBuf, pin::Pin, sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, watch},
    task::{AbortHandle, JoinHandle, JoinSet},
    time::{Instant, Sleep},
};
use tracing::{debug, info, warn};

/// Furthest the poll timer is ever armed into the future.
const MAX_TIMER_DELAY: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// User intent sent to a running controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SelectRegion(RegionId),
    Refresh,
    RetryStartup,
    TogglePanel(Panel),
    ToggleTheme,
    JoinWaitlist(String),
    SendChat(String),
    Shutdown,
}

/// Handle to a running dashboard controller.
///
/// Dropping the handle closes the command channel, which stops the controller and aborts every
/// in-flight fetch along with the poll timer.
#[derive(Debug)]
pub struct DashboardHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<DashboardState>,
    task: JoinHandle<()>,
}

impl DashboardHandle {
    /// Spawn the controller on the current tokio runtime and mount it.
    pub fn spawn(source: Arc<dyn SignalSource>, settings: &Settings) -> Self {
        let state = DashboardState::new(settings);
        let (state_tx, state_rx) = watch::channel(state.clone());
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let preferences = settings
            .preferences_path
            .clone()
            .map(|path| PreferencesWriter::spawn(path, state.preferences()));

        let actor = Controller {
            source,
            poll: Box::pin(tokio::time::sleep_until(deadline(state.poll_policy().interval))),
            poll_armed: false,
            state,
            state_tx,
            commands: command_rx,
            tasks: JoinSet::new(),
            signal_fetches: Vec::new(),
            preferences,
        };

        Self {
            commands: command_tx,
            state: state_rx,
            task: tokio::spawn(actor.run()),
        }
    }

    /// Receiver notified on every state transition.
    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.state.clone()
    }

    /// Clone of the latest published state.
    pub fn snapshot(&self) -> DashboardState {
        self.state.borrow().clone()
    }

    /// Returns `false` if the controller has already stopped.
    pub fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn select_region(&self, region_id: impl Into<RegionId>) -> bool {
        self.send(Command::SelectRegion(region_id.into()))
    }

    pub fn refresh(&self) -> bool {
        self.send(Command::Refresh)
    }

    pub fn retry_startup(&self) -> bool {
        self.send(Command::RetryStartup)
    }

    pub fn join_waitlist(&self, email: impl Into<String>) -> bool {
        self.send(Command::JoinWaitlist(email.into()))
    }

    pub fn send_chat(&self, message: impl Into<String>) -> bool {
        self.send(Command::SendChat(message.into()))
    }

    /// Stop the controller and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Err(error) = self.task.await {
            warn!(%error, "dashboard controller task did not stop cleanly");
        }
    }
}

struct Controller {
    source: Arc<dyn SignalSource>,
    state: DashboardState,
    state_tx: watch::Sender<DashboardState>,
    commands: mpsc::UnboundedReceiver<Command>,
    tasks: JoinSet<DashboardEvent>,
    /// Abort handles of in-flight signal fetches, keyed by selection epoch
    signal_fetches: Vec<(u64, AbortHandle)>,
    poll: Pin<Box<Sleep>>,
    poll_armed: bool,
    preferences: Option<PreferencesWriter>,
}

impl Controller {
    async fn run(mut self) {
        info!("dashboard controller started");
        self.apply(DashboardEvent::Mounted);

        loop {
            let event = tokio::select! {
                command = self.commands.recv() => match command.and_then(event_for) {
                    Some(event) => event,
                    None => break,
                },
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => match joined {
                    Ok(event) => event,
                    Err(error) if error.is_cancelled() => continue,
                    Err(error) => {
                        warn!(%error, "dashboard fetch task failed");
                        continue;
                    }
                },
                () = self.poll.as_mut(), if self.poll_armed => {
                    self.poll_armed = false;
                    DashboardEvent::PollTick
                }
            };

            self.apply(event);
        }

        self.tasks.abort_all();
        if let Some(preferences) = self.preferences.take() {
            preferences.flush().await;
        }
        info!("dashboard controller stopped");
    }

    fn apply(&mut self, event: DashboardEvent) {
        for effect in self.state.process_event(event) {
            self.execute(effect);
        }
        self.state_tx.send_replace(self.state.clone());
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::FetchRegions => {
                let source = Arc::clone(&self.source);
                self.tasks.spawn(async move {
                    DashboardEvent::RegionsFetched(source.fetch_regions().await)
                });
            }
            Effect::FetchSignals(ticket) => {
                let source = Arc::clone(&self.source);
                let epoch = ticket.epoch;
                let handle = self.tasks.spawn(async move {
                    let result = source.fetch_signals(&ticket.region_id).await;
                    DashboardEvent::SignalsFetched { ticket, result }
                });
                self.signal_fetches.retain(|(_, handle)| !handle.is_finished());
                self.signal_fetches.push((epoch, handle));
            }
            Effect::CancelStaleFetches { epoch } => {
                self.signal_fetches.retain(|(issued, handle)| {
                    if *issued < epoch {
                        handle.abort();
                        false
                    } else {
                        true
                    }
                });
            }
            Effect::SchedulePoll(delay) => {
                debug!(?delay, "poll scheduled");
                self.poll.as_mut().reset(deadline(delay));
                self.poll_armed = true;
            }
            Effect::PersistPreferences(preferences) => {
                if let Some(writer) = &self.preferences {
                    writer.latest.send_replace(preferences);
                }
            }
            Effect::SubmitWaitlist(email) => {
                let source = Arc::clone(&self.source);
                self.tasks.spawn(async move {
                    DashboardEvent::WaitlistResolved(source.join_waitlist(&email).await)
                });
            }
            Effect::SendChat { session, request } => {
                let source = Arc::clone(&self.source);
                let region_id = request.region_id.clone();
                self.tasks.spawn(async move {
                    let result = source.chat(request).await;
                    DashboardEvent::ChatResolved {
                        region_id,
                        session,
                        result,
                    }
                });
            }
        }
    }
}

/// Poll deadline `delay` from now, bounded so arbitrarily long intervals cannot overflow.
fn deadline(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay.min(MAX_TIMER_DELAY)).unwrap_or(now)
}

/// Background writer that persists the most recent [`Preferences`] off the controller task.
///
/// Writes are serialised and coalesced: only the latest value is saved.
struct PreferencesWriter {
    latest: watch::Sender<Preferences>,
    task: JoinHandle<()>,
}

impl PreferencesWriter {
    fn spawn(path: PathBuf, initial: Preferences) -> Self {
        let (latest, mut updates) = watch::channel(initial);
        let task = tokio::spawn(async move {
            while updates.changed().await.is_ok() {
                let preferences = updates.borrow_and_update().clone();
                let path = path.clone();
                match tokio::task::spawn_blocking(move || preferences.save(&path)).await {
                    Ok(Ok(())) => debug!("preferences persisted"),
                    Ok(Err(error)) => warn!(%error, "failed to persist preferences"),
                    Err(error) => warn!(%error, "preferences writer failed"),
                }
            }
        });

        Self { latest, task }
    }

    /// Finish any pending write and stop the writer.
    async fn flush(self) {
        let Self { latest, task } = self;
        drop(latest);
        if let Err(error) = task.await {
            warn!(%error, "preferences writer did not stop cleanly");
        }
    }
}

/// Reducer input for a command, `None` for [`Command::Shutdown`].
fn event_for(command: Command) -> Option<DashboardEvent> {
    let event = match command {
        Command::SelectRegion(region_id) => DashboardEvent::SelectRegion(region_id),
        Command::Refresh => DashboardEvent::Refresh,
        Command::RetryStartup => DashboardEvent::RetryStartup,
        Command::TogglePanel(panel) => DashboardEvent::TogglePanel(panel),
        Command::ToggleTheme => DashboardEvent::ToggleTheme,
        Command::JoinWaitlist(email) => DashboardEvent::JoinWaitlist(email),
        Command::SendChat(message) => DashboardEvent::SendChat(message),
        Command::Shutdown => return None,
    };
    Some(event)
}
