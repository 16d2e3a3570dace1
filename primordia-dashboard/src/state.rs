//! Dashboard state machine.
//!
//! [`DashboardState::process_event`] is a pure reducer: it folds one [`DashboardEvent`] into the
//! state and returns the [`Effect`]s the controller must execute. It performs no I/O and reads no
//! clock, so every transition is testable without a runtime.

use crate::config::{PollPolicy, Preferences, Settings, Theme};
use primordia_data::{
    DataError, SignalView,
    model::{ChatMessage, ChatReply, ChatRequest, Region, RegionId, SignalBundle, WaitlistResponse},
    symbols::{MarketSymbol, market_symbols},
};
use std::{fmt, time::Duration};
use tracing::{debug, info, warn};

/// Lifecycle phase of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    /// No region list yet, either still fetching or startup failed.
    #[default]
    Uninitialized,
    RegionsLoaded,
    SignalsLoading,
    SignalsReady,
    /// Last fetch for the selected region failed. The previous bundle, if any, is retained.
    Error,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Uninitialized => "STARTING",
            Phase::RegionsLoaded => "REGIONS",
            Phase::SignalsLoading => "LOADING",
            Phase::SignalsReady => "LIVE",
            Phase::Error => "DEGRADED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Region list could not be loaded. Retryable via [`DashboardEvent::RetryStartup`].
    Startup,
    /// A signal fetch for the selected region failed.
    Poll,
    Chat,
    Waitlist,
}

/// User-facing error stored in state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardError {
    pub kind: ErrorKind,
    pub message: String,
}

impl DashboardError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for DashboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Optional dashboard panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Panel {
    Alerts,
    Headlines,
    Insight,
    Markets,
    Explanation,
    Chat,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelVisibility {
    pub alerts: bool,
    pub headlines: bool,
    pub insight: bool,
    pub markets: bool,
    pub explanation: bool,
    pub chat: bool,
    pub help: bool,
}

impl Default for PanelVisibility {
    fn default() -> Self {
        Self {
            alerts: true,
            headlines: true,
            insight: true,
            markets: true,
            explanation: true,
            chat: false,
            help: false,
        }
    }
}

impl PanelVisibility {
    fn flag(&mut self, panel: Panel) -> &mut bool {
        match panel {
            Panel::Alerts => &mut self.alerts,
            Panel::Headlines => &mut self.headlines,
            Panel::Insight => &mut self.insight,
            Panel::Markets => &mut self.markets,
            Panel::Explanation => &mut self.explanation,
            Panel::Chat => &mut self.chat,
            Panel::Help => &mut self.help,
        }
    }

    pub fn is_visible(&self, panel: Panel) -> bool {
        match panel {
            Panel::Alerts => self.alerts,
            Panel::Headlines => self.headlines,
            Panel::Insight => self.insight,
            Panel::Markets => self.markets,
            Panel::Explanation => self.explanation,
            Panel::Chat => self.chat,
            Panel::Help => self.help,
        }
    }

    pub fn toggle(&mut self, panel: Panel) {
        let flag = self.flag(panel);
        *flag = !*flag;
    }
}

/// Access gate in front of the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitlistGate {
    Locked {
        /// A `join_waitlist` call is in flight
        pending: bool,
        /// Feedback from the last attempt
        message: Option<String>,
    },
    Granted,
}

impl WaitlistGate {
    pub fn is_granted(&self) -> bool {
        matches!(self, WaitlistGate::Granted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatState {
    pub history: Vec<ChatMessage>,
    pub pending: bool,
    pub error: Option<DashboardError>,
}

/// Why a signal fetch was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchRequest {
    Selection,
    Poll,
    Refresh,
}

/// Identity of an in-flight signal fetch.
///
/// A result is committed only while its region is still selected and no newer selection has been
/// made since it was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub region_id: RegionId,
    pub epoch: u64,
    pub request: FetchRequest,
}

/// Input to the reducer: user commands plus completions of side effects.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardEvent {
    Mounted,
    RetryStartup,
    RegionsFetched(Result<Vec<Region>, DataError>),
    SelectRegion(RegionId),
    PollTick,
    Refresh,
    SignalsFetched {
        ticket: FetchTicket,
        result: Result<SignalBundle, DataError>,
    },
    TogglePanel(Panel),
    SetTheme(Theme),
    ToggleTheme,
    JoinWaitlist(String),
    WaitlistResolved(Result<WaitlistResponse, DataError>),
    SendChat(String),
    ChatResolved {
        region_id: RegionId,
        session: u64,
        result: Result<ChatReply, DataError>,
    },
}

/// Side effect requested by the reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchRegions,
    FetchSignals(FetchTicket),
    /// Abort in-flight signal fetches issued before `epoch`.
    CancelStaleFetches { epoch: u64 },
    /// (Re)arm the poll timer to fire after the given delay.
    SchedulePoll(Duration),
    PersistPreferences(Preferences),
    SubmitWaitlist(String),
    /// Ask the assistant; the reply must come back tagged with the same chat `session`.
    SendChat { session: u64, request: ChatRequest },
}

/// Complete dashboard state. Owned by the controller task and published as snapshots.
#[derive(Debug, Clone)]
pub struct DashboardState {
    pub phase: Phase,
    pub regions: Vec<Region>,
    pub selected: Option<RegionId>,
    /// Last good bundle for the selected region
    pub bundle: Option<SignalBundle>,
    /// Derived display values of `bundle`
    pub view: Option<SignalView>,
    pub loading: bool,
    pub error: Option<DashboardError>,
    pub consecutive_failures: u32,
    /// Bumped on every selection, stamps each [`FetchTicket`]
    pub epoch: u64,
    pub panels: PanelVisibility,
    pub theme: Theme,
    pub gate: WaitlistGate,
    pub chat: ChatState,
    poll: PollPolicy,
    startup_pending: bool,
    /// Signal fetches of the current epoch still awaiting a result
    in_flight: u32,
    /// Bumped whenever the chat history is reset
    chat_session: u64,
}

impl DashboardState {
    pub fn new(settings: &Settings) -> Self {
        let gate = if settings.preferences.access_granted {
            WaitlistGate::Granted
        } else {
            WaitlistGate::Locked {
                pending: false,
                message: None,
            }
        };

        Self {
            phase: Phase::Uninitialized,
            regions: Vec::new(),
            selected: None,
            bundle: None,
            view: None,
            loading: false,
            error: None,
            consecutive_failures: 0,
            epoch: 0,
            panels: PanelVisibility::default(),
            theme: settings.preferences.theme,
            gate,
            chat: ChatState::default(),
            poll: settings.poll,
            startup_pending: false,
            in_flight: 0,
            chat_session: 0,
        }
    }

    pub fn selected_region(&self) -> Option<&Region> {
        let selected = self.selected.as_ref()?;
        self.regions.iter().find(|region| &region.id == selected)
    }

    pub fn market_symbols(&self) -> &'static [MarketSymbol] {
        self.selected
            .as_ref()
            .map(|id| market_symbols(id.as_str()))
            .unwrap_or_default()
    }

    pub fn poll_policy(&self) -> PollPolicy {
        self.poll
    }

    pub fn preferences(&self) -> Preferences {
        Preferences {
            theme: self.theme,
            access_granted: self.gate.is_granted(),
        }
    }

    pub fn process_event(&mut self, event: DashboardEvent) -> Vec<Effect> {
        match event {
            DashboardEvent::Mounted | DashboardEvent::RetryStartup => self.start(),
            DashboardEvent::RegionsFetched(result) => self.on_regions(result),
            DashboardEvent::SelectRegion(region_id) => self.select(region_id),
            DashboardEvent::PollTick => self.fetch_selected(FetchRequest::Poll),
            DashboardEvent::Refresh => self.fetch_selected(FetchRequest::Refresh),
            DashboardEvent::SignalsFetched { ticket, result } => self.on_signals(ticket, result),
            DashboardEvent::TogglePanel(panel) => {
                self.panels.toggle(panel);
                vec![]
            }
            DashboardEvent::SetTheme(theme) => self.set_theme(theme),
            DashboardEvent::ToggleTheme => self.set_theme(self.theme.toggled()),
            DashboardEvent::JoinWaitlist(email) => self.join_waitlist(email),
            DashboardEvent::WaitlistResolved(result) => self.on_waitlist(result),
            DashboardEvent::SendChat(message) => self.send_chat(message),
            DashboardEvent::ChatResolved {
                region_id,
                session,
                result,
            } => self.on_chat(region_id, session, result),
        }
    }

    fn start(&mut self) -> Vec<Effect> {
        if !self.gate.is_granted() {
            debug!("dashboard locked behind waitlist, not fetching regions");
            return vec![];
        }
        if self.phase != Phase::Uninitialized || self.startup_pending {
            return vec![];
        }

        self.startup_pending = true;
        self.error = None;
        vec![Effect::FetchRegions]
    }

    fn on_regions(&mut self, result: Result<Vec<Region>, DataError>) -> Vec<Effect> {
        if !std::mem::take(&mut self.startup_pending) {
            return vec![];
        }

        match result {
            Ok(regions) if regions.is_empty() => {
                warn!("backend returned no regions");
                self.error = Some(DashboardError::new(
                    ErrorKind::Startup,
                    "backend returned no regions",
                ));
                vec![]
            }
            Ok(regions) => {
                info!(regions = regions.len(), "regions loaded");
                let first = regions[0].id.clone();
                self.regions = regions;
                self.phase = Phase::RegionsLoaded;
                self.select(first)
            }
            Err(error) => {
                warn!(%error, "failed to load regions");
                self.error = Some(DashboardError::new(ErrorKind::Startup, error.to_string()));
                vec![]
            }
        }
    }

    fn select(&mut self, region_id: RegionId) -> Vec<Effect> {
        if !self.gate.is_granted() || self.regions.is_empty() {
            return vec![];
        }
        if !self.regions.iter().any(|region| region.id == region_id) {
            warn!(%region_id, "ignoring selection of unknown region");
            return vec![];
        }

        if self.selected.as_ref() != Some(&region_id) {
            self.bundle = None;
            self.view = None;
            self.chat = ChatState::default();
            self.chat_session += 1;
        }
        debug!(%region_id, "region selected");

        self.epoch += 1;
        self.selected = Some(region_id.clone());
        self.consecutive_failures = 0;
        self.error = None;
        self.phase = Phase::SignalsLoading;
        self.loading = true;
        // Older fetches are cancelled and never report back
        self.in_flight = 1;

        vec![
            Effect::CancelStaleFetches { epoch: self.epoch },
            Effect::FetchSignals(FetchTicket {
                region_id,
                epoch: self.epoch,
                request: FetchRequest::Selection,
            }),
            Effect::SchedulePoll(self.poll.interval),
        ]
    }

    fn fetch_selected(&mut self, request: FetchRequest) -> Vec<Effect> {
        if !self.gate.is_granted() {
            return vec![];
        }
        let Some(region_id) = self.selected.clone() else {
            return vec![];
        };

        self.phase = Phase::SignalsLoading;
        self.loading = true;
        self.in_flight += 1;

        let mut effects = vec![Effect::FetchSignals(FetchTicket {
            region_id,
            epoch: self.epoch,
            request,
        })];
        if request == FetchRequest::Poll {
            effects.push(Effect::SchedulePoll(self.poll.interval));
        }
        effects
    }

    fn on_signals(
        &mut self,
        ticket: FetchTicket,
        result: Result<SignalBundle, DataError>,
    ) -> Vec<Effect> {
        if ticket.epoch != self.epoch || self.selected.as_ref() != Some(&ticket.region_id) {
            debug!(
                region_id = %ticket.region_id,
                epoch = ticket.epoch,
                current_epoch = self.epoch,
                "discarding stale signals response"
            );
            return vec![];
        }

        // Overlapping poll and refresh: the latest arrival wins, loading ends with the last one
        self.in_flight = self.in_flight.saturating_sub(1);
        self.loading = self.in_flight > 0;
        match result {
            Ok(bundle) => {
                debug!(region_id = %bundle.region_id, divergence = bundle.divergence_score, "signals updated");
                self.view = Some(SignalView::from_bundle(&bundle));
                self.bundle = Some(bundle);
                self.error = None;
                self.phase = Phase::SignalsReady;

                if std::mem::take(&mut self.consecutive_failures) > 0 {
                    info!(region_id = %ticket.region_id, "signals recovered, restoring poll interval");
                    vec![Effect::SchedulePoll(self.poll.interval)]
                } else {
                    vec![]
                }
            }
            Err(error) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                let delay = self.poll.backoff_delay(self.consecutive_failures);
                warn!(
                    region_id = %ticket.region_id,
                    %error,
                    transient = error.is_transient(),
                    failures = self.consecutive_failures,
                    retry_in = ?delay,
                    "signals fetch failed"
                );
                self.error = Some(DashboardError::new(ErrorKind::Poll, error.to_string()));
                self.phase = Phase::Error;
                vec![Effect::SchedulePoll(delay)]
            }
        }
    }

    fn set_theme(&mut self, theme: Theme) -> Vec<Effect> {
        if self.theme == theme {
            return vec![];
        }
        self.theme = theme;
        vec![Effect::PersistPreferences(self.preferences())]
    }

    fn join_waitlist(&mut self, email: String) -> Vec<Effect> {
        let WaitlistGate::Locked { pending, message } = &mut self.gate else {
            return vec![];
        };
        if *pending {
            return vec![];
        }

        let email = email.trim();
        if !is_plausible_email(email) {
            *message = Some("Enter a valid email address".to_string());
            return vec![];
        }

        *pending = true;
        *message = None;
        vec![Effect::SubmitWaitlist(email.to_string())]
    }

    fn on_waitlist(&mut self, result: Result<WaitlistResponse, DataError>) -> Vec<Effect> {
        if self.gate.is_granted() {
            return vec![];
        }

        match result {
            Ok(response) if response.success => {
                info!("waitlist joined, dashboard unlocked");
                self.gate = WaitlistGate::Granted;
                let mut effects = vec![Effect::PersistPreferences(self.preferences())];
                effects.extend(self.start());
                effects
            }
            Ok(response) => {
                self.gate = WaitlistGate::Locked {
                    pending: false,
                    message: Some(response.message),
                };
                vec![]
            }
            Err(error) => {
                warn!(%error, "waitlist request failed");
                self.gate = WaitlistGate::Locked {
                    pending: false,
                    message: Some(error.to_string()),
                };
                vec![]
            }
        }
    }

    fn send_chat(&mut self, message: String) -> Vec<Effect> {
        let message = message.trim();
        if message.is_empty() || self.chat.pending || !self.gate.is_granted() {
            return vec![];
        }
        let Some(region_id) = self.selected.clone() else {
            return vec![];
        };

        let request = ChatRequest {
            message: message.to_string(),
            region_id,
            history: self.chat.history.clone(),
        };
        self.chat.history.push(ChatMessage::user(message));
        self.chat.pending = true;
        self.chat.error = None;

        vec![Effect::SendChat {
            session: self.chat_session,
            request,
        }]
    }

    fn on_chat(
        &mut self,
        region_id: RegionId,
        session: u64,
        result: Result<ChatReply, DataError>,
    ) -> Vec<Effect> {
        if session != self.chat_session || self.selected.as_ref() != Some(&region_id) {
            debug!(%region_id, session, "discarding chat reply for previous session");
            return vec![];
        }

        self.chat.pending = false;
        match result {
            Ok(reply) => self.chat.history.push(ChatMessage::assistant(reply.response)),
            Err(error) => {
                warn!(%error, "chat request failed");
                self.chat.error = Some(DashboardError::new(ErrorKind::Chat, error.to_string()));
            }
        }
        vec![]
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}
