//! Terminal rendering and key bindings.

use crate::{
    config::Theme,
    controller::Command,
    state::{DashboardState, Panel, Phase, WaitlistGate},
};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use primordia_data::{
    AlertLevel, ChatRole, Polarity, Severity, SignalBundle, SignalView, SymbolRole,
    metrics::{ApproximateSeries, SignalReading},
};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, BorderType, Borders, Clear, Gauge, List, ListItem, Paragraph, Row, Sparkline,
        Table, Wrap,
    },
};

/// Colours for one [`Theme`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: Color,
    pub surface: Color,
    pub text: Color,
    pub muted: Color,
    pub accent: Color,
    pub border: Color,
    pub positive: Color,
    pub negative: Color,
    pub warning: Color,
    pub info: Color,
}

impl Palette {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self {
                background: Color::Rgb(18, 18, 28),
                surface: Color::Rgb(30, 30, 40),
                text: Color::Rgb(200, 200, 220),
                muted: Color::Rgb(128, 128, 150),
                accent: Color::Rgb(255, 215, 0),
                border: Color::Rgb(138, 43, 226),
                positive: Color::Rgb(0, 255, 127),
                negative: Color::Rgb(255, 69, 58),
                warning: Color::Rgb(255, 165, 0),
                info: Color::Rgb(100, 149, 237),
            },
            Theme::Light => Self {
                background: Color::Rgb(245, 245, 240),
                surface: Color::Rgb(225, 225, 218),
                text: Color::Rgb(30, 30, 40),
                muted: Color::Rgb(110, 110, 120),
                accent: Color::Rgb(176, 120, 0),
                border: Color::Rgb(90, 60, 160),
                positive: Color::Rgb(0, 140, 70),
                negative: Color::Rgb(200, 40, 40),
                warning: Color::Rgb(200, 110, 0),
                info: Color::Rgb(40, 90, 190),
            },
        }
    }

    pub fn polarity(&self, polarity: Polarity) -> Color {
        match polarity {
            Polarity::Positive => self.positive,
            Polarity::Negative => self.negative,
            Polarity::Neutral => self.muted,
        }
    }

    pub fn severity(&self, severity: Severity) -> Color {
        match severity {
            Severity::Low => self.positive,
            Severity::Moderate => self.info,
            Severity::Elevated => self.warning,
            Severity::Critical => self.negative,
        }
    }

    pub fn alert(&self, level: AlertLevel) -> Color {
        match level {
            AlertLevel::Ok => self.positive,
            AlertLevel::Info => self.info,
            AlertLevel::Warning => self.warning,
            AlertLevel::Critical => self.negative,
        }
    }

    fn block<'a>(&self, title: impl Into<String>) -> Block<'a> {
        Block::default()
            .title(Span::styled(
                format!(" {} ", title.into()),
                Style::default().fg(self.accent).add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(self.border))
            .style(Style::default().bg(self.background).fg(self.text))
    }
}

/// What typed characters are currently feeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    Chat,
}

/// Front-end only state: never seen by the controller.
#[derive(Debug, Clone, Default)]
pub struct UiState {
    pub mode: InputMode,
    pub input: String,
    pub quit: bool,
}

/// Translate a key press into a controller command, updating local input state.
pub fn command_for_key(key: KeyEvent, ui: &mut UiState, state: &DashboardState) -> Option<Command> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        ui.quit = true;
        return None;
    }

    // Locked dashboards only accept an email address
    if !state.gate.is_granted() {
        return match key.code {
            KeyCode::Esc => {
                ui.quit = true;
                None
            }
            KeyCode::Enter => Some(Command::JoinWaitlist(std::mem::take(&mut ui.input))),
            _ => {
                edit_input(&mut ui.input, key.code);
                None
            }
        };
    }

    if ui.mode == InputMode::Chat {
        return match key.code {
            KeyCode::Esc => {
                ui.mode = InputMode::Normal;
                ui.input.clear();
                state.panels.chat.then_some(Command::TogglePanel(Panel::Chat))
            }
            KeyCode::Enter => {
                ui.mode = InputMode::Normal;
                let message = std::mem::take(&mut ui.input);
                (!message.trim().is_empty()).then_some(Command::SendChat(message))
            }
            _ => {
                edit_input(&mut ui.input, key.code);
                None
            }
        };
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            ui.quit = true;
            None
        }
        KeyCode::Down | KeyCode::Char('j') => step_region(state, 1),
        KeyCode::Up | KeyCode::Char('k') => step_region(state, -1),
        KeyCode::Char(digit @ '1'..='9') => {
            let index = digit.to_digit(10)? as usize - 1;
            let region = state.regions.get(index)?;
            Some(Command::SelectRegion(region.id.clone()))
        }
        KeyCode::Char('r') if state.phase == Phase::Uninitialized => Some(Command::RetryStartup),
        KeyCode::Char('r') => Some(Command::Refresh),
        KeyCode::Char('t') => Some(Command::ToggleTheme),
        KeyCode::Char('a') => Some(Command::TogglePanel(Panel::Alerts)),
        KeyCode::Char('h') => Some(Command::TogglePanel(Panel::Headlines)),
        KeyCode::Char('i') => Some(Command::TogglePanel(Panel::Insight)),
        KeyCode::Char('m') => Some(Command::TogglePanel(Panel::Markets)),
        KeyCode::Char('e') => Some(Command::TogglePanel(Panel::Explanation)),
        KeyCode::Char('?') => Some(Command::TogglePanel(Panel::Help)),
        KeyCode::Char('c') => {
            ui.mode = InputMode::Chat;
            ui.input.clear();
            (!state.panels.chat).then_some(Command::TogglePanel(Panel::Chat))
        }
        _ => None,
    }
}

fn edit_input(input: &mut String, code: KeyCode) {
    match code {
        KeyCode::Char(c) => input.push(c),
        KeyCode::Backspace => {
            input.pop();
        }
        _ => {}
    }
}

fn step_region(state: &DashboardState, step: isize) -> Option<Command> {
    if state.regions.is_empty() {
        return None;
    }
    let len = state.regions.len() as isize;
    let current = state
        .selected
        .as_ref()
        .and_then(|selected| state.regions.iter().position(|region| &region.id == selected))
        .unwrap_or(0) as isize;
    let next = (current + step).rem_euclid(len) as usize;

    Some(Command::SelectRegion(state.regions[next].id.clone()))
}

/// Draw one frame.
pub fn render(f: &mut Frame, state: &DashboardState, ui: &UiState, map_enabled: bool) {
    let palette = Palette::for_theme(state.theme);
    let area = f.area();
    f.render_widget(
        Block::default().style(Style::default().bg(palette.background)),
        area,
    );

    if let WaitlistGate::Locked { pending, message } = &state.gate {
        render_waitlist(f, area, &palette, ui, *pending, message.as_deref());
        return;
    }

    let chat_visible = state.panels.chat || ui.mode == InputMode::Chat;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(10),
            Constraint::Length(if chat_visible { 8 } else { 1 }),
        ])
        .split(area);

    render_status_bar(f, chunks[0], state, &palette);

    if state.phase == Phase::Uninitialized {
        render_startup(f, chunks[1], state, &palette);
    } else {
        render_body(f, chunks[1], state, &palette, map_enabled);
    }

    if chat_visible {
        render_chat(f, chunks[2], state, ui, &palette);
    } else {
        render_key_hints(f, chunks[2], &palette);
    }

    if state.panels.help {
        render_help(f, area, &palette);
    }
}

fn render_status_bar(f: &mut Frame, area: Rect, state: &DashboardState, palette: &Palette) {
    let status_color = match state.phase {
        Phase::SignalsReady => palette.positive,
        Phase::Error => palette.negative,
        _ => palette.warning,
    };
    let status_symbol = if state.loading { "◌" } else { "●" };

    let region = state
        .selected_region()
        .map(|region| region.name.clone())
        .unwrap_or_else(|| "-".to_string());

    let updated = state
        .bundle
        .as_ref()
        .and_then(SignalBundle::observed_at)
        .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "never".to_string());

    let mut spans = vec![
        Span::styled(
            format!(" {} {} ", status_symbol, state.phase.label()),
            Style::default().fg(status_color).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            " ◆ PRIMORDIA DIVERGENCE INDEX ◆ ",
            Style::default().fg(palette.accent).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!(" {region} "), Style::default().fg(palette.text)),
        Span::styled(format!(" ⏱ {updated} "), Style::default().fg(palette.info)),
    ];

    if let Some(mode) = state
        .bundle
        .as_ref()
        .map(|bundle| bundle.data_mode.as_str())
        .filter(|mode| !mode.is_empty())
    {
        spans.push(Span::styled(
            format!(" [{}] ", mode.to_uppercase()),
            Style::default().fg(palette.muted),
        ));
    }
    if let Some(error) = &state.error {
        spans.push(Span::styled(
            format!(" ⚠ {} ", error.message),
            Style::default().fg(palette.negative),
        ));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Double)
        .border_style(Style::default().fg(palette.border))
        .style(Style::default().bg(palette.background));

    f.render_widget(
        Paragraph::new(Line::from(spans))
            .block(block)
            .alignment(Alignment::Center),
        area,
    );
}

fn render_waitlist(
    f: &mut Frame,
    area: Rect,
    palette: &Palette,
    ui: &UiState,
    pending: bool,
    message: Option<&str>,
) {
    let area = centered(area, 60, 11);
    let mut lines = vec![
        Line::from(Span::styled(
            "PRIMORDIA IS IN PRIVATE BETA",
            Style::default().fg(palette.accent).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("Join the waitlist to unlock the dashboard."),
        Line::from(""),
        Line::from(vec![
            Span::styled("Email: ", Style::default().fg(palette.muted)),
            Span::styled(
                format!("{}▏", ui.input),
                Style::default().fg(palette.text).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(""),
    ];

    if pending {
        lines.push(Line::from(Span::styled(
            "Submitting...",
            Style::default().fg(palette.info),
        )));
    } else if let Some(message) = message {
        lines.push(Line::from(Span::styled(
            message.to_string(),
            Style::default().fg(palette.warning),
        )));
    }
    lines.push(Line::from(Span::styled(
        "[Enter] Join  [Esc] Quit",
        Style::default().fg(palette.muted),
    )));

    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(lines)
            .block(palette.block("WAITLIST"))
            .alignment(Alignment::Center),
        area,
    );
}

fn render_startup(f: &mut Frame, area: Rect, state: &DashboardState, palette: &Palette) {
    let lines = match &state.error {
        Some(error) => vec![
            Line::from(Span::styled(
                "Unable to load regions",
                Style::default().fg(palette.negative).add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(error.message.clone()),
            Line::from(""),
            Line::from(Span::styled(
                "[R] Retry  [Q] Quit",
                Style::default().fg(palette.muted),
            )),
        ],
        None => vec![Line::from(Span::styled(
            "Loading regions...",
            Style::default().fg(palette.info),
        ))],
    };

    f.render_widget(
        Paragraph::new(lines)
            .block(palette.block("STARTING"))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true }),
        centered(area, 70, 9),
    );
}

fn render_body(f: &mut Frame, area: Rect, state: &DashboardState, palette: &Palette, map_enabled: bool) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(28),
            Constraint::Percentage(45),
            Constraint::Min(30),
        ])
        .split(area);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(7), Constraint::Length(8)])
        .split(columns[0]);
    render_regions(f, left[0], state, palette);
    render_map(f, left[1], state, palette, map_enabled);

    match (&state.bundle, &state.view) {
        (Some(bundle), Some(view)) => {
            let middle = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(12), Constraint::Min(8)])
                .split(columns[1]);
            render_signals(f, middle[0], view, palette);
            render_divergence(f, middle[1], bundle, view, palette);
            render_side_panels(f, columns[2], state, bundle, view, palette);
        }
        _ => {
            let text = if state.loading {
                "Fetching signals..."
            } else {
                "No signals for this region yet. [R] Refresh"
            };
            f.render_widget(
                Paragraph::new(Span::styled(text, Style::default().fg(palette.muted)))
                    .block(palette.block("SIGNALS"))
                    .alignment(Alignment::Center),
                columns[1],
            );
        }
    }
}

fn render_regions(f: &mut Frame, area: Rect, state: &DashboardState, palette: &Palette) {
    let items: Vec<ListItem> = state
        .regions
        .iter()
        .enumerate()
        .map(|(index, region)| {
            let selected = state.selected.as_ref() == Some(&region.id);
            let (marker, style) = if selected {
                (
                    "▶",
                    Style::default()
                        .fg(palette.accent)
                        .bg(palette.surface)
                        .add_modifier(Modifier::BOLD),
                )
            } else {
                (" ", Style::default().fg(palette.text))
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{marker}{} ", index + 1), style),
                Span::styled(region.name.clone(), style),
            ]))
        })
        .collect();

    f.render_widget(List::new(items).block(palette.block("REGIONS")), area);
}

fn render_map(f: &mut Frame, area: Rect, state: &DashboardState, palette: &Palette, map_enabled: bool) {
    let mut lines = Vec::new();
    if let Some(region) = state.selected_region() {
        lines.push(Line::from(Span::styled(
            region.category.to_uppercase(),
            Style::default().fg(palette.info),
        )));
        lines.push(Line::from(format!(
            "◎ {:.3}, {:.3}",
            region.centroid.lat, region.centroid.lng
        )));
        lines.push(Line::from(Span::styled(
            format!(
                "[{:.1} {:.1} {:.1} {:.1}]",
                region.bbox.west, region.bbox.south, region.bbox.east, region.bbox.north
            ),
            Style::default().fg(palette.muted),
        )));
    }
    if !map_enabled {
        lines.push(Line::from(Span::styled(
            "Map unavailable: no token",
            Style::default().fg(palette.warning),
        )));
    }

    f.render_widget(
        Paragraph::new(lines)
            .block(palette.block("MAP"))
            .wrap(Wrap { trim: true }),
        area,
    );
}

fn render_signals(f: &mut Frame, area: Rect, view: &SignalView, palette: &Palette) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3); 4])
        .split(area);

    render_gauge(f, rows[0], "SATELLITE", Some(view.satellite), palette);
    render_gauge(f, rows[1], "NEWS", Some(view.news), palette);
    render_gauge(f, rows[2], "MARKET", view.market, palette);

    match view.fusion {
        Some(fusion) => render_gauge(
            f,
            rows[3],
            &format!("PHYSICAL FUSION · {:.0}% agree", fusion.agreement_pct),
            Some(fusion.signal),
            palette,
        ),
        None => render_gauge(f, rows[3], "PHYSICAL FUSION", None, palette),
    }
}

fn render_gauge(f: &mut Frame, area: Rect, title: &str, reading: Option<SignalReading>, palette: &Palette) {
    let block = palette.block(title);
    let Some(reading) = reading else {
        f.render_widget(
            Paragraph::new(Span::styled("n/a", Style::default().fg(palette.muted)))
                .block(block)
                .alignment(Alignment::Center),
            area,
        );
        return;
    };

    let gauge = Gauge::default()
        .block(block)
        .gauge_style(
            Style::default()
                .fg(palette.polarity(reading.polarity))
                .bg(palette.surface),
        )
        .ratio(reading.bar_width_pct / 100.0)
        .label(Span::styled(
            format!(" {:+.2} {} ", reading.value, reading.polarity.label()),
            Style::default().fg(palette.text).add_modifier(Modifier::BOLD),
        ));

    f.render_widget(gauge, area);
}

fn render_divergence(
    f: &mut Frame,
    area: Rect,
    bundle: &SignalBundle,
    view: &SignalView,
    palette: &Palette,
) {
    let block = palette.block("DIVERGENCE");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)])
        .split(inner);

    let severity_color = palette.severity(view.severity);
    let lines = vec![
        Line::from(vec![
            Span::styled(
                format!("{:.1}", bundle.divergence_score),
                Style::default().fg(severity_color).add_modifier(Modifier::BOLD),
            ),
            Span::styled(" / 100  ", Style::default().fg(palette.muted)),
            Span::styled(
                view.severity.label(),
                Style::default().fg(severity_color).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            Span::styled("Activity ", Style::default().fg(palette.muted)),
            Span::styled(
                format!("{} {}", view.trend.arrow(), view.trend.label()),
                Style::default().fg(palette.text),
            ),
            Span::styled(
                format!("  {:+.1}%", bundle.satellite_raw.activity_delta_pct),
                Style::default().fg(palette.info),
            ),
        ]),
        Line::from(vec![
            Span::styled("Hype ", Style::default().fg(palette.muted)),
            Span::styled(
                format!("{:.0}/100", bundle.news_raw.hype_intensity),
                Style::default().fg(palette.warning),
            ),
            Span::styled(
                format!("  conf {:.0}%", bundle.satellite_raw.confidence * 100.0),
                Style::default().fg(palette.muted),
            ),
        ]),
    ];
    f.render_widget(Paragraph::new(lines), chunks[0]);

    render_history(f, chunks[1], &view.divergence_history, severity_color, palette);
}

fn render_history(
    f: &mut Frame,
    area: Rect,
    series: &ApproximateSeries,
    color: Color,
    palette: &Palette,
) {
    let data: Vec<u64> = series
        .points
        .iter()
        .map(|point| point.round().max(0.0) as u64)
        .collect();

    let title = if series.is_approximate() {
        format!("7D trend ({})", ApproximateSeries::LABEL)
    } else {
        "7D trend".to_string()
    };

    let sparkline = Sparkline::default()
        .block(
            Block::default()
                .title(Span::styled(title, Style::default().fg(palette.muted)))
                .borders(Borders::TOP)
                .border_style(Style::default().fg(palette.surface)),
        )
        .data(&data)
        .style(Style::default().fg(color))
        .max(100);

    f.render_widget(sparkline, area);
}

fn render_side_panels(
    f: &mut Frame,
    area: Rect,
    state: &DashboardState,
    bundle: &SignalBundle,
    view: &SignalView,
    palette: &Palette,
) {
    let panels: Vec<Panel> = [
        Panel::Alerts,
        Panel::Headlines,
        Panel::Insight,
        Panel::Markets,
        Panel::Explanation,
    ]
    .into_iter()
    .filter(|panel| state.panels.is_visible(*panel))
    .collect();

    if panels.is_empty() {
        return;
    }

    let constraints = vec![Constraint::Ratio(1, panels.len() as u32); panels.len()];
    let areas = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    for (panel, area) in panels.into_iter().zip(areas.iter().copied()) {
        match panel {
            Panel::Alerts => render_alerts(f, area, view, palette),
            Panel::Headlines => render_headlines(f, area, bundle, palette),
            Panel::Insight => render_insight(f, area, bundle, palette),
            Panel::Markets => render_markets(f, area, state, bundle, palette),
            Panel::Explanation => render_explanation(f, area, bundle, palette),
            Panel::Chat | Panel::Help => {}
        }
    }
}

fn render_alerts(f: &mut Frame, area: Rect, view: &SignalView, palette: &Palette) {
    let items: Vec<ListItem> = if view.alerts.is_empty() {
        vec![ListItem::new(Span::styled(
            "No active alerts",
            Style::default().fg(palette.muted),
        ))]
    } else {
        view.alerts
            .iter()
            .map(|alert| {
                let color = palette.alert(alert.level);
                let text = match &alert.title {
                    Some(title) => format!("{title}: {}", alert.message),
                    None => alert.message.clone(),
                };
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{:<5}", alert.level.label()),
                        Style::default().fg(color).add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(text, Style::default().fg(palette.text)),
                ]))
            })
            .collect()
    };

    f.render_widget(List::new(items).block(palette.block("ALERTS")), area);
}

fn render_headlines(f: &mut Frame, area: Rect, bundle: &SignalBundle, palette: &Palette) {
    let items: Vec<ListItem> = bundle
        .news_raw
        .headlines
        .iter()
        .take(area.height.saturating_sub(2) as usize)
        .map(|headline| {
            let polarity = Polarity::classify(headline.sentiment);
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:+.2} ", headline.sentiment),
                    Style::default().fg(palette.polarity(polarity)),
                ),
                Span::styled(headline.title.clone(), Style::default().fg(palette.text)),
                Span::styled(
                    format!("  {}", headline.source),
                    Style::default().fg(palette.muted),
                ),
            ]))
        })
        .collect();

    let volume = bundle
        .news_raw
        .headline_volume
        .max(bundle.news_raw.headlines.len() as u32);
    let title = format!("HEADLINES · {volume}");
    f.render_widget(List::new(items).block(palette.block(title)), area);
}

fn render_insight(f: &mut Frame, area: Rect, bundle: &SignalBundle, palette: &Palette) {
    let lines = match &bundle.ai_insight {
        Some(insight) => {
            let mut lines = vec![
                Line::from(Span::styled(
                    format!(
                        "{} · confidence {:.0}%",
                        Polarity::classify(insight.sentiment_score).label(),
                        insight.confidence * 100.0
                    ),
                    Style::default().fg(palette.polarity(Polarity::classify(insight.sentiment_score))),
                )),
                Line::from(insight.summary.clone()),
            ];
            if !insight.key_themes.is_empty() {
                lines.push(Line::from(Span::styled(
                    format!("Themes: {}", insight.key_themes.join(", ")),
                    Style::default().fg(palette.info),
                )));
            }
            if !insight.risk_factors.is_empty() {
                lines.push(Line::from(Span::styled(
                    format!("Risks: {}", insight.risk_factors.join(", ")),
                    Style::default().fg(palette.warning),
                )));
            }
            lines
        }
        None => vec![Line::from(Span::styled(
            "No AI insight for this update",
            Style::default().fg(palette.muted),
        ))],
    };

    f.render_widget(
        Paragraph::new(lines)
            .block(palette.block("AI INSIGHT"))
            .wrap(Wrap { trim: true }),
        area,
    );
}

fn render_markets(
    f: &mut Frame,
    area: Rect,
    state: &DashboardState,
    bundle: &SignalBundle,
    palette: &Palette,
) {
    let rows: Vec<Row> = state
        .market_symbols()
        .iter()
        .map(|symbol| {
            let quote = bundle
                .market_data
                .as_ref()
                .filter(|data| data.ticker.eq_ignore_ascii_case(symbol.ticker));
            let (price, change, change_color) = match quote {
                Some(data) => (
                    format!("{:.2}", data.price),
                    format!("{:+.2}%", data.change_pct),
                    if data.change_pct >= 0.0 {
                        palette.positive
                    } else {
                        palette.negative
                    },
                ),
                None => ("-".to_string(), "-".to_string(), palette.muted),
            };
            let ticker_style = match symbol.role {
                SymbolRole::Primary => Style::default().fg(palette.accent).add_modifier(Modifier::BOLD),
                SymbolRole::Secondary => Style::default().fg(palette.text),
            };

            Row::new(vec![
                Span::styled(symbol.ticker, ticker_style),
                Span::styled(symbol.name, Style::default().fg(palette.muted)),
                Span::styled(price, Style::default().fg(palette.text)),
                Span::styled(change, Style::default().fg(change_color)),
            ])
            .height(1)
        })
        .collect();

    let header = Row::new(vec!["TICKER", "NAME", "PRICE", "CHG"])
        .style(Style::default().fg(palette.info).add_modifier(Modifier::BOLD));

    let table = Table::new(
        rows,
        [
            Constraint::Length(7),
            Constraint::Min(10),
            Constraint::Length(9),
            Constraint::Length(8),
        ],
    )
    .header(header)
    .block(palette.block("MARKETS"));

    f.render_widget(table, area);
}

fn render_explanation(f: &mut Frame, area: Rect, bundle: &SignalBundle, palette: &Palette) {
    let explanation = &bundle.explanation;
    let label = |name: &'static str| Span::styled(name, Style::default().fg(palette.info));
    let mut lines = Vec::new();

    for (name, text) in [
        ("SAT  ", &explanation.sat_agent),
        ("NEWS ", &explanation.news_agent),
        ("MKT  ", &explanation.market_agent),
    ] {
        if !text.is_empty() {
            lines.push(Line::from(vec![label(name), Span::raw(text.clone())]));
        }
    }
    if !explanation.synthesis.is_empty() {
        lines.push(Line::from(Span::styled(
            explanation.synthesis.clone(),
            Style::default().fg(palette.accent),
        )));
    }
    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "No explanation available",
            Style::default().fg(palette.muted),
        )));
    }

    f.render_widget(
        Paragraph::new(lines)
            .block(palette.block("EXPLANATION"))
            .wrap(Wrap { trim: true }),
        area,
    );
}

fn render_chat(f: &mut Frame, area: Rect, state: &DashboardState, ui: &UiState, palette: &Palette) {
    let visible = area.height.saturating_sub(3) as usize;
    let history = &state.chat.history;
    let mut lines: Vec<Line> = history
        .iter()
        .skip(history.len().saturating_sub(visible))
        .map(|message| {
            let (who, color) = match message.role {
                ChatRole::User => ("you", palette.info),
                ChatRole::Assistant => ("ai ", palette.accent),
            };
            Line::from(vec![
                Span::styled(format!("{who} › "), Style::default().fg(color)),
                Span::styled(message.content.clone(), Style::default().fg(palette.text)),
            ])
        })
        .collect();

    let prompt = if state.chat.pending {
        Span::styled("thinking...", Style::default().fg(palette.muted))
    } else if let Some(error) = &state.chat.error {
        Span::styled(error.message.clone(), Style::default().fg(palette.negative))
    } else if ui.mode == InputMode::Chat {
        Span::styled(format!("› {}▏", ui.input), Style::default().fg(palette.text))
    } else {
        Span::styled("[C] Ask about this region", Style::default().fg(palette.muted))
    };
    lines.push(Line::from(prompt));

    f.render_widget(
        Paragraph::new(lines)
            .block(palette.block("CHAT"))
            .wrap(Wrap { trim: false }),
        area,
    );
}

fn render_key_hints(f: &mut Frame, area: Rect, palette: &Palette) {
    f.render_widget(
        Paragraph::new(Span::styled(
            " [↑↓/1-9] Region  [R] Refresh  [C] Chat  [T] Theme  [?] Help  [Q] Quit ",
            Style::default().fg(palette.muted),
        ))
        .alignment(Alignment::Center),
        area,
    );
}

fn render_help(f: &mut Frame, area: Rect, palette: &Palette) {
    let bindings = [
        ("↑ ↓ / j k", "previous / next region"),
        ("1-9", "jump to region"),
        ("r", "refresh (retry on startup failure)"),
        ("a h i m e", "toggle alerts, headlines, insight, markets, explanation"),
        ("c", "chat about the selected region"),
        ("t", "toggle dark / light theme"),
        ("?", "close this help"),
        ("q / Esc", "quit"),
    ];
    let lines: Vec<Line> = bindings
        .iter()
        .map(|(keys, action)| {
            Line::from(vec![
                Span::styled(
                    format!("{keys:>10}  "),
                    Style::default().fg(palette.accent).add_modifier(Modifier::BOLD),
                ),
                Span::styled(*action, Style::default().fg(palette.text)),
            ])
        })
        .collect();

    let area = centered(area, 72, lines.len() as u16 + 2);
    f.render_widget(Clear, area);
    f.render_widget(Paragraph::new(lines).block(palette.block("HELP")), area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
