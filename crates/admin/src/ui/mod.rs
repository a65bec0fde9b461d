pub mod components;
pub mod keymap;
pub mod screens;

mod terminal;
mod theme;

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
};

use crate::app::{AppState, BotState, CategoriesMode, Screen, Tab};
use components::hints::{KeyHint, hints_to_spans};

pub use terminal::{AppTerminal as Terminal, restore_terminal, setup_terminal};
pub use theme::Theme;

const BOTS_HINTS: &[KeyHint] = &[
    KeyHint::new("j/k", "move"),
    KeyHint::new("Enter", "open"),
    KeyHint::new("p", "pause/resume"),
    KeyHint::new("r", "refresh"),
];

const BOT_HINTS: &[KeyHint] = &[
    KeyHint::new("Esc", "back"),
    KeyHint::new("p", "pause/resume"),
    KeyHint::new("r", "refresh"),
];

const CHANNEL_HINTS: &[KeyHint] = &[
    KeyHint::new("Esc", "back"),
    KeyHint::new("d", "detach"),
    KeyHint::new("r", "refresh"),
];

const CATEGORY_HINTS: &[KeyHint] = &[
    KeyHint::new("+/-", "priority"),
    KeyHint::new("s", "save"),
    KeyHint::new("u", "undo"),
    KeyHint::new("a", "add"),
    KeyHint::new("d", "detach"),
];

const PICK_HINTS: &[KeyHint] = &[
    KeyHint::new("Space", "select"),
    KeyHint::new("Enter", "attach"),
    KeyHint::new("Esc", "cancel"),
];

pub fn render(frame: &mut Frame<'_>, state: &AppState) {
    let area = frame.area();
    let theme = Theme::default();

    match (state.screen, state.bot.as_ref()) {
        (Screen::Bot, Some(bot)) => render_bot(frame, area, state, bot, &theme),
        _ => render_bots(frame, area, state, &theme),
    }

    components::toast::render(frame, area, state.toast.as_ref());
}

fn render_bots(frame: &mut Frame<'_>, area: Rect, state: &AppState, theme: &Theme) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    render_info_bar(frame, layout[0], state, None, theme);
    screens::bots::render(frame, layout[1], state);
    render_bottom_bar(frame, layout[2], BOTS_HINTS, theme);
}

fn render_bot(frame: &mut Frame<'_>, area: Rect, state: &AppState, bot: &BotState, theme: &Theme) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Info bar
            Constraint::Length(2), // Tab bar
            Constraint::Min(0),
            Constraint::Length(1), // Bottom bar
        ])
        .split(area);

    render_info_bar(frame, layout[0], state, Some(bot), theme);
    components::tabs::render_tabs(frame, layout[1], bot.tab, theme);

    let content = layout[2];
    match bot.tab {
        Tab::Overview => screens::overview::render(frame, content, bot),
        Tab::Channels => screens::channels::render(frame, content, bot),
        Tab::Categories => screens::categories::render(frame, content, bot),
        Tab::AiResults => screens::ai_results::render(frame, content, bot),
    }

    let hints = match (bot.tab, bot.mode) {
        (Tab::Categories, CategoriesMode::Pick) => PICK_HINTS,
        (Tab::Categories, CategoriesMode::List) => CATEGORY_HINTS,
        (Tab::Channels, _) => CHANNEL_HINTS,
        _ => BOT_HINTS,
    };
    render_bottom_bar(frame, layout[3], hints, theme);
}

fn render_info_bar(
    frame: &mut Frame<'_>,
    area: Rect,
    state: &AppState,
    bot: Option<&BotState>,
    theme: &Theme,
) {
    let refresh = state
        .last_refresh
        .map(|dt| dt.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());

    let mut spans = vec![
        Span::styled("Backend", Style::default().fg(theme.text_muted)),
        Span::raw(format!(": {}  ", state.base_url)),
        Span::styled("Refresh", Style::default().fg(theme.text_muted)),
        Span::raw(format!(": {refresh}  ")),
    ];

    let error = match bot {
        Some(bot) => bot.error.as_ref(),
        None => state.bots.error.as_ref(),
    };

    if let Some(bot) = bot {
        let name = bot
            .aggregate
            .as_ref()
            .map(|aggregate| aggregate.bot.name.clone())
            .unwrap_or_else(|| format!("#{}", bot.bot_id));
        spans.push(Span::styled("Bot", Style::default().fg(theme.text_muted)));
        spans.push(Span::raw(format!(": {name}  ")));
        if bot.priorities.is_dirty() {
            spans.push(Span::styled(
                format!("{} unsaved", bot.priorities.len()),
                Style::default().fg(theme.warning),
            ));
            spans.push(Span::raw("  "));
        }
    }
    if let Some(error) = error {
        spans.push(Span::styled(error.clone(), Style::default().fg(theme.error)));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_bottom_bar(frame: &mut Frame<'_>, area: Rect, hints: &[KeyHint], theme: &Theme) {
    let mut parts = hints_to_spans(hints, theme);

    parts.push(Span::styled("  │  ", Style::default().fg(theme.border)));
    parts.push(Span::styled("q", Style::default().fg(theme.accent)));
    parts.push(Span::raw(" quit"));

    frame.render_widget(Paragraph::new(Line::from(parts)), area);
}
