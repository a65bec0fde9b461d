use ratatui::{
    Frame,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::ListItem,
};

use api_types::bot::BotStatus;

use crate::{app::AppState, ui::theme::Theme};

pub fn render(frame: &mut Frame<'_>, area: Rect, state: &AppState) {
    let theme = Theme::default();
    if state.bots.items.is_empty() {
        let message = match &state.bots.error {
            Some(error) => format!("Could not load bots: {error}"),
            None if state.bots.loading => "Loading bots...".to_string(),
            None => "No bots configured.".to_string(),
        };
        super::render_empty(frame, area, "Bots", &message, &theme);
        return;
    }

    let items = state
        .bots
        .items
        .iter()
        .map(|aggregate| {
            let bot = &aggregate.bot;
            ListItem::new(Line::from(vec![
                Span::raw(format!("{:<28}", bot.name)),
                Span::styled(
                    format!("{:<8}", bot.status.as_str()),
                    status_style(bot.status, &theme),
                ),
                Span::raw(format!(
                    "  {:>3} channels  {:>3} categories  {:>4} AI results",
                    aggregate.channels_count, aggregate.categories_count, aggregate.ai_results_count
                )),
            ]))
        })
        .collect();

    super::render_list(frame, area, "Bots", items, state.bots.selected, &theme);
}

pub fn status_style(status: BotStatus, theme: &Theme) -> Style {
    match status {
        BotStatus::Active => Style::default().fg(theme.positive),
        BotStatus::Setup => Style::default().fg(theme.warning),
        BotStatus::Paused => Style::default().fg(theme.text_muted),
    }
}
