use ratatui::{
    Frame,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::ListItem,
};

use crate::{app::BotState, ui::theme::Theme};

pub fn render(frame: &mut Frame<'_>, area: Rect, bot: &BotState) {
    let theme = Theme::default();
    let Some(aggregate) = &bot.aggregate else {
        super::render_empty(frame, area, "Channels", "Loading...", &theme);
        return;
    };

    let items = aggregate
        .channels
        .iter()
        .map(|channel| {
            let username = channel
                .username
                .as_deref()
                .map(|u| format!("@{u}"))
                .unwrap_or_default();
            let categories = channel
                .categories
                .iter()
                .map(|category| category.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let activity = if channel.is_active {
                Span::styled("on ", Style::default().fg(theme.positive))
            } else {
                Span::styled("off", Style::default().fg(theme.text_muted))
            };
            ListItem::new(Line::from(vec![
                activity,
                Span::raw(format!("  {:<30} {:<20} ", channel.title, username)),
                Span::styled(categories, Style::default().fg(theme.text_muted)),
            ]))
        })
        .collect();

    super::render_list(frame, area, "Channels", items, bot.selected, &theme);
}
