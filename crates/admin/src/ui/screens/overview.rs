use ratatui::{
    Frame,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::{
    app::BotState,
    ui::{screens::bots::status_style, theme::Theme},
};

pub fn render(frame: &mut Frame<'_>, area: Rect, bot: &BotState) {
    let theme = Theme::default();
    let Some(aggregate) = &bot.aggregate else {
        super::render_empty(frame, area, "Overview", "Loading...", &theme);
        return;
    };
    let info = &aggregate.bot;

    let limit = |value: Option<u32>| value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string());
    let token = if info.bot_token.as_deref().is_some_and(|t| !t.is_empty()) {
        "set"
    } else {
        "missing"
    };

    let lines = vec![
        Line::from(vec![
            Span::styled("Status", Style::default().fg(theme.text_muted)),
            Span::raw(": "),
            Span::styled(info.status.as_str(), status_style(info.status, &theme)),
        ]),
        super::field("Language", super::or_dash(info.default_language.as_deref()), &theme),
        super::field("Timezone", super::or_dash(info.timezone.as_deref()), &theme),
        super::field("Token", token.to_string(), &theme),
        super::field("Posts per digest", limit(info.max_posts_per_digest), &theme),
        super::field("Summary length", limit(info.max_summary_length), &theme),
        super::field(
            "Updated",
            info.updated_at
                .map(|dt| dt.format("%d %b %Y %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string()),
            &theme,
        ),
        Line::from(""),
        super::field("Channels", aggregate.channels_count.to_string(), &theme),
        super::field("Categories", aggregate.categories_count.to_string(), &theme),
        super::field("AI results", aggregate.ai_results_count.to_string(), &theme),
        Line::from(""),
        super::field("Description", super::or_dash(info.description.as_deref()), &theme),
    ];

    let block = Block::default()
        .title(info.name.clone())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border));
    frame.render_widget(
        Paragraph::new(lines).wrap(Wrap { trim: true }).block(block),
        area,
    );
}
