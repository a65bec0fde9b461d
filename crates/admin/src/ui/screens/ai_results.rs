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
        super::render_empty(frame, area, "AI results", "Loading...", &theme);
        return;
    };

    let score = |value: Option<f64>| {
        value
            .map(|v| format!("{v:.1}"))
            .unwrap_or_else(|| " - ".to_string())
    };

    let items = aggregate
        .ai_results
        .iter()
        .map(|result| {
            let when = result
                .processed_at
                .map(|dt| dt.format("%d %b %H:%M").to_string())
                .unwrap_or_else(|| "--".to_string());
            ListItem::new(Line::from(vec![
                Span::styled(format!("{when:<13}"), Style::default().fg(theme.text_muted)),
                Span::raw(format!(
                    "imp {} urg {} sig {}  ",
                    score(result.importance),
                    score(result.urgency),
                    score(result.significance)
                )),
                Span::raw(result.summary.clone().unwrap_or_default()),
            ]))
        })
        .collect();

    let title = format!("AI results ({})", aggregate.ai_results_count);
    super::render_list(frame, area, &title, items, bot.selected, &theme);
}
