pub mod ai_results;
pub mod bots;
pub mod categories;
pub mod channels;
pub mod overview;

use ratatui::{
    Frame,
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};

use crate::ui::theme::Theme;

/// Renders `items` as a bordered list with `selected` highlighted.
fn render_list(
    frame: &mut Frame<'_>,
    area: Rect,
    title: &str,
    items: Vec<ListItem<'static>>,
    selected: usize,
    theme: &Theme,
) {
    if items.is_empty() {
        render_empty(frame, area, title, "Nothing here yet.", theme);
        return;
    }

    let mut list_state = ListState::default();
    list_state.select(Some(selected.min(items.len() - 1)));

    let list = List::new(items)
        .block(
            Block::default()
                .title(title.to_string())
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.border)),
        )
        .highlight_style(
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("» ");

    frame.render_stateful_widget(list, area, &mut list_state);
}

fn render_empty(frame: &mut Frame<'_>, area: Rect, title: &str, message: &str, theme: &Theme) {
    let block = Block::default()
        .title(title.to_string())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border));
    let content = Paragraph::new(Line::from(Span::styled(
        message.to_string(),
        Style::default().fg(theme.text_muted),
    )))
    .alignment(Alignment::Center)
    .block(block);
    frame.render_widget(content, area);
}

fn field(label: &'static str, value: String, theme: &Theme) -> Line<'static> {
    Line::from(vec![
        Span::styled(label, Style::default().fg(theme.text_muted)),
        Span::raw(format!(": {value}")),
    ])
}

fn or_dash(value: Option<&str>) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or("-")
        .to_string()
}
