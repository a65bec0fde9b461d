use ratatui::{
    Frame,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::ListItem,
};

use crate::{
    app::{BotState, CategoriesMode},
    ui::theme::Theme,
};

pub fn render(frame: &mut Frame<'_>, area: Rect, bot: &BotState) {
    match bot.mode {
        CategoriesMode::List => render_attached(frame, area, bot),
        CategoriesMode::Pick => render_picker(frame, area, bot),
    }
}

fn render_attached(frame: &mut Frame<'_>, area: Rect, bot: &BotState) {
    let theme = Theme::default();
    if bot.aggregate.is_none() {
        super::render_empty(frame, area, "Categories", "Loading...", &theme);
        return;
    }

    let items = bot
        .categories()
        .into_iter()
        .map(|category| {
            let pending = bot.priorities.get(&category.id).is_some();
            let marker = if pending {
                Span::styled("*", Style::default().fg(theme.warning))
            } else {
                Span::raw(" ")
            };
            ListItem::new(Line::from(vec![
                Span::raw(format!("{:>6.1}", category.priority_or_default())),
                marker,
                Span::raw(format!(" {}", category.name)),
            ]))
        })
        .collect();

    let title = if bot.priorities.is_dirty() {
        format!("Categories ({} unsaved)", bot.priorities.len())
    } else {
        "Categories".to_string()
    };
    super::render_list(frame, area, &title, items, bot.selected, &theme);
}

fn render_picker(frame: &mut Frame<'_>, area: Rect, bot: &BotState) {
    let theme = Theme::default();
    let items = bot
        .available
        .iter()
        .map(|category| {
            let check = if bot.picked.contains(&category.id) {
                "[x]"
            } else {
                "[ ]"
            };
            ListItem::new(Line::from(format!("{check} {}", category.name)))
        })
        .collect();

    let title = format!("Add categories ({} selected)", bot.picked.len());
    super::render_list(frame, area, &title, items, bot.pick_cursor, &theme);
}
