use std::{
    collections::BTreeSet,
    time::{Duration, Instant},
};

use api_types::category::{Category, sort_by_priority};
use chrono::{DateTime, Local};
use crossterm::event::{self, Event, KeyEvent};
use digest_client::{
    Aggregator, ApiClient, BotAggregate, ClientError, CycleOutcome, Failure, FlushReport,
    FlushTrigger, Poller, Snapshot,
    buffer::{PriorityBuffer, priority_writer},
};
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    config::AppConfig,
    error::{AppError, Result},
    ui::{
        self,
        keymap::{AppAction, map_key},
    },
};

const TOAST_TTL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Bots,
    Bot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Overview,
    Channels,
    Categories,
    AiResults,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Overview, Tab::Channels, Tab::Categories, Tab::AiResults];

    pub fn label(self) -> &'static str {
        match self {
            Self::Overview => "Overview",
            Self::Channels => "Channels",
            Self::Categories => "Categories",
            Self::AiResults => "AI results",
        }
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|tab| *tab == self).unwrap_or(0)
    }

    fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    fn prev(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct ToastState {
    pub message: String,
    pub level: ToastLevel,
    expires_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoriesMode {
    List,
    Pick,
}

#[derive(Debug, Default)]
pub struct BotsState {
    pub items: Vec<BotAggregate>,
    pub selected: usize,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct BotState {
    pub bot_id: i64,
    pub aggregate: Option<BotAggregate>,
    pub tab: Tab,
    pub selected: usize,
    pub priorities: PriorityBuffer,
    pub mode: CategoriesMode,
    pub available: Vec<Category>,
    pub picked: BTreeSet<i64>,
    pub pick_cursor: usize,
    pub error: Option<String>,
}

impl BotState {
    fn new(bot_id: i64) -> Self {
        Self {
            bot_id,
            aggregate: None,
            tab: Tab::Overview,
            selected: 0,
            priorities: PriorityBuffer::new(),
            mode: CategoriesMode::List,
            available: Vec::new(),
            picked: BTreeSet::new(),
            pick_cursor: 0,
            error: None,
        }
    }

    /// Categories in display order with pending edits applied.
    pub fn categories(&self) -> Vec<Category> {
        let Some(aggregate) = &self.aggregate else {
            return Vec::new();
        };
        let mut categories: Vec<Category> = aggregate
            .categories
            .iter()
            .cloned()
            .map(|mut category| {
                let server = category.priority_or_default();
                category.priority = Some(self.priorities.value_or(&category.id, server));
                category
            })
            .collect();
        sort_by_priority(&mut categories);
        categories
    }

    fn rows(&self) -> usize {
        let Some(aggregate) = &self.aggregate else {
            return 0;
        };
        match self.tab {
            Tab::Overview => 0,
            Tab::Channels => aggregate.channels.len(),
            Tab::Categories => aggregate.categories.len(),
            Tab::AiResults => aggregate.ai_results.len(),
        }
    }
}

#[derive(Debug)]
pub struct AppState {
    pub screen: Screen,
    pub bots: BotsState,
    pub bot: Option<BotState>,
    pub toast: Option<ToastState>,
    pub base_url: String,
    pub last_refresh: Option<DateTime<Local>>,
}

impl AppState {
    fn notify(&mut self, level: ToastLevel, message: impl Into<String>) {
        self.toast = Some(ToastState {
            message: message.into(),
            level,
            expires_at: Instant::now() + TOAST_TTL,
        });
    }
}

/// A running poller with the receivers the event loop drains.
struct Feed<T> {
    poller: Poller<T>,
    values: watch::Receiver<Option<Snapshot<T>>>,
    failures: watch::Receiver<Option<Failure>>,
}

impl<T: Send + Sync + 'static> Feed<T> {
    fn new(poller: Poller<T>) -> Self {
        Self {
            values: poller.subscribe(),
            failures: poller.subscribe_failures(),
            poller,
        }
    }

    /// Latest applied value, if it changed since the last call.
    fn take_value(&mut self) -> Option<T>
    where
        T: Clone,
    {
        if !self.values.has_changed().unwrap_or(false) {
            return None;
        }
        self.values
            .borrow_and_update()
            .as_ref()
            .map(|snapshot| snapshot.value.clone())
    }

    /// Published failure state, if it changed since the last call. `Some(None)`
    /// means an earlier failure was cleared.
    fn take_failure(&mut self) -> Option<Option<String>> {
        if !self.failures.has_changed().unwrap_or(false) {
            return None;
        }
        Some(
            self.failures
                .borrow_and_update()
                .as_ref()
                .map(|failure| failure.message.clone()),
        )
    }
}

pub struct App {
    config: AppConfig,
    client: ApiClient,
    aggregator: Aggregator,
    bots_feed: Option<Feed<Vec<BotAggregate>>>,
    bot_feed: Option<Feed<BotAggregate>>,
    detached: Vec<JoinHandle<FlushReport<i64>>>,
    pub state: AppState,
    should_quit: bool,
}

impl App {
    pub fn new(config: AppConfig) -> Result<Self> {
        let client_config = config.client();
        let client = ApiClient::new(&client_config)?;
        let aggregator = Aggregator::new(client.clone(), client_config.ai_results_limit);
        let state = AppState {
            screen: Screen::Bots,
            bots: BotsState::default(),
            bot: None,
            toast: None,
            base_url: config.base_url.clone(),
            last_refresh: None,
        };

        Ok(Self {
            config,
            client,
            aggregator,
            bots_feed: None,
            bot_feed: None,
            detached: Vec::new(),
            state,
            should_quit: false,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        tracing::info!("digest admin connecting to {}", self.state.base_url);
        self.start_bots_poller();

        let mut terminal = ui::setup_terminal()?;
        let result = self.event_loop(&mut terminal).await;
        ui::restore_terminal(&mut terminal)?;

        self.teardown().await;
        result
    }

    async fn event_loop(&mut self, terminal: &mut ui::Terminal) -> Result<()> {
        let tick_rate = Duration::from_millis(200);

        while !self.should_quit {
            self.sync_pollers();
            self.expire_toast();

            terminal
                .draw(|frame| ui::render(frame, &self.state))
                .map_err(|err| AppError::Terminal(err.to_string()))?;

            if event::poll(tick_rate)? {
                match event::read()? {
                    Event::Key(key) => self.handle_key(key).await,
                    Event::Resize(_, _) => {}
                    _ => {}
                }
            }
        }

        Ok(())
    }

    /// Flushes what is left and waits a bounded time for it. Anything still in
    /// flight after the grace period is abandoned.
    async fn teardown(&mut self) {
        self.bots_feed = None;
        self.close_bot();

        let grace = Duration::from_secs(self.config.teardown_grace_secs);
        for handle in self.detached.drain(..) {
            match tokio::time::timeout(grace, handle).await {
                Ok(Ok(report)) if report.is_complete() => {}
                Ok(Ok(report)) => tracing::warn!(
                    "teardown flush lost {} priority edit(s)",
                    report.failed.len()
                ),
                Ok(Err(err)) => tracing::error!("teardown flush task failed: {err}"),
                Err(_) => tracing::warn!("teardown flush still running after {grace:?}"),
            }
        }
    }

    fn start_bots_poller(&mut self) {
        let aggregator = self.aggregator.clone();
        let poller = Poller::spawn("bots", self.config.client().poll_interval(), move || {
            let aggregator = aggregator.clone();
            async move { aggregator.bots().await }
        });
        self.bots_feed = Some(Feed::new(poller));
        self.state.bots.loading = true;
    }

    fn start_bot_poller(&mut self, bot_id: i64) {
        let aggregator = self.aggregator.clone();
        let poller = Poller::spawn("bot", self.config.client().poll_interval(), move || {
            let aggregator = aggregator.clone();
            async move { aggregator.bot(bot_id).await }
        });
        self.bot_feed = Some(Feed::new(poller));
    }

    fn sync_pollers(&mut self) {
        if let Some(feed) = self.bots_feed.as_mut() {
            let bots = &mut self.state.bots;
            if let Some(items) = feed.take_value() {
                bots.items = items;
                bots.loading = false;
                bots.error = None;
                bots.selected = bots.selected.min(bots.items.len().saturating_sub(1));
                self.state.last_refresh = Some(Local::now());
            }
            if let Some(error) = feed.take_failure() {
                if error.is_some() {
                    bots.loading = false;
                }
                bots.error = error;
            }
        }

        if let (Some(feed), Some(bot)) = (self.bot_feed.as_mut(), self.state.bot.as_mut()) {
            if let Some(aggregate) = feed.take_value() {
                bot.aggregate = Some(aggregate);
                bot.error = None;
                bot.selected = bot.selected.min(bot.rows().saturating_sub(1));
                self.state.last_refresh = Some(Local::now());
            }
            if let Some(error) = feed.take_failure() {
                bot.error = error;
            }
        }
    }

    fn expire_toast(&mut self) {
        if self
            .state
            .toast
            .as_ref()
            .is_some_and(|toast| toast.expires_at <= Instant::now())
        {
            self.state.toast = None;
        }
    }

    async fn handle_key(&mut self, key: KeyEvent) {
        let action = map_key(key);
        if action == AppAction::Quit {
            self.should_quit = true;
            return;
        }
        match self.state.screen {
            Screen::Bots => self.handle_bots_key(action).await,
            Screen::Bot => self.handle_bot_key(action).await,
        }
    }

    async fn handle_bots_key(&mut self, action: AppAction) {
        let bots = &mut self.state.bots;
        match action {
            AppAction::Up | AppAction::Input('k') => {
                bots.selected = bots.selected.saturating_sub(1);
            }
            AppAction::Down | AppAction::Input('j') => {
                if !bots.items.is_empty() {
                    bots.selected = (bots.selected + 1).min(bots.items.len() - 1);
                }
            }
            AppAction::Submit => {
                if let Some(bot_id) = bots.items.get(bots.selected).map(BotAggregate::id) {
                    self.open_bot(bot_id).await;
                }
            }
            AppAction::Input('p') => {
                if let Some(bot_id) = bots.items.get(bots.selected).map(BotAggregate::id) {
                    self.toggle_bot(bot_id).await;
                }
            }
            AppAction::Input('r') => self.refresh_bots(),
            _ => {}
        }
    }

    async fn handle_bot_key(&mut self, action: AppAction) {
        let Some(bot) = self.state.bot.as_mut() else {
            return;
        };

        if bot.mode == CategoriesMode::Pick {
            self.handle_pick_key(action).await;
            return;
        }

        match action {
            AppAction::Back => self.close_bot_screen(),
            AppAction::NextTab => {
                let next = bot.tab.next();
                self.switch_tab(next).await;
            }
            AppAction::PrevTab => {
                let prev = bot.tab.prev();
                self.switch_tab(prev).await;
            }
            AppAction::Input(ch @ '1'..='4') => {
                let idx = ch as usize - '1' as usize;
                self.switch_tab(Tab::ALL[idx]).await;
            }
            AppAction::Up | AppAction::Input('k') => {
                bot.selected = bot.selected.saturating_sub(1);
            }
            AppAction::Down | AppAction::Input('j') => {
                let rows = bot.rows();
                if rows > 0 {
                    bot.selected = (bot.selected + 1).min(rows - 1);
                }
            }
            AppAction::Input('r') => self.refresh_bot(),
            AppAction::Input('p') => {
                let bot_id = bot.bot_id;
                self.toggle_bot(bot_id).await;
            }
            AppAction::Input('+') | AppAction::Input('=') if bot.tab == Tab::Categories => {
                adjust_priority(bot, 1.0);
            }
            AppAction::Input('-') if bot.tab == Tab::Categories => {
                adjust_priority(bot, -1.0);
            }
            AppAction::Input('u') if bot.tab == Tab::Categories => {
                bot.priorities.reset();
            }
            AppAction::Input('s') if bot.tab == Tab::Categories => {
                self.flush_priorities(FlushTrigger::Save).await;
            }
            AppAction::Input('a') if bot.tab == Tab::Categories => {
                self.open_picker().await;
            }
            AppAction::Input('d') if bot.tab == Tab::Categories => {
                self.detach_selected_category().await;
            }
            AppAction::Input('d') if bot.tab == Tab::Channels => {
                self.detach_selected_channel().await;
            }
            _ => {}
        }
    }

    async fn handle_pick_key(&mut self, action: AppAction) {
        let Some(bot) = self.state.bot.as_mut() else {
            return;
        };
        match action {
            AppAction::Back => {
                bot.mode = CategoriesMode::List;
                bot.picked.clear();
            }
            AppAction::Up | AppAction::Input('k') => {
                bot.pick_cursor = bot.pick_cursor.saturating_sub(1);
            }
            AppAction::Down | AppAction::Input('j') => {
                if !bot.available.is_empty() {
                    bot.pick_cursor = (bot.pick_cursor + 1).min(bot.available.len() - 1);
                }
            }
            AppAction::Input(' ') => {
                if let Some(category) = bot.available.get(bot.pick_cursor) {
                    if !bot.picked.remove(&category.id) {
                        bot.picked.insert(category.id);
                    }
                }
            }
            AppAction::Submit => self.attach_picked().await,
            _ => {}
        }
    }

    async fn open_bot(&mut self, bot_id: i64) {
        // Only one polling page is alive at a time.
        self.bots_feed = None;

        let mut bot = BotState::new(bot_id);
        bot.aggregate = self
            .state
            .bots
            .items
            .iter()
            .find(|aggregate| aggregate.id() == bot_id)
            .cloned();
        self.state.bot = Some(bot);
        self.state.screen = Screen::Bot;
        self.start_bot_poller(bot_id);
    }

    fn close_bot_screen(&mut self) {
        self.close_bot();
        self.state.screen = Screen::Bots;
        self.start_bots_poller();
    }

    /// Tears the bot page down: stops its poller so late responses are
    /// dropped, and hands pending edits to a background flush.
    fn close_bot(&mut self) {
        if let Some(feed) = self.bot_feed.take() {
            feed.poller.stop();
        }

        let Some(bot) = self.state.bot.take() else {
            return;
        };
        let writer = priority_writer(self.client.clone(), bot.bot_id);
        if let Some(handle) = bot.priorities.detach(writer) {
            self.detached.push(handle);
        }
        self.detached.retain(|handle| !handle.is_finished());
    }

    async fn switch_tab(&mut self, tab: Tab) {
        let Some(bot) = self.state.bot.as_ref() else {
            return;
        };
        if bot.tab == tab {
            return;
        }
        if let Some(trigger) = tab_change_trigger(bot.tab, tab) {
            self.flush_priorities(trigger).await;
        }
        if let Some(bot) = self.state.bot.as_mut() {
            bot.tab = tab;
            bot.selected = 0;
        }
    }

    async fn flush_priorities(&mut self, trigger: FlushTrigger) {
        let Some(bot) = self.state.bot.as_mut() else {
            return;
        };
        if !bot.priorities.is_dirty() {
            if trigger == FlushTrigger::Save {
                self.state.notify(ToastLevel::Info, "Nothing to save");
            }
            return;
        }

        let writer = priority_writer(self.client.clone(), bot.bot_id);
        let report = bot.priorities.flush(trigger, writer).await;

        if report.is_complete() {
            self.state.notify(
                ToastLevel::Success,
                format!(
                    "Saved {}",
                    count_label(report.succeeded.len(), "priority change", "priority changes")
                ),
            );
        } else {
            let reason = report
                .failed
                .first()
                .map(|(_, err)| err.user_message())
                .unwrap_or_default();
            self.state.notify(
                ToastLevel::Error,
                format!(
                    "{} of {} not saved: {reason}",
                    report.failed.len(),
                    count_label(
                        report.failed.len() + report.succeeded.len(),
                        "priority change",
                        "priority changes"
                    )
                ),
            );
        }
        self.refresh_bot();
    }

    async fn open_picker(&mut self) {
        let Some(bot_id) = self.state.bot.as_ref().map(|bot| bot.bot_id) else {
            return;
        };
        match self.aggregator.category_catalog(bot_id).await {
            Ok(catalog) => {
                if catalog.available.is_empty() {
                    self.state
                        .notify(ToastLevel::Info, "All categories are already attached");
                    return;
                }
                if let Some(bot) = self.state.bot.as_mut() {
                    bot.available = catalog.available;
                    bot.picked.clear();
                    bot.pick_cursor = 0;
                    bot.mode = CategoriesMode::Pick;
                }
            }
            Err(err) => self.report_error("Could not load categories", &err),
        }
    }

    async fn attach_picked(&mut self) {
        let Some(bot) = self.state.bot.as_mut() else {
            return;
        };
        // Keep the order the picker shows, not the order of selection.
        let ids: Vec<i64> = bot
            .available
            .iter()
            .map(|category| category.id)
            .filter(|id| bot.picked.contains(id))
            .collect();
        bot.mode = CategoriesMode::List;
        bot.picked.clear();
        if ids.is_empty() {
            return;
        }

        let bot_id = bot.bot_id;
        let Some(gate) = self.bot_feed.as_ref().map(|feed| feed.poller.gate().clone()) else {
            return;
        };
        let added = count_label(ids.len(), "category", "categories");

        // The reload goes through the gate like any poll would.
        match self
            .aggregator
            .attach_categories(&gate, bot_id, ids)
            .await
        {
            Ok(CycleOutcome::Applied) => {
                self.state
                    .notify(ToastLevel::Success, format!("Added {added}"));
            }
            Ok(CycleOutcome::Superseded) => {
                // A newer fetch won; make sure one more runs after the attach.
                self.state
                    .notify(ToastLevel::Success, format!("Added {added}"));
                self.refresh_bot();
            }
            Ok(CycleOutcome::Failed(err)) => {
                self.report_error(&format!("Added {added} but could not reload"), &err);
            }
            Err(err) => self.report_error("Could not add categories", &err),
        }
    }

    async fn detach_selected_category(&mut self) {
        let Some(bot) = self.state.bot.as_mut() else {
            return;
        };
        let Some(category) = bot.categories().get(bot.selected).cloned() else {
            return;
        };
        let bot_id = bot.bot_id;

        match self.client.detach_category(bot_id, category.id).await {
            Ok(()) => {
                if let Some(bot) = self.state.bot.as_mut() {
                    bot.priorities.discard(&category.id);
                }
                self.state
                    .notify(ToastLevel::Success, format!("Removed {}", category.name));
                self.refresh_bot();
            }
            Err(err) => self.report_error("Could not remove category", &err),
        }
    }

    async fn detach_selected_channel(&mut self) {
        let Some(bot) = self.state.bot.as_ref() else {
            return;
        };
        let Some(channel) = bot
            .aggregate
            .as_ref()
            .and_then(|aggregate| aggregate.channels.get(bot.selected))
            .cloned()
        else {
            return;
        };

        match self.client.detach_channel(bot.bot_id, channel.id).await {
            Ok(()) => {
                self.state
                    .notify(ToastLevel::Success, format!("Removed {}", channel.title));
                self.refresh_bot();
            }
            Err(err) => self.report_error("Could not remove channel", &err),
        }
    }

    async fn toggle_bot(&mut self, bot_id: i64) {
        match self.client.toggle_bot(bot_id).await {
            Ok(bot) => {
                self.state.notify(
                    ToastLevel::Success,
                    format!("{} is now {}", bot.name, bot.status.as_str()),
                );
                self.refresh_bots();
                self.refresh_bot();
            }
            Err(err) => self.report_error("Could not change status", &err),
        }
    }

    /// Failures of these reach the screen through the feed's failure
    /// channel, so the handles are not awaited.
    fn refresh_bots(&mut self) {
        if let Some(feed) = &self.bots_feed {
            self.state.bots.loading = true;
            drop(feed.poller.refresh());
        }
    }

    fn refresh_bot(&mut self) {
        if let Some(feed) = &self.bot_feed {
            drop(feed.poller.refresh());
        }
    }

    fn report_error(&mut self, context: &str, err: &ClientError) {
        tracing::error!("{context}: {err}");
        if let Some(bot) = self.state.bot.as_mut() {
            bot.error = Some(err.user_message());
        }
        self.state
            .notify(ToastLevel::Error, format!("{context}: {}", err.user_message()));
    }
}

/// Leaving the categories tab saves pending priority edits.
fn tab_change_trigger(from: Tab, to: Tab) -> Option<FlushTrigger> {
    (from == Tab::Categories && to != from).then_some(FlushTrigger::TabSwitch)
}

fn count_label(count: usize, one: &str, many: &str) -> String {
    if count == 1 {
        format!("1 {one}")
    } else {
        format!("{count} {many}")
    }
}

fn adjust_priority(bot: &mut BotState, delta: f64) {
    let Some(category) = bot.categories().get(bot.selected).cloned() else {
        return;
    };
    let current = category.priority_or_default();
    bot.priorities.set(category.id, (current + delta).max(0.0));
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Json, Router,
        extract::{Path, State},
        http::StatusCode,
        routing::{delete, get, put},
    };
    use crossterm::event::{KeyCode, KeyModifiers};
    use digest_client::BufferState;
    use serde_json::{Value, json};

    use super::*;

    #[derive(Default)]
    struct Recorded {
        priority_writes: Vec<(i64, i64, f64)>,
        deletes: Vec<(i64, i64)>,
    }

    type Shared = Arc<Mutex<Recorded>>;

    async fn write_priority(
        State(recorded): State<Shared>,
        Path((bot_id, category_id)): Path<(i64, i64)>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        let priority = body["priority"].as_f64().unwrap();
        recorded
            .lock()
            .unwrap()
            .priority_writes
            .push((bot_id, category_id, priority));
        Json(json!({"message": "ok"}))
    }

    /// Category 8 is locked on the backend and cannot be detached.
    async fn remove_category(
        State(recorded): State<Shared>,
        Path((bot_id, category_id)): Path<(i64, i64)>,
    ) -> (StatusCode, Json<Value>) {
        if category_id == 8 {
            return (StatusCode::CONFLICT, Json(json!({"detail": "Category is locked"})));
        }
        recorded.lock().unwrap().deletes.push((bot_id, category_id));
        (StatusCode::OK, Json(json!({"message": "ok"})))
    }

    async fn bots_down() -> (StatusCode, Json<Value>) {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"detail": "Backend in maintenance"})),
        )
    }

    async fn test_app() -> (App, Shared) {
        let recorded = Shared::default();
        let router = Router::new()
            .route("/api/public-bots", get(bots_down))
            .route(
                "/api/public-bots/{id}/categories/{category_id}",
                delete(remove_category),
            )
            .route(
                "/api/public-bots/{id}/categories/{category_id}/priority",
                put(write_priority),
            )
            .with_state(recorded.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let config = AppConfig {
            base_url: format!("http://{addr}/api"),
            ..AppConfig::default()
        };
        (App::new(config).unwrap(), recorded)
    }

    fn open_categories(app: &mut App) {
        app.state.screen = Screen::Bot;
        app.state.bot = Some(bot_with_categories());
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    /// Writes run concurrently, so arrival order is not meaningful.
    fn writes(recorded: &Shared) -> Vec<(i64, i64, f64)> {
        let mut writes = recorded.lock().unwrap().priority_writes.clone();
        writes.sort_by_key(|(bot_id, category_id, _)| (*bot_id, *category_id));
        writes
    }

    fn bot_with_categories() -> BotState {
        let aggregate: BotAggregate = BotAggregate::assemble(
            serde_json::from_value(serde_json::json!({"id": 1, "name": "b"})).unwrap(),
            Vec::new(),
            serde_json::from_value(serde_json::json!([
                {"id": 7, "category_name": "News", "priority": 2},
                {"id": 8, "category_name": "Sport", "priority": 1},
            ]))
            .unwrap(),
            Vec::new(),
        );
        let mut bot = BotState::new(1);
        bot.aggregate = Some(aggregate);
        bot.tab = Tab::Categories;
        bot
    }

    #[test]
    fn tabs_cycle_both_ways() {
        assert_eq!(Tab::Overview.next(), Tab::Channels);
        assert_eq!(Tab::AiResults.next(), Tab::Overview);
        assert_eq!(Tab::Overview.prev(), Tab::AiResults);
    }

    #[test]
    fn priority_edits_show_before_flush() {
        let mut bot = bot_with_categories();
        bot.selected = 1;
        adjust_priority(&mut bot, 3.0);

        assert_eq!(bot.priorities.state(), BufferState::Dirty);
        assert_eq!(bot.priorities.get(&8), Some(&4.0));
        let shown: Vec<i64> = bot.categories().iter().map(|c| c.id).collect();
        assert_eq!(shown, vec![8, 7]);
    }

    #[test]
    fn only_leaving_categories_triggers_a_flush() {
        assert_eq!(
            tab_change_trigger(Tab::Categories, Tab::AiResults),
            Some(FlushTrigger::TabSwitch)
        );
        assert_eq!(
            tab_change_trigger(Tab::Categories, Tab::Overview),
            Some(FlushTrigger::TabSwitch)
        );
        assert_eq!(tab_change_trigger(Tab::Overview, Tab::Categories), None);
        assert_eq!(tab_change_trigger(Tab::Categories, Tab::Categories), None);
    }

    #[test]
    fn counts_are_pluralised() {
        assert_eq!(count_label(1, "category", "categories"), "1 category");
        assert_eq!(count_label(2, "category", "categories"), "2 categories");
        assert_eq!(count_label(0, "category", "categories"), "0 categories");
    }

    #[tokio::test]
    async fn leaving_categories_tab_writes_pending_priorities() {
        let (mut app, recorded) = test_app().await;
        open_categories(&mut app);
        app.state.bot.as_mut().unwrap().priorities.set(7, 5.0);

        app.handle_key(press(KeyCode::Tab)).await;

        assert_eq!(writes(&recorded), vec![(1, 7, 5.0)]);
        let bot = app.state.bot.as_ref().unwrap();
        assert_eq!(bot.tab, Tab::AiResults);
        assert_eq!(bot.priorities.state(), BufferState::Clean);
        assert_eq!(
            app.state.toast.as_ref().map(|toast| toast.message.as_str()),
            Some("Saved 1 priority change")
        );
    }

    #[tokio::test]
    async fn save_key_writes_without_leaving_tab() {
        let (mut app, recorded) = test_app().await;
        open_categories(&mut app);
        {
            let bot = app.state.bot.as_mut().unwrap();
            bot.priorities.set(7, 5.0);
            bot.priorities.set(8, 3.0);
        }

        app.handle_key(press(KeyCode::Char('s'))).await;

        assert_eq!(writes(&recorded), vec![(1, 7, 5.0), (1, 8, 3.0)]);
        let bot = app.state.bot.as_ref().unwrap();
        assert_eq!(bot.tab, Tab::Categories);
        assert!(!bot.priorities.is_dirty());
    }

    #[tokio::test]
    async fn closing_the_bot_page_flushes_on_teardown() {
        let (mut app, recorded) = test_app().await;
        open_categories(&mut app);
        app.state.bot.as_mut().unwrap().priorities.set(7, 5.0);

        app.close_bot();

        assert!(app.state.bot.is_none());
        let report = app.detached.pop().unwrap().await.unwrap();
        assert_eq!(report.trigger, FlushTrigger::Teardown);
        assert_eq!(report.succeeded, vec![7]);
        assert_eq!(writes(&recorded), vec![(1, 7, 5.0)]);
    }

    #[tokio::test]
    async fn escape_from_bot_page_hands_edits_to_teardown_flush() {
        let (mut app, recorded) = test_app().await;
        open_categories(&mut app);
        app.state.bot.as_mut().unwrap().priorities.set(8, 4.0);

        app.handle_key(press(KeyCode::Esc)).await;

        assert_eq!(app.state.screen, Screen::Bots);
        let report = app.detached.pop().unwrap().await.unwrap();
        assert_eq!(report.trigger, FlushTrigger::Teardown);
        assert_eq!(writes(&recorded), vec![(1, 8, 4.0)]);
    }

    #[tokio::test]
    async fn failed_detach_keeps_unsaved_priority() {
        let (mut app, recorded) = test_app().await;
        open_categories(&mut app);
        {
            let bot = app.state.bot.as_mut().unwrap();
            bot.priorities.set(8, 0.5);
            bot.selected = 1;
        }

        app.detach_selected_category().await;

        let bot = app.state.bot.as_ref().unwrap();
        assert_eq!(bot.priorities.get(&8), Some(&0.5));
        assert_eq!(bot.error.as_deref(), Some("Category is locked"));
        assert!(recorded.lock().unwrap().deletes.is_empty());
    }

    #[tokio::test]
    async fn successful_detach_drops_unsaved_priority() {
        let (mut app, recorded) = test_app().await;
        open_categories(&mut app);
        {
            let bot = app.state.bot.as_mut().unwrap();
            bot.priorities.set(7, 9.0);
            bot.selected = 0;
        }

        app.detach_selected_category().await;

        let bot = app.state.bot.as_ref().unwrap();
        assert_eq!(bot.priorities.get(&7), None);
        assert_eq!(recorded.lock().unwrap().deletes, vec![(1, 7)]);
    }

    #[tokio::test]
    async fn failed_bot_list_load_is_shown_instead_of_loading() {
        let (mut app, _recorded) = test_app().await;
        app.start_bots_poller();
        assert!(app.state.bots.loading);

        for _ in 0..100 {
            app.sync_pollers();
            if app.state.bots.error.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(
            app.state.bots.error.as_deref(),
            Some("Backend in maintenance")
        );
        assert!(!app.state.bots.loading);
        // Background failures do not raise toasts.
        assert!(app.state.toast.is_none());
    }

    #[test]
    fn priority_never_goes_negative() {
        let mut bot = bot_with_categories();
        bot.selected = 1;
        adjust_priority(&mut bot, -5.0);
        assert_eq!(bot.priorities.get(&8), Some(&0.0));
    }
}
