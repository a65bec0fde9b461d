//! Client-side joins over independent backend collections.
//!
//! Only the parent fetch can fail an aggregate. A branch that fails is logged
//! and replaced by an empty list so the parent still renders.

use std::collections::HashSet;

use api_types::{
    ai::{AiResult, AiResultQuery},
    bot::{Bot, BotCategoriesAttach},
    category::Category,
    channel::Channel,
};
use futures::future::join_all;
use serde::Serialize;

use crate::{
    ApiClient,
    error::Result,
    poll::{CycleOutcome, ResponseGate},
};

/// A bot merged with its related collections.
///
/// Serializes flat: the bot's own fields plus `channels`, `channels_count`,
/// `categories`, `categories_count`, `ai_results` and `ai_results_count`.
#[derive(Debug, Clone, Serialize)]
pub struct BotAggregate {
    #[serde(flatten)]
    pub bot: Bot,
    pub channels: Vec<Channel>,
    pub channels_count: usize,
    pub categories: Vec<Category>,
    pub categories_count: usize,
    pub ai_results: Vec<AiResult>,
    pub ai_results_count: usize,
}

impl BotAggregate {
    pub fn assemble(
        bot: Bot,
        channels: Vec<Channel>,
        categories: Vec<Category>,
        ai_results: Vec<AiResult>,
    ) -> Self {
        Self {
            bot,
            channels_count: channels.len(),
            channels,
            categories_count: categories.len(),
            categories,
            ai_results_count: ai_results.len(),
            ai_results,
        }
    }

    pub fn id(&self) -> i64 {
        self.bot.id
    }

    /// Replaces the categories branch, e.g. after a bulk attach reload.
    pub fn replace_categories(&mut self, categories: Vec<Category>) {
        self.categories_count = categories.len();
        self.categories = categories;
    }

    pub fn replace_channels(&mut self, channels: Vec<Channel>) {
        self.channels_count = channels.len();
        self.channels = channels;
    }
}

/// Global categories split by whether a bot already uses them.
#[derive(Debug, Clone, Default)]
pub struct CategoryCatalog {
    pub attached: Vec<Category>,
    pub available: Vec<Category>,
}

#[derive(Debug, Clone)]
pub struct Aggregator {
    client: ApiClient,
    ai_results_limit: u32,
}

impl Aggregator {
    pub fn new(client: ApiClient, ai_results_limit: u32) -> Self {
        Self {
            client,
            ai_results_limit,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Fetches the bot and all its branches concurrently.
    pub async fn bot(&self, bot_id: i64) -> Result<BotAggregate> {
        let (bot, branches) = tokio::join!(self.client.bot(bot_id), self.branches(bot_id));
        let (channels, categories, ai_results) = branches;
        Ok(BotAggregate::assemble(bot?, channels, categories, ai_results))
    }

    /// Every bot with its branches. The bot list itself is the parent; each
    /// listed bot is used as-is and only its branches are fetched.
    pub async fn bots(&self) -> Result<Vec<BotAggregate>> {
        let bots = self.client.bots().await?;
        let aggregates = join_all(bots.into_iter().map(|bot| async move {
            let (channels, categories, ai_results) = self.branches(bot.id).await;
            BotAggregate::assemble(bot, channels, categories, ai_results)
        }))
        .await;
        Ok(aggregates)
    }

    /// Global category list (parent) partitioned by the bot's attachments
    /// (branch).
    pub async fn category_catalog(&self, bot_id: i64) -> Result<CategoryCatalog> {
        let (all, attached) = tokio::join!(
            self.client.categories(),
            self.client.bot_categories(bot_id)
        );
        let all = all?;
        let attached = degrade(bot_id, "categories", attached);

        let attached_ids: HashSet<i64> = attached.iter().map(|category| category.id).collect();
        let available = all
            .into_iter()
            .filter(|category| !attached_ids.contains(&category.id))
            .collect();

        Ok(CategoryCatalog {
            attached,
            available,
        })
    }

    /// Bulk attach, then a categories reload offered through `gate`.
    ///
    /// The reload ticket is taken only once the attach succeeded, so a poll
    /// that started during the POST (and still sees the old list) is older
    /// than the reload and cannot supersede it. Without an applied aggregate
    /// to patch, the whole aggregate is reloaded instead.
    pub async fn attach_categories(
        &self,
        gate: &ResponseGate<BotAggregate>,
        bot_id: i64,
        category_ids: Vec<i64>,
    ) -> Result<CycleOutcome> {
        self.client
            .attach_categories(bot_id, &BotCategoriesAttach::in_order(category_ids))
            .await?;

        let ticket = gate.issue();
        let reloaded = match gate.latest().filter(|aggregate| aggregate.id() == bot_id) {
            Some(mut aggregate) => self.client.bot_categories(bot_id).await.map(|categories| {
                aggregate.replace_categories(categories);
                aggregate
            }),
            None => self.bot(bot_id).await,
        };
        Ok(gate.settle("category reload", ticket, reloaded, true))
    }

    async fn branches(&self, bot_id: i64) -> (Vec<Channel>, Vec<Category>, Vec<AiResult>) {
        let query = AiResultQuery {
            bot_id: Some(bot_id),
            limit: Some(self.ai_results_limit),
        };
        let (channels, categories, ai_results) = tokio::join!(
            self.client.bot_channels(bot_id),
            self.client.bot_categories(bot_id),
            self.client.ai_results(&query),
        );
        (
            degrade(bot_id, "channels", channels),
            degrade(bot_id, "categories", categories),
            degrade(bot_id, "ai_results", ai_results),
        )
    }
}

fn degrade<T>(parent_id: i64, branch: &'static str, result: Result<Vec<T>>) -> Vec<T> {
    result.unwrap_or_else(|err| {
        tracing::warn!(parent_id, branch, "aggregate branch degraded to empty: {err}");
        Vec::new()
    })
}
