use api_types::{
    ai::{AiResult, AiResultQuery},
    bot::{
        Bot, BotCategoriesAttach, BotChannelsAttach, BotNew, BotUpdate, PriorityUpdate,
    },
    category::{Category, CategoryNew},
    channel::{Channel, ChannelNew, ChannelUpdate, ChannelValidation},
    error::ErrorDetail,
    post::{Post, PostQuery},
    settings::{Setting, SettingUpdate},
};
use reqwest::{RequestBuilder, Response, Url};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    config::ClientConfig,
    error::{ClientError, Result},
};

/// Thin typed wrapper over the backend's REST collections.
///
/// Cloning is cheap and shares the connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        // `Url::join` replaces the last segment unless the base ends with '/'.
        let mut raw = config.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base_url =
            Url::parse(&raw).map_err(|err| ClientError::InvalidUrl(format!("{raw}: {err}")))?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| ClientError::InvalidUrl(format!("{path}: {err}")))
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let resp = req.send().await?;
        if resp.status().is_success() {
            return Ok(resp.json::<T>().await?);
        }
        Err(error_from(resp).await)
    }

    async fn send_unit(&self, req: RequestBuilder) -> Result<()> {
        let resp = req.send().await?;
        if resp.status().is_success() {
            return Ok(());
        }
        Err(error_from(resp).await)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(self.http.get(self.url(path)?)).await
    }

    async fn get_query<Q: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<T> {
        self.send(self.http.get(self.url(path)?).query(query)).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send(self.http.post(self.url(path)?).json(body)).await
    }

    async fn post_json_unit<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        self.send_unit(self.http.post(self.url(path)?).json(body))
            .await
    }

    async fn put_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send(self.http.put(self.url(path)?).json(body)).await
    }

    async fn put_json_unit<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        self.send_unit(self.http.put(self.url(path)?).json(body))
            .await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.send_unit(self.http.delete(self.url(path)?)).await
    }

    // Bots

    pub async fn bots(&self) -> Result<Vec<Bot>> {
        self.get_json("public-bots").await
    }

    pub async fn bot(&self, bot_id: i64) -> Result<Bot> {
        self.get_json(&format!("public-bots/{bot_id}")).await
    }

    pub async fn create_bot(&self, payload: &BotNew) -> Result<Bot> {
        self.post_json("public-bots", payload).await
    }

    pub async fn update_bot(&self, bot_id: i64, payload: &BotUpdate) -> Result<Bot> {
        self.put_json(&format!("public-bots/{bot_id}"), payload)
            .await
    }

    pub async fn delete_bot(&self, bot_id: i64) -> Result<()> {
        self.delete(&format!("public-bots/{bot_id}")).await
    }

    /// Flips the bot between `active` and `paused`.
    pub async fn toggle_bot(&self, bot_id: i64) -> Result<Bot> {
        self.send(self.http.post(self.url(&format!("public-bots/{bot_id}/toggle"))?))
            .await
    }

    // Bot channels

    pub async fn bot_channels(&self, bot_id: i64) -> Result<Vec<Channel>> {
        self.get_json(&format!("public-bots/{bot_id}/channels"))
            .await
    }

    pub async fn attach_channels(&self, bot_id: i64, channel_ids: Vec<i64>) -> Result<()> {
        self.post_json_unit(
            &format!("public-bots/{bot_id}/channels"),
            &BotChannelsAttach { channel_ids },
        )
        .await
    }

    pub async fn detach_channel(&self, bot_id: i64, channel_id: i64) -> Result<()> {
        self.delete(&format!("public-bots/{bot_id}/channels/{channel_id}"))
            .await
    }

    // Bot categories

    pub async fn bot_categories(&self, bot_id: i64) -> Result<Vec<Category>> {
        self.get_json(&format!("public-bots/{bot_id}/categories"))
            .await
    }

    pub async fn attach_categories(&self, bot_id: i64, payload: &BotCategoriesAttach) -> Result<()> {
        self.post_json_unit(&format!("public-bots/{bot_id}/categories"), payload)
            .await
    }

    /// Bulk attach followed by a fresh list; the returned list replaces
    /// whatever the caller held.
    pub async fn attach_categories_and_reload(
        &self,
        bot_id: i64,
        category_ids: Vec<i64>,
    ) -> Result<Vec<Category>> {
        self.attach_categories(bot_id, &BotCategoriesAttach::in_order(category_ids))
            .await?;
        self.bot_categories(bot_id).await
    }

    pub async fn detach_category(&self, bot_id: i64, category_id: i64) -> Result<()> {
        self.delete(&format!("public-bots/{bot_id}/categories/{category_id}"))
            .await
    }

    pub async fn update_priority(&self, bot_id: i64, category_id: i64, priority: f64) -> Result<()> {
        self.put_json_unit(
            &format!("public-bots/{bot_id}/categories/{category_id}/priority"),
            &PriorityUpdate { priority },
        )
        .await
    }

    // Channels

    pub async fn channels(&self) -> Result<Vec<Channel>> {
        self.get_json("channels").await
    }

    pub async fn create_channel(&self, payload: &ChannelNew) -> Result<Channel> {
        self.post_json("channels", payload).await
    }

    pub async fn update_channel(&self, channel_id: i64, payload: &ChannelUpdate) -> Result<Channel> {
        self.put_json(&format!("channels/{channel_id}"), payload)
            .await
    }

    pub async fn delete_channel(&self, channel_id: i64) -> Result<()> {
        self.delete(&format!("channels/{channel_id}")).await
    }

    /// Looks the channel up on Telegram before it is created.
    pub async fn validate_channel(&self, username: &str) -> Result<ChannelValidation> {
        let username = username.trim().trim_start_matches('@');
        self.get_json(&format!("channels/validate/{username}"))
            .await
    }

    // Categories

    pub async fn categories(&self) -> Result<Vec<Category>> {
        self.get_json("categories").await
    }

    pub async fn create_category(&self, payload: &CategoryNew) -> Result<Category> {
        self.post_json("categories", payload).await
    }

    pub async fn update_category(&self, category: &Category) -> Result<Category> {
        self.put_json(&format!("categories/{}", category.id), category)
            .await
    }

    pub async fn delete_category(&self, category_id: i64) -> Result<()> {
        self.delete(&format!("categories/{category_id}")).await
    }

    // Posts cache, AI results, settings

    pub async fn posts(&self, query: &PostQuery) -> Result<Vec<Post>> {
        self.get_query("posts/cache", query).await
    }

    pub async fn ai_results(&self, query: &AiResultQuery) -> Result<Vec<AiResult>> {
        self.get_query("ai/results", query).await
    }

    pub async fn settings(&self) -> Result<Vec<Setting>> {
        self.get_json("settings").await
    }

    pub async fn update_setting(&self, key: &str, value: &str) -> Result<Setting> {
        self.put_json(
            &format!("settings/{key}"),
            &SettingUpdate {
                value: value.to_string(),
            },
        )
        .await
    }
}

async fn error_from(resp: Response) -> ClientError {
    let status = resp.status();
    let detail = resp
        .json::<ErrorDetail>()
        .await
        .ok()
        .and_then(|body| body.message());
    ClientError::Http { status, detail }
}
