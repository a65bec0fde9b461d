//! Types exchanged with the digest backend REST API.
//!
//! Every type here mirrors the JSON the backend sends or accepts. Categories
//! are the exception: the backend calls their name `category_name` while the
//! client calls it `name`, and the conversion between the two lives in
//! [`category::from_wire`] / [`category::to_wire`] only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod error {
    use super::*;

    /// Error body returned by the backend on non-2xx responses.
    ///
    /// `detail` is usually a string; validation failures carry a list of
    /// objects instead, which is rendered as compact JSON.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ErrorDetail {
        #[serde(default)]
        pub detail: Option<serde_json::Value>,
    }

    impl ErrorDetail {
        pub fn message(&self) -> Option<String> {
            match self.detail.as_ref()? {
                serde_json::Value::Null => None,
                serde_json::Value::String(detail) if detail.trim().is_empty() => None,
                serde_json::Value::String(detail) => Some(detail.clone()),
                other => Some(other.to_string()),
            }
        }
    }
}

pub mod bot {
    use super::*;

    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum BotStatus {
        Active,
        #[default]
        Setup,
        Paused,
    }

    impl BotStatus {
        pub fn as_str(self) -> &'static str {
            match self {
                Self::Active => "active",
                Self::Setup => "setup",
                Self::Paused => "paused",
            }
        }

        /// Status the backend moves the bot to on `/toggle`.
        pub fn toggled(self) -> Self {
            match self {
                Self::Active => Self::Paused,
                Self::Setup | Self::Paused => Self::Active,
            }
        }
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct Bot {
        pub id: i64,
        pub name: String,
        pub description: Option<String>,
        #[serde(default)]
        pub status: BotStatus,
        pub bot_token: Option<String>,
        pub welcome_message: Option<String>,
        pub default_language: Option<String>,
        pub max_posts_per_digest: Option<u32>,
        pub max_summary_length: Option<u32>,
        /// Opaque delivery schedule, edited by the backend's own forms.
        pub delivery_schedule: Option<serde_json::Value>,
        pub timezone: Option<String>,
        #[serde(default, with = "crate::timestamp::option")]
        pub created_at: Option<DateTime<Utc>>,
        #[serde(default, with = "crate::timestamp::option")]
        pub updated_at: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct BotNew {
        pub name: String,
        pub description: Option<String>,
        pub bot_token: Option<String>,
        pub welcome_message: Option<String>,
        pub default_language: Option<String>,
        pub max_posts_per_digest: Option<u32>,
        pub max_summary_length: Option<u32>,
        pub timezone: Option<String>,
    }

    /// Partial update: absent fields are left untouched by the backend.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct BotUpdate {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub description: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub status: Option<BotStatus>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub bot_token: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub welcome_message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub default_language: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub max_posts_per_digest: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub max_summary_length: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub timezone: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BotChannelsAttach {
        pub channel_ids: Vec<i64>,
    }

    /// Bulk attach of categories to a bot. `priorities[i]` belongs to
    /// `category_ids[i]`.
    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    pub struct BotCategoriesAttach {
        pub category_ids: Vec<i64>,
        pub priorities: Vec<f64>,
    }

    impl BotCategoriesAttach {
        /// Attaches `category_ids` with 1-based positional priorities.
        pub fn in_order(category_ids: Vec<i64>) -> Self {
            let priorities = (1..=category_ids.len()).map(|p| p as f64).collect();
            Self {
                category_ids,
                priorities,
            }
        }
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    pub struct PriorityUpdate {
        pub priority: f64,
    }
}

pub mod channel {
    use super::*;
    use crate::category::Category;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct Channel {
        pub id: i64,
        pub telegram_id: i64,
        pub title: String,
        pub username: Option<String>,
        pub description: Option<String>,
        #[serde(default = "default_active")]
        pub is_active: bool,
        #[serde(default)]
        pub categories: Vec<Category>,
        #[serde(default, with = "crate::timestamp::option")]
        pub created_at: Option<DateTime<Utc>>,
    }

    fn default_active() -> bool {
        true
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ChannelNew {
        pub telegram_id: i64,
        pub title: String,
        pub username: Option<String>,
        pub description: Option<String>,
        pub is_active: bool,
        #[serde(default)]
        pub category_ids: Vec<i64>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ChannelUpdate {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub title: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub username: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub description: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub is_active: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub category_ids: Option<Vec<i64>>,
    }

    /// Telegram lookup result used to prefill a new channel.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct ChannelValidation {
        pub telegram_id: i64,
        pub title: String,
        pub username: Option<String>,
        pub description: Option<String>,
        pub subscribers: Option<u64>,
    }

    impl From<ChannelValidation> for ChannelNew {
        fn from(found: ChannelValidation) -> Self {
            Self {
                telegram_id: found.telegram_id,
                title: found.title,
                username: found.username,
                description: found.description,
                is_active: true,
                category_ids: Vec::new(),
            }
        }
    }
}

pub mod category {
    use super::*;
    use serde_json::{Map, Value};

    /// Category exactly as the backend sends and accepts it.
    ///
    /// Fields the client does not model are kept in `extra` so that a
    /// read-modify-write cycle does not drop them.
    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    pub struct WireCategory {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub id: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub category_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub description: Option<String>,
        /// Per-bot weight; only present on bot-scoped category lists.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub priority: Option<f64>,
        #[serde(flatten)]
        pub extra: Map<String, Value>,
    }

    /// Client view of a category.
    ///
    /// (De)serialization always goes through [`WireCategory`], so a
    /// `Category` cannot be read or written without name translation, even
    /// when nested in another payload.
    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(from = "WireCategory", into = "WireCategory")]
    pub struct Category {
        pub id: i64,
        pub name: String,
        /// Name as last received from the backend, if it sent one.
        pub category_name: Option<String>,
        pub description: Option<String>,
        pub priority: Option<f64>,
        pub extra: Map<String, Value>,
    }

    impl Category {
        pub fn priority_or_default(&self) -> f64 {
            self.priority.unwrap_or(0.0)
        }
    }

    /// Server → client. `name = category_name ?? name ?? ""`.
    pub fn from_wire(wire: WireCategory) -> Category {
        let name = wire
            .category_name
            .clone()
            .or(wire.name)
            .unwrap_or_default();
        Category {
            id: wire.id.unwrap_or_default(),
            name,
            category_name: wire.category_name,
            description: wire.description,
            priority: wire.priority,
            extra: wire.extra,
        }
    }

    /// Client → server. `category_name = name`.
    pub fn to_wire(category: Category) -> WireCategory {
        WireCategory {
            id: Some(category.id),
            category_name: Some(category.name.clone()),
            name: Some(category.name),
            description: category.description,
            priority: category.priority,
            extra: category.extra,
        }
    }

    impl From<WireCategory> for Category {
        fn from(wire: WireCategory) -> Self {
            from_wire(wire)
        }
    }

    impl From<Category> for WireCategory {
        fn from(category: Category) -> Self {
            to_wire(category)
        }
    }

    /// Payload for creating a category. Serialized through [`to_wire`].
    #[derive(Clone, Debug, Serialize)]
    #[serde(into = "WireCategory")]
    pub struct CategoryNew {
        pub name: String,
        pub description: Option<String>,
    }

    impl From<CategoryNew> for WireCategory {
        fn from(new: CategoryNew) -> Self {
            let mut wire = to_wire(Category {
                name: new.name,
                description: new.description,
                ..Category::default()
            });
            wire.id = None;
            wire
        }
    }

    /// Stable, descending sort by priority. Priorities are not unique; ties
    /// keep the order the backend returned.
    pub fn sort_by_priority(categories: &mut [Category]) {
        categories.sort_by(|a, b| b.priority_or_default().total_cmp(&a.priority_or_default()));
    }
}

pub mod post {
    use super::*;

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct Post {
        pub id: i64,
        pub channel_telegram_id: i64,
        pub telegram_message_id: Option<i64>,
        pub title: Option<String>,
        pub content: Option<String>,
        pub views: Option<u64>,
        pub media_type: Option<String>,
        #[serde(default, with = "crate::timestamp::option")]
        pub post_date: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct PostQuery {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub channel_telegram_id: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub limit: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub offset: Option<u32>,
    }
}

pub mod ai {
    use super::*;

    /// One AI processing result for a post, scoped to a bot.
    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct AiResult {
        pub id: i64,
        pub post_id: i64,
        pub public_bot_id: Option<i64>,
        pub summary: Option<String>,
        pub importance: Option<f64>,
        pub urgency: Option<f64>,
        pub significance: Option<f64>,
        pub processing_version: Option<String>,
        #[serde(default, with = "crate::timestamp::option")]
        pub processed_at: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct AiResultQuery {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub bot_id: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub limit: Option<u32>,
    }
}

pub mod settings {
    use super::*;

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct Setting {
        pub key: String,
        pub value: Option<String>,
        pub value_type: Option<String>,
        pub description: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SettingUpdate {
        pub value: String,
    }
}

/// Lenient timestamp parsing.
///
/// The backend emits RFC3339 when the column is timezone aware and a naive
/// ISO-8601 string otherwise; naive values are read as UTC.
pub mod timestamp {
    pub mod option {
        use chrono::{DateTime, NaiveDateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(dt) => serializer.serialize_str(&dt.to_rfc3339()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            let Some(raw) = Option::<String>::deserialize(deserializer)? else {
                return Ok(None);
            };
            if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
                return Ok(Some(dt.with_timezone(&Utc)));
            }
            NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| Some(naive.and_utc()))
                .map_err(serde::de::Error::custom)
        }
    }
}
