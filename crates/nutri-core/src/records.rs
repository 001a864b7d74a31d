//! Records exchanged with the services and kept by the local store.
//!
//! Field names serialize in camelCase so stored blobs keep the page's shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which producer filled a reply or plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplySource {
    Gemini,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// One prior message given to the model as conversation context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub source: ReplySource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    #[default]
    Active,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Macros {
    pub protein: i64,
    pub carbs: i64,
    pub fat: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meals {
    pub breakfast: Vec<String>,
    pub lunch: Vec<String>,
    pub dinner: Vec<String>,
    pub snacks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShoppingItem {
    pub item: String,
    #[serde(rename = "quantidade")]
    pub quantity: String,
    #[serde(rename = "categoria")]
    pub category: String,
}

/// Plan body computed locally from the profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputedPlan {
    pub title: String,
    pub description: String,
    pub target_calories: i64,
    pub macros: Macros,
    pub meals: Meals,
    pub shopping_list: Vec<ShoppingItem>,
    pub tips: Vec<String>,
}

/// Either the locally computed body or whatever JSON object the model returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlanContent {
    Computed(ComputedPlan),
    Generated(Map<String, Value>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DietPlan {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: PlanStatus,
    pub source: ReplySource,
    #[serde(flatten)]
    pub content: PlanContent,
}

/// Keys owned by [`DietPlan`] itself; stripped from model output before flattening.
pub(crate) const PLAN_ENVELOPE_KEYS: &[&str] = &["id", "userId", "createdAt", "status", "source"];

impl DietPlan {
    /// Calorie target, when the body carries one.
    pub fn target_calories(&self) -> Option<i64> {
        match &self.content {
            PlanContent::Computed(p) => Some(p.target_calories),
            PlanContent::Generated(m) => m.get("targetCalories").and_then(Value::as_i64),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(default)]
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Profile fields collected during onboarding.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserRecord {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            email: email.into(),
            name: None,
            created_at: None,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    #[serde(default)]
    pub id: String,
    pub user_id: String,
    pub role: ChatRole,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ReplySource>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationRecord {
    pub fn new(user_id: impl Into<String>, role: ChatRole, message: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            user_id: user_id.into(),
            role,
            message: message.into(),
            source: None,
            timestamp: Utc::now(),
        }
    }
}
