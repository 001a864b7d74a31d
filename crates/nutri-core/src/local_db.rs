//! Local record store used when no database is reachable.
//!
//! Holds users, diet plans and conversation history in memory and writes the
//! whole set back as one JSON blob under `nutri-ai-local-db` after every
//! change. Users are unique by email (last write wins); plans and
//! conversations only ever grow.

use crate::records::{ConversationRecord, DietPlan, UserRecord};
use crate::store::KvStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

pub const LOCAL_DB_KEY: &str = "nutri-ai-local-db";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalData {
    #[serde(default)]
    pub users: Vec<UserRecord>,
    #[serde(default)]
    pub diet_plans: Vec<DietPlan>,
    #[serde(default)]
    pub conversations: Vec<ConversationRecord>,
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn id_or_new(id: &str) -> String {
    if id.trim().is_empty() {
        new_id()
    } else {
        id.to_string()
    }
}

pub struct LocalDb {
    kv: Arc<dyn KvStore>,
    data: Mutex<LocalData>,
}

impl LocalDb {
    /// Loads the persisted blob; missing or unreadable data starts empty.
    pub fn open(kv: Arc<dyn KvStore>) -> Self {
        let data = match kv.get(LOCAL_DB_KEY) {
            Ok(Some(bytes)) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!(target: "nutri::database", "Local data unreadable, starting empty: {}", e);
                LocalData::default()
            }),
            Ok(None) => LocalData::default(),
            Err(e) => {
                tracing::warn!(target: "nutri::database", "Failed to read local data: {}", e);
                LocalData::default()
            }
        };
        Self {
            kv,
            data: Mutex::new(data),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LocalData> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, data: &LocalData) {
        let result = serde_json::to_vec(data)
            .map_err(crate::error::StoreError::from)
            .and_then(|bytes| self.kv.put(LOCAL_DB_KEY, &bytes));
        if let Err(e) = result {
            tracing::warn!(target: "nutri::database", "Failed to save local data: {}", e);
        }
    }

    pub fn save_user(&self, user: UserRecord) -> UserRecord {
        let user = UserRecord {
            id: id_or_new(&user.id),
            created_at: Some(Utc::now()),
            ..user
        };
        let mut data = self.lock();
        match data.users.iter().position(|u| u.email == user.email) {
            Some(i) => data.users[i] = user.clone(),
            None => data.users.push(user.clone()),
        }
        self.persist(&data);
        user
    }

    pub fn find_user(&self, email: &str) -> Option<UserRecord> {
        self.lock().users.iter().find(|u| u.email == email).cloned()
    }

    pub fn save_diet_plan(&self, plan: DietPlan) -> DietPlan {
        let plan = DietPlan {
            id: id_or_new(&plan.id),
            created_at: Utc::now(),
            ..plan
        };
        let mut data = self.lock();
        data.diet_plans.push(plan.clone());
        self.persist(&data);
        plan
    }

    pub fn diet_plans_for(&self, user_id: &str) -> Vec<DietPlan> {
        self.lock()
            .diet_plans
            .iter()
            .filter(|p| p.user_id.as_deref() == Some(user_id))
            .cloned()
            .collect()
    }

    pub fn save_conversation(&self, record: ConversationRecord) -> ConversationRecord {
        let record = ConversationRecord {
            id: id_or_new(&record.id),
            ..record
        };
        let mut data = self.lock();
        data.conversations.push(record.clone());
        self.persist(&data);
        record
    }

    pub fn conversations_for(&self, user_id: &str) -> Vec<ConversationRecord> {
        self.lock()
            .conversations
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn snapshot(&self) -> LocalData {
        self.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::ChatRole;
    use crate::store::MemoryKv;

    #[test]
    fn users_are_unique_by_email() {
        let db = LocalDb::open(Arc::new(MemoryKv::new()));
        let mut first = UserRecord::new("ana@example.com");
        first.name = Some("Ana".into());
        let saved = db.save_user(first);
        assert!(!saved.id.is_empty());

        let mut second = UserRecord::new("ana@example.com");
        second.name = Some("Ana Souza".into());
        second.id = "custom-id".into();
        db.save_user(second);

        let data = db.snapshot();
        assert_eq!(data.users.len(), 1);
        assert_eq!(data.users[0].name.as_deref(), Some("Ana Souza"));
        assert_eq!(data.users[0].id, "custom-id");
    }

    #[test]
    fn data_survives_reopen() {
        let kv = MemoryKv::new();
        {
            let db = LocalDb::open(Arc::new(kv.clone()));
            db.save_user(UserRecord::new("bia@example.com"));
            db.save_conversation(ConversationRecord::new("u1", ChatRole::User, "Oi"));
        }
        let db = LocalDb::open(Arc::new(kv));
        assert!(db.find_user("bia@example.com").is_some());
        assert_eq!(db.conversations_for("u1").len(), 1);
        assert!(db.find_user("nobody@example.com").is_none());
    }

    #[test]
    fn corrupt_blob_starts_empty() {
        let kv = MemoryKv::new();
        kv.put(LOCAL_DB_KEY, b"<<garbage>>").unwrap();
        let db = LocalDb::open(Arc::new(kv));
        assert_eq!(db.snapshot(), LocalData::default());
    }

    #[test]
    fn conversations_append_in_order() {
        let db = LocalDb::open(Arc::new(MemoryKv::new()));
        db.save_conversation(ConversationRecord::new("u1", ChatRole::User, "Oi"));
        db.save_conversation(ConversationRecord::new("u2", ChatRole::User, "Olá"));
        db.save_conversation(ConversationRecord::new("u1", ChatRole::Assistant, "Olá!"));
        let history = db.conversations_for("u1");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, ChatRole::User);
        assert_eq!(history[1].message, "Olá!");
    }
}
