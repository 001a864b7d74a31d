//! Persistence service: remote database first, local record store otherwise.
//!
//! No database driver ships yet. [`UnimplementedBackend`] fails every call, so
//! even with a configured connection string the records land in [`LocalDb`]
//! through the normal fallback path.

use super::{serve_with_fallback, CapabilityService, Served};
use crate::capability::Capability;
use crate::error::ServiceError;
use crate::local_db::LocalDb;
use crate::records::{ConversationRecord, DietPlan, UserRecord};
use crate::resolver::ConfigHandle;
use crate::store::KvStore;
use std::sync::Arc;

const NOT_CONFIGURED: &str = "Database não configurado";

/// Remote storage operations, one per service method.
#[async_trait::async_trait]
pub trait RemoteBackend: Send + Sync {
    async fn save_user(&self, user: &UserRecord) -> Result<UserRecord, ServiceError>;
    async fn find_user(&self, email: &str) -> Result<Option<UserRecord>, ServiceError>;
    async fn save_diet_plan(&self, plan: &DietPlan) -> Result<DietPlan, ServiceError>;
    async fn get_user_diet_plans(&self, user_id: &str) -> Result<Vec<DietPlan>, ServiceError>;
    async fn save_conversation(
        &self,
        record: &ConversationRecord,
    ) -> Result<ConversationRecord, ServiceError>;
    async fn get_conversations(&self, user_id: &str) -> Result<Vec<ConversationRecord>, ServiceError>;
}

/// Placeholder until a Postgres backend exists.
pub struct UnimplementedBackend;

#[async_trait::async_trait]
impl RemoteBackend for UnimplementedBackend {
    async fn save_user(&self, _user: &UserRecord) -> Result<UserRecord, ServiceError> {
        Err(ServiceError::NotImplemented(NOT_CONFIGURED))
    }

    async fn find_user(&self, _email: &str) -> Result<Option<UserRecord>, ServiceError> {
        Err(ServiceError::NotImplemented(NOT_CONFIGURED))
    }

    async fn save_diet_plan(&self, _plan: &DietPlan) -> Result<DietPlan, ServiceError> {
        Err(ServiceError::NotImplemented(NOT_CONFIGURED))
    }

    async fn get_user_diet_plans(&self, _user_id: &str) -> Result<Vec<DietPlan>, ServiceError> {
        Err(ServiceError::NotImplemented(NOT_CONFIGURED))
    }

    async fn save_conversation(
        &self,
        _record: &ConversationRecord,
    ) -> Result<ConversationRecord, ServiceError> {
        Err(ServiceError::NotImplemented(NOT_CONFIGURED))
    }

    async fn get_conversations(&self, _user_id: &str) -> Result<Vec<ConversationRecord>, ServiceError> {
        Err(ServiceError::NotImplemented(NOT_CONFIGURED))
    }
}

pub struct DatabaseService {
    config: ConfigHandle,
    remote: Arc<dyn RemoteBackend>,
    local: LocalDb,
}

impl DatabaseService {
    /// Local store on `kv`, remote calls through [`UnimplementedBackend`].
    pub fn new(config: ConfigHandle, kv: Arc<dyn KvStore>) -> Self {
        Self {
            config,
            remote: Arc::new(UnimplementedBackend),
            local: LocalDb::open(kv),
        }
    }

    pub fn with_backend(mut self, remote: Arc<dyn RemoteBackend>) -> Self {
        self.remote = remote;
        self
    }

    pub fn local(&self) -> &LocalDb {
        &self.local
    }

    pub async fn save_user(&self, user: UserRecord) -> Served<UserRecord> {
        let available = self.is_available().await;
        serve_with_fallback(
            "database.save_user",
            available,
            || self.remote.save_user(&user),
            || self.local.save_user(user.clone()),
        )
        .await
    }

    pub async fn find_user(&self, email: &str) -> Served<Option<UserRecord>> {
        let available = self.is_available().await;
        serve_with_fallback(
            "database.find_user",
            available,
            || self.remote.find_user(email),
            || self.local.find_user(email),
        )
        .await
    }

    pub async fn save_diet_plan(&self, plan: DietPlan) -> Served<DietPlan> {
        let available = self.is_available().await;
        serve_with_fallback(
            "database.save_diet_plan",
            available,
            || self.remote.save_diet_plan(&plan),
            || self.local.save_diet_plan(plan.clone()),
        )
        .await
    }

    pub async fn get_user_diet_plans(&self, user_id: &str) -> Served<Vec<DietPlan>> {
        let available = self.is_available().await;
        serve_with_fallback(
            "database.get_user_diet_plans",
            available,
            || self.remote.get_user_diet_plans(user_id),
            || self.local.diet_plans_for(user_id),
        )
        .await
    }

    pub async fn save_conversation(&self, record: ConversationRecord) -> Served<ConversationRecord> {
        let available = self.is_available().await;
        serve_with_fallback(
            "database.save_conversation",
            available,
            || self.remote.save_conversation(&record),
            || self.local.save_conversation(record.clone()),
        )
        .await
    }

    pub async fn get_conversations(&self, user_id: &str) -> Served<Vec<ConversationRecord>> {
        let available = self.is_available().await;
        serve_with_fallback(
            "database.get_conversations",
            available,
            || self.remote.get_conversations(user_id),
            || self.local.conversations_for(user_id),
        )
        .await
    }
}

#[async_trait::async_trait]
impl CapabilityService for DatabaseService {
    fn capability(&self) -> Capability {
        Capability::Database
    }

    fn config(&self) -> &ConfigHandle {
        &self.config
    }
}
