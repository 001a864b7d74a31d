//! nutri-core: configuration resolution and fallback-capable services for NutriAI.
//!
//! Credentials for the AI endpoint, the database and the session signing secret
//! are resolved from the environment, then the persisted credential record,
//! then (for the signing secret only) generation. Services read the shared
//! [`ConfigHandle`] on every call and degrade to local behaviour when a
//! capability is missing or its live call fails.

pub mod capability;
pub mod credentials;
pub mod error;
pub mod local_db;
pub mod nutrition;
pub mod records;
pub mod resolver;
pub mod services;
pub mod settings;
pub mod store;

pub use capability::{
    mask_secret, Capability, CapabilityState, ConfigEntry, ConfigSnapshot, ConfigStatus, Severity,
    Source, ValidationIssue,
};
pub use credentials::{CredentialStore, StoredEntry, StoredRecord, CREDENTIALS_KEY};
pub use error::{Rejection, ServiceError, StoreError};
pub use local_db::{LocalData, LocalDb, LOCAL_DB_KEY};
pub use nutrition::{ActivityLevel, Gender, UserProfile};
pub use records::{
    ChatReply, ChatRole, ChatTurn, ConversationRecord, DietPlan, PlanContent, PlanStatus,
    ReplySource, UserRecord,
};
pub use resolver::{generate_signing_secret, ConfigHandle, ConfigResolver};
pub use services::{
    serve_with_fallback, AiService, CapabilityService, DatabaseService, FallbackReason, Served,
    ServedBy,
};
pub use settings::{Environment, NutriConfig, ResolverOptions};
pub use store::{KvStore, MemoryKv, SledKv};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
