//! Configuration Resolver: decides, per capability, which value is authoritative.
//!
//! Sources are tried in a fixed order (environment, stored record, generated
//! default for the signing secret) and the first value that passes
//! [`Capability::validate`] wins. The resolver is constructed once and shared
//! through a [`ConfigHandle`]; there is no module-level instance.

use crate::capability::{
    mask_secret, Capability, ConfigEntry, ConfigSnapshot, ConfigStatus, Severity, Source,
    ValidationIssue,
};
use crate::credentials::{CredentialStore, StoredEntry};
use crate::error::Rejection;
use crate::services::API_KEY_HEADER;
use crate::settings::{Environment, ResolverOptions};
use rand::{rngs::OsRng, Rng};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

const SIGNING_SECRET_LEN: usize = 64;
const SIGNING_SECRET_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*";

/// 64 characters from a fixed printable set, drawn from the OS CSPRNG.
pub fn generate_signing_secret() -> String {
    let mut rng = OsRng;
    (0..SIGNING_SECRET_LEN)
        .map(|_| SIGNING_SECRET_CHARSET[rng.gen_range(0..SIGNING_SECRET_CHARSET.len())] as char)
        .collect()
}

pub struct ConfigResolver {
    env: Environment,
    store: CredentialStore,
    options: ResolverOptions,
    client: reqwest::Client,
    snapshot: ConfigSnapshot,
}

impl ConfigResolver {
    /// Builds the resolver and takes the first snapshot.
    pub fn new(env: Environment, store: CredentialStore, options: ResolverOptions) -> Self {
        let client = reqwest::Client::builder()
            .timeout(options.ai_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        let mut resolver = Self {
            env,
            store,
            options,
            client,
            snapshot: ConfigSnapshot::from_entries(BTreeMap::new()),
        };
        resolver.refresh();
        resolver
    }

    pub fn validate(&self, capability: Capability, value: &str) -> bool {
        capability.validate(value)
    }

    /// Re-derives every entry from its sources and replaces the snapshot whole.
    pub fn refresh(&mut self) -> ConfigSnapshot {
        let mut stored = self.store.load();
        let mut generated_secret = false;
        let mut entries = BTreeMap::new();

        for capability in Capability::ALL {
            let entry = match self.from_sources(capability, &stored) {
                Some(entry) => entry,
                None if capability == Capability::SigningSecret => {
                    let secret = generate_signing_secret();
                    tracing::info!(
                        target: "nutri::resolver",
                        "No signing secret configured; generated a new one ({}).",
                        mask_secret(&secret)
                    );
                    if self.options.persist_generated_secret {
                        stored.set(capability, Some(StoredEntry::generated(secret.clone())));
                        generated_secret = true;
                    }
                    ConfigEntry::accepted(secret, Source::Generated)
                }
                None => ConfigEntry::unconfigured(),
            };
            entries.insert(capability, entry);
        }

        if generated_secret {
            self.store.save(&stored);
        }

        self.snapshot = ConfigSnapshot::from_entries(entries);
        tracing::debug!(
            target: "nutri::resolver",
            "Configuration refreshed: ai={:?} database={:?} signingSecret={:?}",
            self.snapshot.entry(Capability::Ai).source,
            self.snapshot.entry(Capability::Database).source,
            self.snapshot.entry(Capability::SigningSecret).source,
        );
        self.snapshot.clone()
    }

    fn from_sources(
        &self,
        capability: Capability,
        stored: &crate::credentials::StoredRecord,
    ) -> Option<ConfigEntry> {
        // First non-empty variable decides; a placeholder there is not
        // rescued by a later variable name.
        let from_env = self
            .env
            .first_of(capability.env_vars())
            .filter(|v| capability.validate(v));
        if let Some(v) = from_env {
            return Some(ConfigEntry::accepted(v.to_string(), Source::Environment));
        }

        let stored_entry = stored.entry(capability)?;
        let value = stored_entry
            .value
            .as_deref()
            .map(str::trim)
            .filter(|v| capability.validate(v))?;
        let source = if stored_entry.generated {
            Source::Generated
        } else {
            Source::Stored
        };
        Some(ConfigEntry::accepted(value.to_string(), source))
    }

    /// Validates and stores a value from the configuration page.
    /// A refused value leaves both the snapshot and the stored record untouched.
    pub fn configure(&mut self, capability: Capability, value: &str) -> Result<ConfigEntry, Rejection> {
        let value = value.trim();
        if !capability.validate(value) {
            tracing::warn!(
                target: "nutri::resolver",
                "Rejected {} value ({} chars).",
                capability,
                value.chars().count()
            );
            return Err(Rejection::new(capability, capability.rejection_message()));
        }

        let entry = ConfigEntry::accepted(value.to_string(), Source::Stored);
        self.snapshot = self.snapshot.with_entry(capability, entry.clone());

        let mut record = self.store.load();
        record.set(capability, Some(StoredEntry::new(value)));
        self.store.save(&record);

        tracing::info!(
            target: "nutri::resolver",
            "{} configured ({}).",
            capability.service_name(),
            mask_secret(value)
        );
        Ok(entry)
    }

    /// Live probe of a capability using the current snapshot.
    pub async fn test_connection(&self, capability: Capability) -> bool {
        let value = self.snapshot.value(capability).map(str::to_string);
        probe_connection(capability, value, &self.client, &self.options).await
    }

    /// One warning per unconfigured capability, ai before database.
    pub fn issues(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        if !self.snapshot.is_configured(Capability::Ai) {
            issues.push(ValidationIssue {
                capability: Capability::Ai,
                severity: Severity::Warning,
                service: Capability::Ai.service_name().to_string(),
                message: "Chave API não configurada. Funcionalidades de IA estarão limitadas."
                    .to_string(),
                suggested_action: "configure_gemini".to_string(),
            });
        }
        if !self.snapshot.is_configured(Capability::Database) {
            issues.push(ValidationIssue {
                capability: Capability::Database,
                severity: Severity::Warning,
                service: Capability::Database.service_name().to_string(),
                message: "Banco de dados não configurado. Usando armazenamento local.".to_string(),
                suggested_action: "configure_database".to_string(),
            });
        }
        issues
    }

    pub fn is_ready(&self) -> bool {
        Capability::ALL
            .iter()
            .all(|c| self.snapshot.is_configured(*c))
    }

    pub fn status(&self) -> ConfigStatus {
        ConfigStatus {
            ai: self.snapshot.is_configured(Capability::Ai).into(),
            database: self.snapshot.is_configured(Capability::Database).into(),
            signing_secret: self.snapshot.is_configured(Capability::SigningSecret).into(),
            ready: self.is_ready(),
        }
    }

    /// Wipes stored overrides and re-derives from the environment.
    pub fn reset(&mut self) -> ConfigSnapshot {
        self.store.clear();
        tracing::info!(target: "nutri::resolver", "Stored configuration cleared.");
        self.refresh()
    }

    pub fn snapshot(&self) -> &ConfigSnapshot {
        &self.snapshot
    }

    pub fn entry(&self, capability: Capability) -> ConfigEntry {
        self.snapshot.entry(capability)
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }
}

async fn probe_connection(
    capability: Capability,
    value: Option<String>,
    client: &reqwest::Client,
    options: &ResolverOptions,
) -> bool {
    match capability {
        Capability::Ai => {
            let Some(key) = value else {
                return false;
            };
            let url = format!("{}/v1beta/models", options.gemini_api_base);
            match client.get(&url).header(API_KEY_HEADER, key.as_str()).send().await {
                Ok(res) => {
                    let ok = res.status().is_success();
                    if !ok {
                        tracing::warn!(target: "nutri::resolver", "Gemini probe returned {}", res.status());
                    }
                    ok
                }
                Err(e) => {
                    tracing::error!(target: "nutri::resolver", "Gemini probe failed: {}", e.without_url());
                    false
                }
            }
        }
        // No database driver yet: the probe only simulates latency.
        Capability::Database => {
            tokio::time::sleep(options.database_probe_delay).await;
            true
        }
        Capability::SigningSecret => value.is_some(),
    }
}

/// Shared, lock-guarded resolver. Construct once at startup and clone into consumers.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<ConfigResolver>>,
}

impl ConfigHandle {
    pub fn new(resolver: ConfigResolver) -> Self {
        Self {
            inner: Arc::new(RwLock::new(resolver)),
        }
    }

    pub async fn snapshot(&self) -> ConfigSnapshot {
        self.inner.read().await.snapshot().clone()
    }

    pub async fn is_configured(&self, capability: Capability) -> bool {
        self.inner.read().await.snapshot().is_configured(capability)
    }

    /// Current accepted value, if any.
    pub async fn value(&self, capability: Capability) -> Option<String> {
        self.inner
            .read()
            .await
            .snapshot()
            .value(capability)
            .map(str::to_string)
    }

    pub async fn refresh(&self) -> ConfigSnapshot {
        self.inner.write().await.refresh()
    }

    pub async fn configure(&self, capability: Capability, value: &str) -> Result<ConfigEntry, Rejection> {
        self.inner.write().await.configure(capability, value)
    }

    /// Releases the lock before probing so a slow endpoint never blocks readers.
    pub async fn test_connection(&self, capability: Capability) -> bool {
        let (value, client, options) = {
            let guard = self.inner.read().await;
            (
                guard.snapshot().value(capability).map(str::to_string),
                guard.client.clone(),
                guard.options().clone(),
            )
        };
        probe_connection(capability, value, &client, &options).await
    }

    pub async fn issues(&self) -> Vec<ValidationIssue> {
        self.inner.read().await.issues()
    }

    pub async fn is_ready(&self) -> bool {
        self.inner.read().await.is_ready()
    }

    pub async fn status(&self) -> ConfigStatus {
        self.inner.read().await.status()
    }

    pub async fn reset(&self) -> ConfigSnapshot {
        self.inner.write().await.reset()
    }

    pub async fn options(&self) -> ResolverOptions {
        self.inner.read().await.options().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityState;
    use crate::credentials::StoredRecord;
    use crate::store::MemoryKv;
    use std::time::Duration;

    const ENV_KEY: &str = "AIzaSyENV-0123456789abcdefghijklmnopqrstu";
    const STORED_KEY: &str = "AIzaSySTORED-0123456789abcdefghijklmnopq";
    const DB_URL: &str = "postgresql://nutri:pw@db.neon.tech/nutri";

    fn store() -> CredentialStore {
        CredentialStore::new(Arc::new(MemoryKv::new()))
    }

    fn fast_options() -> ResolverOptions {
        ResolverOptions {
            database_probe_delay: Duration::from_millis(5),
            ..ResolverOptions::default()
        }
    }

    #[test]
    fn environment_wins_over_stored_value() {
        let store = store();
        let mut record = StoredRecord::default();
        record.set(Capability::Ai, Some(StoredEntry::new(STORED_KEY)));
        store.save(&record);

        let env = Environment::from_pairs([("NUTRI_GEMINI_API_KEY", ENV_KEY)]);
        let resolver = ConfigResolver::new(env, store, fast_options());
        let entry = resolver.entry(Capability::Ai);
        assert_eq!(entry.value.as_deref(), Some(ENV_KEY));
        assert_eq!(entry.source, Source::Environment);
        assert!(entry.is_configured);
    }

    #[test]
    fn stored_value_fills_gap() {
        let store = store();
        let mut record = StoredRecord::default();
        record.set(Capability::Database, Some(StoredEntry::new(DB_URL)));
        store.save(&record);

        let resolver = ConfigResolver::new(Environment::empty(), store, fast_options());
        let entry = resolver.entry(Capability::Database);
        assert_eq!(entry.source, Source::Stored);
        assert_eq!(entry.value.as_deref(), Some(DB_URL));
    }

    #[test]
    fn invalid_environment_value_falls_through_to_stored() {
        let store = store();
        let mut record = StoredRecord::default();
        record.set(Capability::Ai, Some(StoredEntry::new(STORED_KEY)));
        store.save(&record);

        let env = Environment::from_pairs([("NUTRI_GEMINI_API_KEY", "sua_chave_gemini_aqui")]);
        let resolver = ConfigResolver::new(env, store, fast_options());
        assert_eq!(resolver.entry(Capability::Ai).source, Source::Stored);
    }

    #[test]
    fn first_non_empty_variable_decides() {
        let env = Environment::from_pairs([
            ("NUTRI_DATABASE_URL", "postgresql://sua_string_neon/db"),
            ("DATABASE_URL", DB_URL),
        ]);
        let resolver = ConfigResolver::new(env, store(), fast_options());
        assert!(!resolver.entry(Capability::Database).is_configured);

        let env = Environment::from_pairs([("NUTRI_DATABASE_URL", "   "), ("DATABASE_URL", DB_URL)]);
        let resolver = ConfigResolver::new(env, store(), fast_options());
        assert_eq!(resolver.entry(Capability::Database).value.as_deref(), Some(DB_URL));
    }

    #[test]
    fn database_accepts_second_variable_name() {
        let env = Environment::from_pairs([("DATABASE_URL", DB_URL)]);
        let resolver = ConfigResolver::new(env, store(), fast_options());
        assert_eq!(resolver.entry(Capability::Database).source, Source::Environment);
    }

    #[test]
    fn rejected_configure_leaves_state_unchanged() {
        let env = Environment::from_pairs([("NUTRI_DATABASE_URL", DB_URL)]);
        let store = store();
        let mut resolver = ConfigResolver::new(env, store.clone(), fast_options());
        let before = resolver.snapshot().clone();
        let stored_before = store.load();

        let err = resolver.configure(Capability::Database, "not-a-url").unwrap_err();
        assert_eq!(err.capability, Capability::Database);
        assert_eq!(err.message, "URL do banco de dados inválida");
        assert_eq!(resolver.snapshot(), &before);
        assert!(resolver.entry(Capability::Database).is_configured);
        assert_eq!(store.load().database, stored_before.database);
    }

    #[test]
    fn configure_accepts_and_persists() {
        let store = store();
        let mut resolver = ConfigResolver::new(Environment::empty(), store.clone(), fast_options());
        assert!(!resolver.entry(Capability::Ai).is_configured);

        let entry = resolver.configure(Capability::Ai, &format!("  {}  ", STORED_KEY)).unwrap();
        assert_eq!(entry.value.as_deref(), Some(STORED_KEY));
        assert_eq!(entry.source, Source::Stored);
        assert_eq!(
            store.load().ai.and_then(|e| e.value),
            Some(STORED_KEY.to_string())
        );

        let fresh = ConfigResolver::new(Environment::empty(), store, fast_options());
        assert_eq!(fresh.entry(Capability::Ai).source, Source::Stored);
    }

    #[test]
    fn signing_secret_is_generated_when_absent() {
        let resolver = ConfigResolver::new(Environment::empty(), store(), fast_options());
        let entry = resolver.entry(Capability::SigningSecret);
        assert!(entry.is_configured);
        assert_eq!(entry.source, Source::Generated);
        let secret = entry.value.unwrap();
        assert_eq!(secret.chars().count(), 64);
        assert!(secret.bytes().all(|b| SIGNING_SECRET_CHARSET.contains(&b)));
    }

    #[test]
    fn fresh_resolvers_generate_distinct_secrets() {
        let a = ConfigResolver::new(Environment::empty(), store(), fast_options());
        let b = ConfigResolver::new(Environment::empty(), store(), fast_options());
        assert_ne!(
            a.entry(Capability::SigningSecret).value,
            b.entry(Capability::SigningSecret).value
        );
    }

    #[test]
    fn persisted_generated_secret_survives_restart() {
        let store = store();
        let first = ConfigResolver::new(Environment::empty(), store.clone(), fast_options());
        let second = ConfigResolver::new(Environment::empty(), store, fast_options());
        let entry = second.entry(Capability::SigningSecret);
        assert_eq!(entry.source, Source::Generated);
        assert_eq!(entry.value, first.entry(Capability::SigningSecret).value);
    }

    #[test]
    fn unpersisted_generated_secret_changes_on_restart() {
        let store = store();
        let options = ResolverOptions {
            persist_generated_secret: false,
            ..fast_options()
        };
        let first = ConfigResolver::new(Environment::empty(), store.clone(), options.clone());
        let second = ConfigResolver::new(Environment::empty(), store.clone(), options);
        assert!(store.load().signing_secret.is_none());
        assert_ne!(
            first.entry(Capability::SigningSecret).value,
            second.entry(Capability::SigningSecret).value
        );
    }

    #[test]
    fn environment_secret_is_not_generated() {
        let env = Environment::from_pairs([("NUTRI_JWT_SECRET", "s3cret")]);
        let resolver = ConfigResolver::new(env, store(), fast_options());
        let entry = resolver.entry(Capability::SigningSecret);
        assert_eq!(entry.source, Source::Environment);
        assert_eq!(entry.value.as_deref(), Some("s3cret"));
    }

    #[test]
    fn issues_list_ai_before_database() {
        let resolver = ConfigResolver::new(Environment::empty(), store(), fast_options());
        let issues = resolver.issues();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].capability, Capability::Ai);
        assert_eq!(issues[1].capability, Capability::Database);
        assert!(issues.iter().all(|i| i.severity == Severity::Warning));
        assert_eq!(issues[0].suggested_action, "configure_gemini");
    }

    #[test]
    fn readiness_needs_every_capability() {
        let env = Environment::from_pairs([("NUTRI_GEMINI_API_KEY", ENV_KEY)]);
        let mut resolver = ConfigResolver::new(env, store(), fast_options());
        assert!(!resolver.is_ready());
        assert_eq!(resolver.status().database, CapabilityState::Pending);

        resolver.configure(Capability::Database, DB_URL).unwrap();
        assert!(resolver.is_ready());
        assert!(resolver.issues().is_empty());
        assert!(resolver.status().ready);
    }

    #[test]
    fn reset_drops_stored_overrides_but_keeps_environment() {
        let env = Environment::from_pairs([("NUTRI_DATABASE_URL", DB_URL)]);
        let store = store();
        let mut resolver = ConfigResolver::new(env, store.clone(), fast_options());
        resolver.configure(Capability::Ai, STORED_KEY).unwrap();
        assert!(resolver.entry(Capability::Ai).is_configured);

        resolver.reset();
        assert!(!resolver.entry(Capability::Ai).is_configured);
        assert_eq!(resolver.entry(Capability::Database).source, Source::Environment);
        assert!(store.load().ai.is_none());
    }

    #[tokio::test]
    async fn database_probe_is_a_delayed_success() {
        let handle = ConfigHandle::new(ConfigResolver::new(Environment::empty(), store(), fast_options()));
        assert!(handle.test_connection(Capability::Database).await);
    }

    #[tokio::test]
    async fn ai_probe_without_key_fails_fast() {
        let handle = ConfigHandle::new(ConfigResolver::new(Environment::empty(), store(), fast_options()));
        assert!(!handle.test_connection(Capability::Ai).await);
    }

    #[tokio::test]
    async fn handle_configure_is_visible_to_readers() {
        let handle = ConfigHandle::new(ConfigResolver::new(Environment::empty(), store(), fast_options()));
        let reader = handle.clone();
        assert!(!reader.is_configured(Capability::Ai).await);
        handle.configure(Capability::Ai, STORED_KEY).await.unwrap();
        assert!(reader.is_configured(Capability::Ai).await);
        assert_eq!(reader.value(Capability::Ai).await.as_deref(), Some(STORED_KEY));
    }
}
