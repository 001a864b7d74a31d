//! Configurable capabilities and the snapshot types the resolver produces.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

const AI_MIN_KEY_LEN: usize = 30;
const DATABASE_SCHEME: &str = "postgresql://";

/// Example values shipped in `.env.example`; never accepted as a real AI key.
const AI_PLACEHOLDERS: &[&str] = &["sua_chave_gemini_aqui", "your_gemini_api_key_here"];

/// Markers of an unedited example connection string.
const DATABASE_PLACEHOLDER_MARKERS: &[&str] = &["sua_string_neon", "your_database_url_here"];

const SIGNING_SECRET_PLACEHOLDERS: &[&str] = &["sua_chave_jwt_super_secreta_aqui"];

/// One configurable capability. Declaration order is the fixed capability order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    /// Generative-AI API key.
    Ai,
    /// Relational database connection string.
    Database,
    /// Session signing secret.
    SigningSecret,
}

impl Capability {
    pub const ALL: [Capability; 3] = [Capability::Ai, Capability::Database, Capability::SigningSecret];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Ai => "ai",
            Capability::Database => "database",
            Capability::SigningSecret => "signingSecret",
        }
    }

    /// Environment variables consulted for this capability, first non-empty wins.
    pub fn env_vars(&self) -> &'static [&'static str] {
        match self {
            Capability::Ai => &["NUTRI_GEMINI_API_KEY", "GEMINI_API_KEY"],
            Capability::Database => &["NUTRI_DATABASE_URL", "DATABASE_URL"],
            Capability::SigningSecret => &["NUTRI_JWT_SECRET", "JWT_SECRET"],
        }
    }

    /// Human-facing service name used in issues and gateway messages.
    pub fn service_name(&self) -> &'static str {
        match self {
            Capability::Ai => "Gemini AI",
            Capability::Database => "Database",
            Capability::SigningSecret => "JWT",
        }
    }

    /// Syntactic check of a candidate value. No network access.
    pub fn validate(&self, value: &str) -> bool {
        let v = value.trim();
        if v.is_empty() {
            return false;
        }
        match self {
            Capability::Ai => v.chars().count() >= AI_MIN_KEY_LEN && !AI_PLACEHOLDERS.contains(&v),
            Capability::Database => {
                v.contains(DATABASE_SCHEME)
                    && !DATABASE_PLACEHOLDER_MARKERS.iter().any(|m| v.contains(m))
            }
            Capability::SigningSecret => !SIGNING_SECRET_PLACEHOLDERS.contains(&v),
        }
    }

    /// Message shown when `validate` refuses a value.
    pub fn rejection_message(&self) -> &'static str {
        match self {
            Capability::Ai => "Chave API do Gemini inválida",
            Capability::Database => "URL do banco de dados inválida",
            Capability::SigningSecret => "Segredo JWT inválido",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = String;

    /// Accepts the canonical names plus the short service names used by the configuration page.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ai" | "gemini" => Ok(Capability::Ai),
            "database" | "db" => Ok(Capability::Database),
            "signingSecret" | "signing_secret" | "jwt" => Ok(Capability::SigningSecret),
            other => Err(format!("unknown capability: {}", other)),
        }
    }
}

/// Where an accepted value came from. Diagnostics only; precedence is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Environment,
    Stored,
    Generated,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigEntry {
    pub value: Option<String>,
    pub is_configured: bool,
    pub source: Source,
}

impl ConfigEntry {
    pub fn unconfigured() -> Self {
        Self {
            value: None,
            is_configured: false,
            source: Source::None,
        }
    }

    pub fn accepted(value: String, source: Source) -> Self {
        Self {
            value: Some(value),
            is_configured: true,
            source,
        }
    }
}

/// Immutable capability → entry map taken by `refresh()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    entries: BTreeMap<Capability, ConfigEntry>,
}

impl ConfigSnapshot {
    pub(crate) fn from_entries(entries: BTreeMap<Capability, ConfigEntry>) -> Self {
        Self { entries }
    }

    pub fn entry(&self, capability: Capability) -> ConfigEntry {
        self.entries
            .get(&capability)
            .cloned()
            .unwrap_or_else(ConfigEntry::unconfigured)
    }

    pub fn is_configured(&self, capability: Capability) -> bool {
        self.entries
            .get(&capability)
            .map(|e| e.is_configured)
            .unwrap_or(false)
    }

    pub fn value(&self, capability: Capability) -> Option<&str> {
        self.entries
            .get(&capability)
            .filter(|e| e.is_configured)
            .and_then(|e| e.value.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Capability, &ConfigEntry)> {
        self.entries.iter()
    }

    pub(crate) fn with_entry(&self, capability: Capability, entry: ConfigEntry) -> Self {
        let mut entries = self.entries.clone();
        entries.insert(capability, entry);
        Self { entries }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
}

/// Advisory note about an unconfigured capability. Never blocks operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub capability: Capability,
    pub severity: Severity,
    pub service: String,
    pub message: String,
    pub suggested_action: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityState {
    Configured,
    Pending,
}

impl From<bool> for CapabilityState {
    fn from(configured: bool) -> Self {
        if configured {
            CapabilityState::Configured
        } else {
            CapabilityState::Pending
        }
    }
}

/// Compact per-capability summary for status badges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigStatus {
    pub ai: CapabilityState,
    pub database: CapabilityState,
    pub signing_secret: CapabilityState,
    pub ready: bool,
}

/// Shows the first and last four characters of a secret, for logs and status pages.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}…{}", head, tail)
}
