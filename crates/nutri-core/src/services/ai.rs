//! Gemini text-generation service with a deterministic local fallback.
//!
//! Live calls go to `{base}/v1beta/models/{model}:generateContent` with the key
//! in the `x-goog-api-key` header, never in the URL.
//! Without a key, or when the call fails in any way, chat answers come from a
//! fixed keyword table and diet plans are computed from the profile.

use super::{serve_with_fallback, CapabilityService, Served};
use crate::capability::Capability;
use crate::error::ServiceError;
use crate::nutrition::{computed_plan, UserProfile};
use crate::records::{
    ChatReply, ChatTurn, DietPlan, PlanContent, PlanStatus, ReplySource, PLAN_ENVELOPE_KEYS,
};
use crate::resolver::ConfigHandle;
use crate::settings::{DEFAULT_GEMINI_API_BASE, DEFAULT_GEMINI_MODEL};
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub(crate) const API_KEY_HEADER: &str = "x-goog-api-key";

pub const FALLBACK_NOTE: &str =
    "Esta é uma resposta de demonstração. Configure a API do Gemini para respostas personalizadas.";

/// Trigger substring → reply. Checked in order against the lowercased message.
const FALLBACK_REPLIES: &[(&str, &str)] = &[
    (
        "ola",
        "Olá! Sou o assistente nutricional da NutriAI. Posso ajudar com dúvidas sobre alimentação, \
         receitas saudáveis e planejamento de refeições. Como posso ajudar hoje?",
    ),
    (
        "dieta",
        "Uma dieta equilibrada combina proteínas magras, carboidratos complexos e gorduras boas em todas \
         as refeições. Priorize alimentos naturais como arroz integral, feijão, frutas, verduras e legumes, \
         e evite ultraprocessados. Para um plano personalizado, complete seu perfil no onboarding.",
    ),
    (
        "receita",
        "Uma receita prática: peito de frango grelhado com legumes refogados e arroz integral. Tempere o \
         frango com alho, limão e ervas, grelhe por 6 a 8 minutos de cada lado e sirva com brócolis, \
         cenoura e abobrinha salteados no azeite.",
    ),
    (
        "peso",
        "Para controlar o peso de forma sustentável, mantenha um déficit calórico moderado, faça refeições \
         a cada 3-4 horas, beba pelo menos 2 litros de água por dia e pratique atividade física \
         regularmente. Pequenas mudanças consistentes geram grandes resultados!",
    ),
];

const DEFAULT_FALLBACK_REPLY: &str =
    "Ótima pergunta! Para uma alimentação saudável, recomendo focar em alimentos naturais e variados. \
     Inclua proteínas magras, carboidratos complexos e gorduras boas em suas refeições.";

const CHAT_GENERATION: GenerationConfig = GenerationConfig {
    temperature: 0.8,
    top_k: 40,
    top_p: 0.95,
    max_output_tokens: 1024,
};

const PLAN_GENERATION: GenerationConfig = GenerationConfig {
    temperature: 0.7,
    top_k: 40,
    top_p: 0.95,
    max_output_tokens: 2048,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// Reply picked by keyword for a message, without any network access.
pub fn fallback_chat_reply(message: &str) -> ChatReply {
    let lower = message.to_lowercase();
    let text = FALLBACK_REPLIES
        .iter()
        .find(|(trigger, _)| lower.contains(trigger))
        .map(|(_, reply)| *reply)
        .unwrap_or(DEFAULT_FALLBACK_REPLY);
    ChatReply {
        message: text.to_string(),
        timestamp: Utc::now(),
        source: ReplySource::Fallback,
        note: Some(FALLBACK_NOTE.to_string()),
    }
}

pub fn build_chat_prompt(message: &str, context: &[ChatTurn]) -> String {
    let context_block = if context.is_empty() {
        String::new()
    } else {
        let lines: Vec<String> = context
            .iter()
            .map(|t| format!("{}: {}", t.role.as_str(), t.message))
            .collect();
        format!("Contexto da conversa:\n{}\n\n", lines.join("\n"))
    };
    format!(
        "{}Você é um nutricionista brasileiro especializado. Responda de forma clara e prática sobre nutrição, \
         sempre considerando a realidade brasileira.\n\nPergunta: {}\n\n\
         Responda de forma educativa e motivadora, com no máximo 200 palavras.",
        context_block, message
    )
}

fn joined_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "Nenhuma".to_string()
    } else {
        items.join(", ")
    }
}

pub fn build_diet_prompt(profile: &UserProfile) -> String {
    format!(
        "Você é um nutricionista especializado em alimentação brasileira. Crie um plano alimentar personalizado para:\n\n\
         Perfil:\n\
         - Idade: {} anos\n\
         - Peso: {} kg\n\
         - Altura: {} cm\n\
         - Gênero: {}\n\
         - Nível de atividade: {}\n\
         - Objetivos: {}\n\
         - Restrições: {}\n\
         - Alergias: {}\n\n\
         Crie um plano com:\n\
         1. Café da manhã\n\
         2. Almoço\n\
         3. Jantar\n\
         4. 2 lanches\n\
         5. Lista de compras\n\
         6. Dicas nutricionais\n\n\
         Use ingredientes brasileiros e receitas práticas. Formate em JSON.",
        profile.age,
        profile.weight,
        profile.height,
        profile.gender,
        profile.activity_level,
        profile.goals.join(", "),
        joined_or_none(&profile.restrictions),
        joined_or_none(&profile.allergies),
    )
}

/// Models often wrap JSON in a Markdown fence; accept that, nothing looser.
fn strip_code_fence(text: &str) -> &str {
    let t = text.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn plan_from_model_output(text: &str, profile: &UserProfile) -> Result<DietPlan, ServiceError> {
    let value: serde_json::Value = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| ServiceError::MalformedResponse(format!("plan is not JSON: {}", e)))?;
    let serde_json::Value::Object(mut body) = value else {
        return Err(ServiceError::MalformedResponse(
            "plan is not a JSON object".to_string(),
        ));
    };
    for key in PLAN_ENVELOPE_KEYS {
        body.remove(*key);
    }
    Ok(DietPlan {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: profile.user_id.clone(),
        created_at: Utc::now(),
        status: PlanStatus::Active,
        source: ReplySource::Gemini,
        content: PlanContent::Generated(body),
    })
}

/// Plan built from the profile alone.
pub fn fallback_diet_plan(profile: &UserProfile) -> DietPlan {
    DietPlan {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: profile.user_id.clone(),
        created_at: Utc::now(),
        status: PlanStatus::Active,
        source: ReplySource::Fallback,
        content: PlanContent::Computed(computed_plan(profile)),
    }
}

pub struct AiService {
    config: ConfigHandle,
    client: reqwest::Client,
    api_base: String,
    model: String,
    /// One gate per conversation, held for the whole call so a user's replies
    /// complete in send order. Idle gates are dropped.
    chat_gates: DashMap<String, Arc<Mutex<()>>>,
}

impl AiService {
    pub fn new(config: ConfigHandle) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            chat_gates: DashMap::new(),
        }
    }

    /// Point at another Gemini-compatible host (trailing `/` ignored).
    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        self
    }

    /// Chat within one user's conversation. Calls for the same `conversation`
    /// run one at a time; other conversations are not held up.
    pub async fn chat_in(
        &self,
        conversation: &str,
        message: &str,
        context: &[ChatTurn],
    ) -> Served<ChatReply> {
        let gate = self
            .chat_gates
            .entry(conversation.to_string())
            .or_default()
            .clone();
        let served = {
            let _turn = gate.lock().await;
            self.chat(message, context).await
        };
        drop(gate);
        self.chat_gates
            .remove_if(conversation, |_, g| Arc::strong_count(g) == 1);
        served
    }

    /// Stateless chat with no ordering guarantee between calls.
    pub async fn chat(&self, message: &str, context: &[ChatTurn]) -> Served<ChatReply> {
        let key = self.config.value(Capability::Ai).await;
        serve_with_fallback(
            "ai.chat",
            key.is_some(),
            || async {
                let key = key.clone().ok_or(ServiceError::NotConfigured(Capability::Ai))?;
                let prompt = build_chat_prompt(message, context);
                let text = self.generate_text(&key, &prompt, CHAT_GENERATION).await?;
                Ok(ChatReply {
                    message: text,
                    timestamp: Utc::now(),
                    source: ReplySource::Gemini,
                    note: None,
                })
            },
            || fallback_chat_reply(message),
        )
        .await
    }

    pub async fn generate_diet_plan(&self, profile: &UserProfile) -> Served<DietPlan> {
        let key = self.config.value(Capability::Ai).await;
        serve_with_fallback(
            "ai.diet_plan",
            key.is_some(),
            || async {
                let key = key.clone().ok_or(ServiceError::NotConfigured(Capability::Ai))?;
                let prompt = build_diet_prompt(profile);
                let text = self.generate_text(&key, &prompt, PLAN_GENERATION).await?;
                plan_from_model_output(&text, profile)
            },
            || fallback_diet_plan(profile),
        )
        .await
    }

    async fn generate_text(
        &self,
        key: &str,
        prompt: &str,
        generation_config: GenerationConfig,
    ) -> Result<String, ServiceError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.api_base, self.model);
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config,
        };

        tracing::debug!(target: "nutri::ai", "Dispatching to Gemini (model: {})", self.model);
        let res = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, key)
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| ServiceError::MalformedResponse(e.to_string()))?;
        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| {
                ServiceError::MalformedResponse(
                    "missing candidates[0].content.parts[0].text".to_string(),
                )
            })
    }
}

#[async_trait::async_trait]
impl CapabilityService for AiService {
    fn capability(&self) -> Capability {
        Capability::Ai
    }

    fn config(&self) -> &ConfigHandle {
        &self.config
    }
}
