//! Energy arithmetic and the fixed demo plan used when the AI endpoint is unavailable.
//!
//! Basal rate uses the revised Harris-Benedict equations. Every rounding step
//! matches what the plan page displays, so the same profile always yields the
//! same integers.

use crate::records::{ComputedPlan, Macros, Meals, ShoppingItem};
use serde::{Deserialize, Serialize};
use std::fmt;

const DEFAULT_ACTIVITY_FACTOR: f64 = 1.375;
const WEIGHT_LOSS_FACTOR: f64 = 0.85;
const WEIGHT_GAIN_FACTOR: f64 = 1.15;

pub const GOAL_WEIGHT_LOSS: &str = "WEIGHT_LOSS";
pub const GOAL_WEIGHT_GAIN: &str = "WEIGHT_GAIN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Masculino,
    Feminino,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityLevel {
    Sedentario,
    LevementeAtivo,
    ModeradamenteAtivo,
    MuitoAtivo,
    ExtremamenteAtivo,
    #[serde(other)]
    Unknown,
}

impl ActivityLevel {
    pub fn factor(&self) -> f64 {
        match self {
            ActivityLevel::Sedentario => 1.2,
            ActivityLevel::LevementeAtivo => 1.375,
            ActivityLevel::ModeradamenteAtivo => 1.55,
            ActivityLevel::MuitoAtivo => 1.725,
            ActivityLevel::ExtremamenteAtivo => 1.9,
            ActivityLevel::Unknown => DEFAULT_ACTIVITY_FACTOR,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Gender::Masculino => "MASCULINO",
            Gender::Feminino => "FEMININO",
            Gender::Other => "OUTRO",
        })
    }
}

impl fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActivityLevel::Sedentario => "SEDENTARIO",
            ActivityLevel::LevementeAtivo => "LEVEMENTE_ATIVO",
            ActivityLevel::ModeradamenteAtivo => "MODERADAMENTE_ATIVO",
            ActivityLevel::MuitoAtivo => "MUITO_ATIVO",
            ActivityLevel::ExtremamenteAtivo => "EXTREMAMENTE_ATIVO",
            ActivityLevel::Unknown => "DESCONHECIDO",
        })
    }
}

/// Onboarding answers used for plan generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub user_id: Option<String>,
    pub age: f64,
    /// Kilograms.
    pub weight: f64,
    /// Centimetres.
    pub height: f64,
    pub gender: Gender,
    pub activity_level: ActivityLevel,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub restrictions: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
}

impl UserProfile {
    pub fn has_goal(&self, goal: &str) -> bool {
        self.goals.iter().any(|g| g == goal)
    }
}

/// Basal metabolic rate (kcal/day), unrounded.
pub fn basal_metabolic_rate(profile: &UserProfile) -> f64 {
    let (w, h, a) = (profile.weight, profile.height, profile.age);
    match profile.gender {
        Gender::Masculino => 88.362 + 13.397 * w + 4.799 * h - 5.677 * a,
        _ => 447.593 + 9.247 * w + 3.098 * h - 4.330 * a,
    }
}

/// Daily expenditure: `round(bmr × activity factor)`.
pub fn total_calories(profile: &UserProfile) -> i64 {
    (basal_metabolic_rate(profile) * profile.activity_level.factor()).round() as i64
}

/// Expenditure adjusted for the goal: −15% for weight loss, +15% for weight gain.
/// Weight loss is checked first when both tags are present.
pub fn target_calories(profile: &UserProfile) -> i64 {
    let total = total_calories(profile);
    if profile.has_goal(GOAL_WEIGHT_LOSS) {
        (total as f64 * WEIGHT_LOSS_FACTOR).round() as i64
    } else if profile.has_goal(GOAL_WEIGHT_GAIN) {
        (total as f64 * WEIGHT_GAIN_FACTOR).round() as i64
    } else {
        total
    }
}

/// 25% protein, 45% carbohydrate (4 kcal/g), 30% fat (9 kcal/g).
pub fn macros_for(target: i64) -> Macros {
    let t = target as f64;
    Macros {
        protein: (t * 0.25 / 4.0).round() as i64,
        carbs: (t * 0.45 / 4.0).round() as i64,
        fat: (t * 0.30 / 9.0).round() as i64,
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn demo_meals() -> Meals {
    Meals {
        breakfast: strings(&[
            "2 fatias de pão integral com abacate e ovo",
            "1 xícara de café com leite desnatado",
            "1 banana média",
        ]),
        lunch: strings(&[
            "150g de peito de frango grelhado",
            "1 xícara de arroz integral",
            "Salada verde com azeite",
            "1 porção de feijão",
        ]),
        dinner: strings(&[
            "150g de peixe assado",
            "Legumes refogados",
            "1 batata doce média",
            "Salada de folhas verdes",
        ]),
        snacks: strings(&[
            "1 iogurte natural com granola",
            "Mix de castanhas (30g)",
            "1 maçã com canela",
        ]),
    }
}

pub fn demo_shopping_list() -> Vec<ShoppingItem> {
    [
        ("Pão integral", "1 pacote", "Padaria"),
        ("Ovos", "1 dúzia", "Laticínios"),
        ("Peito de frango", "1 kg", "Carnes"),
        ("Arroz integral", "1 kg", "Grãos"),
        ("Feijão", "500g", "Grãos"),
        ("Batata doce", "1 kg", "Hortifruti"),
        ("Alface", "1 pé", "Hortifruti"),
        ("Tomate", "500g", "Hortifruti"),
        ("Banana", "1 cacho", "Hortifruti"),
        ("Maçã", "1 kg", "Hortifruti"),
    ]
    .into_iter()
    .map(|(item, quantity, category)| ShoppingItem {
        item: item.to_string(),
        quantity: quantity.to_string(),
        category: category.to_string(),
    })
    .collect()
}

pub fn demo_tips() -> Vec<String> {
    strings(&[
        "Beba pelo menos 2 litros de água por dia",
        "Faça refeições a cada 3-4 horas",
        "Inclua vegetais em todas as refeições principais",
        "Evite alimentos ultraprocessados",
        "Pratique atividade física regularmente",
    ])
}

/// Plan body built entirely from the profile and the fixed demo menu.
pub fn computed_plan(profile: &UserProfile) -> ComputedPlan {
    let target = target_calories(profile);
    ComputedPlan {
        title: format!("Plano Personalizado - {} kcal", target),
        description: "Plano alimentar baseado no seu perfil e objetivos".to_string(),
        target_calories: target,
        macros: macros_for(target),
        meals: demo_meals(),
        shopping_list: demo_shopping_list(),
        tips: demo_tips(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_profile() -> UserProfile {
        UserProfile {
            user_id: Some("u1".into()),
            age: 25.0,
            weight: 70.0,
            height: 170.0,
            gender: Gender::Masculino,
            activity_level: ActivityLevel::Sedentario,
            goals: vec![GOAL_WEIGHT_LOSS.into()],
            restrictions: vec![],
            allergies: vec![],
        }
    }

    #[test]
    fn male_sedentary_weight_loss_chain() {
        let p = reference_profile();
        let bmr = basal_metabolic_rate(&p);
        assert!((bmr - 1700.057).abs() < 1e-9, "bmr was {}", bmr);
        assert_eq!(total_calories(&p), 2040);
        assert_eq!(target_calories(&p), 1734);
        assert_eq!(
            macros_for(1734),
            Macros {
                protein: 108,
                carbs: 195,
                fat: 58
            }
        );
    }

    #[test]
    fn weight_gain_adds_fifteen_percent() {
        let p = UserProfile {
            goals: vec![GOAL_WEIGHT_GAIN.into()],
            ..reference_profile()
        };
        assert_eq!(target_calories(&p), 2346);
    }

    #[test]
    fn no_goal_keeps_total() {
        let p = UserProfile {
            goals: vec!["MUSCLE_TONE".into()],
            ..reference_profile()
        };
        assert_eq!(target_calories(&p), total_calories(&p));
    }

    #[test]
    fn female_formula_and_default_factor() {
        let p = UserProfile {
            gender: Gender::Feminino,
            activity_level: ActivityLevel::Unknown,
            goals: vec![],
            age: 30.0,
            weight: 60.0,
            height: 165.0,
            ..reference_profile()
        };
        // 447.593 + 554.82 + 511.17 - 129.9 = 1383.683
        assert!((basal_metabolic_rate(&p) - 1383.683).abs() < 1e-9);
        // 1383.683 * 1.375 = 1902.56...
        assert_eq!(total_calories(&p), 1903);
    }

    #[test]
    fn unknown_tags_deserialize_to_defaults() {
        let p: UserProfile = serde_json::from_value(serde_json::json!({
            "age": 40, "weight": 80, "height": 180,
            "gender": "NAO_INFORMADO", "activityLevel": "ATLETA"
        }))
        .unwrap();
        assert_eq!(p.gender, Gender::Other);
        assert_eq!(p.activity_level.factor(), 1.375);
        assert!(p.goals.is_empty());
    }

    #[test]
    fn computed_plan_title_carries_target() {
        let plan = computed_plan(&reference_profile());
        assert_eq!(plan.title, "Plano Personalizado - 1734 kcal");
        assert_eq!(plan.shopping_list.len(), 10);
        assert_eq!(plan.tips.len(), 5);
        assert_eq!(plan.meals.lunch.len(), 4);
    }
}
