use crate::agent_engine::state::RunMode;
use crate::errors::{AgentError, AgentResult};

const ACTION_TEMPLATE: &str = include_str!("../../prompts/action.txt");
const DESCRIBE_TEMPLATE: &str = include_str!("../../prompts/describe.txt");

pub const CUSTOM_PERSONA_ID: &str = "custom";

/// A named goal preset. Chosen once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub id: String,
    pub display_name: String,
    pub goal: String,
}

const CATALOG: &[(&str, &str, &str)] = &[
    ("explorer", "Explorer", "Explore the world"),
    (
        "treasure_hunter",
        "Treasure Hunter",
        "Walk forward and find a chest",
    ),
    ("fighter", "Fighter", "Find enemies and defeat them"),
    (
        "gatherer",
        "Gatherer",
        "Collect nearby items, plants and resources",
    ),
    (
        "companion",
        "Companion",
        "Keep the player company and comment on what is happening",
    ),
];

pub fn catalog() -> Vec<Persona> {
    CATALOG
        .iter()
        .map(|(id, name, goal)| Persona {
            id: (*id).to_string(),
            display_name: (*name).to_string(),
            goal: (*goal).to_string(),
        })
        .collect()
}

pub fn custom(goal: &str) -> Persona {
    Persona {
        id: CUSTOM_PERSONA_ID.to_string(),
        display_name: "Custom".to_string(),
        goal: goal.trim().to_string(),
    }
}

/// Resolves a persona from a catalog id, a 1-based catalog index, or `custom`.
pub fn select(selector: &str, custom_goal: Option<&str>) -> AgentResult<Persona> {
    let selector = selector.trim();

    if selector.eq_ignore_ascii_case(CUSTOM_PERSONA_ID) {
        return match custom_goal.map(str::trim).filter(|g| !g.is_empty()) {
            Some(goal) => Ok(custom(goal)),
            None => Err(AgentError::Config(
                "persona 'custom' needs a non-empty goal".into(),
            )),
        };
    }

    let personas = catalog();
    if let Ok(index) = selector.parse::<usize>() {
        return index
            .checked_sub(1)
            .and_then(|i| personas.get(i).cloned())
            .ok_or_else(|| AgentError::Config(format!("no persona at index {index}")));
    }

    personas
        .into_iter()
        .find(|p| p.id.eq_ignore_ascii_case(selector))
        .ok_or_else(|| AgentError::Config(format!("unknown persona '{selector}'")))
}

/// The instruction sent with every frame for the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub mode: RunMode,
    pub goal: String,
    pub text: String,
}

pub fn build_prompt(persona: &Persona, mode: RunMode) -> Prompt {
    let template = match mode {
        RunMode::Action => ACTION_TEMPLATE,
        RunMode::Describe => DESCRIBE_TEMPLATE,
    };
    Prompt {
        mode,
        goal: persona.goal.clone(),
        text: template.trim_end().replace("{goal}", &persona.goal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_by_id_and_index() {
        assert_eq!(select("fighter", None).unwrap().display_name, "Fighter");
        assert_eq!(select("Explorer", None).unwrap().id, "explorer");
        assert_eq!(select("2", None).unwrap().id, "treasure_hunter");
    }

    #[test]
    fn rejects_unknown_selectors() {
        assert!(select("0", None).is_err());
        assert!(select("99", None).is_err());
        assert!(select("wizard", None).is_err());
    }

    #[test]
    fn custom_needs_goal() {
        assert!(select("custom", None).is_err());
        assert!(select("custom", Some("   ")).is_err());
        let p = select("custom", Some(" Find the blacksmith ")).unwrap();
        assert_eq!(p.goal, "Find the blacksmith");
    }

    #[test]
    fn action_prompt_carries_goal_and_protocol() {
        let persona = select("treasure_hunter", None).unwrap();
        let prompt = build_prompt(&persona, RunMode::Action);
        assert!(prompt.text.contains("Walk forward and find a chest"));
        assert!(prompt.text.contains(r#""type": "press_key""#));
        assert!(!prompt.text.contains("{goal}"));
    }

    #[test]
    fn describe_prompt_only_offers_say() {
        let persona = custom("Watch the boss fight");
        let prompt = build_prompt(&persona, RunMode::Describe);
        assert_eq!(prompt.mode, RunMode::Describe);
        assert!(prompt.text.contains("Watch the boss fight"));
        assert!(prompt.text.contains(r#""type": "say""#));
        assert!(!prompt.text.contains("press_key"));
    }
}
