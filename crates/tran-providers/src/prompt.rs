//! Prompt presets and system prompt rendering (`MiniJinja`).

use std::fmt;
use std::str::FromStr;

use minijinja::{Environment, UndefinedBehavior, context};
use serde::{Deserialize, Serialize};

const FORMAL_TEMPLATE: &str = "You are a professional translator. Translate the following text to {{ target_language }} in a formal, polished tone. If the text is already in the target language, return it as-is. Output only the translated text, nothing else.";

const CONCISE_TEMPLATE: &str = "Translate the following text to {{ target_language }}. If the text is already in the target language, return it as-is. Output only the translated text, nothing else.";

const CASUAL_TEMPLATE: &str = "Translate the following text to {{ target_language }} in a casual, conversational tone. If the text is already in the target language, return it as-is. Output only the translated text, nothing else.";

/// Built-in prompt tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptStyle {
    Formal,
    #[default]
    Concise,
    Casual,
}

impl PromptStyle {
    pub fn template(self) -> &'static str {
        match self {
            PromptStyle::Formal => FORMAL_TEMPLATE,
            PromptStyle::Concise => CONCISE_TEMPLATE,
            PromptStyle::Casual => CASUAL_TEMPLATE,
        }
    }

    pub fn all() -> &'static [PromptStyle] {
        &[PromptStyle::Formal, PromptStyle::Concise, PromptStyle::Casual]
    }
}

impl fmt::Display for PromptStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptStyle::Formal => write!(f, "formal"),
            PromptStyle::Concise => write!(f, "concise"),
            PromptStyle::Casual => write!(f, "casual"),
        }
    }
}

impl FromStr for PromptStyle {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "formal" => Ok(PromptStyle::Formal),
            "concise" => Ok(PromptStyle::Concise),
            "casual" => Ok(PromptStyle::Casual),
            other => Err(format!(
                "Unknown prompt style: {other}. Use formal, concise, or casual"
            )),
        }
    }
}

/// Renders a system prompt template with the target language.
///
/// Undefined variables are an error, so typos in custom templates surface
/// instead of silently rendering empty.
///
/// # Errors
/// Returns the `MiniJinja` error message if the template is invalid.
pub fn render_system_prompt(template: &str, target_language: &str) -> Result<String, String> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.add_template("system_prompt", template)
        .map_err(|error| error.to_string())?;

    let output = env
        .get_template("system_prompt")
        .map_err(|error| error.to_string())?
        .render(context! { target_language => target_language })
        .map_err(|error| error.to_string())?;

    Ok(output.replace("\r\n", "\n").trim().to_string())
}
