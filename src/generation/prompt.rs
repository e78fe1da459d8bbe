//! Prompt templates
//!
//! A template pairs the fixed system instructions with a user prompt that
//! has `{key}` placeholders, one per form field.

use crate::errors::{BakeError, Result, ValidationErrors};
use serde::{Deserialize, Serialize};

/// Shared house style appended to every built-in template's instructions
const HOUSE_STYLE: &str = "You must never be verbose. Answer in a direct and succinct manner \
and do not add filler content. Use professional terminology and never suggest unethical or \
illegal handling of personal data. Write in HTML syntax: use h1-h4 for headings, <p> for \
paragraphs, <br> for line breaks, <strong> for emphasis and bullet lists where they help.";

/// One input on the generation form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateField {
    /// Placeholder name used in the prompt as `{key}`
    pub key: String,

    /// Question shown to the user
    pub label: String,
}

/// Generation template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub name: String,
    pub title: String,

    /// System message, always first in the conversation
    pub instructions: String,

    /// User message with `{key}` placeholders
    pub prompt: String,

    #[serde(default)]
    pub fields: Vec<TemplateField>,
}

impl PromptTemplate {
    /// Fill the placeholders with the given inputs, in field order
    pub fn render(&self, inputs: &[String]) -> Result<String> {
        if inputs.len() != self.fields.len() {
            let mut errors = ValidationErrors::new();
            errors.add(
                "inputs",
                format!(
                    "Template '{}' expects {} inputs, got {}",
                    self.name,
                    self.fields.len(),
                    inputs.len()
                ),
            );
            return Err(BakeError::Validation(errors));
        }

        // single pass over the template; inserted values are never rescanned
        let mut rendered = String::with_capacity(self.prompt.len());
        let mut rest = self.prompt.as_str();
        while let Some(open) = rest.find('{') {
            rendered.push_str(&rest[..open]);
            let tail = &rest[open..];
            let substitution = tail.find('}').and_then(|close| {
                let key = &tail[1..close];
                self.fields
                    .iter()
                    .position(|field| field.key == key)
                    .map(|i| (close, inputs[i].trim()))
            });
            match substitution {
                Some((close, value)) => {
                    rendered.push_str(value);
                    rest = &tail[close + 1..];
                }
                None => {
                    rendered.push('{');
                    rest = &tail[1..];
                }
            }
        }
        rendered.push_str(rest);
        Ok(rendered)
    }

    /// Short description stored with the persisted result: the first input
    pub fn describe(&self, inputs: &[String]) -> String {
        inputs
            .first()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.title.clone())
    }

    /// Check the template is usable
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();
        if self.name.trim().is_empty() {
            errors.add("name", "Template name is required");
        }
        if self.instructions.trim().is_empty() {
            errors.add("instructions", "System instructions are required");
        }
        for field in &self.fields {
            if !self.prompt.contains(&format!("{{{}}}", field.key)) {
                errors.add(
                    "prompt",
                    format!("Placeholder {{{}}} is not used in the prompt", field.key),
                );
            }
        }
        errors.into_result()
    }
}

fn field(key: &str, label: &str) -> TemplateField {
    TemplateField {
        key: key.to_string(),
        label: label.to_string(),
    }
}

/// Templates shipped with the binary
pub fn builtin_templates() -> Vec<PromptTemplate> {
    vec![
        PromptTemplate {
            name: "marketing-plan".to_string(),
            title: "12 month data privacy marketing plan".to_string(),
            instructions: format!(
                "You are DataPrivacyBot, a marketing assistant specialised in data privacy \
                 compliance (GDPR, CCPA, HIPAA). Stay within data privacy, data security and \
                 compliance topics and consider regional differences in how audiences respond \
                 to privacy messaging. {}",
                HOUSE_STYLE
            ),
            prompt: "Create a marketing plan for {business} whose main goal is to drive {goal}. \
                     Focus on {objective}. Structure it as: Our Objective; To Achieve This \
                     Objective; Company Initiative; at most 3 Initiatives each with a goal and \
                     success metrics; Marketing Strategy; and a three phase plan (attracting the \
                     right audience, converting them, delighting them) with target market, pain \
                     points and desired gains."
                .to_string(),
            fields: vec![
                field("business", "Describe your data privacy business"),
                field("goal", "What is your goal?"),
                field("objective", "What is your objective?"),
            ],
        },
        PromptTemplate {
            name: "product-description".to_string(),
            title: "Product description".to_string(),
            instructions: format!(
                "You are an e-commerce SEO expert who writes compelling, keyword-rich product \
                 descriptions for people shopping online. {}",
                HOUSE_STYLE
            ),
            prompt: "Write a product description of less than 1000 words for: {product}. Use at \
                     least three distinct sections, each with an eye-catching subheading and its \
                     own subset of keywords. Then list 5 possible H1 headings of under 7 words \
                     and the broad match keywords you used."
                .to_string(),
            fields: vec![field(
                "product",
                "What product do you need a description for?",
            )],
        },
    ]
}

/// Look a template up by name among built-ins and extras
pub fn find_template<'a>(
    templates: &'a [PromptTemplate],
    name: &str,
) -> Option<&'a PromptTemplate> {
    templates.iter().find(|t| t.name == name)
}
