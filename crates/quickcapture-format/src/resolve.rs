//! Resolver collaborators injected into the substitution engine.
//!
//! The engine itself never talks to a UI, a script sandbox, or the vault:
//! everything interactive or host-specific sits behind these traits. The
//! interactive engine and the non-interactive preview renderer are two
//! [`ResolverSet`] configurations of the same code path.
//!
//! Cancellation: any prompt may return [`Error::Aborted`]; the engine
//! propagates it unchanged so callers can tell "user cancelled" from
//! "operation failed".

use async_trait::async_trait;
use chrono::{Duration, Local, NaiveDate};
use quickcapture_core::{Error, FormatContext, Result};
use std::sync::Arc;

/// One selectable option shown by a suggester.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceOption {
    /// The value substituted when this option is picked
    pub value: String,
    /// The label shown to the user
    pub label: String,
}

/// What the user did in a suggester.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Picked an offered option, by index
    Picked(usize),
    /// Typed free text; substituted literally, never remapped to a label
    Custom(String),
}

/// Interactive value acquisition.
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Free-text prompt, optionally pre-filled.
    async fn prompt_text(&self, label: &str, default: Option<&str>) -> Result<String>;

    /// Choice among options; `allow_custom` permits free typed text.
    async fn prompt_choice(
        &self,
        label: &str,
        options: &[ChoiceOption],
        allow_custom: bool,
    ) -> Result<Selection>;

    /// Prompt for a natural-language date expression.
    async fn prompt_date(&self, label: &str, default: Option<&str>) -> Result<String>;

    /// Open the interactive math evaluator.
    async fn prompt_math(&self) -> Result<String>;
}

/// Macro and inline-script execution. Both may write variables back into
/// the run's context.
#[async_trait]
pub trait ScriptHost: Send + Sync {
    async fn run_macro(&self, name: &str, ctx: &mut FormatContext) -> Result<String>;
    async fn run_inline_script(&self, code: &str, ctx: &mut FormatContext) -> Result<String>;
}

/// Natural-language date parsing.
pub trait DateParser: Send + Sync {
    fn parse(&self, input: &str) -> Option<NaiveDate>;
}

/// Candidate values for `{{FIELD:name}}` suggestions, typically gathered
/// from frontmatter across the vault.
#[async_trait]
pub trait FieldSource: Send + Sync {
    async fn field_values(&self, name: &str) -> Result<Vec<String>>;
}

/// Source of nested template content for `{{TEMPLATE:path}}`.
#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn template_content(&self, path: &str) -> Result<String>;
}

/// The full collaborator bundle the engine runs against.
#[derive(Clone)]
pub struct ResolverSet {
    pub prompter: Arc<dyn Prompter>,
    pub scripts: Arc<dyn ScriptHost>,
    pub dates: Arc<dyn DateParser>,
    pub fields: Arc<dyn FieldSource>,
    pub templates: Arc<dyn TemplateSource>,
}

impl ResolverSet {
    pub fn new(
        prompter: Arc<dyn Prompter>,
        scripts: Arc<dyn ScriptHost>,
        dates: Arc<dyn DateParser>,
        fields: Arc<dyn FieldSource>,
        templates: Arc<dyn TemplateSource>,
    ) -> Self {
        Self {
            prompter,
            scripts,
            dates,
            fields,
            templates,
        }
    }
}

/// The resolver configuration for dry-run preview rendering: nothing
/// suspends, prompts resolve to their defaults or to empty text, scripts
/// and nested templates produce nothing.
pub fn preview_resolvers() -> ResolverSet {
    ResolverSet {
        prompter: Arc::new(PreviewPrompter),
        scripts: Arc::new(InertScriptHost),
        dates: Arc::new(SimpleDateParser),
        fields: Arc::new(NoFields),
        templates: Arc::new(NoTemplates),
    }
}

/// Non-interactive prompter used for preview rendering.
pub struct PreviewPrompter;

#[async_trait]
impl Prompter for PreviewPrompter {
    async fn prompt_text(&self, _label: &str, default: Option<&str>) -> Result<String> {
        Ok(default.unwrap_or_default().to_string())
    }

    async fn prompt_choice(
        &self,
        _label: &str,
        options: &[ChoiceOption],
        _allow_custom: bool,
    ) -> Result<Selection> {
        if options.is_empty() {
            Ok(Selection::Custom(String::new()))
        } else {
            Ok(Selection::Picked(0))
        }
    }

    async fn prompt_date(&self, _label: &str, default: Option<&str>) -> Result<String> {
        Ok(default.unwrap_or("today").to_string())
    }

    async fn prompt_math(&self) -> Result<String> {
        Ok(String::new())
    }
}

/// Script host that runs nothing; macros and inline scripts render empty.
pub struct InertScriptHost;

#[async_trait]
impl ScriptHost for InertScriptHost {
    async fn run_macro(&self, name: &str, _ctx: &mut FormatContext) -> Result<String> {
        log::debug!("inert script host ignoring macro '{name}'");
        Ok(String::new())
    }

    async fn run_inline_script(&self, _code: &str, _ctx: &mut FormatContext) -> Result<String> {
        Ok(String::new())
    }
}

/// Field source with no vault behind it.
pub struct NoFields;

#[async_trait]
impl FieldSource for NoFields {
    async fn field_values(&self, _name: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Template source with no vault behind it.
pub struct NoTemplates;

#[async_trait]
impl TemplateSource for NoTemplates {
    async fn template_content(&self, path: &str) -> Result<String> {
        Err(Error::not_found(format!("template {path}")))
    }
}

/// Date parser for the common relative expressions. Hosts with richer
/// natural-language parsing plug in their own [`DateParser`].
pub struct SimpleDateParser;

impl SimpleDateParser {
    fn parse_relative(input: &str, today: NaiveDate) -> Option<NaiveDate> {
        match input {
            "today" => return Some(today),
            "tomorrow" => return Some(today + Duration::days(1)),
            "yesterday" => return Some(today - Duration::days(1)),
            _ => {}
        }

        if let Some(rest) = input.strip_prefix("in ") {
            let days: i64 = rest.strip_suffix(" days").or_else(|| rest.strip_suffix(" day"))?
                .trim()
                .parse()
                .ok()?;
            return Some(today + Duration::days(days));
        }

        if let Some(rest) = input.strip_suffix(" days ago").or_else(|| input.strip_suffix(" day ago")) {
            let days: i64 = rest.trim().parse().ok()?;
            return Some(today - Duration::days(days));
        }

        NaiveDate::parse_from_str(input, "%Y-%m-%d").ok()
    }
}

impl DateParser for SimpleDateParser {
    fn parse(&self, input: &str) -> Option<NaiveDate> {
        let normalized = input.trim().to_lowercase();
        Self::parse_relative(&normalized, Local::now().date_naive())
    }
}
