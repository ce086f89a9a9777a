//! Integration tests for the token substitution engine

use async_trait::async_trait;
use quickcapture_core::{ActiveDocument, Error, FormatContext, Result, VariableValue};
use quickcapture_format::engine::{CurrentFileMode, EngineOptions, Formatter};
use quickcapture_format::resolve::{
    ChoiceOption, FieldSource, Prompter, ResolverSet, ScriptHost, Selection, SimpleDateParser,
    TemplateSource,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Prompter that replays queued answers and counts how often it is asked.
#[derive(Default)]
struct ScriptedPrompter {
    texts: Mutex<VecDeque<String>>,
    choices: Mutex<VecDeque<Selection>>,
    prompts: AtomicUsize,
}

impl ScriptedPrompter {
    fn with_texts(texts: &[&str]) -> Self {
        Self {
            texts: Mutex::new(texts.iter().map(|s| s.to_string()).collect()),
            ..Self::default()
        }
    }

    fn with_choices(choices: Vec<Selection>) -> Self {
        Self {
            choices: Mutex::new(choices.into()),
            ..Self::default()
        }
    }

    fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn prompt_text(&self, _label: &str, default: Option<&str>) -> Result<String> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .texts
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| default.map(String::from))
            .unwrap_or_default())
    }

    async fn prompt_choice(
        &self,
        _label: &str,
        _options: &[ChoiceOption],
        _allow_custom: bool,
    ) -> Result<Selection> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .choices
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Selection::Picked(0)))
    }

    async fn prompt_date(&self, _label: &str, default: Option<&str>) -> Result<String> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .texts
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| default.map(String::from))
            .unwrap_or_default())
    }

    async fn prompt_math(&self) -> Result<String> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .texts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }
}

/// Prompter that cancels everything.
struct AbortingPrompter;

#[async_trait]
impl Prompter for AbortingPrompter {
    async fn prompt_text(&self, _label: &str, _default: Option<&str>) -> Result<String> {
        Err(Error::Aborted)
    }

    async fn prompt_choice(
        &self,
        _label: &str,
        _options: &[ChoiceOption],
        _allow_custom: bool,
    ) -> Result<Selection> {
        Err(Error::Aborted)
    }

    async fn prompt_date(&self, _label: &str, _default: Option<&str>) -> Result<String> {
        Err(Error::Aborted)
    }

    async fn prompt_math(&self) -> Result<String> {
        Err(Error::Aborted)
    }
}

/// Script host that seeds a variable and returns fixed output.
struct SeedingScriptHost;

#[async_trait]
impl ScriptHost for SeedingScriptHost {
    async fn run_macro(&self, name: &str, ctx: &mut FormatContext) -> Result<String> {
        match name {
            "seed" => {
                ctx.set("project", "Seeded Project");
                Ok(String::new())
            }
            "banner" => Ok("== banner ==".to_string()),
            other => Err(Error::not_found(format!("macro {other}"))),
        }
    }

    async fn run_inline_script(&self, code: &str, ctx: &mut FormatContext) -> Result<String> {
        ctx.set("script_ran", code.trim());
        Ok("(script output)".to_string())
    }
}

struct NoScripts;

#[async_trait]
impl ScriptHost for NoScripts {
    async fn run_macro(&self, _name: &str, _ctx: &mut FormatContext) -> Result<String> {
        Ok(String::new())
    }

    async fn run_inline_script(&self, _code: &str, _ctx: &mut FormatContext) -> Result<String> {
        Ok(String::new())
    }
}

struct FixedFields(HashMap<String, Vec<String>>);

#[async_trait]
impl FieldSource for FixedFields {
    async fn field_values(&self, name: &str) -> Result<Vec<String>> {
        Ok(self.0.get(name).cloned().unwrap_or_default())
    }
}

struct MapTemplates(HashMap<String, String>);

#[async_trait]
impl TemplateSource for MapTemplates {
    async fn template_content(&self, path: &str) -> Result<String> {
        self.0
            .get(path)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("template {path}")))
    }
}

fn formatter_with(prompter: Arc<dyn Prompter>) -> Formatter {
    Formatter::new(ResolverSet::new(
        prompter,
        Arc::new(NoScripts),
        Arc::new(SimpleDateParser),
        Arc::new(FixedFields(HashMap::new())),
        Arc::new(MapTemplates(HashMap::new())),
    ))
}

#[tokio::test]
async fn test_named_value_prompts_once_per_run() {
    let prompter = Arc::new(ScriptedPrompter::with_texts(&["first answer"]));
    let formatter = formatter_with(prompter.clone());
    let mut ctx = FormatContext::new();

    let out = formatter
        .format("{{VALUE:v}} and {{VALUE:v}}", &mut ctx)
        .await
        .unwrap();

    assert_eq!(out, "first answer and first answer");
    assert_eq!(prompter.prompt_count(), 1);
}

#[tokio::test]
async fn test_value_answer_is_not_rescanned() {
    let prompter = Arc::new(ScriptedPrompter::with_texts(&["{{VALUE}}"]));
    let formatter = formatter_with(prompter.clone());
    let mut ctx = FormatContext::new();

    let out = formatter.format("got: {{VALUE}}", &mut ctx).await.unwrap();

    assert_eq!(out, "got: {{VALUE}}");
    assert_eq!(prompter.prompt_count(), 1);
}

#[tokio::test]
async fn test_anonymous_slot_shared_between_value_and_name() {
    let prompter = Arc::new(ScriptedPrompter::with_texts(&["once"]));
    let formatter = formatter_with(prompter.clone());
    let mut ctx = FormatContext::new();

    let out = formatter
        .format("{{VALUE}}/{{NAME}}", &mut ctx)
        .await
        .unwrap();

    assert_eq!(out, "once/once");
    assert_eq!(prompter.prompt_count(), 1);
}

#[tokio::test]
async fn test_case_transform_does_not_mutate_stored_value() {
    let prompter = Arc::new(ScriptedPrompter::with_texts(&["My New Blog"]));
    let formatter = formatter_with(prompter);
    let mut ctx = FormatContext::new();

    let out = formatter
        .format("{{VALUE:blog|case:kebab}} / {{VALUE:blog}}", &mut ctx)
        .await
        .unwrap();

    assert_eq!(out, "my-new-blog / My New Blog");
    assert_eq!(
        ctx.get("blog"),
        Some(&VariableValue::Text("My New Blog".into()))
    );
}

#[tokio::test]
async fn test_unknown_case_style_passes_through() {
    let prompter = Arc::new(ScriptedPrompter::with_texts(&["As Typed"]));
    let formatter = formatter_with(prompter);
    let mut ctx = FormatContext::new();

    let out = formatter
        .format("{{VALUE:v|case:shouting}}", &mut ctx)
        .await
        .unwrap();

    assert_eq!(out, "As Typed");
}

#[tokio::test]
async fn test_display_mapping_substitutes_value_not_label() {
    let prompter = Arc::new(ScriptedPrompter::with_choices(vec![Selection::Picked(1)]));
    let formatter = formatter_with(prompter);
    let mut ctx = FormatContext::new();

    let out = formatter
        .format("{{VALUE:🔼,⏫|text:Normal,High}}", &mut ctx)
        .await
        .unwrap();

    assert_eq!(out, "⏫");
}

#[tokio::test]
async fn test_custom_text_equal_to_label_stays_literal() {
    let prompter = Arc::new(ScriptedPrompter::with_choices(vec![Selection::Custom(
        "High".into(),
    )]));
    let formatter = formatter_with(prompter);
    let mut ctx = FormatContext::new();

    let out = formatter
        .format("{{VALUE:🔼,⏫|text:Normal,High|custom}}", &mut ctx)
        .await
        .unwrap();

    assert_eq!(out, "High");
}

#[tokio::test]
async fn test_duplicate_display_labels_are_config_error() {
    let prompter = Arc::new(ScriptedPrompter::default());
    let formatter = formatter_with(prompter);
    let mut ctx = FormatContext::new();

    let result = formatter
        .format("{{VALUE:a,b|text:Same,Same}}", &mut ctx)
        .await;

    assert!(matches!(result, Err(Error::ConfigError { .. })));
}

#[tokio::test]
async fn test_random_token_length_and_alphabet() {
    let formatter = formatter_with(Arc::new(ScriptedPrompter::default()));
    let mut ctx = FormatContext::new();

    let out = formatter.format("{{RANDOM:24}}", &mut ctx).await.unwrap();
    assert_eq!(out.len(), 24);
    assert!(out.chars().all(|c| c.is_ascii_alphanumeric()));
}

#[tokio::test]
async fn test_random_token_out_of_range_is_error() {
    let formatter = formatter_with(Arc::new(ScriptedPrompter::default()));

    for bad in ["{{RANDOM:0}}", "{{RANDOM:101}}"] {
        let mut ctx = FormatContext::new();
        let result = formatter.format(bad, &mut ctx).await;
        assert!(matches!(result, Err(Error::ConfigError { .. })), "{bad}");
    }
}

#[tokio::test]
async fn test_random_token_invalid_length_left_untouched() {
    let formatter = formatter_with(Arc::new(ScriptedPrompter::default()));
    let mut ctx = FormatContext::new();

    let out = formatter.format("{{RANDOM:abc}}", &mut ctx).await.unwrap();
    assert_eq!(out, "{{RANDOM:abc}}");
}

#[tokio::test]
async fn test_malformed_token_left_untouched() {
    let formatter = formatter_with(Arc::new(ScriptedPrompter::default()));
    let mut ctx = FormatContext::new();

    let input = "open {{VALUE and {{VDATE:only_name}}";
    let out = formatter.format(input, &mut ctx).await.unwrap();
    assert_eq!(out, input);
}

#[tokio::test]
async fn test_plain_date_token_shape() {
    let formatter = formatter_with(Arc::new(ScriptedPrompter::default()));
    let mut ctx = FormatContext::new();

    let out = formatter
        .format("{{DATE}} {{DATE:%Y}}", &mut ctx)
        .await
        .unwrap();

    let parts: Vec<&str> = out.split(' ').collect();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].len(), 10);
    assert!(parts[0].chars().nth(4) == Some('-'));
    assert_eq!(parts[1].len(), 4);
}

#[tokio::test]
async fn test_date_variable_prompts_once_and_formats_twice() {
    let prompter = Arc::new(ScriptedPrompter::with_texts(&["2025-12-31"]));
    let formatter = formatter_with(prompter.clone());
    let mut ctx = FormatContext::new();

    let out = formatter
        .format("{{VDATE:due,%Y}}-{{VDATE:due,%d}}", &mut ctx)
        .await
        .unwrap();

    assert_eq!(out, "2025-31");
    assert_eq!(prompter.prompt_count(), 1);
}

#[tokio::test]
async fn test_date_variable_unparseable_input_names_value() {
    let prompter = Arc::new(ScriptedPrompter::with_texts(&["not a date"]));
    let formatter = formatter_with(prompter);
    let mut ctx = FormatContext::new();

    let result = formatter.format("{{VDATE:due,%Y}}", &mut ctx).await;

    match result {
        Err(Error::DateParseError { input }) => assert_eq!(input, "not a date"),
        other => panic!("expected date parse error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_macro_seeds_variable_for_later_pass() {
    let prompter = Arc::new(ScriptedPrompter::default());
    let formatter = Formatter::new(ResolverSet::new(
        prompter.clone(),
        Arc::new(SeedingScriptHost),
        Arc::new(SimpleDateParser),
        Arc::new(FixedFields(HashMap::new())),
        Arc::new(MapTemplates(HashMap::new())),
    ));
    let mut ctx = FormatContext::new();

    let out = formatter
        .format("{{MACRO:seed}}project: {{VALUE:project}}", &mut ctx)
        .await
        .unwrap();

    assert_eq!(out, "project: Seeded Project");
    assert_eq!(prompter.prompt_count(), 0);
}

#[tokio::test]
async fn test_macro_output_is_spliced() {
    let formatter = Formatter::new(ResolverSet::new(
        Arc::new(ScriptedPrompter::default()),
        Arc::new(SeedingScriptHost),
        Arc::new(SimpleDateParser),
        Arc::new(FixedFields(HashMap::new())),
        Arc::new(MapTemplates(HashMap::new())),
    ));
    let mut ctx = FormatContext::new();

    let out = formatter
        .format("x {{MACRO:banner}} y", &mut ctx)
        .await
        .unwrap();
    assert_eq!(out, "x == banner == y");
}

#[tokio::test]
async fn test_inline_script_runs_and_splices_output() {
    let formatter = Formatter::new(ResolverSet::new(
        Arc::new(ScriptedPrompter::default()),
        Arc::new(SeedingScriptHost),
        Arc::new(SimpleDateParser),
        Arc::new(FixedFields(HashMap::new())),
        Arc::new(MapTemplates(HashMap::new())),
    ));
    let mut ctx = FormatContext::new();

    let out = formatter
        .format("a\n```capture\nset everything\n```\nb", &mut ctx)
        .await
        .unwrap();

    assert_eq!(out, "a\n(script output)b");
    assert_eq!(
        ctx.get("script_ran"),
        Some(&VariableValue::Text("set everything".into()))
    );
}

#[tokio::test]
async fn test_nested_template_resolves_recursively() {
    let mut templates = HashMap::new();
    templates.insert(
        "templates/meeting.md".to_string(),
        "## Meeting with {{VALUE:person}}".to_string(),
    );

    let prompter = Arc::new(ScriptedPrompter::with_texts(&["Ada"]));
    let formatter = Formatter::new(ResolverSet::new(
        prompter.clone(),
        Arc::new(NoScripts),
        Arc::new(SimpleDateParser),
        Arc::new(FixedFields(HashMap::new())),
        Arc::new(MapTemplates(templates)),
    ));
    let mut ctx = FormatContext::new();

    let out = formatter
        .format("{{TEMPLATE:templates/meeting.md}}\nnotes", &mut ctx)
        .await
        .unwrap();

    assert_eq!(out, "## Meeting with Ada\nnotes");
}

#[tokio::test]
async fn test_missing_template_is_skipped_not_fatal() {
    let formatter = formatter_with(Arc::new(ScriptedPrompter::default()));
    let mut ctx = FormatContext::new();

    let out = formatter
        .format("before {{TEMPLATE:gone.md}}after", &mut ctx)
        .await
        .unwrap();

    assert_eq!(out, "before after");
}

#[tokio::test]
async fn test_field_namespace_does_not_collide_with_variable() {
    let mut fields = HashMap::new();
    fields.insert("title".to_string(), vec!["From Field".to_string()]);

    let prompter = Arc::new(ScriptedPrompter::with_texts(&["From Prompt"]));
    let formatter = Formatter::new(ResolverSet::new(
        prompter.clone(),
        Arc::new(NoScripts),
        Arc::new(SimpleDateParser),
        Arc::new(FixedFields(fields)),
        Arc::new(MapTemplates(HashMap::new())),
    ));
    let mut ctx = FormatContext::new();

    let out = formatter
        .format("{{VALUE:title}}/{{FIELD:title}}", &mut ctx)
        .await
        .unwrap();

    assert_eq!(out, "From Prompt/From Field");
    assert_eq!(prompter.prompt_count(), 2);
}

#[tokio::test]
async fn test_title_slot_renders_and_is_independent() {
    let formatter = formatter_with(Arc::new(ScriptedPrompter::default()));
    let mut ctx = FormatContext::new();
    ctx.set("title", "macro title");
    ctx.set_title("Daily Note");

    let out = formatter
        .format("# {{TITLE}} ({{VALUE:title}})", &mut ctx)
        .await
        .unwrap();

    assert_eq!(out, "# Daily Note (macro title)");
}

#[tokio::test]
async fn test_selection_token() {
    let active = ActiveDocument {
        path: "notes/today.md".into(),
        selection: Some("picked text".into()),
        cursor_offset: None,
    };
    let formatter = Formatter::with_options(
        ResolverSet::new(
            Arc::new(ScriptedPrompter::default()),
            Arc::new(NoScripts),
            Arc::new(SimpleDateParser),
            Arc::new(FixedFields(HashMap::new())),
            Arc::new(MapTemplates(HashMap::new())),
        ),
        EngineOptions {
            active: Some(active),
            current_file_mode: CurrentFileMode::Required,
        },
    );
    let mut ctx = FormatContext::new();

    let out = formatter
        .format("> {{SELECTED}} / {{FILENAMECURRENT}} / {{LINKCURRENT}}", &mut ctx)
        .await
        .unwrap();

    assert_eq!(out, "> picked text / today / [[today]]");
}

#[tokio::test]
async fn test_current_file_required_without_active_is_error() {
    let formatter = formatter_with(Arc::new(ScriptedPrompter::default()));
    let mut ctx = FormatContext::new();

    let result = formatter.format("{{LINKCURRENT}}", &mut ctx).await;
    assert!(matches!(result, Err(Error::NotFound { .. })));
}

#[tokio::test]
async fn test_current_file_optional_removes_token() {
    let formatter = Formatter::with_options(
        ResolverSet::new(
            Arc::new(ScriptedPrompter::default()),
            Arc::new(NoScripts),
            Arc::new(SimpleDateParser),
            Arc::new(FixedFields(HashMap::new())),
            Arc::new(MapTemplates(HashMap::new())),
        ),
        EngineOptions {
            active: None,
            current_file_mode: CurrentFileMode::Optional,
        },
    );
    let mut ctx = FormatContext::new();

    let out = formatter
        .format("a{{LINKCURRENT}}b{{FILENAMECURRENT}}c", &mut ctx)
        .await
        .unwrap();
    assert_eq!(out, "abc");
}

#[tokio::test]
async fn test_abort_propagates_unchanged() {
    let formatter = formatter_with(Arc::new(AbortingPrompter));
    let mut ctx = FormatContext::new();

    let result = formatter.format("{{VALUE}}", &mut ctx).await;
    assert!(matches!(result, Err(Error::Aborted)));
}

#[tokio::test]
async fn test_preview_formatter_never_prompts() {
    let formatter = Formatter::preview();
    let mut ctx = FormatContext::new();

    let out = formatter
        .format("{{VALUE:v|default:fallback}} {{SELECTED}}", &mut ctx)
        .await
        .unwrap();

    assert_eq!(out, "fallback ");
}

#[tokio::test]
async fn test_list_hint_recorded_but_inline_substitution_unchanged() {
    let prompter = Arc::new(ScriptedPrompter::with_texts(&["a, b, c"]));
    let formatter = formatter_with(prompter);
    let mut ctx = FormatContext::new();

    let out = formatter
        .format("tags: {{VALUE:tags@list}}", &mut ctx)
        .await
        .unwrap();

    assert_eq!(out, "tags: a, b, c");
    assert!(ctx.list_hints().contains_key("tags"));
}
