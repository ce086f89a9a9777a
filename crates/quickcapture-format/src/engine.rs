//! The token-substitution engine.
//!
//! [`Formatter`] drives a fixed sequence of substitution passes over a
//! format string, each pass scanning its input exactly once (see
//! [`crate::scan`]). Pass order matters: inline scripts and macros run
//! first because they may seed variables that later passes read, nested
//! templates are spliced before value resolution so their tokens resolve
//! in the same run, and the cheap context lookups (title, random) run
//! last.
//!
//! Values resolve at most once per run: the first reference to a name
//! prompts, every later reference reuses the cached value from the
//! [`FormatContext`].

use crate::case::CaseStyle;
use crate::resolve::{ChoiceOption, ResolverSet, Selection, preview_resolvers};
use crate::scan::{Segment, segments};
use crate::tokens::{self, ValueSpec};
use chrono::{Duration, Local, NaiveDate};
use quickcapture_core::{ActiveDocument, Error, FormatContext, Result, VariableValue};
use rand::Rng;
use rand::distr::Alphanumeric;
use std::collections::HashSet;
use std::fmt::Write as _;

/// Resolution mode for the current-file tokens (`{{LINKCURRENT}}`,
/// `{{FILENAMECURRENT}}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CurrentFileMode {
    /// No active file is an error
    #[default]
    Required,
    /// No active file silently removes the token
    Optional,
}

/// Per-engine (not per-run) configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// The document the user is editing, if any
    pub active: Option<ActiveDocument>,
    pub current_file_mode: CurrentFileMode,
}

/// The substitution engine. One instance serves many runs; all per-run
/// state lives in the [`FormatContext`] passed to [`Formatter::format`].
pub struct Formatter {
    resolvers: ResolverSet,
    options: EngineOptions,
}

impl Formatter {
    pub fn new(resolvers: ResolverSet) -> Self {
        Self {
            resolvers,
            options: EngineOptions::default(),
        }
    }

    pub fn with_options(resolvers: ResolverSet, options: EngineOptions) -> Self {
        Self { resolvers, options }
    }

    /// A formatter wired for non-interactive preview rendering.
    pub fn preview() -> Self {
        Self::new(preview_resolvers())
    }

    pub fn resolvers(&self) -> &ResolverSet {
        &self.resolvers
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Run all substitution passes over `input`.
    #[tracing::instrument(skip_all, name = "format")]
    pub async fn format(&self, input: &str, ctx: &mut FormatContext) -> Result<String> {
        if !tokens::has_tokens(input) {
            return Ok(input.to_string());
        }

        let mut out = self.pass_inline_scripts(input, ctx).await?;
        out = self.pass_macros(&out, ctx).await?;
        out = self.pass_templates(&out, ctx).await?;
        out = self.pass_selection(&out);
        out = self.pass_math(&out).await?;
        out = self.pass_dates(&out)?;
        out = self.pass_values(&out, ctx).await?;
        out = self.pass_date_variables(&out, ctx).await?;
        out = self.pass_named_variables(&out, ctx).await?;
        out = self.pass_fields(&out, ctx).await?;
        out = self.pass_current_file(&out)?;
        out = self.pass_title(&out, ctx);
        out = self.pass_random(&out)?;
        Ok(out)
    }

    // === Pass 1: inline scripts ===

    async fn pass_inline_scripts(&self, input: &str, ctx: &mut FormatContext) -> Result<String> {
        let mut out = String::with_capacity(input.len());
        for seg in segments(&tokens::INLINE_SCRIPT, input) {
            match seg {
                Segment::Literal(text) => out.push_str(text),
                Segment::Token(caps) => {
                    let code = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                    let rendered = self.resolvers.scripts.run_inline_script(code, ctx).await?;
                    out.push_str(&rendered);
                }
            }
        }
        Ok(out)
    }

    // === Pass 2: macros ===

    async fn pass_macros(&self, input: &str, ctx: &mut FormatContext) -> Result<String> {
        let mut out = String::with_capacity(input.len());
        for seg in segments(&tokens::MACRO, input) {
            match seg {
                Segment::Literal(text) => out.push_str(text),
                Segment::Token(caps) => {
                    let name = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
                    let rendered = self.resolvers.scripts.run_macro(name, ctx).await?;
                    out.push_str(&rendered);
                }
            }
        }
        Ok(out)
    }

    // === Pass 3: nested templates ===

    async fn pass_templates(&self, input: &str, ctx: &mut FormatContext) -> Result<String> {
        let mut out = String::with_capacity(input.len());
        for seg in segments(&tokens::TEMPLATE, input) {
            match seg {
                Segment::Literal(text) => out.push_str(text),
                Segment::Token(caps) => {
                    let path = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
                    match self.resolvers.templates.template_content(path).await {
                        Ok(content) => {
                            // the whole engine runs against the nested content
                            let rendered = Box::pin(self.format(&content, ctx)).await?;
                            out.push_str(&rendered);
                        }
                        Err(e) if e.is_recoverable() => {
                            log::warn!("nested template '{path}' unavailable, skipping: {e}");
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }
        Ok(out)
    }

    // === Pass 4: editor selection ===

    fn pass_selection(&self, input: &str) -> String {
        let selection = self
            .options
            .active
            .as_ref()
            .and_then(|a| a.selection.as_deref())
            .unwrap_or_default();

        let mut out = String::with_capacity(input.len());
        for seg in segments(&tokens::SELECTED, input) {
            match seg {
                Segment::Literal(text) => out.push_str(text),
                Segment::Token(_) => out.push_str(selection),
            }
        }
        out
    }

    // === Pass 5: math values ===

    async fn pass_math(&self, input: &str) -> Result<String> {
        let mut out = String::with_capacity(input.len());
        for seg in segments(&tokens::MVALUE, input) {
            match seg {
                Segment::Literal(text) => out.push_str(text),
                Segment::Token(_) => {
                    let value = self.resolvers.prompter.prompt_math().await?;
                    out.push_str(&value);
                }
            }
        }
        Ok(out)
    }

    // === Pass 6: plain dates ===

    fn pass_dates(&self, input: &str) -> Result<String> {
        let mut out = String::with_capacity(input.len());
        for seg in segments(&tokens::DATE, input) {
            match seg {
                Segment::Literal(text) => out.push_str(text),
                Segment::Token(caps) => {
                    let format = caps.get(1).map(|m| m.as_str()).unwrap_or("%Y-%m-%d");
                    let offset: i64 = caps
                        .get(2)
                        .and_then(|m| m.as_str().parse().ok())
                        .unwrap_or(0);
                    let date = Local::now().date_naive() + Duration::days(offset);
                    out.push_str(&format_date(&date, format)?);
                }
            }
        }
        Ok(out)
    }

    // === Pass 7: anonymous values and suggestion lists ===

    async fn pass_values(&self, input: &str, ctx: &mut FormatContext) -> Result<String> {
        let mut out = String::with_capacity(input.len());
        for seg in segments(&tokens::VALUE, input) {
            match seg {
                Segment::Literal(text) => out.push_str(text),
                Segment::Token(caps) => {
                    let raw = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                    let spec = ValueSpec::parse(raw);
                    if spec.is_named_variable() {
                        // belongs to the named-variable pass
                        out.push_str(caps.get(0).map(|m| m.as_str()).unwrap_or_default());
                        continue;
                    }
                    let value = self.resolve_value(&spec, ctx).await?;
                    out.push_str(&apply_case(&value, spec.case));
                }
            }
        }
        Ok(out)
    }

    async fn resolve_value(&self, spec: &ValueSpec, ctx: &mut FormatContext) -> Result<String> {
        // bare {{VALUE}}/{{NAME}} share the anonymous slot; suggestion
        // lists cache under their raw spec
        if spec.raw.is_empty() {
            if let Some(cached) = ctx.anonymous() {
                return Ok(cached.to_string());
            }
        } else if let Some(cached) = ctx.get(&spec.raw) {
            return Ok(cached.as_text());
        }

        let value = if spec.options.is_empty() {
            self.resolvers
                .prompter
                .prompt_text("Value", spec.default.as_deref())
                .await?
        } else {
            let options = build_choice_options(spec)?;
            match self
                .resolvers
                .prompter
                .prompt_choice("Value", &options, spec.allow_custom)
                .await?
            {
                Selection::Picked(i) => options
                    .get(i)
                    .map(|o| o.value.clone())
                    .ok_or_else(|| Error::other("suggester returned an out-of-range selection"))?,
                Selection::Custom(text) => text,
            }
        };

        if spec.raw.is_empty() {
            ctx.set_anonymous(value.clone());
        } else {
            ctx.set(spec.raw.clone(), value.clone());
            if let Some(hint) = spec.list_hint {
                ctx.record_list_hint(spec.raw.clone(), hint);
            }
        }
        Ok(value)
    }

    // === Pass 8: date variables ===

    async fn pass_date_variables(&self, input: &str, ctx: &mut FormatContext) -> Result<String> {
        let mut out = String::with_capacity(input.len());
        for seg in segments(&tokens::VDATE, input) {
            match seg {
                Segment::Literal(text) => out.push_str(text),
                Segment::Token(caps) => {
                    let name = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
                    let format = caps.get(2).map(|m| m.as_str()).unwrap_or("%Y-%m-%d");
                    let default = caps.get(3).map(|m| m.as_str());
                    let date = self.resolve_date_variable(name, default, ctx).await?;
                    out.push_str(&format_date(&date, format)?);
                }
            }
        }
        Ok(out)
    }

    async fn resolve_date_variable(
        &self,
        name: &str,
        default: Option<&str>,
        ctx: &mut FormatContext,
    ) -> Result<NaiveDate> {
        match ctx.get(name) {
            Some(VariableValue::Date(date)) => Ok(*date),
            Some(other) => {
                // a script seeded this name with text; parse it as a date
                let text = other.as_text();
                self.resolvers
                    .dates
                    .parse(&text)
                    .ok_or_else(|| Error::date_parse(text))
            }
            None => {
                let input = self.resolvers.prompter.prompt_date(name, default).await?;
                let date = self
                    .resolvers
                    .dates
                    .parse(&input)
                    .ok_or_else(|| Error::date_parse(&input))?;
                ctx.set(name, VariableValue::Date(date));
                Ok(date)
            }
        }
    }

    // === Pass 9: named variables ===

    async fn pass_named_variables(&self, input: &str, ctx: &mut FormatContext) -> Result<String> {
        let mut out = String::with_capacity(input.len());
        for seg in segments(&tokens::VALUE, input) {
            match seg {
                Segment::Literal(text) => out.push_str(text),
                Segment::Token(caps) => {
                    let raw = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                    let spec = ValueSpec::parse(raw);
                    let Some(name) = spec.name().map(String::from) else {
                        // anonymous tokens that survived the value pass are
                        // resolved user text; emit verbatim
                        out.push_str(caps.get(0).map(|m| m.as_str()).unwrap_or_default());
                        continue;
                    };

                    if !ctx.contains(&name) {
                        let value = self
                            .resolvers
                            .prompter
                            .prompt_text(&name, spec.default.as_deref())
                            .await?;
                        ctx.set(name.clone(), value);
                        if let Some(hint) = spec.list_hint {
                            ctx.record_list_hint(name.clone(), hint);
                        }
                    }

                    let value = ctx.get(&name).map(|v| v.as_text()).unwrap_or_default();
                    out.push_str(&apply_case(&value, spec.case));
                }
            }
        }
        Ok(out)
    }

    // === Pass 9 (continued): field lookups, own cache namespace ===

    async fn pass_fields(&self, input: &str, ctx: &mut FormatContext) -> Result<String> {
        let mut out = String::with_capacity(input.len());
        for seg in segments(&tokens::FIELD, input) {
            match seg {
                Segment::Literal(text) => out.push_str(text),
                Segment::Token(caps) => {
                    let raw = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                    let spec = ValueSpec::parse(raw);
                    let Some(name) = spec.options.first().cloned() else {
                        out.push_str(caps.get(0).map(|m| m.as_str()).unwrap_or_default());
                        continue;
                    };

                    let key = FormatContext::field_key(&name);
                    if !ctx.contains(&key) {
                        let value = self.resolve_field(&name, &spec).await?;
                        ctx.set(key.clone(), value);
                        if let Some(hint) = spec.list_hint {
                            ctx.record_list_hint(key.clone(), hint);
                        }
                    }

                    let value = ctx.get(&key).map(|v| v.as_text()).unwrap_or_default();
                    out.push_str(&apply_case(&value, spec.case));
                }
            }
        }
        Ok(out)
    }

    async fn resolve_field(&self, name: &str, spec: &ValueSpec) -> Result<String> {
        let known = self.resolvers.fields.field_values(name).await?;
        if known.is_empty() {
            return self
                .resolvers
                .prompter
                .prompt_text(name, spec.default.as_deref())
                .await;
        }

        let options: Vec<ChoiceOption> = known
            .into_iter()
            .map(|v| ChoiceOption {
                label: v.clone(),
                value: v,
            })
            .collect();

        match self
            .resolvers
            .prompter
            .prompt_choice(name, &options, true)
            .await?
        {
            Selection::Picked(i) => options
                .get(i)
                .map(|o| o.value.clone())
                .ok_or_else(|| Error::other("suggester returned an out-of-range selection")),
            Selection::Custom(text) => Ok(text),
        }
    }

    // === Pass 10: current-file tokens ===

    fn pass_current_file(&self, input: &str) -> Result<String> {
        let stem = self
            .options
            .active
            .as_ref()
            .and_then(|a| a.path.file_stem())
            .map(|s| s.to_string_lossy().to_string());

        let mut out = String::with_capacity(input.len());
        for seg in segments(&tokens::LINKCURRENT, input) {
            match seg {
                Segment::Literal(text) => out.push_str(text),
                Segment::Token(_) => match (&stem, self.options.current_file_mode) {
                    (Some(stem), _) => {
                        out.push_str("[[");
                        out.push_str(stem);
                        out.push_str("]]");
                    }
                    (None, CurrentFileMode::Optional) => {}
                    (None, CurrentFileMode::Required) => {
                        return Err(Error::not_found("active file for {{LINKCURRENT}}"));
                    }
                },
            }
        }

        let mut final_out = String::with_capacity(out.len());
        for seg in segments(&tokens::FILENAMECURRENT, &out) {
            match seg {
                Segment::Literal(text) => final_out.push_str(text),
                Segment::Token(_) => match (&stem, self.options.current_file_mode) {
                    (Some(stem), _) => final_out.push_str(stem),
                    (None, CurrentFileMode::Optional) => {}
                    (None, CurrentFileMode::Required) => {
                        return Err(Error::not_found("active file for {{FILENAMECURRENT}}"));
                    }
                },
            }
        }
        Ok(final_out)
    }

    // === Pass 11: title ===

    fn pass_title(&self, input: &str, ctx: &FormatContext) -> String {
        let title = ctx.title().unwrap_or_default();
        let mut out = String::with_capacity(input.len());
        for seg in segments(&tokens::TITLE, input) {
            match seg {
                Segment::Literal(text) => out.push_str(text),
                Segment::Token(_) => out.push_str(title),
            }
        }
        out
    }

    // === Pass 12: random strings ===

    fn pass_random(&self, input: &str) -> Result<String> {
        let mut out = String::with_capacity(input.len());
        for seg in segments(&tokens::RANDOM, input) {
            match seg {
                Segment::Literal(text) => out.push_str(text),
                Segment::Token(caps) => {
                    let len: usize = caps
                        .get(1)
                        .and_then(|m| m.as_str().parse().ok())
                        .unwrap_or(usize::MAX);
                    if !(1..=100).contains(&len) {
                        return Err(Error::config_error(format!(
                            "random string length must be between 1 and 100, got {}",
                            caps.get(1).map(|m| m.as_str()).unwrap_or_default()
                        )));
                    }
                    let random: String = rand::rng()
                        .sample_iter(&Alphanumeric)
                        .take(len)
                        .map(char::from)
                        .collect();
                    out.push_str(&random);
                }
            }
        }
        Ok(out)
    }
}

fn apply_case(value: &str, case: Option<CaseStyle>) -> String {
    match case {
        Some(style) => style.apply(value),
        None => value.to_string(),
    }
}

fn build_choice_options(spec: &ValueSpec) -> Result<Vec<ChoiceOption>> {
    if let Some(labels) = &spec.labels {
        let mut seen = HashSet::new();
        for label in labels {
            if !seen.insert(label.as_str()) {
                return Err(Error::config_error(format!(
                    "duplicate display label: {label}"
                )));
            }
        }
    }

    Ok(spec
        .options
        .iter()
        .enumerate()
        .map(|(i, value)| ChoiceOption {
            value: value.clone(),
            label: spec
                .labels
                .as_ref()
                .and_then(|labels| labels.get(i))
                .cloned()
                .unwrap_or_else(|| value.clone()),
        })
        .collect())
}

/// Format a date through chrono, trapping invalid format strings instead
/// of panicking in `Display`.
fn format_date(date: &NaiveDate, format: &str) -> Result<String> {
    let mut out = String::new();
    write!(out, "{}", date.format(format))
        .map_err(|_| Error::parse_error(format!("invalid date format: {format}")))?;
    Ok(out)
}
