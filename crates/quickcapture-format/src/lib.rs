//! # QuickCapture Format
//!
//! Token grammar and substitution engine for capture format strings.
//!
//! A format string contains placeholder tokens (`{{VALUE}}`, `{{DATE}}`,
//! `{{MACRO:name}}`, ...) that the [`engine::Formatter`] resolves through
//! a fixed sequence of single-scan passes. Interactive resolution, script
//! execution, date parsing and template lookup are injected through the
//! [`resolve::ResolverSet`] collaborator bundle, so the interactive engine
//! and the non-interactive preview renderer share one code path.
//!
//! ## Core Modules
//!
//! - [`tokens`] - the regex catalogue and value-spec/modifier parsing
//! - [`scan`] - single-pass segmentation with the anti-recursion guarantee
//! - [`resolve`] - collaborator traits and preview implementations
//! - [`engine`] - the pass pipeline and memoization
//! - [`case`] - `|case:<style>` transforms

pub mod case;
pub mod engine;
pub mod resolve;
pub mod scan;
pub mod tokens;

pub use case::CaseStyle;
pub use engine::{CurrentFileMode, EngineOptions, Formatter};
pub use resolve::{
    ChoiceOption, DateParser, FieldSource, Prompter, ResolverSet, ScriptHost, Selection,
    SimpleDateParser, TemplateSource, preview_resolvers,
};
pub use tokens::ValueSpec;

pub mod prelude {
    pub use crate::case::CaseStyle;
    pub use crate::engine::{CurrentFileMode, EngineOptions, Formatter};
    pub use crate::resolve::{
        ChoiceOption, DateParser, FieldSource, Prompter, ResolverSet, ScriptHost, Selection,
        SimpleDateParser, TemplateSource, preview_resolvers,
    };
    pub use quickcapture_core::prelude::*;
}
