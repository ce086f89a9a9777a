//! Case transforms for the `|case:<style>` token modifier.
//!
//! Transforms apply per-occurrence at substitution time and never mutate
//! the value cached in the variable store.

/// A recognized case style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseStyle {
    Kebab,
    Snake,
    Camel,
    Pascal,
    Title,
    Lower,
    Upper,
}

impl CaseStyle {
    /// Parse a style name. Unknown names return `None`; the caller leaves
    /// the value untouched.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "kebab" => Some(Self::Kebab),
            "snake" => Some(Self::Snake),
            "camel" => Some(Self::Camel),
            "pascal" => Some(Self::Pascal),
            "title" => Some(Self::Title),
            "lower" => Some(Self::Lower),
            "upper" => Some(Self::Upper),
            _ => None,
        }
    }

    /// Apply the transform to a resolved value.
    pub fn apply(&self, input: &str) -> String {
        match self {
            Self::Lower => input.to_lowercase(),
            Self::Upper => input.to_uppercase(),
            Self::Kebab => join_words(input, "-", WordShape::Lower),
            Self::Snake => join_words(input, "_", WordShape::Lower),
            Self::Camel => {
                let words = split_words(input);
                let mut out = String::with_capacity(input.len());
                for (i, word) in words.iter().enumerate() {
                    if i == 0 {
                        out.push_str(&word.to_lowercase());
                    } else {
                        out.push_str(&capitalize(word));
                    }
                }
                out
            }
            Self::Pascal => split_words(input).iter().map(|w| capitalize(w)).collect(),
            Self::Title => join_words(input, " ", WordShape::Capitalized),
        }
    }
}

enum WordShape {
    Lower,
    Capitalized,
}

fn join_words(input: &str, sep: &str, shape: WordShape) -> String {
    split_words(input)
        .iter()
        .map(|w| match shape {
            WordShape::Lower => w.to_lowercase(),
            WordShape::Capitalized => capitalize(w),
        })
        .collect::<Vec<_>>()
        .join(sep)
}

/// Split on whitespace, hyphens and underscores.
fn split_words(input: &str) -> Vec<String> {
    input
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
