//! Capture placement: where substituted text lands in a note.
//!
//! [`place_capture`] is a pure function from (existing content, new text,
//! policy) to new content. It never touches storage, so callers can wrap
//! it in whatever write discipline their backend supports.
//!
//! The newline joining rule: when splicing at a line boundary, a newline
//! is added before the new text only if the preceding content does not
//! already end in one, and after it only if more content follows and the
//! text lacks its own trailing newline. Repeated captures to the same
//! anchor therefore never accumulate blank lines.

use quickcapture_core::prelude::*;
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

/// Matches # Heading, ## Heading, etc.
static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#{1,6}\s").unwrap());

/// A line that ends the current section: the next heading or a fence
static SECTION_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:#{1,6}\s|---)").unwrap());

/// Compute the new document content for one capture.
///
/// `policy.active_position` must only be set when the destination is the
/// active document; callers strip it otherwise. `cursor` is the caret
/// byte offset for cursor placement, when the host knows it.
pub fn place_capture(
    existing: &str,
    text: &str,
    policy: &PlacementPolicy,
    cursor: Option<usize>,
) -> Result<String> {
    match &policy.mode {
        PlacementMode::InsertAfter(after) => insert_after(existing, text, after),
        PlacementMode::Inline(inline) => insert_inline(existing, text, inline),
        mode => Ok(match policy.active_position {
            Some(ActiveFilePosition::Top) => insert_top(existing, text),
            Some(ActiveFilePosition::Bottom) => append_bottom(existing, text),
            Some(ActiveFilePosition::Cursor) => {
                let mut at = cursor.unwrap_or(0).min(existing.len());
                while at > 0 && !existing.is_char_boundary(at) {
                    at -= 1;
                }
                splice(existing, at, text)
            }
            None => match mode {
                PlacementMode::Bottom => append_bottom(existing, text),
                _ => insert_top(existing, text),
            },
        }),
    }
}

/// Insert at the top of the note, below any frontmatter block.
pub fn insert_top(existing: &str, text: &str) -> String {
    let at = frontmatter_end(existing).unwrap_or(0);
    splice(existing, at, text)
}

/// Append at the bottom of the note.
pub fn append_bottom(existing: &str, text: &str) -> String {
    splice(existing, existing.len(), text)
}

fn insert_after(existing: &str, text: &str, policy: &InsertAfterPolicy) -> Result<String> {
    let spans = line_spans(existing);
    let anchor = policy.anchor.as_str();

    let matched = spans.iter().position(|span| {
        let line = existing[span.clone()].trim_start();
        line == anchor || line.starts_with(anchor)
    });
    let Some(idx) = matched else {
        return Err(Error::anchor_not_found(anchor));
    };

    if policy.at_end_of_section {
        return Ok(insert_at_section_end(existing, text, &spans, idx));
    }

    let is_heading = HEADING.is_match(&existing[spans[idx].clone()]);
    let skip_blanks = match policy.blank_lines {
        BlankLinePolicy::Auto => is_heading,
        BlankLinePolicy::Skip => true,
        BlankLinePolicy::None => false,
    };

    let mut insert_line = idx + 1;
    if skip_blanks {
        while insert_line < spans.len() && existing[spans[insert_line].clone()].trim().is_empty() {
            insert_line += 1;
        }
    }

    Ok(splice(existing, line_start(existing, &spans, insert_line), text))
}

/// Extend the insertion point to the end of the matched section: the last
/// non-blank line before the next heading, or the end of the document
/// when the section runs to EOF.
fn insert_at_section_end(existing: &str, text: &str, spans: &[Range<usize>], idx: usize) -> String {
    let boundary =
        (idx + 1..spans.len()).find(|&i| SECTION_BOUNDARY.is_match(&existing[spans[i].clone()]));

    match boundary {
        Some(b) => {
            let last_content = (idx + 1..b)
                .rev()
                .find(|&i| !existing[spans[i].clone()].trim().is_empty());
            let insert_line = match last_content {
                Some(line) => line + 1,
                None => idx + 1,
            };
            splice(existing, line_start(existing, spans, insert_line), text)
        }
        None => splice(existing, existing.len(), text),
    }
}

fn insert_inline(existing: &str, text: &str, policy: &InlinePolicy) -> Result<String> {
    if policy.anchor.contains('\n') {
        return Err(Error::config_error(
            "inline anchor must not contain a newline",
        ));
    }

    let Some(start) = existing.find(&policy.anchor) else {
        return Err(Error::anchor_not_found(&policy.anchor));
    };
    let after_anchor = start + policy.anchor.len();
    let line_end = existing[after_anchor..]
        .find('\n')
        .map(|i| after_anchor + i)
        .unwrap_or(existing.len());

    let mut out = String::with_capacity(existing.len() + text.len());
    out.push_str(&existing[..after_anchor]);
    out.push_str(text);
    if policy.replace_to_end_of_line {
        // replacing at end-of-line degenerates to a pure insert
        out.push_str(&existing[line_end..]);
    } else {
        out.push_str(&existing[after_anchor..]);
    }
    Ok(out)
}

/// Byte offset where the YAML frontmatter block ends, if one opens the
/// document.
fn frontmatter_end(content: &str) -> Option<usize> {
    let rest = content.strip_prefix("---\n")?;
    let mut offset = 4;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if trimmed == "---" || trimmed == "..." {
            return Some(offset + line.len());
        }
        offset += line.len();
    }
    None
}

/// Byte ranges of each line, exclusive of the trailing newline. A final
/// newline does not produce an empty trailing line.
fn line_spans(content: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0;
    for (i, b) in content.bytes().enumerate() {
        if b == b'\n' {
            spans.push(start..i);
            start = i + 1;
        }
    }
    if start < content.len() {
        spans.push(start..content.len());
    }
    spans
}

fn line_start(content: &str, spans: &[Range<usize>], line: usize) -> usize {
    spans.get(line).map(|s| s.start).unwrap_or(content.len())
}

/// Splice `text` into `existing` at a line boundary, applying the
/// newline joining rule.
fn splice(existing: &str, at: usize, text: &str) -> String {
    let (before, after) = existing.split_at(at);
    let mut out = String::with_capacity(existing.len() + text.len() + 2);
    out.push_str(before);
    if !before.is_empty() && !before.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(text);
    if !after.is_empty() && !text.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(after);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn after(anchor: &str) -> PlacementPolicy {
        PlacementPolicy::new(PlacementMode::InsertAfter(InsertAfterPolicy::new(anchor)))
    }

    fn after_at_end(anchor: &str) -> PlacementPolicy {
        PlacementPolicy::new(PlacementMode::InsertAfter(
            InsertAfterPolicy::new(anchor).at_end_of_section(),
        ))
    }

    #[test]
    fn test_insert_after_heading_auto_skips_blanks() {
        let doc = "# Log\n\nfirst\n";
        let out = place_capture(doc, "new\n", &after("# Log"), None).unwrap();
        assert_eq!(out, "# Log\n\nnew\nfirst\n");
    }

    #[test]
    fn test_insert_after_plain_line_auto_does_not_skip() {
        let doc = "marker\n\nrest\n";
        let out = place_capture(doc, "new\n", &after("marker"), None).unwrap();
        assert_eq!(out, "marker\nnew\n\nrest\n");
    }

    #[test]
    fn test_insert_after_skip_policy_always_skips() {
        let doc = "marker\n\n\nrest\n";
        let policy = PlacementPolicy::new(PlacementMode::InsertAfter(
            InsertAfterPolicy::new("marker").blank_lines(BlankLinePolicy::Skip),
        ));
        let out = place_capture(doc, "new\n", &policy, None).unwrap();
        assert_eq!(out, "marker\n\n\nnew\nrest\n");
    }

    #[test]
    fn test_insert_after_none_policy_inserts_immediately() {
        let doc = "# Log\n\nrest\n";
        let policy = PlacementPolicy::new(PlacementMode::InsertAfter(
            InsertAfterPolicy::new("# Log").blank_lines(BlankLinePolicy::None),
        ));
        let out = place_capture(doc, "new\n", &policy, None).unwrap();
        assert_eq!(out, "# Log\nnew\n\nrest\n");
    }

    #[test]
    fn test_insert_after_prefix_match_ignores_indent() {
        let doc = "  - marker item with tail\nrest\n";
        let out = place_capture(doc, "new\n", &after("- marker"), None).unwrap();
        assert_eq!(out, "  - marker item with tail\nnew\nrest\n");
    }

    #[test]
    fn test_insert_after_missing_anchor_is_recoverable_error() {
        let result = place_capture("body\n", "new\n", &after("## Gone"), None);
        match result {
            Err(Error::AnchorNotFound { anchor }) => assert_eq!(anchor, "## Gone"),
            other => panic!("expected anchor error, got {other:?}"),
        }
    }

    #[test]
    fn test_insert_at_end_of_section_before_next_heading() {
        let doc = "## A\none\ntwo\n\n## B\nother\n";
        let out = place_capture(doc, "new\n", &after_at_end("## A"), None).unwrap();
        assert_eq!(out, "## A\none\ntwo\nnew\n\n## B\nother\n");
    }

    #[test]
    fn test_insert_at_end_of_section_at_eof_appends() {
        let doc = "# J\n\n10:00\nData\n";
        let out = place_capture(doc, "18:11\nTest\n\n", &after_at_end("# J"), None).unwrap();
        assert_eq!(out, "# J\n\n10:00\nData\n18:11\nTest\n\n");
    }

    #[test]
    fn test_repeated_at_end_captures_do_not_grow_blank_lines() {
        let doc = "# J\n\n10:00\nData\n";
        let once = place_capture(doc, "18:11\nTest\n\n", &after_at_end("# J"), None).unwrap();
        let twice = place_capture(&once, "18:12\nTest2\n\n", &after_at_end("# J"), None).unwrap();
        assert_eq!(twice, "# J\n\n10:00\nData\n18:11\nTest\n\n18:12\nTest2\n\n");
    }

    #[test]
    fn test_insert_at_end_with_empty_section() {
        let doc = "## A\n## B\n";
        let out = place_capture(doc, "new\n", &after_at_end("## A"), None).unwrap();
        assert_eq!(out, "## A\nnew\n## B\n");
    }

    #[test]
    fn test_inline_insert_preserves_tail() {
        let doc = "Mood:: okay stuff\nrest\n";
        let policy = PlacementPolicy::new(PlacementMode::Inline(InlinePolicy {
            anchor: "Mood::".into(),
            replace_to_end_of_line: false,
        }));
        let out = place_capture(doc, " great", &policy, None).unwrap();
        assert_eq!(out, "Mood:: great okay stuff\nrest\n");
    }

    #[test]
    fn test_inline_replace_to_end_of_line() {
        let doc = "Mood:: old value\nrest\n";
        let policy = PlacementPolicy::new(PlacementMode::Inline(InlinePolicy {
            anchor: "Mood::".into(),
            replace_to_end_of_line: true,
        }));
        let out = place_capture(doc, " great", &policy, None).unwrap();
        assert_eq!(out, "Mood:: great\nrest\n");
    }

    #[test]
    fn test_inline_replace_at_eol_is_pure_append() {
        let doc = "Mood::\nrest\n";
        let policy = PlacementPolicy::new(PlacementMode::Inline(InlinePolicy {
            anchor: "Mood::".into(),
            replace_to_end_of_line: true,
        }));
        let out = place_capture(doc, " great", &policy, None).unwrap();
        assert_eq!(out, "Mood:: great\nrest\n");
    }

    #[test]
    fn test_inline_newline_anchor_is_config_error() {
        let policy = PlacementPolicy::new(PlacementMode::Inline(InlinePolicy {
            anchor: "a\nb".into(),
            replace_to_end_of_line: false,
        }));
        let result = place_capture("a\nb\n", "x", &policy, None);
        assert!(matches!(result, Err(Error::ConfigError { .. })));
    }

    #[test]
    fn test_top_goes_below_frontmatter() {
        let doc = "---\ntitle: Note\n---\nbody\n";
        let out = place_capture(doc, "new\n", &PlacementPolicy::default(), None).unwrap();
        assert_eq!(out, "---\ntitle: Note\n---\nnew\nbody\n");
    }

    #[test]
    fn test_top_without_frontmatter_is_position_zero() {
        let out = place_capture("body\n", "new\n", &PlacementPolicy::default(), None).unwrap();
        assert_eq!(out, "new\nbody\n");
    }

    #[test]
    fn test_unclosed_frontmatter_falls_back_to_top() {
        let doc = "---\ntitle: broken\nbody\n";
        let out = place_capture(doc, "new\n", &PlacementPolicy::default(), None).unwrap();
        assert_eq!(out, "new\n---\ntitle: broken\nbody\n");
    }

    #[test]
    fn test_bottom_adds_separator_newline_only_when_needed() {
        let policy = PlacementPolicy::new(PlacementMode::Bottom);
        let out = place_capture("no trailing newline", "new\n", &policy, None).unwrap();
        assert_eq!(out, "no trailing newline\nnew\n");

        let out = place_capture("trailing\n", "new\n", &policy, None).unwrap();
        assert_eq!(out, "trailing\nnew\n");
    }

    #[test]
    fn test_bottom_into_empty_document() {
        let policy = PlacementPolicy::new(PlacementMode::Bottom);
        let out = place_capture("", "new\n", &policy, None).unwrap();
        assert_eq!(out, "new\n");
    }

    #[test]
    fn test_active_position_overrides_mode() {
        let policy = PlacementPolicy {
            mode: PlacementMode::Top,
            active_position: Some(ActiveFilePosition::Bottom),
        };
        let out = place_capture("body\n", "new\n", &policy, None).unwrap();
        assert_eq!(out, "body\nnew\n");
    }

    #[test]
    fn test_cursor_position_splices_at_offset() {
        let policy = PlacementPolicy {
            mode: PlacementMode::Top,
            active_position: Some(ActiveFilePosition::Cursor),
        };
        let doc = "one\ntwo\nthree\n";
        let out = place_capture(doc, "new\n", &policy, Some(4)).unwrap();
        assert_eq!(out, "one\nnew\ntwo\nthree\n");
    }

    #[test]
    fn test_text_without_trailing_newline_gets_one_mid_document() {
        let doc = "# Log\nrest\n";
        let policy = PlacementPolicy::new(PlacementMode::InsertAfter(
            InsertAfterPolicy::new("# Log").blank_lines(BlankLinePolicy::None),
        ));
        let out = place_capture(doc, "new", &policy, None).unwrap();
        assert_eq!(out, "# Log\nnew\nrest\n");
    }
}
