//! Strips markdown emphasis markers from model answers.
//!
//! This is a fixed sequence of regex rewrites, not a markdown parser: code
//! spans, links, and nested markers are left alone.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

static BOLD_ASTERISK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("bold asterisk regex is valid"));

static BOLD_UNDERSCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"__(.+?)__").expect("bold underscore regex is valid"));

static ITALIC_ASTERISK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*(.+?)\*").expect("italic asterisk regex is valid"));

static ITALIC_UNDERSCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_(.+?)_").expect("italic underscore regex is valid"));

static STRAY_ASTERISK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*").expect("stray asterisk regex is valid"));

/// Remove bold and italic markers, then any asterisk left over.
///
/// Rules run in this order: `**X**`, `__X__`, `*X*`, `_X_`, lone `*`. Bold runs
/// first so its outer markers are never paired as italics. Matches are
/// non-greedy and never span a line break. Unpaired underscores survive.
/// Whitespace and case are untouched.
///
/// Returns `Cow::Borrowed` when the text contains no `*` or `_`.
#[must_use]
pub fn strip_markdown(text: &str) -> Cow<'_, str> {
    if !text.contains(['*', '_']) {
        return Cow::Borrowed(text);
    }

    let rules: [(&Regex, &str); 5] = [
        (&*BOLD_ASTERISK, "${1}"),
        (&*BOLD_UNDERSCORE, "${1}"),
        (&*ITALIC_ASTERISK, "${1}"),
        (&*ITALIC_UNDERSCORE, "${1}"),
        (&*STRAY_ASTERISK, ""),
    ];

    let mut out: Option<String> = None;
    for (re, replacement) in rules {
        let current = out.as_deref().unwrap_or(text);
        let next = match re.replace_all(current, replacement) {
            Cow::Borrowed(_) => None,
            Cow::Owned(s) => Some(s),
        };
        if next.is_some() {
            out = next;
        }
    }

    match out {
        Some(s) => Cow::Owned(s),
        None => Cow::Borrowed(text),
    }
}
