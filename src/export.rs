//! Plain-text export of generated markup

use regex::Regex;
use std::sync::OnceLock;

fn tag_regex() -> Option<&'static Regex> {
    static TAG: OnceLock<Option<Regex>> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"<[^>]+>").ok()).as_ref()
}

/// Remove every `<...>` tag, keeping the text between tags
pub fn strip_markup(text: &str) -> String {
    match tag_regex() {
        Some(re) => re.replace_all(text, "").into_owned(),
        None => text.to_string(),
    }
}
