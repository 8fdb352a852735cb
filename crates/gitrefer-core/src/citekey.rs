//! Citekey generation: `{folded family name}{year}{short title}`.

use crate::error::Result;
use crate::storage::sanitize_id;
use crate::text::{capitalize, fold_name, simplify_title};

/// Number of significant title words used when nothing else is configured.
pub const DEFAULT_TITLE_WORDS: usize = 1;

/// Short title from the first `title_words` significant words.
///
/// With enough words the result is lower case; a title with fewer words
/// than requested keeps its capitalized form.
pub fn short_title(title: &str, title_words: usize) -> Result<String> {
    let simplified = simplify_title(title)?;
    let words: Vec<String> = simplified
        .split(' ')
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect();

    if words.len() < title_words {
        return Ok(words.concat());
    }
    Ok(words[..title_words].concat().to_lowercase())
}

/// Build a citekey from the first author's family name, the year and the title.
pub fn make_citekey(family_name: &str, year: &str, title: &str) -> Result<String> {
    make_citekey_with(family_name, year, title, DEFAULT_TITLE_WORDS)
}

/// [`make_citekey`] with `title_words` significant title words instead of the default.
pub fn make_citekey_with(
    family_name: &str,
    year: &str,
    title: &str,
    title_words: usize,
) -> Result<String> {
    let year: String = year.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(format!(
        "{}{}{}",
        fold_name(family_name),
        year,
        short_title(title, title_words)?
    ))
}

/// Citekey used when author, year or title is missing.
pub fn fallback_citekey(id: &str) -> String {
    format!("Gitrefer:{}", sanitize_id(id))
}

/// Generate a citekey, or fall back to the id-based key when the inputs are
/// incomplete.
pub fn citekey_or_fallback(
    id: &str,
    family_name: Option<&str>,
    year: &str,
    title: &str,
    title_words: usize,
) -> Result<String> {
    match family_name {
        Some(family) if !family.is_empty() && !year.is_empty() && !title.is_empty() => {
            make_citekey_with(family, year, title, title_words)
        }
        _ => Ok(fallback_citekey(id)),
    }
}
