//! Text normalization used by citekey generation.
//!
//! [`transliterate`] brings Japanese text into Hepburn romaji and leaves
//! every other script untouched. [`simplify_title`] repeatedly strips
//! punctuation, contractions and stopwords until the title stops changing.

pub mod stopwords;

use unicode_normalization::UnicodeNormalization;

use crate::error::{GitreferError, Result};
use stopwords::{STOPWORDS, remove_token};

/// Upper bound on simplification passes. Each pass at least halves runs of
/// adjacent stopwords, so real titles settle in two or three.
pub const MAX_SIMPLIFY_PASSES: usize = 20;

const DASHES: &[char] = &[
    '/', '\u{2010}', '\u{2011}', '\u{2012}', '\u{2013}', '\u{2014}', '\u{2015}',
];

const CONTRACTIONS: &[&str] = &[
    "'s", "'t", "'S", "'T", "\u{2019}s", "\u{2019}t", "\u{2019}S", "\u{2019}T",
];

fn is_japanese(c: char) -> bool {
    matches!(c,
        '\u{3005}'
        | '\u{3040}'..='\u{30FF}'
        | '\u{31F0}'..='\u{31FF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{FF66}'..='\u{FF9F}')
}

fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
        || matches!(c,
            '\u{00A1}' | '\u{00AB}' | '\u{00BB}' | '\u{00BF}'
            | '\u{2016}'..='\u{205E}'
            | '\u{3001}'..='\u{3003}'
            | '\u{3008}'..='\u{3011}'
            | '\u{30FB}'
            | '\u{FF01}'..='\u{FF0F}'
            | '\u{FF1A}'..='\u{FF20}')
}

/// Latin working form of `text`: Japanese is romanized, everything else
/// passes through unchanged.
pub fn transliterate(text: &str) -> String {
    if !text.chars().any(is_japanese) {
        return text.to_string();
    }
    let widened: String = text.nfkc().collect();
    kakasi::convert(&widened).romaji
}

/// Fold a family name for use in a citekey: no underscores, romanized,
/// lower case, no whitespace.
pub fn fold_name(name: &str) -> String {
    transliterate(&name.replace('_', ""))
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Capitalize a token. Tokens shorter than two characters are upper-cased
/// whole; a token with a leading space capitalizes its second character.
pub fn capitalize(token: &str) -> String {
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (None, _) | (Some(_), None) => token.to_uppercase(),
        (Some(' '), Some(second)) => {
            format!(" {}{}", second.to_uppercase(), chars.as_str())
        }
        (Some(first), Some(_)) => {
            let rest = &token[first.len_utf8()..];
            format!("{}{rest}", first.to_uppercase())
        }
    }
}

fn simplify_pass(title: &str) -> String {
    let spaced: String = title
        .chars()
        .map(|c| if DASHES.contains(&c) || c.is_whitespace() { ' ' } else { c })
        .collect();

    let mut title = format!(" {} ", transliterate(&spaced));
    for contraction in CONTRACTIONS {
        title = title.replace(contraction, "");
    }
    title.retain(|c| !is_punctuation(c));
    for word in STOPWORDS {
        title = remove_token(&title, word);
    }
    title
}

fn visible_len(text: &str) -> usize {
    text.chars().filter(|c| *c != ' ').count()
}

/// Simplify a title to its significant words, space separated.
///
/// Passes repeat until the non-space length stops changing. A title that is
/// still changing after [`MAX_SIMPLIFY_PASSES`] is an error.
pub fn simplify_title(title: &str) -> Result<String> {
    let mut current = title.to_string();
    for _ in 0..MAX_SIMPLIFY_PASSES {
        let before = visible_len(&current);
        current = simplify_pass(&current);
        if visible_len(&current) == before {
            return Ok(current.split(' ').filter(|t| !t.is_empty()).collect::<Vec<_>>().join(" "));
        }
    }
    tracing::error!(title, passes = MAX_SIMPLIFY_PASSES, "title simplification did not converge");
    Err(GitreferError::NoConvergence(MAX_SIMPLIFY_PASSES))
}
