/// Words dropped from titles before citekey generation (the Zotero Better
/// BibTeX `skipWords` list).
pub const STOPWORDS: &[&str] = &[
    "a", "ab", "aboard", "about", "above", "across", "after", "against", "al", "along", "amid",
    "among", "an", "and", "anti", "around", "as", "at", "before", "behind", "below", "beneath",
    "beside", "besides", "between", "beyond", "but", "by", "d", "da", "das", "de", "del", "dell",
    "dello", "dei", "degli", "della", "delle", "dem", "den", "der", "des", "despite", "die", "do",
    "down", "du", "during", "ein", "eine", "einem", "einen", "einer", "eines", "el", "en", "et",
    "except", "for", "from", "gli", "i", "il", "in", "inside", "into", "is", "l", "la", "las",
    "le", "les", "like", "lo", "los", "near", "nor", "of", "off", "on", "onto", "or", "over",
    "past", "per", "plus", "round", "save", "since", "so", "some", "sur", "than", "the",
    "through", "to", "toward", "towards", "un", "una", "unas", "under", "underneath", "une",
    "unlike", "uno", "unos", "until", "up", "upon", "versus", "via", "von", "while", "with",
    "within", "without", "yet", "zu", "zum",
];

/// Replace every ` word ` (ASCII case-insensitive) with a single space.
///
/// Matches never overlap: in ` a a ` only the first `a` goes, because its
/// trailing space is consumed. Callers iterate to a fixed point.
pub(crate) fn remove_token(text: &str, word: &str) -> String {
    let bytes = text.as_bytes();
    let word = word.as_bytes();
    let span = word.len() + 2;

    let mut out = String::with_capacity(text.len());
    let mut start = 0;
    let mut i = 0;
    while i + span <= bytes.len() {
        if bytes[i] == b' '
            && bytes[i + span - 1] == b' '
            && bytes[i + 1..i + 1 + word.len()].eq_ignore_ascii_case(word)
        {
            out.push_str(&text[start..i]);
            out.push(' ');
            i += span;
            start = i;
        } else {
            i += 1;
        }
    }
    out.push_str(&text[start..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_whole_tokens_only() {
        assert_eq!(remove_token(" the theory ", "the"), " theory ");
        assert_eq!(remove_token(" bathe ", "the"), " bathe ");
    }

    #[test]
    fn case_insensitive() {
        assert_eq!(remove_token(" The X THE y ", "the"), " X y ");
    }

    #[test]
    fn adjacent_matches_need_another_pass() {
        let once = remove_token(" a a a a ", "a");
        assert_eq!(once, " a a ");
        let twice = remove_token(&once, "a");
        assert_eq!(twice, " a ");
        assert_eq!(remove_token(&twice, "a"), " ");
    }

    #[test]
    fn multibyte_text_is_preserved() {
        assert_eq!(remove_token(" über of größe ", "of"), " über größe ");
    }
}
