use crate::models::{Author, Record};

fn apa_author(author: &Author) -> String {
    match author.initial() {
        Some(initial) => format!("{}, {initial}.", author.family),
        None => author.family.clone(),
    }
}

fn apa_authors(authors: &[Author]) -> String {
    let names: Vec<String> = authors.iter().map(apa_author).collect();
    match names.split_last() {
        None => String::new(),
        Some((only, [])) => only.clone(),
        Some((last, rest)) => format!("{}, & {last}", rest.join(", ")),
    }
}

/// APA-style reference:
/// `Authors (year). Title. _Journal_, _volume_(issue), first-last. link`.
pub fn format_apa(id: &str, record: &Record) -> String {
    let mut head: Vec<String> = Vec::new();
    let authors = apa_authors(&record.authors);
    if !authors.is_empty() {
        head.push(authors);
    }
    if !record.year.is_empty() {
        head.push(format!("({}).", record.year));
    }
    if !record.title.is_empty() {
        head.push(format!("{}.", record.title));
    }

    let mut source = String::new();
    if !record.journal.is_empty() {
        source.push_str(&format!("_{}_", record.journal));
    }
    if !record.volume.is_empty() {
        if !source.is_empty() {
            source.push_str(", ");
        }
        source.push_str(&format!("_{}_", record.volume));
    }
    if !record.issue.is_empty() {
        source.push_str(&format!("({})", record.issue));
    }
    if !record.firstpage.is_empty() && !record.lastpage.is_empty() {
        if !source.is_empty() {
            source.push_str(", ");
        }
        source.push_str(&format!("{}-{}", record.firstpage, record.lastpage));
    }
    if !source.is_empty() {
        head.push(format!("{source}."));
    }

    if record.is_doi {
        head.push(format!("https://doi.org/{id}"));
    } else if !record.url.is_empty() {
        head.push(record.url.clone());
    }
    head.join(" ")
}
