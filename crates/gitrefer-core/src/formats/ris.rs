use crate::models::{EntryType, Record};

fn ris_type(entry_type: EntryType) -> &'static str {
    match entry_type {
        EntryType::Article => "JOUR",
        EntryType::Book | EntryType::InBook | EntryType::InCollection => "BOOK",
        EntryType::PhdThesis | EntryType::MastersThesis => "THES",
        EntryType::InProceedings => "CONF",
        _ => "GEN",
    }
}

fn push_line(lines: &mut Vec<String>, tag: &str, value: &str) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }
    lines.push(format!("{tag}  - {value}"));
}

/// RIS record terminated by an `ER` line. Page tags need both ends; DOI
/// records carry `DO`, others `UR`.
pub fn format_ris(id: &str, record: &Record) -> String {
    let mut lines = vec![format!("TY  - {}", ris_type(record.entry_type))];
    for author in &record.authors {
        push_line(&mut lines, "AU", &format!("{}, {}", author.family, author.given));
    }
    push_line(&mut lines, "TI", &record.title);
    push_line(&mut lines, "PY", &record.year);
    push_line(&mut lines, "JF", &record.journal);
    push_line(&mut lines, "VL", &record.volume);
    push_line(&mut lines, "IS", &record.issue);
    if !record.firstpage.is_empty() && !record.lastpage.is_empty() {
        push_line(&mut lines, "SP", &record.firstpage);
        push_line(&mut lines, "EP", &record.lastpage);
    }
    push_line(&mut lines, "PB", &record.publisher);
    if record.is_doi {
        push_line(&mut lines, "DO", id);
    } else {
        push_line(&mut lines, "UR", &record.url);
    }
    lines.push("ER  - ".to_string());
    lines.push(String::new());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Author;

    #[test]
    fn doi_record_has_do_and_no_ur() {
        let mut record = Record::new(true);
        record.entry_type = EntryType::Article;
        record.authors = vec![Author::new("Smith", "J")];
        record.title = "Deep Learning Systems".into();
        record.year = "2020".into();
        record.url = "https://publisher.example/a".into();
        record.firstpage = "1".into();
        record.lastpage = "9".into();
        let ris = format_ris("10.1/xyz", &record);
        assert_eq!(
            ris,
            "TY  - JOUR\nAU  - Smith, J\nTI  - Deep Learning Systems\nPY  - 2020\n\
             SP  - 1\nEP  - 9\nDO  - 10.1/xyz\nER  - \n"
        );
        assert!(!ris.contains("UR  -"));
    }

    #[test]
    fn manual_record_has_url() {
        let mut record = Record::new(false);
        record.url = "https://example.org".into();
        let ris = format_ris("note", &record);
        assert!(ris.starts_with("TY  - GEN\n"));
        assert!(ris.contains("UR  - https://example.org\n"));
        assert!(!ris.contains("DO  -"));
    }

    #[test]
    fn type_codes() {
        assert_eq!(ris_type(EntryType::InCollection), "BOOK");
        assert_eq!(ris_type(EntryType::MastersThesis), "THES");
        assert_eq!(ris_type(EntryType::InProceedings), "CONF");
        assert_eq!(ris_type(EntryType::TechReport), "GEN");
        assert_eq!(ris_type(EntryType::Unspecified), "GEN");
    }

    #[test]
    fn single_page_is_omitted() {
        let mut record = Record::new(false);
        record.firstpage = "7".into();
        assert!(!format_ris("p", &record).contains("SP  -"));
    }
}
