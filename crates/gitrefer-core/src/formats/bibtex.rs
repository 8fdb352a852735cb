use crate::models::Record;

/// BibTeX entry for `record`. Values are written as stored, without escaping;
/// `doi` is the id and only present for DOI records.
pub fn format_bibtex(id: &str, record: &Record) -> String {
    let authors = record
        .authors
        .iter()
        .map(|author| format!("{}, {}", author.family, author.given))
        .collect::<Vec<_>>()
        .join(" and ");

    let mut bib = format!("@{}{{{},\n", record.entry_type.bibtex_name(), record.citekey);
    push_field(&mut bib, "author", &authors);
    push_field(&mut bib, "title", &record.title);
    push_field(&mut bib, "year", &record.year);
    push_field(&mut bib, "month", &record.month);
    push_field(&mut bib, "edition", &record.edition);
    push_field(&mut bib, "journal", &record.journal);
    push_field(&mut bib, "volume", &record.volume);
    push_field(&mut bib, "number", &record.issue);
    push_field(&mut bib, "pages", &record.pages());
    push_field(&mut bib, "publisher", &record.publisher);
    push_field(&mut bib, "url", &record.url);
    if record.is_doi {
        push_field(&mut bib, "doi", id);
    }
    bib.push('}');
    bib
}

fn push_field(bib: &mut String, name: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    bib.push_str(&format!("  {name}={{{value}}},\n"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Author, EntryType, ManualFields};

    fn article() -> Record {
        let mut record = Record::new(true);
        record.entry_type = EntryType::Article;
        record.citekey = "vaswani2017attention".into();
        record.authors = vec![Author::new("Vaswani", "Ashish"), Author::new("Shazeer", "Noam")];
        record.title = "Attention Is All You Need".into();
        record.year = "2017".into();
        record.journal = "NeurIPS".into();
        record.volume = "30".into();
        record.issue = "1".into();
        record.firstpage = "5998".into();
        record.lastpage = "6008".into();
        record
    }

    #[test]
    fn full_entry() {
        let bib = format_bibtex("10.5555/3295222.3295349", &article());
        assert_eq!(
            bib,
            "@article{vaswani2017attention,\n\
             \x20 author={Vaswani, Ashish and Shazeer, Noam},\n\
             \x20 title={Attention Is All You Need},\n\
             \x20 year={2017},\n\
             \x20 journal={NeurIPS},\n\
             \x20 volume={30},\n\
             \x20 number={1},\n\
             \x20 pages={5998-6008},\n\
             \x20 doi={10.5555/3295222.3295349},\n\
             }"
        );
    }

    #[test]
    fn manual_record_has_citekey_and_no_doi() {
        let fields = ManualFields {
            entry_type: EntryType::PhdThesis,
            authors: vec![Author::new("Smith", "J")],
            year: "2020".into(),
            title: "Deep Learning Systems".into(),
            url: "https://example.org/thesis".into(),
            ..Default::default()
        };
        let record = Record::manual("paper1", fields, 1).unwrap();
        let bib = format_bibtex("paper1", &record);
        assert!(bib.starts_with("@phdthesis{smith2020deep,\n"));
        assert!(bib.contains("  url={https://example.org/thesis},\n"));
        assert!(!bib.contains("doi="));
        assert!(bib.ends_with('}'));
    }

    #[test]
    fn empty_entry_type_is_misc_and_empty_fields_are_skipped() {
        let mut record = Record::new(false);
        record.citekey = "Gitrefer:note".into();
        assert_eq!(format_bibtex("note", &record), "@misc{Gitrefer:note,\n}");
    }
}
