//! DOI and metadata extraction from local PDF files.
//!
//! Nothing here fails loudly: an unreadable PDF yields `None`, and a PDF
//! without a DOI still yields whatever its info dictionary holds.

use std::path::Path;

use gitrefer_core::{Author, ManualFields, validate_doi};
use lopdf::{Dictionary, Document, Object};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{RemoteError, Result};

static DOI_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)10\.\d{4,9}/[-._;()/:A-Z0-9]+[A-Z0-9/]").expect("valid DOI regex"));

/// Pages scanned for a DOI before falling back to the info dictionary.
const TEXT_PAGES: usize = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PdfMetadata {
    pub doi: Option<String>,
    pub title: String,
    pub authors: Vec<Author>,
    pub keywords: String,
    /// The info dictionary `Subject`, which producers use for the abstract.
    pub abstract_text: String,
}

impl PdfMetadata {
    /// Fields for a manual record built from this PDF.
    pub fn to_manual_fields(&self) -> ManualFields {
        ManualFields {
            title: self.title.clone(),
            authors: self.authors.clone(),
            keywords: self.keywords.clone(),
            abstract_text: self.abstract_text.clone(),
            ..ManualFields::default()
        }
    }
}

/// First DOI-shaped substring of `text`.
pub fn find_doi(text: &str) -> Option<String> {
    DOI_REGEX
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .find(|doi| validate_doi(doi))
}

/// Inspect `path`. `None` when the file cannot be parsed as a PDF.
pub fn inspect(path: &Path) -> Option<PdfMetadata> {
    let document = match Document::load(path) {
        Ok(document) => document,
        Err(err) => {
            tracing::warn!(path = %path.display(), "lopdf failed to open PDF: {err}");
            return None;
        }
    };

    let text = match first_pages_text(&document, TEXT_PAGES) {
        Ok(text) => text,
        Err(err) => {
            tracing::debug!(path = %path.display(), "{err}");
            String::new()
        }
    };

    let info = info_dictionary(&document);
    let title = info_string(info, b"Title");
    let subject = info_string(info, b"Subject");
    let keywords = info_string(info, b"Keywords");
    let custom_doi = info_string(info, b"doi");

    let doi = find_doi(&text).or_else(|| {
        [&custom_doi, &subject, &keywords, &title]
            .into_iter()
            .find_map(|value| find_doi(value))
    });
    match &doi {
        Some(doi) => tracing::info!(path = %path.display(), doi = %doi, "found DOI in PDF"),
        None => tracing::info!(path = %path.display(), "no DOI found in PDF"),
    }

    Some(PdfMetadata {
        doi,
        title: title.trim().to_string(),
        authors: parse_authors(&info_string(info, b"Author")),
        keywords: keywords.trim().to_string(),
        abstract_text: subject.trim().to_string(),
    })
}

fn first_pages_text(document: &Document, max_pages: usize) -> Result<String> {
    let pages = document.get_pages();
    if pages.is_empty() {
        return Ok(String::new());
    }
    let page_numbers = pages.keys().copied().take(max_pages).collect::<Vec<u32>>();
    document
        .extract_text(&page_numbers)
        .map_err(|err| RemoteError::PdfExtraction(format!("lopdf failed to extract text: {err}")))
}

fn info_dictionary(document: &Document) -> Option<&Dictionary> {
    match document.trailer.get(b"Info").ok()? {
        Object::Reference(id) => document.get_object(*id).ok()?.as_dict().ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

/// A text entry of the info dictionary; empty when absent.
fn info_string(info: Option<&Dictionary>, key: &[u8]) -> String {
    match info.and_then(|dict| dict.get(key).ok()) {
        Some(Object::String(bytes, _)) => decode_text_string(bytes),
        _ => String::new(),
    }
}

/// PDF text strings are UTF-16BE with a byte order mark, or a single-byte
/// encoding. UTF-8 from non-conforming producers is accepted as-is.
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

/// Split an info-dictionary `Author` value into names. Entries are separated
/// by `;` or ` and `; each is `"Family, Given"` or `"Given Family"`.
pub fn parse_authors(value: &str) -> Vec<Author> {
    value
        .split(';')
        .flat_map(|part| part.split(" and "))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            if name.contains(',') {
                return Author::parse(name);
            }
            match name.rsplit_once(char::is_whitespace) {
                Some((given, family)) => Author::new(family.trim(), given.trim()),
                None => Author::new(name, ""),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Stream, StringFormat, dictionary};
    use tempfile::TempDir;

    fn write_pdf(path: &Path, info: Dictionary) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let info_id = doc.add_object(info);
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);
        doc.save(path).unwrap();
    }

    #[test]
    fn finds_doi_in_running_text() {
        let text = "Journal of Things 12 (2020)\nhttps://doi.org/10.1016/j.cell.2020.01.001.\nAbstract";
        assert_eq!(find_doi(text).as_deref(), Some("10.1016/j.cell.2020.01.001"));
        assert_eq!(find_doi("no identifier here, only 10.12/short"), None);
    }

    #[test]
    fn decodes_utf16_and_latin1_strings() {
        assert_eq!(decode_text_string(&[0xFE, 0xFF, 0x00, 0x41, 0x30, 0x42]), "A\u{3042}");
        assert_eq!(decode_text_string(b"plain"), "plain");
        assert_eq!(decode_text_string(&[0x43, 0x61, 0x66, 0xE9]), "Caf\u{e9}");
    }

    #[test]
    fn author_lists() {
        assert_eq!(
            parse_authors("Smith, John; Jane Doe and Roe"),
            vec![Author::new("Smith", "John"), Author::new("Doe", "Jane"), Author::new("Roe", "")]
        );
        assert!(parse_authors("  ").is_empty());
    }

    #[test]
    fn reads_info_dictionary() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("paper.pdf");
        write_pdf(
            &path,
            dictionary! {
                "Title" => Object::string_literal("Deep Learning Systems"),
                "Author" => Object::string_literal("Smith, John; Doe, Jane"),
                "Subject" => Object::string_literal("doi:10.1234/abcd.5678"),
                "Keywords" => Object::String(
                    vec![0xFE, 0xFF, 0x00, 0x6D, 0x00, 0x6C],
                    StringFormat::Hexadecimal,
                ),
            },
        );

        let meta = inspect(&path).unwrap();
        assert_eq!(meta.doi.as_deref(), Some("10.1234/abcd.5678"));
        assert_eq!(meta.title, "Deep Learning Systems");
        assert_eq!(meta.authors, vec![Author::new("Smith", "John"), Author::new("Doe", "Jane")]);
        assert_eq!(meta.keywords, "ml");

        let fields = meta.to_manual_fields();
        assert_eq!(fields.title, "Deep Learning Systems");
        assert_eq!(fields.abstract_text, "doi:10.1234/abcd.5678");
    }

    #[test]
    fn pdf_without_doi_keeps_metadata() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.pdf");
        write_pdf(&path, dictionary! { "Title" => Object::string_literal("Lecture Notes") });

        let meta = inspect(&path).unwrap();
        assert_eq!(meta.doi, None);
        assert_eq!(meta.title, "Lecture Notes");
        assert!(meta.authors.is_empty());
    }

    #[test]
    fn non_pdf_is_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fake.pdf");
        std::fs::write(&path, b"definitely not a pdf").unwrap();
        assert!(inspect(&path).is_none());
        assert!(inspect(&dir.path().join("missing.pdf")).is_none());
    }
}
