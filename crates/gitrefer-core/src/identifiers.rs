use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{GitreferError, Result};

static DOI_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^10\.\d{4,9}/[-._;()/:a-zA-Z0-9_]+$").expect("valid DOI regex"));

/// Whether `candidate` has the shape of a bare DOI (`10.NNNN/suffix`).
pub fn validate_doi(candidate: &str) -> bool {
    DOI_REGEX.is_match(candidate)
}

/// A validated DOI, stripped of resolver and `doi:` prefixes. Case is kept:
/// the stored id is the DOI exactly as the registry knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Doi {
    pub raw: String,
    pub value: String,
}

impl Doi {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        let stripped = [
            "https://doi.org/",
            "http://doi.org/",
            "https://dx.doi.org/",
            "http://dx.doi.org/",
            "doi:",
            "DOI:",
        ]
        .iter()
        .find_map(|prefix| input.strip_prefix(prefix))
        .map(str::trim_start)
        .unwrap_or(input);

        if !validate_doi(stripped) {
            return Err(GitreferError::InvalidDoi(input.to_string()));
        }

        Ok(Self {
            raw: input.to_string(),
            value: stripped.to_string(),
        })
    }

    pub fn url(&self) -> String {
        format!("https://doi.org/{}", self.value)
    }
}

impl std::fmt::Display for Doi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_doi() {
        let doi = Doi::parse("10.1000/xyz123").unwrap();
        assert_eq!(doi.value, "10.1000/xyz123");
        assert_eq!(doi.url(), "https://doi.org/10.1000/xyz123");
    }

    #[test]
    fn doi_with_https_prefix() {
        let doi = Doi::parse("https://doi.org/10.1000/xyz123").unwrap();
        assert_eq!(doi.value, "10.1000/xyz123");
    }

    #[test]
    fn doi_with_space_after_colon() {
        let doi = Doi::parse("DOI: 10.1000/XYZ123").unwrap();
        assert_eq!(doi.value, "10.1000/XYZ123");
    }

    #[test]
    fn chapter_doi_with_underscore() {
        assert!(validate_doi("10.1007/978-3-319-10590-1_53"));
        assert!(validate_doi("10.48550/arxiv.2401.17231"));
    }

    #[test]
    fn reject_non_dois() {
        assert!(Doi::parse("not-a-doi").is_err());
        assert!(Doi::parse("10.1000").is_err());
        assert!(Doi::parse("10.12/short-registrant").is_err());
        assert!(Doi::parse("").is_err());
        assert!(!validate_doi("paper1"));
    }
}
