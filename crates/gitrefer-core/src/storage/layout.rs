/// Replace characters that are unsafe in file names with `_`.
pub fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| match c {
            '/' | '\\' | '?' | '%' | '*' | ':' | '|' | '"' | '<' | '>' => '_',
            other => other,
        })
        .collect()
}

/// Paths of the persisted layout below the store root:
///
/// ```text
/// {root}/references.json
/// {root}/raw/{sanitized id}.json
/// {root}/data/{sanitized id}/{file name}
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    root: String,
}

impl StoreLayout {
    pub fn new(root: &str) -> Self {
        Self {
            root: root.trim_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn references_file(&self) -> String {
        format!("{}/references.json", self.root)
    }

    pub fn raw_dir(&self) -> String {
        format!("{}/raw", self.root)
    }

    pub fn data_root(&self) -> String {
        format!("{}/data", self.root)
    }

    pub fn raw_file(&self, id: &str) -> String {
        format!("{}/{}.json", self.raw_dir(), sanitize_id(id))
    }

    pub fn data_dir(&self, id: &str) -> String {
        format!("{}/{}", self.data_root(), sanitize_id(id))
    }

    pub fn data_file(&self, id: &str, file_name: &str) -> String {
        format!("{}/{}", self.data_dir(id), file_name)
    }
}

impl Default for StoreLayout {
    fn default() -> Self {
        Self::new("references")
    }
}
