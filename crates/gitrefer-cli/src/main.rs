use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use gitrefer_core::{
    AppConfig, Attachment, Author, BackendKind, Doi, EntryType, ErrorKind, ExitCode, GitreferError,
    LocalStorage, ManualFields, Record, ReferenceStore, StorageBackend, StorageError,
};
use gitrefer_remote::{GitHubStorage, RegistryClient, RemoteError, inspect_pdf};

type Store = ReferenceStore<Box<dyn StorageBackend>>;

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "gitrefer",
    about = "Reference manager that keeps its library in a GitHub repository",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format (for scripts).
    /// Also enabled by setting GITREFER_JSON=1.
    #[arg(long, global = true)]
    json: bool,

    /// Log progress to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List references.
    List {
        /// Only references carrying one of these tags.
        #[arg(short, long = "tag", action = clap::ArgAction::Append)]
        tags: Vec<String>,
    },

    /// Show one reference.
    Show { id: String },

    /// Show the registry response stored for a DOI reference.
    Raw { id: String },

    /// List every file in the store.
    Tree,

    /// Add a reference by DOI.
    AddDoi {
        doi: String,
        /// Do not download the PDF linked from the registry.
        #[arg(long)]
        no_pdf: bool,
    },

    /// Add references from a file with one DOI per line.
    AddDois {
        file: PathBuf,
        #[arg(long)]
        no_pdf: bool,
    },

    /// Add a PDF, or every PDF below a directory.
    AddPdf { path: PathBuf },

    /// Add a reference without a DOI.
    AddManual {
        id: String,
        #[command(flatten)]
        fields: FieldArgs,
    },

    /// List works cited by stored references that are not in the store.
    FindNew {
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Update a reference, optionally giving it a new id.
    Update {
        id: String,
        new_id: Option<String>,
        #[command(flatten)]
        fields: FieldArgs,
        /// Regenerate the citekey from the updated fields.
        #[arg(long)]
        regen_citekey: bool,
    },

    /// Delete a reference with its files.
    Delete {
        id: String,
        #[arg(long)]
        confirm: bool,
    },

    /// Tag management.
    Tag {
        #[command(subcommand)]
        action: TagAction,
    },

    /// Attachment management.
    File {
        #[command(subcommand)]
        action: FileAction,
    },

    /// Export references as BibTeX, APA or RIS.
    Export {
        #[arg(short, long, default_value = "bibtex")]
        style: String,
        #[arg(short, long = "tag", action = clap::ArgAction::Append)]
        tags: Vec<String>,
        /// Write to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete every reference, file and raw response in the store.
    Reset {
        #[arg(long)]
        confirm: bool,
    },

    /// Config management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum TagAction {
    /// Add a tag to a reference.
    Add { id: String, tag: String },
    /// Remove a tag from a reference.
    Remove { id: String, tag: String },
}

#[derive(Subcommand)]
enum FileAction {
    /// Attach a local file.
    Add { id: String, path: PathBuf },
    /// Delete an attached file.
    Delete {
        id: String,
        name: String,
        #[arg(long)]
        confirm: bool,
    },
    /// Rename an attached file.
    Rename { id: String, old: String, new: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration.
    Show,
    /// Print the config file location.
    Path,
}

/// Bibliographic fields given on the command line. Flags override `--fields`.
#[derive(Args, Debug, Default)]
struct FieldArgs {
    /// JSON object with any of the record fields.
    #[arg(long)]
    fields: Option<String>,
    #[arg(long)]
    entry_type: Option<String>,
    #[arg(long)]
    citekey: Option<String>,
    /// "Family, Given"; repeat for several authors.
    #[arg(long = "author", action = clap::ArgAction::Append)]
    authors: Vec<String>,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    year: Option<String>,
    #[arg(long)]
    journal: Option<String>,
    #[arg(long)]
    volume: Option<String>,
    #[arg(long)]
    issue: Option<String>,
    #[arg(long)]
    publisher: Option<String>,
    #[arg(long)]
    url: Option<String>,
}

impl FieldArgs {
    fn into_fields(self) -> Result<ManualFields> {
        let mut fields: ManualFields = match &self.fields {
            Some(raw) => serde_json::from_str(raw).context("--fields must be a JSON object of record fields")?,
            None => ManualFields::default(),
        };
        if let Some(entry_type) = self.entry_type {
            fields.entry_type = entry_type.parse::<EntryType>()?;
        }
        if !self.authors.is_empty() {
            fields.authors = self.authors.iter().map(|a| Author::parse(a)).collect();
        }
        let overrides = [
            (self.citekey, &mut fields.citekey),
            (self.title, &mut fields.title),
            (self.year, &mut fields.year),
            (self.journal, &mut fields.journal),
            (self.volume, &mut fields.volume),
            (self.issue, &mut fields.issue),
            (self.publisher, &mut fields.publisher),
            (self.url, &mut fields.url),
        ];
        for (value, slot) in overrides {
            if let Some(value) = value {
                *slot = value;
            }
        }
        Ok(fields)
    }
}

// ─── Main ────────────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let json_output = cli.json || std::env::var("GITREFER_JSON").as_deref() == Ok("1");

    if let Err(err) = run(cli.command, json_output) {
        let kind = error_kind(&err);
        let code = kind.map(ExitCode::from).unwrap_or(ExitCode::GeneralError);
        if json_output {
            let body = json!({
                "status": "error",
                "error": kind.map(kind_label).unwrap_or("error"),
                "message": format!("{err:#}"),
            });
            println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
        } else {
            eprintln!("Error: {err:#}");
        }
        std::process::exit(code as i32);
    }
}

fn run(command: Commands, json_output: bool) -> Result<()> {
    let start = Instant::now();
    let config = AppConfig::load()?;

    match command {
        Commands::List { tags } => {
            let store = open_store(&config)?;
            let items: Vec<(&String, &Record)> = store
                .references()
                .iter()
                .filter(|(_, record)| record.has_any_tag(&tags))
                .collect();
            if json_output {
                let data: serde_json::Map<String, serde_json::Value> = items
                    .iter()
                    .map(|(id, record)| Ok(((*id).clone(), serde_json::to_value(record)?)))
                    .collect::<Result<_>>()?;
                print_ok(json!({"items": data, "total": items.len()}), start)?;
            } else if items.is_empty() {
                println!("No references. Use `gitrefer add-doi` or `gitrefer add-manual` to add some.");
            } else {
                for (id, record) in items {
                    println!("{id}  [{}]  {}", record.citekey, record.title);
                }
            }
        }

        Commands::Show { id } => {
            let store = open_store(&config)?;
            let record = store.get(&id)?;
            if json_output {
                print_ok(json!({"id": id, "reference": record}), start)?;
            } else {
                println!("{id}");
                println!("{}", serde_json::to_string_pretty(record)?);
            }
        }

        Commands::Raw { id } => {
            let store = open_store(&config)?;
            let raw = store.raw_data(&id)?;
            if json_output {
                print_ok(json!({"id": id, "raw": raw}), start)?;
            } else {
                match raw {
                    Some(raw) => println!("{}", serde_json::to_string_pretty(&raw)?),
                    None => println!("No raw data stored for {id}"),
                }
            }
        }

        Commands::Tree => {
            let store = open_store(&config)?;
            let files = store.tree()?;
            if json_output {
                print_ok(json!({"items": files}), start)?;
            } else {
                for entry in files {
                    println!("{}", entry.path);
                }
            }
        }

        // ── Adding ─────────────────────────────────────────────────────────
        Commands::AddDoi { doi, no_pdf } => {
            let mut store = open_store(&config)?;
            let registry = RegistryClient::new(&config.registry)?;
            let download = config.import.download_pdf && !no_pdf;
            let (id, record) = add_doi(&mut store, &registry, &doi, download)?;
            if json_output {
                print_ok(json!({"id": id, "reference": record}), start)?;
            } else {
                println!("Added {id} [{}]", record.citekey);
                for file in &record.files {
                    println!("  file: {file}");
                }
            }
        }

        Commands::AddDois { file, no_pdf } => {
            let contents = std::fs::read_to_string(&file)
                .with_context(|| format!("cannot read DOI list {}", file.display()))?;
            let mut store = open_store(&config)?;
            let registry = RegistryClient::new(&config.registry)?;
            let download = config.import.download_pdf && !no_pdf;

            let mut added = Vec::new();
            let mut failed = Vec::new();
            for doi in doi_lines(&contents) {
                match add_doi(&mut store, &registry, doi, download) {
                    Ok((id, _)) => added.push(id),
                    Err(e) => {
                        tracing::warn!(doi, "not added: {e:#}");
                        failed.push(json!({"doi": doi, "error": format!("{e:#}")}));
                    }
                }
            }
            if json_output {
                print_ok(json!({"added": added, "failed": failed}), start)?;
            } else {
                println!("Added {} references, {} failed.", added.len(), failed.len());
                for failure in &failed {
                    println!("  {}: {}", failure["doi"].as_str().unwrap_or_default(), failure["error"].as_str().unwrap_or_default());
                }
            }
            if !failed.is_empty() {
                std::process::exit(ExitCode::GeneralError as i32);
            }
        }

        Commands::AddPdf { path } => {
            let mut store = open_store(&config)?;
            let registry = RegistryClient::new(&config.registry)?;
            let pdfs = if path.is_dir() { collect_pdfs(&path)? } else { vec![path] };

            let mut added = Vec::new();
            let mut failed = Vec::new();
            for pdf in &pdfs {
                match add_pdf(&mut store, &registry, pdf) {
                    Ok(id) => added.push(id),
                    Err(e) => {
                        tracing::warn!(path = %pdf.display(), "not added: {e:#}");
                        failed.push(json!({"path": pdf.display().to_string(), "error": format!("{e:#}")}));
                    }
                }
            }
            if json_output {
                print_ok(json!({"added": added, "failed": failed}), start)?;
            } else {
                for id in &added {
                    println!("Added {id}");
                }
                for failure in &failed {
                    eprintln!("Failed {}: {}", failure["path"].as_str().unwrap_or_default(), failure["error"].as_str().unwrap_or_default());
                }
            }
            if !failed.is_empty() {
                std::process::exit(ExitCode::GeneralError as i32);
            }
        }

        Commands::AddManual { id, fields } => {
            let fields = fields.into_fields()?;
            let mut store = open_store(&config)?;
            let record = store.create_manual(&id, fields)?;
            if json_output {
                print_ok(json!({"id": id, "reference": record}), start)?;
            } else {
                println!("Added {id} [{}]", record.citekey);
            }
        }

        Commands::FindNew { limit } => {
            let store = open_store(&config)?;
            let mut found = store.find_new_references()?;
            if let Some(limit) = limit {
                found.truncate(limit);
            }
            if json_output {
                print_ok(json!({"items": found, "total": found.len()}), start)?;
            } else if found.is_empty() {
                println!("No new references found.");
            } else {
                for reference in &found {
                    println!("{:>4}  {}", reference.count, reference.doi.as_deref().unwrap_or("(no DOI)"));
                    for line in &reference.info {
                        println!("        {line}");
                    }
                }
            }
        }

        // ── Editing ────────────────────────────────────────────────────────
        Commands::Update { id, new_id, fields, regen_citekey } => {
            let fields = fields.into_fields()?;
            let mut store = open_store(&config)?;
            let mut updated = store.get(&id)?.clone();
            updated.apply(fields);
            if regen_citekey {
                updated.citekey.clear();
            }
            let target = new_id.unwrap_or_else(|| id.clone());
            let record = store.rename(&id, &target, updated)?;
            if json_output {
                print_ok(json!({"id": target, "reference": record}), start)?;
            } else if target != id {
                println!("Updated {id} -> {target}");
            } else {
                println!("Updated {id}");
            }
        }

        Commands::Delete { id, confirm } => {
            require_confirm(confirm, "delete a reference")?;
            let mut store = open_store(&config)?;
            let removed = store.delete(&id)?;
            if json_output {
                print_ok(json!({"deleted": id, "files": removed.files}), start)?;
            } else {
                println!("Deleted reference: {id}");
            }
        }

        Commands::Tag { action } => {
            let mut store = open_store(&config)?;
            let (id, tag, change) = match action {
                TagAction::Add { id, tag } => {
                    let change = store.add_tag(&id, &tag)?;
                    (id, tag, change)
                }
                TagAction::Remove { id, tag } => {
                    let change = store.remove_tag(&id, &tag)?;
                    (id, tag, change)
                }
            };
            let tags = &store.get(&id)?.tags;
            if json_output {
                print_ok(json!({"id": id, "tag": tag, "result": change, "tags": tags}), start)?;
            } else {
                println!("Tag '{tag}' {change} for {id}. Tags: {}", tags.join(", "));
            }
        }

        Commands::File { action } => {
            let mut store = open_store(&config)?;
            match action {
                FileAction::Add { id, path } => {
                    let name = store.add_file(&id, &path)?;
                    if json_output {
                        print_ok(json!({"id": id, "file": name}), start)?;
                    } else {
                        println!("Added file {name} to {id}");
                    }
                }
                FileAction::Delete { id, name, confirm } => {
                    require_confirm(confirm, "delete a file")?;
                    store.delete_file(&id, &name)?;
                    if json_output {
                        print_ok(json!({"id": id, "deleted": name}), start)?;
                    } else {
                        println!("Deleted file {name} from {id}");
                    }
                }
                FileAction::Rename { id, old, new } => {
                    store.rename_file(&id, &old, &new)?;
                    if json_output {
                        print_ok(json!({"id": id, "from": old, "to": new}), start)?;
                    } else {
                        println!("Renamed file {old} -> {new} in {id}");
                    }
                }
            }
        }

        Commands::Export { style, tags, output } => {
            let store = open_store(&config)?;
            let entries = store.export(&style, &tags)?;
            if json_output {
                let items: Vec<_> = entries.iter().map(|(id, text)| json!({"id": id, "text": text})).collect();
                print_ok(json!({"style": style, "items": items}), start)?;
                return Ok(());
            }
            let separator = if style.eq_ignore_ascii_case("bibtex") { "\n\n" } else { "\n" };
            let text = entries.into_iter().map(|(_, text)| text).collect::<Vec<_>>().join(separator);
            match output {
                Some(path) => {
                    std::fs::write(&path, format!("{text}\n"))
                        .with_context(|| format!("cannot write {}", path.display()))?;
                    eprintln!("Exported to {}", path.display());
                }
                None => println!("{text}"),
            }
        }

        Commands::Reset { confirm } => {
            require_confirm(confirm, "reset the whole store")?;
            let mut store = open_store(&config)?;
            store.reset()?;
            if json_output {
                print_ok(json!({"reset": true}), start)?;
            } else {
                println!("Store reset.");
            }
        }

        // ── Config ─────────────────────────────────────────────────────────
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                if json_output {
                    print_ok(serde_json::to_value(&config)?, start)?;
                } else {
                    print!("{}", toml::to_string_pretty(&config)?);
                }
            }
            ConfigAction::Path => {
                let path = AppConfig::config_path();
                if json_output {
                    print_ok(json!({"path": path, "exists": path.exists()}), start)?;
                } else {
                    println!("{}", path.display());
                }
            }
        },
    }

    Ok(())
}

// ─── Operations ─────────────────────────────────────────────────────────────

/// Fetch `doi` from its registry and store it, with the linked PDF when
/// `download` is set.
fn add_doi(store: &mut Store, registry: &RegistryClient, input: &str, download: bool) -> Result<(String, Record)> {
    let doi = Doi::parse(input)?;
    let id = doi.value;
    if store.contains(&id) {
        return Err(GitreferError::DuplicateReference(id).into());
    }
    let response = registry.fetch(&id)?;
    let attachments: Vec<Attachment> = if download {
        registry.download_pdf(&id, &response).into_iter().collect()
    } else {
        Vec::new()
    };
    let record = store.create_from_registry(&id, &response, attachments)?.clone();
    Ok((id, record))
}

/// Store a PDF under the DOI found in it, or as a manual record named after
/// the file when there is none.
fn add_pdf(store: &mut Store, registry: &RegistryClient, path: &Path) -> Result<String> {
    let metadata = inspect_pdf(path);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .with_context(|| format!("{} has no file name", path.display()))?;

    let id = match metadata.as_ref().and_then(|m| m.doi.clone()) {
        Some(doi) if store.contains(&doi) => {
            tracing::info!(doi = %doi, "reference exists, attaching PDF only");
            doi
        }
        Some(doi) => add_doi(store, registry, &doi, false)?.0,
        None => {
            let mut fields = metadata.map(|m| m.to_manual_fields()).unwrap_or_default();
            if fields.title.is_empty() {
                fields.title = stem.clone();
            }
            store.create_manual(&stem, fields)?;
            stem
        }
    };
    store.add_file(&id, path)?;
    Ok(id)
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = std::env::var("GITREFER_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn open_store(config: &AppConfig) -> Result<Store> {
    let backend: Box<dyn StorageBackend> = match config.storage.backend {
        BackendKind::Github => {
            if config.storage.repo.is_empty() {
                bail!(GitreferError::ConfigError(
                    "storage.repo is not set; set it in the config file or GITREFER_REPO".to_string()
                ));
            }
            let github = GitHubStorage::with_base(&config.storage.api_base, &config.storage.repo, config.token())?
                .with_branch(config.storage.branch.clone());
            Box::new(github)
        }
        BackendKind::Local => Box::new(LocalStorage::new(&config.storage.local_path)),
    };
    Ok(ReferenceStore::open(backend, config.store_config())?)
}

fn require_confirm(confirm: bool, action: &str) -> Result<()> {
    if !confirm {
        eprintln!("Add --confirm to {action}.");
        std::process::exit(ExitCode::ConfirmRequired as i32);
    }
    Ok(())
}

fn print_ok(data: serde_json::Value, start: Instant) -> Result<()> {
    let body = json!({
        "status": "ok",
        "data": data,
        "meta": {"duration_ms": start.elapsed().as_millis()},
    });
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

/// DOIs of a batch file: one per line, blank lines and `#` comments skipped.
fn doi_lines(contents: &str) -> impl Iterator<Item = &str> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

/// Every `.pdf` below `dir`, sorted by path.
fn collect_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current).with_context(|| format!("cannot read {}", current.display()))? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("pdf")) {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

fn error_kind(err: &anyhow::Error) -> Option<ErrorKind> {
    if let Some(err) = err.downcast_ref::<GitreferError>() {
        return Some(err.kind());
    }
    if let Some(err) = err.downcast_ref::<RemoteError>() {
        return Some(err.kind());
    }
    if err.downcast_ref::<StorageError>().is_some() {
        return Some(ErrorKind::UpstreamFailure);
    }
    None
}

fn kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::NotFound => "not_found",
        ErrorKind::AlreadyExists => "already_exists",
        ErrorKind::InvalidInput => "invalid_input",
        ErrorKind::ImmutableFieldViolation => "immutable_field",
        ErrorKind::UpstreamFailure => "upstream_failure",
        ErrorKind::PartialFailure => "partial_failure",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn doi_list_skips_blanks_and_comments() {
        let contents = "# reading list\n10.1/a\n\n  10.2/b  \n#10.3/c\n";
        assert_eq!(doi_lines(contents).collect::<Vec<_>>(), ["10.1/a", "10.2/b"]);
    }

    #[test]
    fn flags_override_json_fields() {
        let args = FieldArgs {
            fields: Some(r#"{"title": "From JSON", "year": "1999", "entry_type": "book"}"#.into()),
            title: Some("From Flag".into()),
            authors: vec!["Smith, John".into()],
            ..FieldArgs::default()
        };
        let fields = args.into_fields().unwrap();
        assert_eq!(fields.title, "From Flag");
        assert_eq!(fields.year, "1999");
        assert_eq!(fields.entry_type, EntryType::Book);
        assert_eq!(fields.authors, vec![Author::new("Smith", "John")]);
    }

    #[test]
    fn unknown_json_field_is_rejected() {
        let args = FieldArgs {
            fields: Some(r#"{"tags": ["x"]}"#.into()),
            ..FieldArgs::default()
        };
        assert!(args.into_fields().is_err());
    }

    #[test]
    fn error_kinds_survive_anyhow() {
        let err = anyhow::Error::from(GitreferError::ReferenceNotFound("x".into()));
        assert_eq!(error_kind(&err), Some(ErrorKind::NotFound));
        let err = anyhow::Error::from(RemoteError::Parse("bad".into()));
        assert_eq!(error_kind(&err), Some(ErrorKind::UpstreamFailure));
        assert_eq!(error_kind(&anyhow::anyhow!("other")), None);
    }

    #[test]
    fn pdfs_are_collected_recursively() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"x").unwrap();
        std::fs::write(dir.path().join("sub").join("a.PDF"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let found = collect_pdfs(dir.path()).unwrap();
        assert_eq!(found, vec![dir.path().join("b.pdf"), dir.path().join("sub").join("a.PDF")]);
    }
}
