//! Per-entry publish pipeline
//!
//! Each catalog entry moves through
//! `Start → Downloaded → AppCreated → VersionCreated → BinaryUploaded → IconUploaded → Done`.
//! Any step before the icon upload can fail the entry; the icon upload is
//! best-effort. Whatever happens, the entry's scratch directory is removed
//! before [`Publisher::publish`] returns, and a published entry is written to
//! the ledger immediately.

use crate::catalog::CatalogEntry;
use crate::client::{AppPayload, BinaryAttachment, StoreClient, VersionPayload};
use crate::downloader::{download, ProgressCallback};
use crate::ledger::Ledger;
use crate::metadata::PublishTargets;
use crate::uploader::ChunkedUploader;
use crate::{Error, Result};
use reqwest::blocking::Client;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Descriptions shorter than this (after trimming) are replaced
pub const MIN_DESCRIPTION_CHARS: usize = 10;

/// The step an entry failed at
///
/// The icon upload is not a stage: its failure never fails the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Download,
    CreateApp,
    CreateVersion,
    UploadBinary,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Download => "download",
            Stage::CreateApp => "create app",
            Stage::CreateVersion => "create version",
            Stage::UploadBinary => "upload binary",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct Published {
    pub app_id: u64,
    pub version_id: u64,
    pub attachment: BinaryAttachment,
    pub icon_uploaded: bool,
    pub ledger_saved: bool,
}

#[derive(Debug)]
pub enum EntryOutcome {
    /// Already in the ledger; nothing was downloaded or sent
    Skipped,
    Published(Published),
    Failed { stage: Stage, error: Error },
}

/// Optional progress reporting for long transfers
#[derive(Clone, Default)]
pub struct ProgressHooks {
    pub download: Option<ProgressCallback>,
    pub upload: Option<ProgressCallback>,
}

/// Settings the pipeline needs from the configuration
#[derive(Debug, Clone)]
pub struct PublishSettings {
    pub chunk_size: u64,
    pub description_max_chars: usize,
    pub work_dir: PathBuf,
}

pub struct Publisher<'a> {
    store: &'a StoreClient,
    http: &'a Client,
    targets: &'a PublishTargets,
    settings: PublishSettings,
    hooks: ProgressHooks,
}

type StageResult<T> = std::result::Result<T, (Stage, Error)>;

impl<'a> Publisher<'a> {
    pub fn new(
        store: &'a StoreClient,
        http: &'a Client,
        targets: &'a PublishTargets,
        settings: PublishSettings,
    ) -> Self {
        Self {
            store,
            http,
            targets,
            settings,
            hooks: ProgressHooks::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: ProgressHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Publish one entry unless the ledger already has it
    pub fn publish(&self, entry: &CatalogEntry, ledger: &mut Ledger) -> EntryOutcome {
        if ledger.contains(&entry.bundle_identifier) {
            return EntryOutcome::Skipped;
        }

        let workspace = match EntryWorkspace::create(&self.settings.work_dir, &entry.name) {
            Ok(ws) => ws,
            Err(error) => {
                return EntryOutcome::Failed {
                    stage: Stage::Download,
                    error,
                }
            }
        };

        let result = self.run_stages(entry, &workspace);
        workspace.cleanup();

        match result {
            Ok(mut published) => {
                ledger.insert(&entry.bundle_identifier);
                match ledger.save() {
                    Ok(()) => published.ledger_saved = true,
                    Err(e) => eprintln!(
                        "  ⚠ Published {} but could not save {}: {}",
                        entry.bundle_identifier,
                        ledger.path().display(),
                        e
                    ),
                }
                EntryOutcome::Published(published)
            }
            Err((stage, error)) => EntryOutcome::Failed { stage, error },
        }
    }

    fn run_stages(&self, entry: &CatalogEntry, workspace: &EntryWorkspace) -> StageResult<Published> {
        let fail = |stage: Stage| move |error: Error| (stage, error);

        println!("  📥 Downloading IPA ({:.1} MB)...", entry.size_mb());
        self.fetch(&entry.download_url, &workspace.binary_path, "IPA file")
            .map_err(fail(Stage::Download))?;

        println!("  🖼️  Downloading app icon...");
        self.fetch(&entry.icon_url, &workspace.icon_path, "icon file")
            .map_err(fail(Stage::Download))?;

        println!("  🚀 Creating app entry...");
        let payload = build_app_payload(entry, self.targets, self.settings.description_max_chars);
        let app = self.store.create_app(&payload).map_err(fail(Stage::CreateApp))?;
        println!(
            "  ✓ Created app: {} (ID: {}) - Status: {}",
            app.title, app.id, app.status
        );

        println!("  📦 Creating app version...");
        let version = self
            .store
            .create_version(app.id, &build_version_payload(entry))
            .map_err(fail(Stage::CreateVersion))?;
        println!(
            "  ✓ Created version: {} (ID: {}) - Status: {}",
            version.version, version.id, version.status
        );

        println!("  ⬆️  Uploading binary (chunked upload)...");
        let attachment = ChunkedUploader::new(self.store, self.settings.chunk_size)
            .with_progress(self.hooks.upload.clone())
            .upload(&workspace.binary_path, app.id, version.id)
            .map_err(fail(Stage::UploadBinary))?;

        println!("  🖼️  Uploading icon...");
        let icon_uploaded = match self.store.upload_icon(app.id, &workspace.icon_path) {
            Ok(()) => {
                println!("  ✓ Uploaded icon for app {}", app.id);
                true
            }
            Err(e) => {
                eprintln!("  ⚠ Icon upload failed for app {}: {}", app.id, e);
                false
            }
        };

        Ok(Published {
            app_id: app.id,
            version_id: version.id,
            attachment,
            icon_uploaded,
            ledger_saved: false,
        })
    }

    fn fetch(&self, url: &str, destination: &Path, what: &str) -> Result<()> {
        if download(self.http, url, destination, self.hooks.download.as_ref())? {
            Ok(())
        } else {
            Err(Error::Other(format!("Failed to download {} from {}", what, url)))
        }
    }
}

/// Scratch directory for one entry, removed on drop
pub struct EntryWorkspace {
    dir: TempDir,
    pub binary_path: PathBuf,
    pub icon_path: PathBuf,
}

impl EntryWorkspace {
    /// Create a uniquely named directory for `name` inside `work_dir`
    pub fn create(work_dir: &Path, name: &str) -> Result<Self> {
        fs::create_dir_all(work_dir)?;

        let stem = sanitize_file_stem(name);
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-", stem))
            .tempdir_in(work_dir)?;

        Ok(Self {
            binary_path: dir.path().join(format!("{}.ipa", stem)),
            icon_path: dir.path().join(format!("{}.png", stem)),
            dir,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory now, reporting failures instead of ignoring them
    pub fn cleanup(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            eprintln!("  ⚠ Could not remove {}: {}", path.display(), e);
        }
    }
}

/// Turn an app name into something safe to use as a file name
pub fn sanitize_file_stem(name: &str) -> String {
    let stem: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let stem = stem.trim_matches(|c| c == '.' || c == ' ');
    if stem.is_empty() {
        "app".to_string()
    } else {
        stem.to_string()
    }
}

/// Description sent to the store
///
/// Falls back to a generated sentence when the source text is missing or too
/// short, and is cut to at most `max_chars` characters.
pub fn normalize_description(entry: &CatalogEntry, max_chars: usize) -> String {
    let source = entry.localized_description.as_deref().unwrap_or("").trim();

    let description = if source.chars().count() < MIN_DESCRIPTION_CHARS {
        format!(
            "Enhanced version of {} with premium features unlocked.",
            entry.name
        )
    } else {
        source.to_string()
    };

    description.chars().take(max_chars).collect()
}

pub fn details_block(entry: &CatalogEntry) -> String {
    format!(
        "🚀 **Enhanced {name}**\n\n **Version:** {version}\n **Size:** {size:.1} MB\n **Bundle ID:** {bundle}\n\n",
        name = entry.name,
        version = entry.version,
        size = entry.size_mb(),
        bundle = entry.bundle_identifier
    )
}

pub fn app_changelog(version: &str) -> String {
    format!(
        "🎉 Version {} Release\n\n✅ Latest tweaks and enhancements",
        version
    )
}

pub fn version_changelog(version: &str) -> String {
    format!("Version {} - Latest release", version)
}

pub fn build_app_payload(
    entry: &CatalogEntry,
    targets: &PublishTargets,
    description_max_chars: usize,
) -> AppPayload {
    AppPayload {
        title: entry.name.clone(),
        description: normalize_description(entry, description_max_chars),
        details: details_block(entry),
        bundle_id: entry.bundle_identifier.clone(),
        categories: vec![targets.category.id],
        platforms: vec![targets.platform.id],
        price: 0,
        version: entry.version.clone(),
        changelog: app_changelog(&entry.version),
        file_size: entry.size.to_string(),
    }
}

pub fn build_version_payload(entry: &CatalogEntry) -> VersionPayload {
    VersionPayload {
        version: entry.version.clone(),
        changelog: version_changelog(&entry.version),
        file_size: entry.size.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::metadata::Selection;
    use mockito::{Matcher, Server, ServerGuard};

    fn entry(name: &str, description: Option<&str>) -> CatalogEntry {
        CatalogEntry {
            name: name.to_string(),
            version: "2.1".to_string(),
            bundle_identifier: format!("com.example.{}", name.to_lowercase()),
            size: 3 * 1024 * 1024,
            download_url: format!("/files/{}.ipa", name),
            icon_url: format!("/files/{}.png", name),
            localized_description: description.map(str::to_string),
            kind: Some(1),
        }
    }

    fn targets() -> PublishTargets {
        PublishTargets {
            category: Selection {
                id: 9,
                name: "Tweaked App".to_string(),
                fallback: false,
            },
            platform: Selection {
                id: 1,
                name: "iOS".to_string(),
                fallback: false,
            },
        }
    }

    #[test]
    fn test_short_description_is_replaced() {
        let e = entry("Demo", Some("   tiny   "));
        assert_eq!(
            normalize_description(&e, 500),
            "Enhanced version of Demo with premium features unlocked."
        );

        let missing = entry("Demo", None);
        assert!(normalize_description(&missing, 500).contains("Demo"));
    }

    #[test]
    fn test_description_is_truncated_on_char_boundary() {
        let long = "é".repeat(800);
        let e = entry("Demo", Some(&long));
        let description = normalize_description(&e, 500);
        assert_eq!(description.chars().count(), 500);

        let fallback = normalize_description(&entry("Demo", None), 12);
        assert_eq!(fallback, "Enhanced ver");
    }

    #[test]
    fn test_app_payload_fields() {
        let e = entry("Demo", Some("A perfectly fine description"));
        let payload = build_app_payload(&e, &targets(), 500);

        assert_eq!(payload.title, "Demo");
        assert_eq!(payload.bundle_id, "com.example.demo");
        assert_eq!(payload.categories, vec![9]);
        assert_eq!(payload.platforms, vec![1]);
        assert_eq!(payload.price, 0);
        assert_eq!(payload.file_size, "3145728");
        assert!(payload.details.contains("**Size:** 3.0 MB"));
        assert!(payload.changelog.contains("Version 2.1"));

        let version = build_version_payload(&e);
        assert_eq!(version.version, "2.1");
        assert_eq!(version.file_size, "3145728");
    }

    #[test]
    fn test_sanitize_file_stem() {
        assert_eq!(sanitize_file_stem("Delta"), "Delta");
        assert_eq!(sanitize_file_stem("a/b\\c:d"), "a_b_c_d");
        assert_eq!(sanitize_file_stem("../.."), "_");
        assert_eq!(sanitize_file_stem("  "), "app");
    }

    #[test]
    fn test_workspace_is_unique_and_removed() {
        let root = tempfile::TempDir::new().unwrap();
        let first = EntryWorkspace::create(root.path(), "Same").unwrap();
        let second = EntryWorkspace::create(root.path(), "Same").unwrap();
        assert_ne!(first.path(), second.path());

        fs::write(&first.binary_path, "x").unwrap();
        let first_path = first.path().to_path_buf();
        first.cleanup();
        drop(second);

        assert!(!first_path.exists());
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    struct Fixture {
        server: ServerGuard,
        store: StoreClient,
        http: Client,
        work: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let server = Server::new();
        let http = HttpConfig {
            max_retries: 0,
            ..HttpConfig::default()
        };
        let store = StoreClient::new(&server.url(), "token", &http).unwrap();
        Fixture {
            server,
            store,
            http: Client::new(),
            work: tempfile::TempDir::new().unwrap(),
        }
    }

    fn absolute(server: &ServerGuard, mut e: CatalogEntry) -> CatalogEntry {
        e.download_url = format!("{}{}", server.url(), e.download_url);
        e.icon_url = format!("{}{}", server.url(), e.icon_url);
        e
    }

    fn settings(work: &Path) -> PublishSettings {
        PublishSettings {
            chunk_size: 4,
            description_max_chars: 500,
            work_dir: work.join("temp"),
        }
    }

    fn mock_store_success(server: &mut ServerGuard, icon_status: usize) {
        server
            .mock("GET", "/files/Demo.ipa")
            .with_status(200)
            .with_body("abcdef")
            .create();
        server
            .mock("GET", "/files/Demo.png")
            .with_status(200)
            .with_body("png")
            .create();
        server
            .mock("POST", "/apps")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "bundle_id": "com.example.demo",
                "price": 0
            })))
            .with_status(201)
            .with_body(r#"{"data":{"id":11,"title":"Demo","status":"pending"}}"#)
            .create();
        server
            .mock("POST", "/apps/11/versions")
            .with_status(201)
            .with_body(r#"{"data":{"id":22,"version":"2.1","status":"pending"}}"#)
            .create();
        server
            .mock("POST", "/upload/initiate")
            .with_status(200)
            .with_body(r#"{"upload_id":"u1"}"#)
            .create();
        server
            .mock("POST", "/upload/u1/chunk")
            .with_status(200)
            .expect(2)
            .create();
        server
            .mock("POST", "/upload/u1/finalize")
            .with_status(200)
            .with_body(r#"{"final_path":"final/Demo.ipa"}"#)
            .create();
        server
            .mock("POST", "/apps/11/versions/22/binary")
            .with_status(200)
            .with_body(r#"{"data":{"version_status":"approved","upload_method":"chunked_path"}}"#)
            .create();
        server
            .mock("POST", "/apps/11/icon")
            .with_status(icon_status)
            .create();
    }

    #[test]
    fn test_publish_success_updates_ledger_and_cleans_up() {
        let mut fx = fixture();
        mock_store_success(&mut fx.server, 201);

        let ledger_path = fx.work.path().join("ledger.json");
        let mut ledger = Ledger::new(&ledger_path);
        let targets = targets();
        let settings = settings(fx.work.path());
        let work_dir = settings.work_dir.clone();
        let publisher = Publisher::new(&fx.store, &fx.http, &targets, settings);

        let e = absolute(&fx.server, entry("Demo", None));
        match publisher.publish(&e, &mut ledger) {
            EntryOutcome::Published(p) => {
                assert_eq!(p.app_id, 11);
                assert_eq!(p.version_id, 22);
                assert!(p.icon_uploaded);
                assert!(p.ledger_saved);
                assert!(p.attachment.is_approved());
            }
            other => panic!("expected published, got {:?}", other),
        }

        let persisted = Ledger::load(&ledger_path).unwrap();
        assert!(persisted.contains("com.example.demo"));
        assert_eq!(fs::read_dir(&work_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_icon_failure_still_publishes() {
        let mut fx = fixture();
        mock_store_success(&mut fx.server, 422);

        let mut ledger = Ledger::new(fx.work.path().join("ledger.json"));
        let targets = targets();
        let publisher = Publisher::new(&fx.store, &fx.http, &targets, settings(fx.work.path()));

        let e = absolute(&fx.server, entry("Demo", None));
        match publisher.publish(&e, &mut ledger) {
            EntryOutcome::Published(p) => assert!(!p.icon_uploaded),
            other => panic!("expected published, got {:?}", other),
        }
        assert!(ledger.contains("com.example.demo"));
    }

    #[test]
    fn test_failed_download_never_contacts_store() {
        let mut fx = fixture();
        fx.server
            .mock("GET", "/files/Demo.ipa")
            .with_status(200)
            .with_body("abcdef")
            .create();
        fx.server
            .mock("GET", "/files/Demo.png")
            .with_status(404)
            .create();
        let create = fx.server.mock("POST", "/apps").expect(0).create();

        let mut ledger = Ledger::new(fx.work.path().join("ledger.json"));
        let targets = targets();
        let settings = settings(fx.work.path());
        let work_dir = settings.work_dir.clone();
        let publisher = Publisher::new(&fx.store, &fx.http, &targets, settings);

        let e = absolute(&fx.server, entry("Demo", None));
        match publisher.publish(&e, &mut ledger) {
            EntryOutcome::Failed { stage, .. } => assert_eq!(stage, Stage::Download),
            other => panic!("expected failure, got {:?}", other),
        }

        create.assert();
        assert!(ledger.is_empty());
        assert!(!fx.work.path().join("ledger.json").exists());
        assert_eq!(fs::read_dir(&work_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_version_failure_reports_stage() {
        let mut fx = fixture();
        fx.server
            .mock("GET", Matcher::Regex("^/files/".to_string()))
            .with_status(200)
            .with_body("data")
            .create();
        fx.server
            .mock("POST", "/apps")
            .with_status(201)
            .with_body(r#"{"data":{"id":3,"title":"Demo"}}"#)
            .create();
        fx.server
            .mock("POST", "/apps/3/versions")
            .with_status(422)
            .with_body(r#"{"message":"version exists"}"#)
            .create();
        let initiate = fx.server.mock("POST", "/upload/initiate").expect(0).create();

        let mut ledger = Ledger::new(fx.work.path().join("ledger.json"));
        let targets = targets();
        let publisher = Publisher::new(&fx.store, &fx.http, &targets, settings(fx.work.path()));

        let e = absolute(&fx.server, entry("Demo", None));
        match publisher.publish(&e, &mut ledger) {
            EntryOutcome::Failed { stage, error } => {
                assert_eq!(stage, Stage::CreateVersion);
                assert_eq!(error.status(), Some(422));
                assert!(error.to_string().contains("version exists"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        initiate.assert();
        assert!(!ledger.contains("com.example.demo"));
    }

    #[test]
    fn test_ledger_entry_is_skipped() {
        let mut fx = fixture();
        let any = fx
            .server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create();

        let mut ledger = Ledger::new(fx.work.path().join("ledger.json"));
        ledger.insert("com.example.demo");
        let targets = targets();
        let publisher = Publisher::new(&fx.store, &fx.http, &targets, settings(fx.work.path()));

        let e = absolute(&fx.server, entry("Demo", None));
        assert!(matches!(
            publisher.publish(&e, &mut ledger),
            EntryOutcome::Skipped
        ));
        any.assert();
        assert!(!fx.work.path().join("temp").exists());
    }
}
