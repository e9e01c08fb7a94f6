//! Test utilities and helpers for altpub integration tests.
//!
//! Provides an isolated workspace (config directory, ledger, scratch
//! directory) and a mock store/catalog server built on mockito.

#![allow(dead_code)]

use mockito::{Mock, Server, ServerGuard};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Isolated directories for one test
pub struct TestWorkspace {
    pub temp_dir: TempDir,
    pub config_dir: PathBuf,
    pub ledger_path: PathBuf,
    pub work_dir: PathBuf,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path().to_path_buf();
        let config_dir = root.join(".altpub");
        fs::create_dir_all(&config_dir).expect("Failed to create config directory");

        Self {
            ledger_path: root.join("uploaded_apps.json"),
            work_dir: root.join("temp"),
            config_dir,
            temp_dir,
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Point every URL and path of the config at this workspace and `server`
    pub fn write_config(&self, server_url: &str) {
        let config = format!(
            r#"[api]
base_url = "{server}/api/dev"

[catalog]
url = "{server}/repo.json"

[upload]
chunk_size_mb = 1

[http]
max_retries = 0
retry_base_delay_ms = 0

[paths]
ledger = "{ledger}"
work_dir = "{work}"
"#,
            server = server_url,
            ledger = self.ledger_path.display(),
            work = self.work_dir.display()
        );
        fs::write(self.config_file(), config).expect("Failed to write config");
    }

    pub fn config(&self, server_url: &str) -> altpub::Config {
        self.write_config(server_url);
        altpub::Config::load_from(&self.config_file()).expect("Failed to load config")
    }

    pub fn write_ledger(&self, ids: &[&str]) {
        fs::write(&self.ledger_path, serde_json::to_string(ids).unwrap())
            .expect("Failed to write ledger");
    }

    pub fn read_ledger(&self) -> Vec<String> {
        let content = fs::read_to_string(&self.ledger_path).expect("Failed to read ledger");
        serde_json::from_str(&content).expect("Ledger is not a JSON array")
    }

    /// Number of entries left in the scratch directory
    pub fn leftover_work_dirs(&self) -> usize {
        if !self.work_dir.exists() {
            return 0;
        }
        fs::read_dir(&self.work_dir)
            .expect("Failed to read work directory")
            .count()
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Catalog entry fixture
pub struct MockApp {
    pub name: String,
    pub bundle_id: String,
    pub version: String,
    pub kind: i64,
    pub binary: Vec<u8>,
}

impl MockApp {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            bundle_id: format!("com.example.{}", name.to_lowercase()),
            version: "1.0".to_string(),
            kind: 1,
            binary: format!("{} binary contents", name).into_bytes(),
        }
    }

    pub fn with_kind(mut self, kind: i64) -> Self {
        self.kind = kind;
        self
    }

    pub fn to_json(&self, server_url: &str) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "version": self.version,
            "bundleIdentifier": self.bundle_id,
            "size": self.binary.len(),
            "downloadURL": format!("{}/files/{}.ipa", server_url, self.name),
            "iconURL": format!("{}/files/{}.png", server_url, self.name),
            "localizedDescription": format!("{} is a test application for the catalog", self.name),
            "type": self.kind,
        })
    }
}

/// A mockito server acting as both the catalog host and the store API
pub struct MockStore {
    pub server: ServerGuard,
    mocks: Vec<Mock>,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            server: Server::new(),
            mocks: Vec::new(),
        }
    }

    pub fn url(&self) -> String {
        self.server.url()
    }

    pub fn metadata(&mut self) -> &mut Self {
        let mock = self
            .server
            .mock("GET", "/api/dev/metadata")
            .with_status(200)
            .with_body(
                r#"{"data":{"categories":[{"id":2,"name":"Games"},{"id":7,"name":"Tweaked App"}],
                    "platforms":[{"id":1,"name":"iOS"}]}}"#,
            )
            .create();
        self.mocks.push(mock);
        self
    }

    pub fn metadata_rejected(&mut self) -> &mut Self {
        let mock = self
            .server
            .mock("GET", "/api/dev/metadata")
            .with_status(401)
            .with_body(r#"{"message":"Unauthenticated."}"#)
            .create();
        self.mocks.push(mock);
        self
    }

    pub fn catalog(&mut self, apps: &[MockApp]) -> &mut Self {
        let url = self.url();
        let body = serde_json::json!({
            "name": "Test Repo",
            "apps": apps.iter().map(|a| a.to_json(&url)).collect::<Vec<_>>(),
        });
        let mock = self
            .server
            .mock("GET", "/repo.json")
            .with_status(200)
            .with_body(body.to_string())
            .create();
        self.mocks.push(mock);
        self
    }

    /// Downloads and every store call for `app`, all succeeding
    pub fn publishable(&mut self, app: &MockApp, app_id: u64) -> &mut Self {
        let version_id = app_id + 100;
        let upload_id = format!("upload-{}", app_id);

        let mocks = vec![
            self.server
                .mock("GET", format!("/files/{}.ipa", app.name).as_str())
                .with_status(200)
                .with_body(app.binary.clone())
                .create(),
            self.server
                .mock("GET", format!("/files/{}.png", app.name).as_str())
                .with_status(200)
                .with_body("icon")
                .create(),
            self.server
                .mock("POST", "/api/dev/apps")
                .match_body(mockito::Matcher::PartialJson(
                    serde_json::json!({ "bundle_id": app.bundle_id }),
                ))
                .with_status(201)
                .with_body(format!(
                    r#"{{"data":{{"id":{},"title":"{}","status":"pending"}}}}"#,
                    app_id, app.name
                ))
                .create(),
            self.server
                .mock("POST", format!("/api/dev/apps/{}/versions", app_id).as_str())
                .with_status(201)
                .with_body(format!(
                    r#"{{"data":{{"id":{},"version":"{}","status":"pending"}}}}"#,
                    version_id, app.version
                ))
                .create(),
            self.server
                .mock("POST", "/api/dev/upload/initiate")
                .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                    "filename": format!("{}.ipa", app.name)
                })))
                .with_status(200)
                .with_body(format!(r#"{{"upload_id":"{}"}}"#, upload_id))
                .create(),
            self.server
                .mock("POST", format!("/api/dev/upload/{}/chunk", upload_id).as_str())
                .with_status(200)
                .create(),
            self.server
                .mock("POST", format!("/api/dev/upload/{}/finalize", upload_id).as_str())
                .with_status(200)
                .with_body(format!(r#"{{"final_path":"chunks/{}/{}.ipa"}}"#, upload_id, app.name))
                .create(),
            self.server
                .mock(
                    "POST",
                    format!("/api/dev/apps/{}/versions/{}/binary", app_id, version_id).as_str(),
                )
                .with_status(200)
                .with_body(r#"{"data":{"version_status":"approved","upload_method":"chunked_path"}}"#)
                .create(),
            self.server
                .mock("POST", format!("/api/dev/apps/{}/icon", app_id).as_str())
                .with_status(201)
                .create(),
        ];

        self.mocks.extend(mocks);
        self
    }

    /// Expect no app creation at all
    pub fn no_app_creation(&mut self) -> Mock {
        self.server.mock("POST", "/api/dev/apps").expect(0).create()
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}
