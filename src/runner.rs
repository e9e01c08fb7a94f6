//! One complete upload run
//!
//! The runner owns the order of operations: authenticate against the store,
//! resolve the taxonomy, fetch the catalog, load the ledger, then publish
//! entries one at a time and finish with the summary. Failures before the
//! loop abort the run; failures inside the loop only affect their entry.

use crate::catalog::{fetch_catalog, CatalogEntry};
use crate::client::{build_http_client, RetryPolicy, StoreClient};
use crate::config::Config;
use crate::ledger::Ledger;
use crate::metadata::resolve_metadata;
use crate::pipeline::{EntryOutcome, ProgressHooks, PublishSettings, Publisher};
use crate::report::RunReport;
use crate::Result;
use reqwest::blocking::Client;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Bearer token for the store API
    pub token: String,
    /// Only look at the first N catalog entries; 0 or `None` means all
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanAction {
    Publish,
    Skip,
}

#[derive(Debug, Clone)]
pub struct PlannedEntry {
    pub entry: CatalogEntry,
    pub action: PlanAction,
}

pub struct Runner<'a> {
    config: &'a Config,
    hooks: ProgressHooks,
}

impl<'a> Runner<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            hooks: ProgressHooks::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: ProgressHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Publish every catalog entry that is not in the ledger yet
    pub fn run(&self, options: &RunOptions) -> Result<RunReport> {
        let config = self.config;
        config.validate()?;

        let started = chrono::Local::now();
        println!("🚀 Starting altpub upload run ({})", started.format("%Y-%m-%d %H:%M:%S"));
        println!("📡 API Base URL: {}", config.api.base_url);
        println!("📦 Repository: {}", config.catalog.url);

        let store = StoreClient::from_config(config, &options.token)?;

        println!("🔑 Testing API authentication...");
        let taxonomy = resolve_metadata(&store)?;
        println!("✅ API authentication successful");
        println!(
            "📋 Found {} categories and {} platforms",
            taxonomy.categories.len(),
            taxonomy.platforms.len()
        );
        let targets = taxonomy.select_targets(
            &config.publish.preferred_category,
            &config.publish.preferred_platform,
        )?;

        let http = build_http_client(&config.http)?;
        let entries = self.load_catalog(&http, options.limit)?;

        let mut ledger = Ledger::load(config.paths.ledger_path())?;
        println!("📚 {} apps already uploaded (will be skipped)", ledger.len());

        let settings = PublishSettings {
            chunk_size: config.upload.chunk_size_bytes(),
            description_max_chars: config.publish.description_max_chars,
            work_dir: config.paths.work_dir_path(),
        };
        let publisher =
            Publisher::new(&store, &http, &targets, settings).with_hooks(self.hooks.clone());

        let mut report = RunReport::new();
        let total = entries.len();

        for (index, entry) in entries.iter().enumerate() {
            let position = index + 1;
            if ledger.contains(&entry.bundle_identifier) {
                println!(
                    "⏭️  [{}/{}] Skipping already uploaded: {} ({})",
                    position, total, entry.name, entry.bundle_identifier
                );
            } else {
                println!();
                println!(
                    "📱 [{}/{}] Processing {} v{} ({})",
                    position, total, entry.name, entry.version, entry.bundle_identifier
                );
                println!("   Size: {:.1} MB", entry.size_mb());
            }

            let outcome = publisher.publish(entry, &mut ledger);
            match &outcome {
                EntryOutcome::Published(_) => {
                    println!("🎉 Successfully uploaded {}!", entry.name)
                }
                EntryOutcome::Failed { stage, error } => eprintln!(
                    "❌ {} ({}) failed at {}: {}",
                    entry.name, entry.bundle_identifier, stage, error
                ),
                EntryOutcome::Skipped => {}
            }
            report.record(entry, &outcome);
        }

        println!();
        println!("{}", report.summary(ledger.len()));

        let elapsed = chrono::Local::now() - started;
        println!("⏱️  Finished in {}s", elapsed.num_seconds());

        Ok(report)
    }

    /// Decide what a run would do without contacting the store API
    pub fn plan(&self, limit: Option<usize>) -> Result<Vec<PlannedEntry>> {
        self.config.validate()?;

        let http = build_http_client(&self.config.http)?;
        let entries = self.load_catalog(&http, limit)?;
        let ledger = Ledger::load(self.config.paths.ledger_path())?;

        Ok(entries
            .into_iter()
            .map(|entry| {
                let action = if ledger.contains(&entry.bundle_identifier) {
                    PlanAction::Skip
                } else {
                    PlanAction::Publish
                };
                PlannedEntry { entry, action }
            })
            .collect())
    }

    fn load_catalog(&self, http: &Client, limit: Option<usize>) -> Result<Vec<CatalogEntry>> {
        println!("📡 Fetching app repository...");
        let mut entries = fetch_catalog(
            http,
            &self.config.catalog.url,
            self.config.catalog.package_type,
            &RetryPolicy::from_config(&self.config.http),
        )?;

        let total = entries.len();
        match limit.filter(|n| *n > 0) {
            Some(n) => {
                entries.truncate(n);
                println!(
                    "📝 Processing {} of {} apps (limited by user)",
                    entries.len(),
                    total
                );
            }
            None => println!("📝 Found {} apps in repository", total),
        }

        Ok(entries)
    }
}
