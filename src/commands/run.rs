use altpub::{Config, PlanAction, ProgressCallback, ProgressHooks, RunOptions, Runner};
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Arc, Mutex};

use crate::RunArgs;

/// Create an indicatif-based progress callback for one kind of transfer
///
/// A new bar is started whenever the label changes; a bar is cleared once
/// `current` reaches a known `total`.
fn create_bar_callback(template: &'static str) -> ProgressCallback {
    let state: Arc<Mutex<Option<(String, ProgressBar)>>> = Arc::new(Mutex::new(None));

    Arc::new(move |label: &str, current: u64, total: u64| {
        if total == 0 && current == 0 {
            return;
        }

        let mut guard = match state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let is_new = guard.as_ref().map(|(l, _)| l != label).unwrap_or(true);
        if is_new {
            if let Some((_, old)) = guard.take() {
                old.finish_and_clear();
            }
            let bar = if total > 0 {
                ProgressBar::new(total)
            } else {
                ProgressBar::new_spinner()
            };
            bar.set_style(
                ProgressStyle::default_bar()
                    .template(template)
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> "),
            );
            bar.set_message(label.to_string());
            *guard = Some((label.to_string(), bar));
        }

        let done = match guard.as_ref() {
            Some((_, bar)) => {
                bar.set_position(current);
                total > 0 && current >= total
            }
            None => false,
        };

        if done {
            if let Some((_, bar)) = guard.take() {
                bar.finish_and_clear();
            }
        }
    })
}

fn progress_hooks() -> ProgressHooks {
    ProgressHooks {
        download: Some(create_bar_callback(
            "    {msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})",
        )),
        upload: Some(create_bar_callback(
            "    {msg} [{bar:30.green/white}] chunk {pos}/{len}",
        )),
    }
}

fn load_config(args: &RunArgs) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file does not exist: {}", path.display());
            }
            Config::load_from(path)?
        }
        None => Config::load()?,
    };

    if let Some(url) = &args.base_url {
        config.api.base_url = url.clone();
    }
    if let Some(url) = &args.catalog_url {
        config.catalog.url = url.clone();
    }
    if let Some(ledger) = &args.ledger {
        config.paths.ledger = ledger.clone();
    }
    if let Some(work_dir) = &args.work_dir {
        config.paths.work_dir = work_dir.clone();
    }
    if let Some(chunk_size) = args.chunk_size_mb {
        config.upload.chunk_size_mb = chunk_size;
    }

    config.validate()?;
    Ok(config)
}

pub fn run(args: RunArgs) -> Result<()> {
    let config = load_config(&args)?;

    if args.dry_run {
        return dry_run(&config, args.limit);
    }

    let token = config.resolve_token(args.token.as_deref())?;
    let options = RunOptions {
        token,
        limit: args.limit,
    };

    Runner::new(&config)
        .with_hooks(progress_hooks())
        .run(&options)?;

    Ok(())
}

fn dry_run(config: &Config, limit: Option<usize>) -> Result<()> {
    let plan = Runner::new(config).plan(limit)?;

    let publish = plan
        .iter()
        .filter(|p| p.action == PlanAction::Publish)
        .count();

    println!();
    for (index, planned) in plan.iter().enumerate() {
        let marker = match planned.action {
            PlanAction::Publish => "+",
            PlanAction::Skip => "=",
        };
        println!(
            "  {} [{}/{}] {} v{} ({}, {:.1} MB)",
            marker,
            index + 1,
            plan.len(),
            planned.entry.name,
            planned.entry.version,
            planned.entry.bundle_identifier,
            planned.entry.size_mb()
        );
    }
    println!();
    println!("--dry-run specified, nothing was uploaded");
    println!(
        "  Would publish: {}  Would skip: {}",
        publish,
        plan.len() - publish
    );

    Ok(())
}
