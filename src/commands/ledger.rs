use altpub::{Config, Ledger};
use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::LedgerAction;

pub fn run(file: Option<PathBuf>, action: &LedgerAction) -> Result<()> {
    let path = match file {
        Some(path) => path,
        None => Config::load()?.paths.ledger_path(),
    };

    match action {
        LedgerAction::List => list(&path),
        LedgerAction::Forget { bundle_id } => forget(&path, bundle_id),
        LedgerAction::Clear { yes } => clear(&path, *yes),
    }
}

fn list(path: &Path) -> Result<()> {
    let ledger = Ledger::load(path)?;

    if ledger.is_empty() {
        println!("No apps uploaded yet ({})", path.display());
        return Ok(());
    }

    println!(
        "{} app{} uploaded ({}):",
        ledger.len(),
        if ledger.len() == 1 { "" } else { "s" },
        path.display()
    );
    for bundle_id in ledger.iter() {
        println!("  {}", bundle_id);
    }

    Ok(())
}

fn forget(path: &Path, bundle_id: &str) -> Result<()> {
    let mut ledger = Ledger::load(path)?;

    if !ledger.remove(bundle_id) {
        anyhow::bail!("{} is not in {}", bundle_id, path.display());
    }

    ledger.save()?;
    println!("✓ Removed {}; the next run will publish it again", bundle_id);
    Ok(())
}

fn clear(path: &Path, confirmed: bool) -> Result<()> {
    if !confirmed {
        anyhow::bail!("Refusing to clear {} without --yes", path.display());
    }

    let mut ledger = Ledger::load(path)?;
    let removed = ledger.len();
    ledger.clear();
    ledger.save()?;

    println!("✓ Cleared {} entr{}", removed, if removed == 1 { "y" } else { "ies" });
    Ok(())
}
