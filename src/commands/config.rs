use altpub::Config;
use anyhow::Result;

use crate::ConfigAction;

pub fn run(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => show_config(),
        ConfigAction::Init { force } => init_config(*force),
        ConfigAction::Set { key, value } => set_config(key, value),
    }
}

fn show_config() -> Result<()> {
    let config = Config::load()?;
    let config_path = Config::default_path()?;

    println!();
    println!("  📁 Config file: {}", config_path.display());
    if !config_path.exists() {
        println!("     (not created yet, showing defaults)");
    }
    println!();

    println!("┌─ Store API ──────────────────────────────────────────────────────────────────┐");
    println!("   Base URL:            {}", config.api.base_url);
    println!(
        "   Token:               {}",
        if config.auth.token.is_some() {
            "<set>"
        } else {
            "<not set>"
        }
    );
    println!("   Preferred category:  {}", config.publish.preferred_category);
    println!("   Preferred platform:  {}", config.publish.preferred_platform);
    println!("   Description limit:   {} characters", config.publish.description_max_chars);
    println!("└──────────────────────────────────────────────────────────────────────────────┘");
    println!();

    println!("┌─ Catalog ────────────────────────────────────────────────────────────────────┐");
    println!("   URL:                 {}", config.catalog.url);
    println!("   Package type:        {}", config.catalog.package_type);
    println!("└──────────────────────────────────────────────────────────────────────────────┘");
    println!();

    println!("┌─ Transfers ──────────────────────────────────────────────────────────────────┐");
    println!("   Chunk size:          {} MiB", config.upload.chunk_size_mb);
    println!("   Request timeout:     {}s", config.http.request_timeout_secs);
    println!("   Transfer timeout:    {}s", config.http.transfer_timeout_secs);
    println!("   Connect timeout:     {}s", config.http.connect_timeout_secs);
    println!(
        "   Retries:             {} (base delay {}ms, max {}ms)",
        config.http.max_retries, config.http.retry_base_delay_ms, config.http.retry_max_delay_ms
    );
    println!("└──────────────────────────────────────────────────────────────────────────────┘");
    println!();

    println!("┌─ Paths ──────────────────────────────────────────────────────────────────────┐");
    println!("   Ledger:              {}", config.paths.ledger_path().display());
    println!("   Work directory:      {}", config.paths.work_dir_path().display());
    println!("└──────────────────────────────────────────────────────────────────────────────┘");
    println!();

    println!("💡 Modify settings:");
    println!("   altpub config set <key> <value>");
    println!();

    Ok(())
}

fn init_config(force: bool) -> Result<()> {
    let path = Config::default_path()?;

    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}\nUse --force to overwrite it",
            path.display()
        );
    }

    Config::default().save_to(&path)?;
    println!("✓ Wrote default configuration to {}", path.display());
    Ok(())
}

fn set_config(key: &str, value: &str) -> Result<()> {
    let mut config = Config::load()?;

    if let Err(e) = config.set_value(key, value) {
        println!("  ❌ {}", e);
        println!();
        println!("  Available keys:");
        for key in Config::settable_keys() {
            println!("    • {}", key);
        }
        println!();
        anyhow::bail!("Invalid configuration value");
    }

    config.save()?;

    if key == "auth.token" {
        println!(
            "  ✓ auth.token = {}",
            if value.is_empty() { "<cleared>" } else { "<set>" }
        );
    } else {
        println!("  ✓ {} = \"{}\"", key, value);
    }
    println!();
    println!("✅ Configuration saved");

    Ok(())
}
