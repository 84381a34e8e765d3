// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use loginq_api::Client;
use loginq_app::{Clock, LogicalField, StatusBucket, SystemClock, fields};
use loginq_cache::{CacheRegion, CacheStore};
use loginq_cli::config::Config;
use loginq_cli::runtime::{LeadRuntime, RuntimeSettings};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "LOGINQ_LOG";

fn main() {
    init_tracing();
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `loginq --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    let cache_path = config.cache_path()?;
    if options.print_cache_path {
        println!("{}", cache_path.display());
        return Ok(());
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut cache = CacheStore::open(&cache_path, Arc::clone(&clock)).with_context(|| {
        format!(
            "open cache {} -- if this path is wrong, set [cache].db_path or {}",
            cache_path.display(),
            loginq_cache::CACHE_PATH_ENV
        )
    })?;
    cache.bootstrap()?;
    cache.set_policy(CacheRegion::LeadList, config.lead_list_policy()?);
    let purged = cache.purge_expired()?;
    tracing::debug!(purged, "dropped expired cache entries");

    let timeout = config.api_timeout()?;
    let client = Client::new(config.api_base_url(), timeout).with_context(|| {
        format!(
            "invalid [api] config in {}; fix base_url/timeout values",
            options.config_path.display()
        )
    })?;
    if options.check_only {
        return Ok(());
    }

    let department = options
        .department
        .clone()
        .or_else(|| config.department().map(str::to_owned))
        .ok_or_else(|| {
            anyhow!(
                "department is required -- pass --department or set [api].department in {}",
                options.config_path.display()
            )
        })?;

    let settings = RuntimeSettings {
        user_id: config.user_id().map(str::to_owned),
        autosave_delay: config.autosave_delay()?,
        page_size: config.page_size(),
        page_step: config.page_step(),
        ..RuntimeSettings::for_department(department)
    };
    let mut runtime = LeadRuntime::new(Arc::new(client), cache, clock, settings);
    runtime.load_all(options.refresh)?;
    runtime.wait_idle(timeout + Duration::from_secs(1))?;

    if let Some(search) = &options.search {
        runtime.query_mut().search = search.clone();
    }
    runtime.query_mut().filters.duplicates_only = options.duplicates_only;

    let error = runtime.take_error();
    if let Some(error) = &error {
        eprintln!("warning: {error}");
    }
    if runtime.records().is_empty()
        && let Some(error) = error
    {
        return Err(anyhow!("no cached leads to show: {error}"));
    }

    print_view(&mut runtime);
    Ok(())
}

fn print_view(runtime: &mut LeadRuntime) {
    let taxonomy = runtime.taxonomy().clone();
    let view = runtime.view();
    let counts: Vec<String> = StatusBucket::ALL
        .iter()
        .map(|bucket| format!("{}: {}", bucket.label(), view.counts.get(*bucket)))
        .collect();
    println!("{} leads ({})", view.total, counts.join(", "));

    for record in &view.rows {
        let name = fields::resolve(record, LogicalField::CustomerName).unwrap_or_default();
        let sub_status = taxonomy.effective_sub_status(record.status(), record.sub_status());
        let status = match (record.status(), sub_status) {
            (Some(status), Some(sub)) if sub != status => format!("{status} / {sub}"),
            (Some(status), _) => status.to_owned(),
            (None, _) => "-".to_owned(),
        };
        let phone = record.mobile_number.as_deref().unwrap_or("-");
        let marker = if view.is_duplicate(record) { " [dup]" } else { "" };
        println!("{}\t{name}\t{status}\t{phone}{marker}", record.id);
    }
    if view.has_more {
        println!("... {} more", view.total - view.rows.len());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_cache_path: bool,
    print_example: bool,
    check_only: bool,
    department: Option<String>,
    search: Option<String>,
    duplicates_only: bool,
    refresh: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_cache_path: false,
        print_example: false,
        check_only: false,
        department: None,
        search: None,
        duplicates_only: false,
        refresh: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-path" => {
                options.print_cache_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--department" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--department requires a department name"))?;
                options.department = Some(value.as_ref().to_owned());
            }
            "--search" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--search requires a search term"))?;
                options.search = Some(value.as_ref().to_owned());
            }
            "--duplicates" => {
                options.duplicates_only = true;
            }
            "--refresh" => {
                options.refresh = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("loginq");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-path             Print resolved cache database path");
    println!("  --print-example-config   Print a config template");
    println!("  --check                  Validate config + cache + API settings");
    println!("  --department <name>      Department to load (overrides [api].department)");
    println!("  --search <term>          Only show leads matching the term");
    println!("  --duplicates             Only show leads sharing a phone number");
    println!("  --refresh                Ignore cached data and fetch again");
    println!("  --help                   Show this help");
}
