use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use listing_scout::cache::{CacheStore, FileCache, MemoryCache};
use listing_scout::cli::Args;
use listing_scout::collector::{CollectOutcome, Collector, FoundSite};
use listing_scout::config::CONFIG;
use listing_scout::fetcher::{FetcherSettings, PageFetcher};
use listing_scout::query::normalize_state;
use listing_scout::search::{SearchBackend, build_providers};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries only progress and results.
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let config = args.search_config()?;
    let state = match &args.state {
        Some(state) => state.clone(),
        None => prompt_state()?,
    };
    let state = normalize_state(&state)?;

    let env = &*CONFIG;
    let settings = FetcherSettings::from(&config);
    let cache: Arc<dyn CacheStore> = if args.no_cache {
        Arc::new(MemoryCache::new())
    } else {
        let path = args.cache_path.clone().unwrap_or_else(|| env.cache_path.clone());
        Arc::new(FileCache::open(path, settings.cache_ttl))
    };

    let fetcher = Arc::new(PageFetcher::new(cache, settings)?);
    let backend = SearchBackend::new(
        build_providers(env, fetcher.clone()),
        config.results_per_page,
        config.result_cap,
    )?;

    let collector = Collector::new(&backend, &fetcher, &config);
    let outcomes = collector
        .collect_all(&state, &args.systems(), print_found)
        .await?;

    for outcome in &outcomes {
        print_results(outcome);
    }
    log::info!(
        "done: {} search results requested, {} network requests",
        backend.budget().used(),
        fetcher.network_requests()
    );
    Ok(())
}

fn prompt_state() -> Result<String> {
    print!("Enter a state name or abbreviation: ");
    io::stdout().flush().context("failed to flush stdout")?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read state from stdin")?;
    Ok(line.trim().to_string())
}

fn print_found(found: &FoundSite<'_>) {
    println!(
        "[+] Found good site ({}/{}): {}",
        found.index, found.target, found.url
    );
}

fn print_results(outcome: &CollectOutcome) {
    println!(
        "\nFound {} qualifying {} websites for {}:\n",
        outcome.urls.len(),
        outcome.system,
        outcome.state_name
    );
    for url in &outcome.urls {
        println!("{url}");
    }
}
