use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tracing::{error, info, warn};

mod classify;
mod config;
mod engine;
mod error;
mod models;
mod scrapers;

use config::Config;
use engine::{ActiveOnly, Event, ScrapingEngine, TieBreakOnly, TournamentContains};
use models::Match;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let mut engine = ScrapingEngine::new(&config.engine_settings())?;
    info!(
        "🎾 Configured {} source(s): {:?}",
        engine.source_names().len(),
        engine.source_names()
    );
    info!(
        "Retries: {}, base delay: {:?}, request timeout: {:?}",
        engine.config().max_retries,
        engine.config().base_delay(),
        engine.config().request_timeout()
    );
    if engine.source_names().is_empty() {
        warn!("No known sources enabled; cycles will return nothing");
    }

    engine.events().on("scraper_unavailable", |event| {
        if let Event::ScraperUnavailable { source } = event {
            warn!("⚠️ {} is unreachable this cycle", source);
        }
        Ok(())
    });
    engine.events().on("scraper_error", |event| {
        if let Event::ScraperError { source, message } = event {
            error!("❌ {} failed: {}", source, message);
        }
        Ok(())
    });

    if config.live_only {
        engine.add_filter(ActiveOnly);
    }
    if config.tie_breaks_only {
        engine.add_filter(TieBreakOnly);
    }
    if let Some(tournament) = config.tournament.as_deref() {
        engine.add_filter(TournamentContains::new(tournament)?);
    }

    let json = config.json;
    let print = move |matches: &[Match]| {
        if json {
            print_json(matches);
        } else {
            print_table(matches);
        }
    };

    if config.once {
        match engine.get_filtered_matches().await {
            Ok(matches) => print(&matches),
            Err(e) => error!("Scraping cycle failed: {}", e),
        }
    } else {
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        };
        engine::run_monitor(
            &engine,
            Duration::from_secs(config.interval_secs),
            shutdown,
            print,
        )
        .await;
    }

    engine.cleanup().await;
    Ok(())
}

fn print_json(matches: &[Match]) {
    for game in matches {
        match serde_json::to_string(game) {
            Ok(line) => println!("{}", line),
            Err(e) => error!("Failed to serialise {}: {}", game.title(), e),
        }
    }
}

fn print_table(matches: &[Match]) {
    for game in matches {
        let flag = if game.is_tie_break() { " 🚨 TIE-BREAK" } else { "" };
        println!(
            "{:<12} {:<45} {:<18} {:<14} {}{}",
            game.source,
            format!(
                "{} vs {}",
                game.home_player.display_name(),
                game.away_player.display_name()
            ),
            game.score.to_string(),
            game.status.display_name(),
            game.tournament,
            flag
        );
    }
}
