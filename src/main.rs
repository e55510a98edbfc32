use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use gridcity::{
    autoplay::AutoPlayer,
    persistence::{FileStore, KeyValueStore, MemoryStore},
    scenario::ScenarioLoader,
    web::{self, WebServerConfig},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Grid city simulation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Simulate headlessly and print the final stats
    Run(RunArgs),
    /// Serve the live city over HTTP/SSE
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
struct CommonArgs {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/sample_town.yaml")]
    scenario: PathBuf,

    /// Directory for save files (saves stay in memory when omitted)
    #[arg(long)]
    save_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Override tick count (uses scenario default when omitted)
    #[arg(long)]
    ticks: Option<u64>,

    /// Let a seeded auto-player build between ticks
    #[arg(long)]
    autoplay: bool,

    /// Auto-player actions per tick
    #[arg(long, default_value_t = 1)]
    actions_per_tick: u32,

    /// Save the city when the run ends
    #[arg(long)]
    save: bool,
}

#[derive(Debug, Args)]
struct ServeArgs {
    #[command(flatten)]
    common: CommonArgs,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Override the scenario tick interval
    #[arg(long)]
    tick_ms: Option<u64>,
}

fn store_for(save_dir: Option<PathBuf>) -> Box<dyn KeyValueStore> {
    match save_dir {
        Some(dir) => Box::new(FileStore::new(dir)),
        None => Box::new(MemoryStore::new()),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    match Cli::parse().command {
        Command::Run(args) => run(args),
        Command::Serve(args) => serve(args),
    }
}

fn run(args: RunArgs) -> Result<()> {
    let loader = ScenarioLoader::new(".");
    let scenario = loader.load(&args.common.scenario)?;
    let mut game = scenario.build_game(store_for(args.common.save_dir))?;
    let ticks = scenario.ticks(args.ticks);

    let simulated = if args.autoplay {
        let mut player = AutoPlayer::with_actions_per_tick(scenario.seed, args.actions_per_tick);
        let mut simulated = 0;
        while simulated < ticks && !game.is_game_over() {
            player.step(&mut game);
            simulated += 1;
        }
        simulated
    } else {
        game.run(ticks)
    };

    if args.save {
        game.save()?;
    }

    let frame = game.snapshot();
    info!(scenario = %scenario.name, simulated, "run finished");
    println!(
        "Scenario '{}' ran {} ticks{}. Revenue {:.2}, population {}, happiness {:.1}, pollution {:.1}, lifespan {:.1}",
        scenario.name,
        simulated,
        if frame.game_over { " (game over)" } else { "" },
        frame.revenue,
        frame.population,
        frame.happiness,
        frame.pollution,
        frame.lifespan,
    );
    Ok(())
}

fn serve(args: ServeArgs) -> Result<()> {
    let loader = ScenarioLoader::new(".");
    let scenario = loader.load(&args.common.scenario)?;
    let game = scenario.build_game(store_for(args.common.save_dir))?;
    let tick_interval = Duration::from_millis(args.tick_ms.unwrap_or(scenario.tick_interval_ms).max(1));

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(web::run(WebServerConfig {
        game,
        scenario_name: scenario.name.clone(),
        tick_interval,
        host: args.host,
        port: args.port,
    }))
}
