//! Arbor CLI - behavior tree tooling.
//!
//! - `arbor check` - validate a tree file
//! - `arbor run` - drive a tree through a scripted scenario

mod scenario;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use arbor_bt::{BehaviorState, BehaviorSystem, ConditionRegistry, TreeBuilder, TreeSpec};
use arbor_core::{Aspect, ComponentKind, EntityId, FixedClock, TickContext};
use arbor_tools::{SharedTraceLog, TraceSink, TracingSink};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use scenario::{ActionLog, Scenario};

#[derive(Parser)]
#[command(name = "arbor")]
#[command(about = "Behavior tree tooling", version)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a tree file
    Check {
        /// Tree file (YAML, or JSON with a .json extension)
        #[arg(long)]
        tree: PathBuf,

        /// Scenario providing conditions, actions and configuration
        #[arg(long)]
        scenario: Option<PathBuf>,
    },

    /// Run a tree against a scripted scenario
    Run {
        #[arg(long)]
        tree: PathBuf,

        #[arg(long)]
        scenario: PathBuf,

        /// Override the scenario's tick count
        #[arg(long)]
        ticks: Option<u64>,

        /// Print the structured trace after the run
        #[arg(long)]
        trace: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Check { tree, scenario } => check(&tree, scenario.as_deref()),
        Commands::Run {
            tree,
            scenario,
            ticks,
            trace,
        } => run(&tree, &scenario, ticks, trace),
    }
}

fn load_tree(path: &Path) -> Result<TreeSpec> {
    TreeSpec::load(path).with_context(|| format!("failed to load tree from {}", path.display()))
}

fn check(tree_path: &Path, scenario_path: Option<&Path>) -> Result<()> {
    let spec = load_tree(tree_path)?;
    let scenario = scenario_path.map(Scenario::load).transpose()?;
    let runtime = scenario.as_ref().map(Scenario::runtime);

    let mut builder = match &scenario {
        Some(scenario) => TreeBuilder::new(scenario.conditions())
            .with_config(scenario.config.clone()),
        None => TreeBuilder::new(ConditionRegistry::with_builtins()),
    };
    if let Some(runtime) = &runtime {
        builder = builder.with_catalog(runtime);
    }
    let tree = builder
        .build(&spec)
        .with_context(|| format!("invalid tree {}", tree_path.display()))?;

    println!("{}: ok", tree_path.display());
    println!("  nodes: {}", tree.len());
    for (name, root) in tree.roots() {
        println!("  root {name} -> {root}");
    }
    Ok(())
}

fn run(
    tree_path: &Path,
    scenario_path: &Path,
    ticks: Option<u64>,
    print_trace: bool,
) -> Result<()> {
    let spec = load_tree(tree_path)?;
    let scenario = Scenario::load(scenario_path)?;
    let mut runtime = scenario.runtime();

    let tree = TreeBuilder::new(scenario.conditions())
        .with_config(scenario.config.clone())
        .with_catalog(&runtime)
        .build(&spec)
        .with_context(|| format!("invalid tree {}", tree_path.display()))?;

    let log = SharedTraceLog::new();
    let mut system = BehaviorSystem::new(tree).with_trace_sink(log.clone());
    let mut store: BTreeMap<EntityId, BehaviorState> = BTreeMap::new();
    let start = TickContext::new(0, 0.0);
    for entity in &scenario.entities {
        let id = EntityId(entity.id);
        let state = system
            .state_for_named(&entity.root)
            .with_context(|| format!("entity {} refers to an unknown root", entity.id))?;
        store.insert(id, state);
        system.on_entity_activated(&start, id, Aspect::of(&[ComponentKind::Behavior]));
    }

    let ticks = ticks.unwrap_or(scenario.ticks);
    tracing::info!(ticks, entities = store.len(), "running scenario");

    let mut clock = FixedClock::new(scenario.dt_seconds);
    let mut actions = ActionLog::new(&mut runtime);
    for _ in 0..ticks {
        let ctx = clock.advance();
        let first = actions.performed.len();
        system.update(&ctx, &mut store, &mut actions);
        for (tick, entity, action, state) in &actions.performed[first..] {
            println!(
                "tick {tick:>4} t={:>7.2} {entity} {} -> {state:?}",
                ctx.now,
                scenario.action_name(*action)
            );
        }
    }

    println!();
    println!("Summary");
    println!("=======");
    for (entity, state) in &store {
        let performed = actions
            .performed
            .iter()
            .filter(|(_, e, _, _)| e == entity)
            .count();
        println!(
            "{entity}: {performed} action ticks, last state {:?}, in flight {}",
            state.action_state(),
            state
                .in_flight()
                .map_or_else(|| "-".to_string(), |a| scenario.action_name(a)),
        );
    }
    println!("cancelled: {}", actions.cancelled.len());

    if print_trace {
        println!();
        let mut forward = TracingSink;
        for event in log.snapshot().events {
            println!("{:>4} {:<24} a={} b={}", event.tick, event.tag, event.a, event.b);
            forward.emit(event);
        }
    }
    Ok(())
}
