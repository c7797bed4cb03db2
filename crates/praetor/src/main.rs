use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use praetor::{
    build_enforcement_point, builtin_registry, load_decision_point, render_tree,
    InMemoryEvaluationSink, InformationPoint, PraetorConfig, Request, RootError,
};

/// Praetor: attribute-based access-control decisions
///
/// Inspect cached compiled policy sets and evaluate requests against them.
#[derive(Parser, Debug)]
#[command(name = "praetor", version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the structure of an encoded policy set
    Inspect {
        /// Encoded policy set (JSON)
        encoded: PathBuf,
    },

    /// Evaluate a request against an encoded policy set
    Evaluate {
        /// Encoded policy set (JSON)
        #[arg(long)]
        policy: PathBuf,

        /// Request attributes as a JSON object, or a list of [key, value] pairs
        #[arg(long)]
        request: PathBuf,

        /// Print every evaluated item
        #[arg(long)]
        trace: bool,
    },
}

fn init_tracing(verbose: bool, filter: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("praetor=debug,praetor_policy=debug,praetor_enforce=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<PraetorConfig, RootError> {
    match path {
        Some(p) => PraetorConfig::load(p),
        None => PraetorConfig::load(&PraetorConfig::default_config_path()),
    }
}

fn main() {
    let cli = Cli::parse();
    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("praetor: {}", e);
            std::process::exit(2);
        }
    };
    init_tracing(cli.verbose, &config.logging.filter);

    if let Err(e) = run(cli.command, &config) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands, config: &PraetorConfig) -> Result<(), RootError> {
    match command {
        Commands::Inspect { encoded } => cmd_inspect(config, &encoded),
        Commands::Evaluate {
            policy,
            request,
            trace,
        } => cmd_evaluate(config, &policy, &request, trace),
    }
}

fn cmd_inspect(config: &PraetorConfig, encoded: &Path) -> Result<(), RootError> {
    let registry = Arc::new(builtin_registry()?);
    let bytes = std::fs::read(encoded)?;
    let root = praetor_policy::load_encoded_policy_set(&bytes, config.decision.max_policy_bytes)?;
    print!("{}", render_tree(&root));

    // Report references the builtin registry cannot bind.
    if let Err(e) = registry.check(&root) {
        println!("note: {}", e);
    }
    Ok(())
}

fn cmd_evaluate(
    config: &PraetorConfig,
    policy: &Path,
    request: &Path,
    trace: bool,
) -> Result<(), RootError> {
    let registry = Arc::new(builtin_registry()?);
    let sink = Arc::new(InMemoryEvaluationSink::new());
    let pdp = load_decision_point(config, policy, registry)?.with_sink(sink.clone());

    let contents = std::fs::read_to_string(request)?;
    let request: Request = serde_json::from_str(&contents)?;
    info!(attributes = request.len(), "evaluating request");

    let pep = build_enforcement_point(config, Arc::new(InformationPoint::default()), pdp);
    let (authorized, evaluation) = pep.decide(&request)?;

    if trace {
        for event in sink.events() {
            println!(
                "{:?} {} '{}' target={} outcome={}",
                event.kind,
                event.item_kind,
                event.name.as_deref().unwrap_or("<unnamed>"),
                event.target_match.map(|m| m.to_string()).unwrap_or_default(),
                event.outcome.map(|o| o.to_string()).unwrap_or_default(),
            );
        }
    }

    println!("outcome: {}", evaluation.outcome);
    println!("authorized: {}", authorized);
    for method in &evaluation.obligations {
        println!("obligation: {}", method);
    }
    for method in &evaluation.advice {
        println!("advice: {}", method);
    }
    Ok(())
}
