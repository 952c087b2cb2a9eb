//! qualopt CLI: reification and meta-program tooling.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use qualopt::config::RunConfig;
use qualopt::graph::DependencyGraph;
use qualopt::reify::canonical::parse_program;
use qualopt::reify::external::ExternalReifier;
use qualopt::reify::{interpreter, OutputDialect};

#[derive(Parser)]
#[command(name = "qualopt", version, about = "Qualitative optimization over answer-set programs")]
struct Cli {
    /// Run configuration (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reify a logic program with the external reifier and print the prefixed facts.
    Reify {
        /// Program file.
        file: PathBuf,

        /// Prefix for every reified predicate.
        #[arg(long, default_value = "")]
        prefix: String,
    },

    /// Check that the configured reifier binary is usable.
    CheckReifier,

    /// Print the meta-interpreter.
    MetaInterpreter {
        /// Prefix for every interpreter predicate.
        #[arg(long, default_value = "")]
        prefix: String,
    },

    /// Print the effective configuration as TOML.
    Config,

    /// Print the non-trivial strongly connected components of a reified program.
    Sccs {
        /// File with reified facts (output of `clingo --output=reify`).
        file: PathBuf,

        /// Prefix the facts carry.
        #[arg(long, default_value = "")]
        prefix: String,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };

    match cli.command {
        Commands::Reify { file, prefix } => {
            let program = std::fs::read_to_string(&file).into_diagnostic()?;
            let reifier = ExternalReifier::new(&config.reifier.command)?;
            let base = reifier.reify_text(&program, &prefix)?;
            print!("{}", base.facts());
        }

        Commands::CheckReifier => {
            let reifier = ExternalReifier::new(&config.reifier.command)?;
            let (major, minor) = reifier.version();
            println!(
                "{}: clingo {major}.{minor} (reify supported)",
                reifier.command().display()
            );
        }

        Commands::MetaInterpreter { prefix } => {
            print!("{}", interpreter(&prefix));
        }

        Commands::Config => {
            print!("{}", config.to_toml_string()?);
        }

        Commands::Sccs { file, prefix } => {
            let text = std::fs::read_to_string(&file).into_diagnostic()?;
            let program = parse_program(&text, &prefix, OutputDialect::LiteralTuple);

            let mut graph = DependencyGraph::new();
            for rule in &program.rules {
                graph.add_rule(&rule.head, &rule.body);
            }
            for rule in &program.weighted_rules {
                graph.add_rule(&rule.head, rule.body.iter().map(|(literal, _)| literal));
            }
            let names: std::collections::BTreeMap<_, _> = program
                .output_atoms
                .iter()
                .map(|o| (o.atom, o.symbol.to_string()))
                .collect();

            let sccs = graph.compute_sccs();
            println!(
                "{} atoms, {} positive / {} negative edges",
                graph.atom_count(),
                graph.positive_edge_count(),
                graph.negative_edge_count()
            );
            for component in sccs.loops() {
                let members: Vec<String> = component
                    .members
                    .iter()
                    .map(|a| names.get(a).cloned().unwrap_or_else(|| format!("#{a}")))
                    .collect();
                println!("scc {}: {}", component.id, members.join(" "));
            }
        }
    }

    Ok(())
}
