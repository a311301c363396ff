//! The `oir` command line tool.
//!
//! Thin wrappers over the library: parse and verify IR files, print their
//! canonical form, or run the variables-used analysis.

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use orion_ir::analysis::InstVars;
use orion_ir::ir::Program;

#[derive(Parser)]
#[command(name = "oir")]
#[command(version = orion_ir::VERSION)]
#[command(about = "IR toolkit for a small imperative language", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and verify an IR file
    Check {
        /// Input file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Parse an IR file and print its canonical form
    Print {
        /// Input file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Print, per instruction, the variables it mentions
    Vars {
        /// Input file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Only this function (default: every function)
        #[arg(short, long)]
        function: Option<String>,
    },
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    colog::default_builder()
        .filter_level(if cli.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    match &cli.command {
        Commands::Check { input } => {
            let program = load(input)?;
            println!(
                "OK: {} struct type(s), {} function(s)",
                program.struct_types().len(),
                program.functions().len()
            );
        }

        Commands::Print { input } => {
            let program = load(input)?;
            print!("{program}");
        }

        Commands::Vars { input, function } => {
            let program = load(input)?;
            let analysis = InstVars::new(&program);

            let names: Vec<String> = match function {
                Some(name) => {
                    if program.get(name).is_none() {
                        return Err(miette::miette!("no function named '{name}'"));
                    }
                    vec![name.clone()]
                }
                None => program.functions().keys().cloned().collect(),
            };

            for name in names {
                println!("function {name}:");
                let solution = analysis.analyze(&name);

                let mut sites: Vec<_> = solution.iter().collect();
                sites.sort_by_key(|(site, _)| (*site).clone());
                for ((label, index), vars) in sites {
                    let names: BTreeSet<&str> = vars.iter().map(|v| v.name()).collect();
                    let joined: Vec<&str> = names.into_iter().collect();
                    println!("  {label}.{index}: {}", joined.join(", "));
                }
            }
        }
    }

    Ok(())
}

fn load(input: &PathBuf) -> miette::Result<Program> {
    let source = fs::read_to_string(input)
        .map_err(|e| miette::miette!("failed to read {}: {e}", input.display()))?;

    log::debug!("parsing {} ({} bytes)", input.display(), source.len());
    source
        .parse::<Program>()
        .map_err(|e| miette::miette!("{}: {e}", input.display()))
}
