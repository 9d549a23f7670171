//! CLI for gridsim — run PMU/PDC placement scenarios and inspect placement.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gridsim")]
#[command(about = "gridsim — discrete-event smart-grid telemetry simulator")]
#[command(version = gridsim_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one placement scenario and write CSV outputs
    Run {
        /// Placement variant: v1 (PDC at TSO), v2 (PDC per GNB via TELCO),
        /// v3 (PDC per GNB, direct)
        #[arg(long, value_parser = ["v1", "v2", "v3"])]
        variant: String,

        /// Simulation settings properties file
        #[arg(long, default_value = "simulation.properties")]
        settings: String,

        /// Topology JSON file
        #[arg(long, default_value = "topology.json")]
        topology: String,

        /// Application JSON file
        #[arg(long, default_value = "application.json")]
        application: String,

        /// Output directory root (default: output/<variant>/<timestamp>/)
        #[arg(long)]
        output: Option<String>,
    },

    /// Print PMU coordinates and their collector assignment
    Placement {
        /// Simulation settings properties file
        #[arg(long, default_value = "simulation.properties")]
        settings: String,

        /// Topology JSON file
        #[arg(long, default_value = "topology.json")]
        topology: String,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            variant,
            settings,
            topology,
            application,
            output,
        } => commands::run::run(&variant, &settings, &topology, &application, output.as_deref()),
        Commands::Placement { settings, topology } => {
            commands::placement::run(&settings, &topology)
        }
    }
}
