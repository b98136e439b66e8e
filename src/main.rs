use std::path::PathBuf;
use std::process::exit;

use clap::{Args, Parser, Subcommand};
use log::error;

use lintim_core::drivers;
use lintim_core::error::Result;

#[derive(Parser, Debug)]
#[command(
    version,
    author,
    about = "Planning steps for periodic public transport: EAN construction, timetabling, integrated line planning and vehicle scheduling"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone, Debug)]
enum Commands {
    #[command(about = "Build the periodic event-activity network of the line concept")]
    MakeEan(ConfigArgs),

    #[command(about = "Compute a periodic timetable with the cycle base formulation")]
    TimPespCycleBase(ConfigArgs),

    #[command(about = "Plan lines, timetable and passenger routes in one model")]
    TimPass(ConfigArgs),

    #[command(about = "Compute a periodic timetable together with the vehicle schedule")]
    TimVeh(ConfigArgs),
}

#[derive(Args, Clone, Debug)]
struct ConfigArgs {
    #[arg(help = "The dataset configuration, usually basis/Config.cnf.")]
    config: PathBuf,
}

fn run(command: &Commands) -> Result<()> {
    match command {
        Commands::MakeEan(args) => drivers::make_ean(&args.config),
        Commands::TimPespCycleBase(args) => drivers::tim_pesp_cycle_base(&args.config),
        Commands::TimPass(args) => drivers::tim_pass(&args.config),
        Commands::TimVeh(args) => drivers::tim_veh(&args.config),
    }
}

fn main() {
    env_logger::builder().parse_env("LOG").init();
    let cli = Cli::parse();
    if let Err(e) = run(&cli.command) {
        error!("{}", e);
        exit(1);
    }
}
