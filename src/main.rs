use clap::Parser;
use stagehand::cli::{check, probe, run, Cli, Commands};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Run(args) => run::execute(args).await,
        Commands::Check(args) => check::execute(&args.config),
        Commands::Match(args) => probe::execute(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
