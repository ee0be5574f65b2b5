use clap::Parser;
use keel_cli::{run_validate, Args, Command, EXIT_OK, EXIT_RUNTIME_ERROR, EXIT_VALIDATION_ERROR};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let code = match args.command {
        Command::Validate { dir } => run(&dir),
    };
    std::process::exit(code);
}

fn run(dir: &std::path::Path) -> i32 {
    match run_validate(dir) {
        Ok(report) if report.is_empty() => {
            tracing::info!(dir = %dir.display(), "schema is valid");
            EXIT_OK
        }
        Ok(report) => {
            tracing::warn!(count = report.len(), "schema validation failed");
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{json}"),
                Err(e) => eprintln!("failed to serialize validation report: {e}"),
            }
            EXIT_VALIDATION_ERROR
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            EXIT_RUNTIME_ERROR
        }
    }
}
