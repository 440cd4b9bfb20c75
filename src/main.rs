use clap::Parser;
use schema_codegen::{
    CliArgs, GenerationConfig, GenerationError, LoggingConfig, init_logging, run_generation,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    let _guard = match init_logging(LoggingConfig::from_env()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("failed to initialize logging: {e:#}");
            return ExitCode::from(1);
        }
    };

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let generation_error = e
                .chain()
                .find_map(|cause| cause.downcast_ref::<GenerationError>());
            let (category, code) = match generation_error {
                Some(err) => (err.category(), err.exit_code()),
                None => ("config_error", 2),
            };
            tracing::error!(category, error = %format!("{e:#}"), "generation failed");
            eprintln!("error[{category}]: {e:#}");
            ExitCode::from(code as u8)
        }
    }
}

fn run() -> anyhow::Result<()> {
    let cli = CliArgs::parse();
    let config = GenerationConfig::from_args(cli)?;

    // Validate configuration before touching any output root (fail-fast)
    config.validate()?;

    run_generation(&config)?;
    Ok(())
}
