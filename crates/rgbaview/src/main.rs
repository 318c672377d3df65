mod cli;
mod host;
mod patterns;
mod run;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();

    match cli.command {
        Some(Command::CheckConfig { file }) => {
            run::initialise_tracing("warn");
            run::check_config(&file)
        }
        Some(Command::Info) => {
            let settings = run::load_settings(&cli.run)?;
            run::initialise_tracing(settings.log_filter());
            run::info(&settings)
        }
        Some(Command::Run) | None => {
            let settings = run::load_settings(&cli.run)?;
            run::initialise_tracing(settings.log_filter());
            run::run(cli.run, settings)
        }
    }
}
