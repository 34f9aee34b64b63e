mod bootstrap;
mod cli;
mod paths;
mod run;

use std::process::ExitCode;

fn main() -> ExitCode {
    let args = cli::parse();
    match run::run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            run::exit_code(&err)
        }
    }
}
