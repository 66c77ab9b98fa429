use std::process::ExitCode;

use stepwise::ui::output;

fn main() -> ExitCode {
    match stepwise::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::error(format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}
