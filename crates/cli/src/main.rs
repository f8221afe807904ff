use std::process::ExitCode;

fn main() -> ExitCode {
    fixfurn_cli::run()
}
