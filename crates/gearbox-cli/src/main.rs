use std::process::ExitCode;

fn main() -> ExitCode {
    gearbox_cli::run()
}
