use std::process::ExitCode;

fn main() -> ExitCode {
    hoconf_cli::run()
}
