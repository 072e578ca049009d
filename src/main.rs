use std::process::ExitCode;

fn main() -> ExitCode {
    monkemod_lib::run()
}
