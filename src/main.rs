use std::process::ExitCode;

fn main() -> ExitCode {
    lumine_lib::run()
}
