// The binary uses the library, not duplicate modules
use std::process::ExitCode;

fn main() -> ExitCode {
    hiking_map::run()
}
