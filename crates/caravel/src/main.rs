// Target-specific transitive dependency split (terminal stack) is accepted for now.
#![allow(clippy::multiple_crate_versions)]

fn main() {
    match caravel_cli::run() {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            eprintln!("error: {error:#}");
            std::process::exit(1);
        }
    }
}
