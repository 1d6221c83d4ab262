//! xsbench CLI entry point.

fn main() {
    if let Err(e) = xsbench_cli::run() {
        eprintln!("Error: {e:#}");
        std::process::exit(xsbench_cli::exit_code(&e));
    }
}
