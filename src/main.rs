fn main() {
    if let Err(e) = loam_cli::run_cli() {
        loam_logger::error(&format!("{e}"));
        std::process::exit(1);
    }
}
