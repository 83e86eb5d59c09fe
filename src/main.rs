fn main() {
    if let Err(e) = passterm::app::run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
