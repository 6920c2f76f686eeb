fn main() {
    if let Err(err) = stock_sync::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
