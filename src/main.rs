fn main() {
    if let Err(err) = csv_to_sqlite::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
