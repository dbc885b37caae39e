fn main() {
    if let Err(err) = fallwatch_lib::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
