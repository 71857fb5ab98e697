fn main() {
    if let Err(e) = snipchat_lib::run() {
        eprintln!("snipchat: {}", e);
        std::process::exit(1);
    }
}
