fn main() {
    match std::env::args().nth(1).as_deref() {
        Some("keep-alive") => std::process::exit(mymusic_lib::keep_alive()),
        _ => mymusic_lib::run(),
    }
}
