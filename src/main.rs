use std::env;

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn init_logging() {
    let level = match env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install log subscriber: {err}");
    }
}

fn main() {
    init_logging();
    let args: Vec<String> = env::args().collect();
    std::process::exit(bubblebuff::cli::run_with_args(&args));
}
