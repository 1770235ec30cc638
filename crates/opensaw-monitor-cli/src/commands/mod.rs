pub mod monitor;
pub mod serve;
pub mod watch;

/// Multi-threaded runtime for the pollers, or exit if one cannot be built.
pub fn runtime() -> tokio::runtime::Runtime {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => fail(&format!("cannot start async runtime: {e}")),
    }
}

/// Shared HTTP client for both pollers.
pub fn http_client() -> reqwest::Client {
    match reqwest::Client::builder().build() {
        Ok(client) => client,
        Err(e) => fail(&format!("cannot build HTTP client: {e}")),
    }
}

pub fn fail(msg: &str) -> ! {
    eprintln!("Error: {msg}");
    std::process::exit(1);
}
