use std::path::PathBuf;

use log::warn;
use opensaw_monitor_server::ApiData;

pub fn run(host: &str, port: u16, statistics: Option<PathBuf>, tracegraph: Option<PathBuf>) {
    let base = format!("http://{host}:{port}");

    println!("OpenSAW job API v{}", opensaw_monitor_core::VERSION);
    println!("   {base}");
    println!();

    let rt = super::runtime();
    let result = rt.block_on(async {
        let data = ApiData::new();
        for (name, path) in [("statistics", statistics), ("tracegraph", tracegraph)] {
            let Some(path) = path else { continue };
            if !path.exists() {
                warn!(
                    "{} does not exist yet; /api/{name}.json fails until it does",
                    path.display()
                );
            }
            println!("   GET /api/{name}.json  ← {}", path.display());
            data.set_file(name, path).await;
        }
        if data.names().await.is_empty() {
            warn!("nothing to publish; pass --statistics and/or --tracegraph");
        }
        println!();
        println!("   Watch it with: opensaw-monitor monitor --url {base}");
        println!();

        opensaw_monitor_server::run_server(data, host, port).await
    });

    if let Err(e) = result {
        super::fail(&format!("server on {base} failed: {e}"));
    }
}
