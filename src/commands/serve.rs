//! `skillsheet serve`: run the HTTP server

use anyhow::Result;

use skillsheet::{server, AppConfig};

pub fn execute(config: &AppConfig) -> Result<()> {
    let options = config.server.serve_options();
    let db = config.database.open()?;

    if options.host != "127.0.0.1" && options.host != "localhost" {
        tracing::warn!(
            host = %options.host,
            "binding beyond loopback; the server has no authentication or TLS"
        );
    }

    println!("skillsheet listening on http://{}", options.addr());
    server::run(&options, db)
}
