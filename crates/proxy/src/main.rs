mod dispatcher;
mod requester;
mod router;
mod state;

use std::sync::Arc;

/// Configuration and replacement-directory paths, parsed with the same
/// `clap::Parser` shape the teacher's `receiver` binary uses for its own
/// `Args`.
#[derive(clap::Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to the `av_gate.ini` configuration file.
    #[arg(short, long, default_value_t = String::from("/etc/docscan-proxy/av_gate.ini"))]
    config: String,

    /// Directory of benign placeholder payloads, keyed by MIME type.
    #[arg(long, default_value_t = String::from("/etc/docscan-proxy/replacements"))]
    replacements: String,

    /// Address to bind the inbound HTTP listener on.
    #[arg(long, default_value_t = String::from("0.0.0.0:8443"))]
    listen: String,
}

#[tokio::main]
async fn main() {
    let args = <Args as clap::Parser>::parse();

    let state = match state::AppState::build(
        std::path::Path::new(&args.config),
        std::path::Path::new(&args.replacements),
    ) {
        Ok(state) => Arc::new(state),
        Err(error) => {
            eprintln!("Failed to boot docscan-proxy: {error}");
            std::process::exit(1);
        }
    };

    let app = dispatcher::build(state);

    let addr: std::net::SocketAddr = match args.listen.parse() {
        Ok(addr) => addr,
        Err(error) => {
            eprintln!("Invalid --listen address {}: {error}", args.listen);
            std::process::exit(1);
        }
    };

    tracing::info!(%addr, "docscan-proxy is listening");
    if let Err(error) = axum::Server::bind(&addr).serve(app.into_make_service()).await {
        tracing::error!(?error, "docscan-proxy server loop exited with an error");
    }
}
