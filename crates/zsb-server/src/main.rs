//! Backend server binary.
//!
//! Runs the HTTP control plane, the discovery protocol, and the
//! match-server supervisory loops.

#[tokio::main]
async fn main() {
    zsb_core::log();
    if let Err(e) = zsb_server::run().await {
        log::error!("backend failed: {}", e);
        std::process::exit(1);
    }
}
