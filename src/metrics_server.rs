//! `/metrics` endpoint shared by both binaries. A blocking `tiny_http`
//! listener on its own OS thread, matching the corpus's lightweight
//! webserver idiom (`ktheindifferent-AtlasDNS`'s `tiny_http`-based
//! `WebServer::run_webserver`) rather than pulling in a full async web
//! framework for a single read-only text endpoint.

use std::sync::Arc;

use tiny_http::{Response, Server};

use crate::metrics::Metrics;

/// Spawns the metrics server on a background thread and returns immediately;
/// the thread runs for the lifetime of the process.
pub fn spawn(metrics: Arc<Metrics>, port: u16) {
    let server = match Server::http(("0.0.0.0", port)) {
        Ok(server) => server,
        Err(err) => {
            tracing::error!(%err, port, "failed to bind metrics listener");
            return;
        }
    };
    std::thread::spawn(move || {
        for request in server.incoming_requests() {
            let body = metrics.render();
            let response = Response::from_string(body).with_header(
                tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"text/plain; version=0.0.4"[..])
                    .expect("static header is valid"),
            );
            if let Err(err) = request.respond(response) {
                tracing::warn!(%err, "failed to write metrics response");
            }
        }
    });
}
