use std::net::SocketAddr;
use std::sync::Arc;

use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use log::{error, info};
use tokio::net::TcpListener;
use tokio::select;
use tokio::sync::oneshot;

use crate::commons::error::Error;
use crate::config::Config;
use crate::engine::Issuer;
use crate::engine::context::CaContext;
use crate::engine::keys::{KeyPool, KeySource};

use super::http::server::HttpServer;

/// Loads the CA, then serves the HTTP API until interrupted.
///
/// Once the listener is bound, its local address is sent through
/// `signal_running`. Returns `Ok(())` after a Ctrl-C.
pub async fn start_certmint_daemon(
    config: Arc<Config>,
    signal_running: Option<oneshot::Sender<SocketAddr>>,
) -> Result<(), Error> {
    let context = CaContext::create(
        config.issuance_policy(),
        &config.ca_cert,
        &config.ca_key,
    )?;

    let keys = if config.key_pool_enabled {
        let pool = KeyPool::start(
            config.key_pool_refill_interval(),
            config.key_pool_size,
            config.key_bits,
        )?;
        info!(
            "Pregenerating up to {} keys of {} bits",
            config.key_pool_size, config.key_bits
        );
        KeySource::pool(Arc::new(pool))
    } else {
        KeySource::generate(config.key_bits)
    };

    let issuer = Issuer::new(Arc::new(context), keys)?;
    let server = Arc::new(HttpServer::new(issuer, config.development));

    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        Error::config(format!("could not bind to {addr}: {e}"))
    })?;
    let local_addr = listener.local_addr().map_err(|e| {
        Error::config(format!("could not get address of listener: {e}"))
    })?;
    info!("Listening on http://{local_addr}");

    if let Some(tx) = signal_running {
        let _ = tx.send(local_addr);
    }

    loop {
        let stream = select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _addr)) => stream,
                Err(err) => {
                    error!("Fatal error in HTTP server {local_addr}: {err}");
                    return Err(Error::config(format!(
                        "accepting connections failed: {err}"
                    )));
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Received interrupt, stopping");
                return Ok(());
            }
        };

        let server = server.clone();
        tokio::task::spawn(async move {
            let _ = hyper_util::server::conn::auto::Builder::new(
                TokioExecutor::new(),
            )
            .serve_connection(
                TokioIo::new(stream),
                service_fn(move |req| {
                    let server = server.clone();
                    async move { server.process_request(req).await }
                }),
            )
            .await;
        });
    }
}
