use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use hyper::header::{self, HeaderValue};
use hyper::server::conn::Http;
use hyper::Body;
use routerify::{Middleware, RequestServiceBuilder, Router};
use tokio::net::TcpListener;
use tokio::select;

use crate::global::GlobalState;

use self::error::{error_handler, RouteError};

pub mod assignments;
pub mod error;
pub mod health;
mod macros;

fn cors_middleware(_global: &Arc<GlobalState>) -> Middleware<Body, RouteError> {
    Middleware::post(|mut resp| async move {
        resp.headers_mut()
            .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        resp.headers_mut()
            .insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("*"));
        resp.headers_mut()
            .insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
        resp.headers_mut().insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static("86400"),
        );

        Ok(resp)
    })
}

pub fn routes(global: &Arc<GlobalState>) -> Router<Body, RouteError> {
    // Handlers hold a weak reference so open keep-alive connections cannot
    // keep the global state alive during shutdown.
    let weak = Arc::downgrade(global);
    Router::builder()
        .data(weak)
        .err_handler_with_info(error_handler)
        .middleware(cors_middleware(global))
        .scope("/health", health::routes())
        .scope("/", assignments::routes())
        .build()
        .expect("failed to build router")
}

pub async fn run(global: Arc<GlobalState>) -> Result<()> {
    let addr: SocketAddr = global.config.bind_address.parse()?;

    tracing::info!("listening on {}", addr);
    let listener = TcpListener::bind(&addr).await?;

    let service_builder =
        RequestServiceBuilder::new(routes(&global)).expect("failed to build request service");

    loop {
        select! {
            _ = global.ctx.done() => {
                return Ok(());
            }
            r = listener.accept() => {
                let (socket, addr) = r?;
                let service = service_builder.build(addr);

                tracing::debug!("accepted connection from {}", addr);

                tokio::spawn(async move {
                    Http::new().serve_connection(socket, service).await.ok();
                });
            }
        }
    }
}
