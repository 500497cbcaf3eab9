//! HTTP server setup.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer, dev::Server, middleware::Logger, web};

use crate::{api, model::AppState};

/// Creates and binds the counter HTTP server.
///
/// OS signal handling is left to [`super::shutdown`] so the same signal also
/// cancels in-flight lock waits.
pub fn counter_server(
    app_state: Arc<AppState>,
    address: String,
    port: u16,
    shutdown_timeout: Duration,
) -> Result<Server, std::io::Error> {
    Ok(HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::from(app_state.clone()))
            .service(api::route::routes())
    })
    .shutdown_timeout(shutdown_timeout.as_secs())
    .disable_signals()
    .bind((address, port))?
    .run())
}
