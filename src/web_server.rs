use std::sync::Arc;

use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};

use crate::orchestrator::Orchestrator;
use crate::routes;

/// Builds (but does not run) the HTTP intake server, following the teacher's
/// `build_server` shape: JSON/query error handlers registered up front, the
/// orchestrator shared as `web::Data`.
pub fn build_server(
    orchestrator: Arc<Orchestrator>,
    listen_port: u16,
) -> std::io::Result<Server> {
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(orchestrator.clone()))
            .app_data(web::JsonConfig::default().error_handler(routes::json_error_handler))
            .app_data(web::QueryConfig::default().error_handler(routes::query_error_handler))
            .service(routes::submit_handler)
            .service(routes::exit)
    })
    .bind(("0.0.0.0", listen_port))?
    .run();

    Ok(server)
}
