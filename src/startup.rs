use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;

use crate::configuration::JwtSettings;
use crate::middleware::{JwtMiddleware, LoggerMiddleware};
use crate::routes::{current_user, health_check, json_config, login, logout, refresh, register};
use crate::session::SessionController;

pub fn run(
    listener: TcpListener,
    controller: SessionController,
    jwt_config: JwtSettings,
) -> Result<Server, std::io::Error> {
    let controller = web::Data::new(controller);

    let server = HttpServer::new(move || {
        App::new()
            // Request logging (method, path, status, latency only)
            .wrap(LoggerMiddleware)

            // Shared state
            .app_data(controller.clone())
            .app_data(json_config())

            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/api/v1/users")
                    // Public routes
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/refresh-token", web::post().to(refresh))

                    // Protected routes (require an access token)
                    .service(
                        web::resource("/logout")
                            .wrap(JwtMiddleware::new(jwt_config.clone()))
                            .route(web::post().to(logout)),
                    )
                    .service(
                        web::resource("/current-user")
                            .wrap(JwtMiddleware::new(jwt_config.clone()))
                            .route(web::get().to(current_user)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
