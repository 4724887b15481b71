use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use sqlx::PgPool;
use std::net::TcpListener;

use crate::configuration::JwtSettings;
use crate::logger::LoggerMiddleware;
use crate::middleware::AuthMiddleware;
use crate::routes::{
    create, create_join, delete_user, get_current_user, get_user, health_check, join, list_food,
    list_users, login, refresh, register,
};

pub fn run(
    listener: TcpListener,
    connection: PgPool,
    jwt_config: JwtSettings,
) -> Result<Server, std::io::Error> {
    let connection = web::Data::new(connection);
    let jwt_config_data = web::Data::new(jwt_config.clone());

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(Logger::default())
            .wrap(LoggerMiddleware)

            // Shared state
            .app_data(connection.clone())
            .app_data(jwt_config_data.clone())

            // Public routes (no authentication required)
            .route("/health_check", web::get().to(health_check))
            .route("/auth/register", web::post().to(register))
            .route("/auth/login", web::post().to(login))
            .route("/auth/refresh", web::post().to(refresh))

            // Protected routes (require a valid access token)
            .service(
                web::scope("/auth")
                    .wrap(AuthMiddleware::new(jwt_config.clone()))
                    .route("/me", web::get().to(get_current_user)),
            )
            .service(
                web::scope("/family")
                    .wrap(AuthMiddleware::new(jwt_config.clone()))
                    .route("/create", web::post().to(create))
                    .route("/create-join", web::post().to(create_join))
                    .route("/join", web::post().to(join)),
            )
            .service(
                web::scope("/users")
                    .wrap(AuthMiddleware::new(jwt_config.clone()))
                    .route("", web::get().to(list_users))
                    .route("/{id}", web::get().to(get_user))
                    .route("/{id}", web::delete().to(delete_user)),
            )
            .service(
                web::scope("/food")
                    .wrap(AuthMiddleware::new(jwt_config.clone()))
                    .route("", web::get().to(list_food)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
