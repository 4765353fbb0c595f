use actix_web::{HttpResponse, error, web};
use tracing::debug;

use crate::error::ApiError;
use crate::handlers;

/// Malformed bodies answer with the same envelope as every other error.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        debug!("Rejected JSON body: {}", err);
        error::Error::from(ApiError::invalid_input(err.to_string()))
    })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req| error::Error::from(ApiError::invalid_input(err.to_string())))
}

pub fn scoped_config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .service(web::resource("/health").route(web::get().to(handlers::health::check)))
        .service(
            web::scope("/api")
                .service(
                    web::resource("/payment-intents")
                        .route(web::post().to(handlers::payment_intents::create)),
                )
                .service(
                    web::resource("/webhooks/stripe").route(web::post().to(handlers::webhooks::stripe)),
                )
                .service(web::resource("/blasts").route(web::post().to(handlers::blasts::send)))
                .service(web::resource("/push/send").route(web::post().to(handlers::push::send)))
                .service(
                    web::resource("/push-subscriptions")
                        .route(web::post().to(handlers::push::subscribe))
                        .route(web::delete().to(handlers::push::unsubscribe)),
                )
                .service(
                    web::scope("/payment-requests")
                        .service(
                            web::resource("").route(web::post().to(handlers::payment_requests::create)),
                        )
                        .service(
                            web::resource("/{id}/late-fees")
                                .route(web::post().to(handlers::payment_requests::apply_late_fees)),
                        ),
                )
                .service(
                    web::resource("/payment-records")
                        .route(web::get().to(handlers::payment_records::index))
                        .route(web::head().to(HttpResponse::MethodNotAllowed)),
                )
                .service(
                    web::scope("/notifications")
                        .service(web::resource("").route(web::get().to(handlers::notifications::index)))
                        .service(
                            web::resource("/{id}/read")
                                .route(web::post().to(handlers::notifications::mark_read)),
                        ),
                ),
        );
}
