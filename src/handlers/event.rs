use actix_web::{http::header::ContentType, web, HttpResponse};

use crate::{
    db::EventStore,
    dto::{RegisterEventsDto, RegisteredEventResponse},
    errors::ScheduleError,
    service::{self, transport::Mailer},
    views, AppState,
};

pub async fn register<S: EventStore + 'static, M: Mailer + 'static>(
    dto: web::Json<RegisterEventsDto>,
    state: web::Data<AppState<S, M>>,
) -> Result<HttpResponse, ScheduleError> {
    let pending = service::schedule::register(&state.store, dto.into_inner()).await?;
    Ok(HttpResponse::Created().json(RegisteredEventResponse {
        id: pending.event.id,
        times: pending.times.len(),
        attendees: pending.attendees.len(),
    }))
}

pub async fn show<S: EventStore + 'static, M: Mailer + 'static>(
    key: web::Path<String>,
    state: web::Data<AppState<S, M>>,
) -> Result<HttpResponse, ScheduleError> {
    let key = key.into_inner();
    let pending = service::schedule::load(&state.store, &key).await?;
    Ok(HttpResponse::Ok()
        .insert_header(ContentType::html())
        .body(views::show_event(&pending, &key)))
}

pub async fn schedule<S: EventStore + 'static, M: Mailer + 'static>(
    key: web::Path<String>,
    state: web::Data<AppState<S, M>>,
) -> Result<HttpResponse, ScheduleError> {
    let key = key.into_inner();
    let pending = service::schedule::finalize(&state.store, &state.mailer, &state.sender, &key).await?;
    let time = pending.time(&key).ok_or(ScheduleError::NotFound)?;
    Ok(HttpResponse::Ok()
        .insert_header(ContentType::html())
        .body(views::scheduled(&pending, time)))
}

pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .content_type_required(false)
        .error_handler(|err, _req| ScheduleError::bad_request(err.to_string()).into())
}

pub fn config<S: EventStore + 'static, M: Mailer + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .route("/register-events", web::post().to(register::<S, M>))
        .service(
            web::resource("/event/{key}")
                .route(web::get().to(show::<S, M>))
                .route(web::post().to(schedule::<S, M>)),
        );
}
