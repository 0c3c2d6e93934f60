pub mod config;
pub mod db;
pub mod dto;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod service;
pub mod views;

use std::io;

use actix_web::{web, App, HttpServer};
use config::Config;
use db::{event::PgStore, init_db_pool};
use log::{error, info};
use service::{log::LoggerMiddleware, transport::HttpMailer};
use sqlx::{postgres::Postgres, Pool};

type PGPool = Pool<Postgres>;

/// Shared per-process state handed to every handler.
pub struct AppState<S, M> {
    pub store: S,
    pub mailer: M,
    /// Fixed `From` address of outgoing invitations.
    pub sender: String,
}

fn startup_error(context: &str, err: impl std::fmt::Display) -> io::Error {
    error!("{}: {}", context, err);
    io::Error::new(io::ErrorKind::Other, format!("{context}: {err}"))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    service::log::init_logger();

    let config = Config::from_env().map_err(|e| startup_error("invalid configuration", e))?;
    let pool: PGPool = init_db_pool(&config.database)
        .await
        .map_err(|e| startup_error("failed to initialise database", e))?;
    let mailer = HttpMailer::new(&config.mail).map_err(|e| startup_error("failed to build mail client", e))?;

    let state = web::Data::new(AppState {
        store: PgStore::new(pool.clone()),
        mailer,
        sender: config.mail.from.clone(),
    });

    info!("listening on {}:{}", config.host, config.port);
    HttpServer::new(move || {
        App::new()
            .wrap(LoggerMiddleware)
            .app_data(state.clone())
            .configure(handlers::event::config::<PgStore, HttpMailer>)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    pool.close().await;
    info!("database pool closed");
    Ok(())
}
