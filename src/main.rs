use actix_web::HttpServer;
use std::env;
use std::io;

use strategic_analyst::app::config::Config;
use strategic_analyst::app::factory::{AppState, CreateApp};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
  if env::var_os("RUST_LOG").is_none() {
    env::set_var("RUST_LOG", "actix_web=info,info");
  }
  env_logger::init();

  let config : Config = Config::load();

  let app_state: AppState = match AppState::new(&config) {
    Ok(state) => state,
    Err(e) => {
      log::error!("Cannot start the service: {:#}", e);
      return Err(io::Error::new(io::ErrorKind::Other, format!("{:#}", e)));
    }
  };

  if app_state.auth_gate.is_open() {
    log::warn!("Serving without authentication");
  }

  let server_builder = HttpServer::new(move || {
    let factory: CreateApp = CreateApp::new(app_state.clone());
    factory.build_app().wrap(actix_web::middleware::Logger::default())
  });

  log::info!("Listening on {}:{}", config.bind_address, config.port);
  let server = server_builder.bind((config.bind_address.as_str(), config.port))?;

  server.run().await?;

  Ok(())
}
