//! tsdash - an administration dashboard backend for Typesense
//!
//! The server keeps track of which Typesense instance the operator is
//! connected to and proxies every dashboard action to its REST API, returning
//! `{ok, data}` or `{ok, error}` to the browser.
//!
//! # Embedding the routes
//!
//! ```rust,no_run
//! use actix_web::{web, App, HttpServer};
//! use tsdash_server::api::{self, AppState};
//!
//! #[actix_web::main]
//! async fn main() -> anyhow::Result<()> {
//!     let state = web::Data::new(AppState::new(tsdash_core::Config::default())?);
//!     HttpServer::new(move || App::new().app_data(state.clone()).configure(api::configure))
//!         .bind("127.0.0.1:3000")?
//!         .run()
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! # Server Usage
//!
//! Run the binary; it reads `config.json` from the working directory:
//! ```bash
//! tsdash-server
//! ```

pub use tsdash_core;
pub use tsdash_rs;

pub mod api;
pub mod session;
