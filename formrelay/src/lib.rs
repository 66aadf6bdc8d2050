//! Relays website job-application and contact form submissions to a mailbox.
//!
//! `POST /backend/apply` takes a multipart body with a `resume` file part;
//! `POST /backend/contact` takes JSON, URL-encoded or multipart text fields.
//! Both answer with `{"success": bool, "message": string}`.

pub mod config;
pub mod error;
pub mod handlers;
pub mod mail;
pub mod routes;
pub mod serve;
pub mod staging;
pub mod submission;

pub use crate::config::{CleanupPolicy, EnvConfig, ServerConfig};
pub use crate::error::{Error, Reply};
pub use crate::routes::{router, Context};
pub use crate::serve::serve;
