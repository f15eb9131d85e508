pub mod config;
pub mod contact;
pub mod database;
pub mod error;
pub mod metrics;
pub mod validation;
pub mod web;

pub use contact::{Contact, ContactFormData, ContactPatch, SocialMedia};
pub use database::Database;
pub use error::{ContactError, Result};

pub const NAME: &str = "contact-book";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
