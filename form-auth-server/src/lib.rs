pub mod api;
pub mod config;
pub mod db;
pub mod token;

pub use api::{app, serve};
pub use config::ServerConfig;
pub use db::RedbDirectory;
pub use token::JwtIssuer;
