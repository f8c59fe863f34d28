pub mod auth;
pub mod config;
pub mod datastore;
pub mod extract;
pub mod fighter;
pub mod http_client;
pub mod import;
pub mod logging;
pub mod market;
pub mod profiles;
pub mod rating;
pub mod rest_store;
pub mod roster;
pub mod sqlite_store;
