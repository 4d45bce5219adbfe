//! Group directory service: a JSON-file backed list of chat groups with
//! snapshot rotation.

pub mod avatar;
pub mod backup;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod routes;
pub mod store;
pub mod uploads;
pub mod worker;
