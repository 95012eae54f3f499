pub mod auth;
pub mod config;
pub mod dashboard;
pub mod errors;
pub mod forms;
pub mod gateway;
pub mod logging;
pub mod realtime;
pub mod session;

#[cfg(test)]
mod test_support;

pub use builderhub_common;
