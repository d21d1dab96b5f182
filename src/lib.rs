//! Tooling for the weather station: the deploy pipeline that pushes openHAB
//! configuration and the receiver to the home server, and the receiver that
//! bridges the nRF24L01 radio to the openHAB REST API.

pub mod config;
pub mod deploy;
pub mod logging;
pub mod models;
pub mod receiver;
pub mod ssh_config;
pub mod ssh_service;
