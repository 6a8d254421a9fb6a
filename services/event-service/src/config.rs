use std::net::SocketAddr;

use anyhow::{Context, Result};

use crate::bus::BusConfig;
use crate::db::DbConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub log_level: String,
    pub dev_mode: bool,
    pub database: DbConfig,
    pub bus: BusConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let listen_addr = std::env::var("PRIDR_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .context("PRIDR_LISTEN_ADDR must be a socket address")?;

        let log_level = std::env::var("PRIDR_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let dev_mode = std::env::var("PRIDR_DEV")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        let database = DbConfig::from_env();
        let bus = BusConfig::from_env()?;

        Ok(Self {
            listen_addr,
            log_level,
            dev_mode,
            database,
            bus,
        })
    }
}
