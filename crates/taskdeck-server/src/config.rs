use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use taskdeck_db::{Backend, DbConfig};

pub const APP_NAME: &str = "Task Manager API";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Storage {
    /// Single SQLite file at `--database-path`
    Sqlite,
    /// Process memory; lost on exit
    Memory,
}

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone, Parser)]
#[command(name = "taskdeck-server", about = "Task manager REST API", version)]
pub struct Config {
    /// Path of the SQLite database file
    #[arg(long, env = "DATABASE_PATH", default_value = "tasks.db")]
    pub database_path: PathBuf,

    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Verbose logging
    #[arg(long, env = "DEBUG")]
    pub debug: bool,

    /// Storage backend
    #[arg(long, env = "TASKDECK_STORAGE", value_enum, default_value_t = Storage::Sqlite)]
    pub storage: Storage,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("tasks.db"),
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8000,
            debug: false,
            storage: Storage::Sqlite,
        }
    }
}

impl Config {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            backend: match self.storage {
                Storage::Sqlite => Backend::Sqlite,
                Storage::Memory => Backend::Memory,
            },
            sqlite_path: Some(self.database_path.clone()),
        }
    }

    /// Filter used when `RUST_LOG` is not set.
    pub fn default_log_filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}
