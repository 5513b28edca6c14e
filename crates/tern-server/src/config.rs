use std::path::PathBuf;

use tern_shared::constants::{
    DEFAULT_CONNECT_LIMIT, DEFAULT_HERTZ, DEFAULT_MAX_FRAME_SIZE, DEFAULT_PORT, DEFAULT_TASK_LIMIT,
};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Required `Origin` header value; empty disables the check.
    pub origin: String,
    /// Salt mixed into every derived uuid and password hash.
    pub salt: String,
    pub task_limit: i64,
    pub connect_limit: usize,
    pub max_frame_size: usize,
    pub hertz: f64,
    pub forbid_register: bool,
    pub forbid_token: bool,
    pub ssl_crt: Option<PathBuf>,
    pub ssl_crt_key: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            origin: String::new(),
            salt: "tern".to_string(),
            task_limit: DEFAULT_TASK_LIMIT,
            connect_limit: DEFAULT_CONNECT_LIMIT,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            hertz: DEFAULT_HERTZ,
            forbid_register: false,
            forbid_token: false,
            ssl_crt: None,
            ssl_crt_key: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(port) = std::env::var("TERN_PORT") {
            if let Ok(parsed) = port.parse::<u16>() {
                config.port = parsed;
            } else {
                tracing::warn!(value = %port, "Invalid TERN_PORT, using default");
            }
        }

        if let Ok(origin) = std::env::var("TERN_ORIGIN") {
            config.origin = origin;
        }

        if let Ok(salt) = std::env::var("TERN_SALT") {
            if !salt.is_empty() {
                config.salt = salt;
            }
        }

        if let Ok(val) = std::env::var("TERN_TASK_LIMIT") {
            if let Ok(n) = val.parse::<i64>() {
                config.task_limit = n;
            } else {
                tracing::warn!(value = %val, "Invalid TERN_TASK_LIMIT, using default");
            }
        }

        if let Ok(val) = std::env::var("TERN_CONNECT_LIMIT") {
            if let Ok(n) = val.parse::<usize>() {
                config.connect_limit = n;
            } else {
                tracing::warn!(value = %val, "Invalid TERN_CONNECT_LIMIT, using default");
            }
        }

        if let Ok(val) = std::env::var("TERN_MAX_FRAME_SIZE") {
            if let Ok(n) = val.parse::<usize>() {
                config.max_frame_size = n;
            } else {
                tracing::warn!(value = %val, "Invalid TERN_MAX_FRAME_SIZE, using default");
            }
        }

        if let Ok(val) = std::env::var("TERN_HERTZ") {
            if let Ok(n) = val.parse::<f64>() {
                if n > 0.0 {
                    config.hertz = n;
                }
            } else {
                tracing::warn!(value = %val, "Invalid TERN_HERTZ, using default");
            }
        }

        if let Ok(val) = std::env::var("TERN_FORBID_REGISTER") {
            config.forbid_register = val != "false" && val != "0";
        }

        if let Ok(val) = std::env::var("TERN_FORBID_TOKEN") {
            config.forbid_token = val != "false" && val != "0";
        }

        if let Ok(path) = std::env::var("TERN_SSL_CRT") {
            if !path.is_empty() {
                config.ssl_crt = Some(PathBuf::from(path));
            }
        }

        if let Ok(path) = std::env::var("TERN_SSL_CRT_KEY") {
            if !path.is_empty() {
                config.ssl_crt_key = Some(PathBuf::from(path));
            }
        }

        config
    }

    /// TLS engages only when both credential paths are configured.
    pub fn tls_enabled(&self) -> bool {
        self.ssl_crt.is_some() && self.ssl_crt_key.is_some()
    }
}
