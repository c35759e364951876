use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Directory holding the persisted signing keypair.
    pub keys_dir: String,
    /// Master secret for envelope encryption of account secrets.
    /// Supplied via deployment secrets, never stored in the database.
    pub master_secret: String,
    pub admin_token: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let master_secret = env::var("MASTER_SECRET")
            .map_err(|_| anyhow::anyhow!("MASTER_SECRET must be set"))?;
        if master_secret.len() < 16 {
            anyhow::bail!("MASTER_SECRET must be at least 16 characters");
        }

        let admin_token =
            env::var("ADMIN_TOKEN").map_err(|_| anyhow::anyhow!("ADMIN_TOKEN must be set"))?;

        Ok(Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "modgate.db".to_string()),
            keys_dir: env::var("KEYS_DIR").unwrap_or_else(|_| ".".to_string()),
            master_secret,
            admin_token,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
