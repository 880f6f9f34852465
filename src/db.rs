use crate::config::AppConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use bb8::{ManageConnection, Pool};
use rustls::{ClientConfig, RootCertStore};
use rustls_pemfile::certs;
use std::fs::File;
use std::io::BufReader;
use tokio_postgres::{Client, Config as PgConfig, NoTls};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{error, info, warn};

pub type PgPool = Pool<PgConnectionManager>;

/// Builds the shared connection pool. Requests lease connections from
/// here; the lease returns on drop, on every exit path.
pub async fn connect_pool(config: &AppConfig) -> Result<PgPool> {
    let manager = PgConnectionManager::new(config)?;
    let pool = Pool::builder()
        .max_size(config.max_pool_size)
        .build(manager)
        .await
        .context("failed to build PostgreSQL connection pool")?;

    // One-time connectivity probe so credential problems show up in the
    // startup log instead of on the first request.
    match pool.get().await {
        Ok(_) => info!("database connectivity check succeeded"),
        Err(err) => error!(error = ?err, "initial database connectivity check failed"),
    }

    Ok(pool)
}

#[derive(Clone)]
pub struct PgConnectionManager {
    config: PgConfig,
    tls: PgTls,
}

#[derive(Clone)]
enum PgTls {
    None,
    Rustls(MakeRustlsConnect),
}

impl PgConnectionManager {
    fn new(config: &AppConfig) -> Result<Self> {
        let mut pg = PgConfig::new();
        pg.host(&config.db_host)
            .port(config.db_port)
            .user(&config.db_user)
            .password(&config.db_password)
            .dbname(&config.db_name)
            .connect_timeout(config.connect_timeout);

        let tls = match config.pg_ssl_root_cert.as_deref() {
            Some(path) => PgTls::Rustls(build_tls_connector(path)?),
            None => PgTls::None,
        };

        Ok(Self { config: pg, tls })
    }
}

#[async_trait]
impl ManageConnection for PgConnectionManager {
    type Connection = Client;
    type Error = anyhow::Error;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        match &self.tls {
            PgTls::None => {
                let (client, connection) = self.config.connect(NoTls).await?;
                tokio::spawn(async move {
                    if let Err(err) = connection.await {
                        warn!(error = %err, "database connection closed with error");
                    }
                });
                Ok(client)
            }
            PgTls::Rustls(connector) => {
                let (client, connection) = self.config.connect(connector.clone()).await?;
                tokio::spawn(async move {
                    if let Err(err) = connection.await {
                        warn!(error = %err, "database connection closed with error");
                    }
                });
                Ok(client)
            }
        }
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.simple_query("SELECT 1").await?;
        Ok(())
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.is_closed()
    }
}

fn build_tls_connector(root_cert: &str) -> Result<MakeRustlsConnect> {
    let mut reader =
        BufReader::new(File::open(root_cert).context("failed to open PG_SSL_ROOT_CERT")?);
    let mut root_store = RootCertStore::empty();
    for cert in certs(&mut reader) {
        let cert = cert.context("failed to parse PG_SSL_ROOT_CERT")?;
        root_store
            .add(cert)
            .map_err(|_| anyhow::anyhow!("invalid certificate in PG_SSL_ROOT_CERT"))?;
    }

    let client_config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    Ok(MakeRustlsConnect::new(client_config))
}
