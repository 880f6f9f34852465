use axum::{
    body::{self, Body},
    http::{self, Request, StatusCode},
    Router,
};
use dbrelay::{config::AppConfig, server::Server};
use serde_json::Value;
use std::{
    env, fs,
    future::Future,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Once,
    time::Duration,
};
use tokio_postgres::{config::Host, Config as PgConfig, NoTls};
use tower::ServiceExt;

pub const API_KEY: &str = "test-api-key";

static TRACING_INIT: Once = Once::new();

#[derive(Debug, Clone, Copy)]
pub enum Credential {
    Valid,
    Missing,
    Wrong,
}

/// Runs a test closure against a bootstrapped relay instance backed by
/// the seeded `project` fixture. Skips silently when the fixture
/// database is not configured.
pub async fn with_relay_harness<F, Fut>(test: F)
where
    F: FnOnce(RelayTestHarness) -> Fut,
    Fut: Future<Output = ()>,
{
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt::try_init();
    });

    let database_url = match env::var("DBRELAY_TEST_DATABASE_URL") {
        Ok(value) if !value.trim().is_empty() => value,
        _ => {
            eprintln!("[dbrelay-test] skipping harness: DBRELAY_TEST_DATABASE_URL is not set");
            return;
        }
    };

    seed_fixture_database(&database_url)
        .await
        .expect("failed to seed fixture database");

    let config = test_config(&database_url).expect("invalid DBRELAY_TEST_DATABASE_URL");
    let server = Server::new(config)
        .await
        .expect("failed to boot relay server for harness");

    let harness = RelayTestHarness {
        router: server.router(),
    };

    test(harness).await;
}

#[derive(Clone)]
pub struct RelayTestHarness {
    router: Router,
}

impl RelayTestHarness {
    pub async fn health(&self) -> http::Response<Body> {
        let request = Request::builder()
            .method("GET")
            .uri("/")
            .body(Body::empty())
            .expect("failed to build health request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router should handle health request")
    }

    pub async fn relay(
        &self,
        path: &str,
        payload: &Value,
        credential: Credential,
    ) -> http::Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header(http::header::CONTENT_TYPE, "application/json");

        builder = match credential {
            Credential::Valid => builder.header("x-api-key", API_KEY),
            Credential::Wrong => builder.header("x-api-key", "not-the-key"),
            Credential::Missing => builder,
        };

        let request = builder
            .body(Body::from(payload.to_string()))
            .expect("failed to build harness request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router should handle harness request")
    }
}

pub async fn read_json(response: http::Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("response body should deserialize");
    let value =
        serde_json::from_slice::<Value>(&bytes).expect("response body should be valid JSON");
    (status, value)
}

fn test_config(database_url: &str) -> anyhow::Result<AppConfig> {
    let parsed: PgConfig = database_url.parse()?;

    let db_host = parsed
        .get_hosts()
        .iter()
        .find_map(|host| match host {
            Host::Tcp(name) => Some(name.clone()),
            _ => None,
        })
        .ok_or_else(|| anyhow::anyhow!("DBRELAY_TEST_DATABASE_URL must use a tcp host"))?;
    let db_port = parsed.get_ports().first().copied().unwrap_or(5432);
    let db_user = parsed
        .get_user()
        .ok_or_else(|| anyhow::anyhow!("DBRELAY_TEST_DATABASE_URL must include a username"))?
        .to_string();
    let db_password = String::from_utf8(parsed.get_password().unwrap_or_default().to_vec())?;
    let db_name = parsed
        .get_dbname()
        .ok_or_else(|| anyhow::anyhow!("DBRELAY_TEST_DATABASE_URL must include a database name"))?
        .to_string();

    Ok(AppConfig {
        listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        db_host,
        db_port,
        db_user,
        db_password,
        db_name,
        api_key: API_KEY.to_string(),
        max_pool_size: 5,
        connect_timeout: Duration::from_secs(10),
        allow_raw: true,
        pg_ssl_root_cert: None,
    })
}

async fn seed_fixture_database(database_url: &str) -> anyhow::Result<()> {
    let config: PgConfig = database_url.parse()?;
    let (client, connection) = config.connect(NoTls).await?;
    let task = tokio::spawn(async move {
        if let Err(err) = connection.await {
            eprintln!("[dbrelay-test] fixture connection closed with error: {err}");
        }
    });

    let schema_sql = load_fixture("schema.sql")?;
    let seed_sql = load_fixture("seed.sql")?;
    client.batch_execute(&schema_sql).await?;
    client.batch_execute(&seed_sql).await?;

    drop(client);
    let _ = task.await;
    Ok(())
}

fn load_fixture(name: &str) -> anyhow::Result<String> {
    let path = fixture_root().join(name);
    fs::read_to_string(&path)
        .map_err(|err| anyhow::anyhow!("failed to read fixture {name} from {:?}: {err}", path))
}

fn fixture_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}
