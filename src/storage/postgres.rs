//! PostgreSQL catalog store over `tokio-postgres`.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Config, NoTls, Row};
use tracing::{debug, error, info};

use crate::error::{AppError, AppResult};
use crate::model::{DirectoryId, DirectoryListing, EntryRow};
use crate::query::compose::{DirectoryQuery, EntryQuery};
use crate::storage::sql::{self, Rendered, SqlValue};
use crate::storage::CatalogStore;

#[derive(Clone)]
pub struct PgStore {
    client: Arc<Client>,
    addr: String,
}

fn boxed(params: &[SqlValue]) -> Vec<Box<dyn ToSql + Sync + Send>> {
    params
        .iter()
        .map(|p| -> Box<dyn ToSql + Sync + Send> {
            match p {
                SqlValue::Text(s) => Box::new(s.clone()),
                SqlValue::Int(i) => Box::new(*i),
                SqlValue::Bool(b) => Box::new(*b),
            }
        })
        .collect()
}

/// `user@hosts/dbname` for logging; never includes the password.
fn describe(cfg: &Config) -> String {
    let hosts: Vec<String> = cfg.get_hosts().iter().map(|h| format!("{:?}", h)).collect();
    format!("{}@{}/{}", cfg.get_user().unwrap_or("<default>"), hosts.join(","), cfg.get_dbname().unwrap_or("<default>"))
}

fn entry_row(row: &Row) -> Result<EntryRow, tokio_postgres::Error> {
    let map_count: i64 = row.try_get(14)?;
    Ok(EntryRow {
        id: row.try_get(0)?,
        collection: row.try_get(1)?,
        path: row.try_get(2)?,
        title: row.try_get(3)?,
        size: row.try_get::<_, Option<i64>>(4)?.unwrap_or(0),
        created: row.try_get(5)?,
        modified: row.try_get(6)?,
        updated: row.try_get::<_, Option<i64>>(7)?.unwrap_or(0),
        // 0 is the stored "unspecified" code.
        game: row.try_get::<_, Option<i64>>(8)?.filter(|g| *g != 0),
        engine: row.try_get::<_, Option<i64>>(9)?.filter(|g| *g != 0),
        singleplayer: row.try_get::<_, Option<bool>>(10)?.unwrap_or(false),
        cooperative: row.try_get::<_, Option<bool>>(11)?.unwrap_or(false),
        deathmatch: row.try_get::<_, Option<bool>>(12)?.unwrap_or(false),
        description: row.try_get(13)?,
        map_count: u32::try_from(map_count).unwrap_or(u32::MAX),
        score: row.try_get(15)?,
    })
}

impl PgStore {
    pub async fn connect(dsn: &str) -> anyhow::Result<Self> {
        let cfg: Config = dsn.parse().context("invalid postgres dsn")?;
        let addr = describe(&cfg);
        let (client, conn) = cfg.connect(NoTls).await.with_context(|| format!("connecting to {}", addr))?;
        let conn_addr = addr.clone();
        // drive the connection in background
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                error!(target: "wadarchive::storage", "postgres connection {} closed: {}", conn_addr, e);
            }
        });
        info!(target: "wadarchive::storage", "connected to postgres {}", addr);
        Ok(Self { client: Arc::new(client), addr })
    }

    pub fn addr(&self) -> &str { &self.addr }

    async fn query(&self, r: &Rendered) -> AppResult<Vec<Row>> {
        let params = boxed(&r.params);
        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p.as_ref() as &(dyn ToSql + Sync)).collect();
        let started = Instant::now();
        let rows = self.client.query(r.text.as_str(), &refs).await.map_err(|e| {
            error!(target: "wadarchive::storage", "query failed: {} [{}]", e, r.text);
            AppError::from(e)
        })?;
        debug!(target: "wadarchive::storage", "{} rows in {:?}: {}", rows.len(), started.elapsed(), r.text);
        Ok(rows)
    }
}

impl CatalogStore for PgStore {
    async fn find_directory(&self, collection: &str, path: &str) -> AppResult<Option<DirectoryId>> {
        let rows = self.query(&sql::render_find_directory(collection, path)).await?;
        match rows.first() {
            Some(row) => Ok(Some(row.try_get(0)?)),
            None => Ok(None),
        }
    }

    async fn fetch_directories(&self, query: &DirectoryQuery) -> AppResult<Vec<DirectoryListing>> {
        let rows = self.query(&sql::render_directories(query)).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(DirectoryListing { name: row.try_get(0)?, path: row.try_get(1)? });
        }
        Ok(out)
    }

    async fn fetch_entries(&self, query: &EntryQuery) -> AppResult<Vec<EntryRow>> {
        if query.is_count() {
            return Err(AppError::internal("bad_projection", "count query passed to fetch_entries"));
        }
        let rows = self.query(&sql::render_entries(query)).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(entry_row(row)?);
        }
        Ok(out)
    }

    async fn count_entries(&self, query: &EntryQuery) -> AppResult<u64> {
        let rendered = sql::render_entries(&query.count_query());
        let rows = self.query(&rendered).await?;
        let n: i64 = match rows.first() {
            Some(row) => row.try_get(0)?,
            None => 0,
        };
        Ok(u64::try_from(n).unwrap_or(0))
    }
}
