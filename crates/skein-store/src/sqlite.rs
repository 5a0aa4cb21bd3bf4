use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use skein_action::{Action, ActionId, ActionState, ActionStats};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::types::Json;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use crate::error::StoreError;
use crate::filter::ActionFilter;
use crate::item::{Item, Upsert};
use crate::{ActionStore, ItemStore};

const ACTION_COLUMNS: &str = "id, provider, route, query, priority, created, \
  stats_pages, stats_results, stats_items, stats_updated, stats_spawned, \
  current_page, finished, finished_date, started_date, last_link, data, \
  attempts, failed, last_error";

/// SQLite-based store implementation.
#[derive(Debug, Clone)]
pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Open (creating if needed) the database at `url` and run migrations.
  pub async fn connect(url: &str) -> Result<Self, StoreError> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    let store = Self::new(pool);
    store.migrate().await?;
    Ok(store)
  }

  /// A private in-memory database, migrated and ready.
  ///
  /// Limited to one connection: every `:memory:` connection is its own database.
  pub async fn in_memory() -> Result<Self, StoreError> {
    let pool = SqlitePoolOptions::new()
      .max_connections(1)
      .connect("sqlite::memory:")
      .await?;
    let store = Self::new(pool);
    store.migrate().await?;
    Ok(store)
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(&self.pool).await?;
    Ok(())
  }

  pub fn pool(&self) -> &SqlitePool {
    &self.pool
  }
}

/// Append the `WHERE` conditions of `filter`.
fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ActionFilter) {
  qb.push(" WHERE 1 = 1");

  if let Some(finished) = filter.finished {
    qb.push(" AND finished = ").push_bind(finished);
  }
  if !filter.include_failed {
    qb.push(" AND failed = 0");
  }
  if !filter.exclude_ids.is_empty() {
    qb.push(" AND id NOT IN (");
    let mut ids = qb.separated(", ");
    for id in &filter.exclude_ids {
      ids.push_bind(id.to_string());
    }
    ids.push_unseparated(")");
  }
  if !filter.exclude_routes.is_empty() {
    qb.push(" AND (provider || ':' || route) NOT IN (");
    let mut routes = qb.separated(", ");
    for route in &filter.exclude_routes {
      routes.push_bind(route.to_string());
    }
    routes.push_unseparated(")");
  }

  for fragment in &filter.fragments {
    if !fragment.providers.is_empty() {
      qb.push(" AND provider IN (");
      let mut providers = qb.separated(", ");
      for provider in &fragment.providers {
        providers.push_bind(provider.clone());
      }
      providers.push_unseparated(")");
    }
    if !fragment.routes.is_empty() {
      qb.push(" AND (provider || ':' || route) IN (");
      let mut routes = qb.separated(", ");
      for route in &fragment.routes {
        routes.push_bind(route.clone());
      }
      routes.push_unseparated(")");
    }
    if let Some(min) = fragment.min_priority {
      qb.push(" AND priority >= ").push_bind(min);
    }
    if let Some(max) = fragment.max_priority {
      qb.push(" AND priority <= ").push_bind(max);
    }
  }
}

#[async_trait]
impl ActionStore for SqliteStore {
  async fn find_one(&self, filter: &ActionFilter) -> Result<Option<Action>, StoreError> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {ACTION_COLUMNS} FROM actions"));
    push_filter(&mut qb, filter);
    qb.push(" ORDER BY priority DESC, created ASC, id ASC LIMIT 1");

    let row = qb
      .build_query_as::<ActionRow>()
      .fetch_optional(&self.pool)
      .await?;
    row.map(Action::try_from).transpose()
  }

  async fn insert(&self, action: &Action) -> Result<(), StoreError> {
    let result = sqlx::query(
      r#"
            INSERT INTO actions (id, provider, route, query, priority, created,
              stats_pages, stats_results, stats_items, stats_updated, stats_spawned,
              current_page, finished, finished_date, started_date, last_link, data,
              attempts, failed, last_error)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
    )
    .bind(action.id.to_string())
    .bind(&action.provider)
    .bind(&action.route)
    .bind(&action.query)
    .bind(action.priority)
    .bind(action.created)
    .bind(action.stats.pages as i64)
    .bind(action.stats.results as i64)
    .bind(action.stats.items as i64)
    .bind(action.stats.updated as i64)
    .bind(action.stats.spawned as i64)
    .bind(action.state.current_page as i64)
    .bind(action.state.finished)
    .bind(action.state.finished_date)
    .bind(action.state.started_date)
    .bind(&action.state.last_link)
    .bind(Json(&action.state.data))
    .bind(action.state.attempts as i64)
    .bind(action.state.failed)
    .bind(&action.state.last_error)
    .execute(&self.pool)
    .await;

    match result {
      Ok(_) => Ok(()),
      Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
        Err(StoreError::AlreadyExists(action.id.to_string()))
      }
      Err(e) => Err(e.into()),
    }
  }

  async fn save(&self, action: &Action) -> Result<(), StoreError> {
    let result = sqlx::query(
      r#"
            UPDATE actions
            SET priority = ?,
                stats_pages = ?, stats_results = ?, stats_items = ?,
                stats_updated = ?, stats_spawned = ?,
                current_page = ?, finished = ?, finished_date = ?, started_date = ?,
                last_link = ?, data = ?, attempts = ?, failed = ?, last_error = ?
            WHERE id = ?
            "#,
    )
    .bind(action.priority)
    .bind(action.stats.pages as i64)
    .bind(action.stats.results as i64)
    .bind(action.stats.items as i64)
    .bind(action.stats.updated as i64)
    .bind(action.stats.spawned as i64)
    .bind(action.state.current_page as i64)
    .bind(action.state.finished)
    .bind(action.state.finished_date)
    .bind(action.state.started_date)
    .bind(&action.state.last_link)
    .bind(Json(&action.state.data))
    .bind(action.state.attempts as i64)
    .bind(action.state.failed)
    .bind(&action.state.last_error)
    .bind(action.id.to_string())
    .execute(&self.pool)
    .await?;

    if result.rows_affected() == 0 {
      return Err(StoreError::NotFound(action.id.to_string()));
    }
    Ok(())
  }

  async fn get(&self, id: ActionId) -> Result<Option<Action>, StoreError> {
    let row: Option<ActionRow> =
      sqlx::query_as(&format!("SELECT {ACTION_COLUMNS} FROM actions WHERE id = ?"))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
    row.map(Action::try_from).transpose()
  }

  async fn count(&self, filter: &ActionFilter) -> Result<u64, StoreError> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM actions");
    push_filter(&mut qb, filter);

    let count = qb
      .build_query_scalar::<i64>()
      .fetch_one(&self.pool)
      .await?;
    Ok(count as u64)
  }
}

#[async_trait]
impl ItemStore for SqliteStore {
  async fn upsert_item(&self, item: &Item) -> Result<Upsert, StoreError> {
    let mut tx = self.pool.begin().await?;

    let inserted = sqlx::query(
      r#"
            INSERT INTO items (provider, key, route, data, scraped_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (provider, key) DO NOTHING
            "#,
    )
    .bind(&item.provider)
    .bind(&item.key)
    .bind(&item.route)
    .bind(Json(&item.data))
    .bind(item.scraped_at)
    .execute(&mut *tx)
    .await?;

    let outcome = if inserted.rows_affected() == 1 {
      Upsert::Created
    } else {
      sqlx::query(
        r#"
            UPDATE items
            SET route = ?, data = ?, scraped_at = ?
            WHERE provider = ? AND key = ?
            "#,
      )
      .bind(&item.route)
      .bind(Json(&item.data))
      .bind(item.scraped_at)
      .bind(&item.provider)
      .bind(&item.key)
      .execute(&mut *tx)
      .await?;
      Upsert::Updated
    };

    tx.commit().await?;
    Ok(outcome)
  }

  async fn get_item(&self, provider: &str, key: &str) -> Result<Option<Item>, StoreError> {
    let row: Option<ItemRow> = sqlx::query_as(
      r#"
            SELECT provider, key, route, data, scraped_at
            FROM items
            WHERE provider = ? AND key = ?
            "#,
    )
    .bind(provider)
    .bind(key)
    .fetch_optional(&self.pool)
    .await?;

    Ok(row.map(|row| Item {
      provider: row.provider,
      route: row.route,
      key: row.key,
      data: row.data.0,
      scraped_at: row.scraped_at,
    }))
  }
}

/// An action row as stored in the database.
#[derive(Debug, FromRow)]
struct ActionRow {
  id: String,
  provider: String,
  route: String,
  query: String,
  priority: i64,
  created: DateTime<Utc>,
  stats_pages: i64,
  stats_results: i64,
  stats_items: i64,
  stats_updated: i64,
  stats_spawned: i64,
  current_page: i64,
  finished: bool,
  finished_date: Option<DateTime<Utc>>,
  started_date: Option<DateTime<Utc>>,
  last_link: Option<String>,
  data: Json<serde_json::Map<String, serde_json::Value>>,
  attempts: i64,
  failed: bool,
  last_error: Option<String>,
}

impl TryFrom<ActionRow> for Action {
  type Error = StoreError;

  fn try_from(row: ActionRow) -> Result<Self, Self::Error> {
    let id = ActionId::from_str(&row.id).map_err(|e| StoreError::Corrupt {
      message: format!("invalid action id '{}': {}", row.id, e),
    })?;

    Ok(Action {
      id,
      provider: row.provider,
      route: row.route,
      query: row.query,
      priority: row.priority,
      created: row.created,
      stats: ActionStats {
        pages: row.stats_pages as u64,
        results: row.stats_results as u64,
        items: row.stats_items as u64,
        updated: row.stats_updated as u64,
        spawned: row.stats_spawned as u64,
      },
      state: ActionState {
        current_page: row.current_page as u32,
        finished: row.finished,
        finished_date: row.finished_date,
        started_date: row.started_date,
        last_link: row.last_link,
        data: row.data.0,
        attempts: row.attempts as u32,
        failed: row.failed,
        last_error: row.last_error,
      },
    })
  }
}

/// An item row as stored in the database.
#[derive(Debug, FromRow)]
struct ItemRow {
  provider: String,
  key: String,
  route: String,
  data: Json<serde_json::Map<String, serde_json::Value>>,
  scraped_at: DateTime<Utc>,
}
