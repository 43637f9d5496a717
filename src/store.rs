use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{OptionalExtension, params, params_from_iter};
use tokio_rusqlite::Connection;
use tracing::warn;

use crate::errors::BotError;
use crate::models::calendar::{DaySummary, MonthView};
use crate::models::task::{DueReminder, Task};
use crate::models::user::{
    DEFAULT_MODE, DEFAULT_REMINDER_MINUTES, DEFAULT_THEME, DEFAULT_TIMEZONE, Mode, UserRef,
};
use crate::service::free_days::{self, MAX_GROUP_USERS};
use crate::service::reminder_time;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    user_id    INTEGER PRIMARY KEY,
    username   TEXT,
    full_name  TEXT NOT NULL DEFAULT '',
    mode       TEXT NOT NULL DEFAULT 'meeting',
    reminder   INTEGER NOT NULL DEFAULT 60,
    timezone   TEXT NOT NULL DEFAULT 'Europe/Moscow',
    theme      TEXT NOT NULL DEFAULT 'default',
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS calendar_days (
    user_id    INTEGER NOT NULL,
    year       INTEGER NOT NULL,
    month      INTEGER NOT NULL,
    day        INTEGER NOT NULL,
    status     TEXT NOT NULL DEFAULT 'busy',
    updated_at TEXT NOT NULL,
    PRIMARY KEY (user_id, year, month, day)
);
CREATE TABLE IF NOT EXISTS tasks (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id       INTEGER NOT NULL,
    year          INTEGER NOT NULL,
    month         INTEGER NOT NULL,
    day           INTEGER NOT NULL,
    task          TEXT NOT NULL,
    time          TEXT NOT NULL,
    reminder      INTEGER NOT NULL,
    reminder_at   TEXT NOT NULL,
    reminder_sent INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tasks_day ON tasks (user_id, year, month, day);
CREATE INDEX IF NOT EXISTS idx_tasks_due ON tasks (reminder_sent, reminder_at);
CREATE TABLE IF NOT EXISTS group_requests (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id    INTEGER NOT NULL,
    user_ids   TEXT NOT NULL,
    created_at TEXT NOT NULL
);
";

// RFC 3339 UTC with fixed width, so string comparison orders instants.
fn fmt_instant(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_instant(column: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    let raw_reminder_at: String = row.get(8)?;
    Ok(Task {
        id: row.get(0)?,
        user_id: row.get(1)?,
        year: row.get(2)?,
        month: row.get(3)?,
        day: row.get(4)?,
        text: row.get(5)?,
        time: row.get(6)?,
        reminder_minutes: row.get(7)?,
        reminder_at: parse_instant(8, &raw_reminder_at)?,
        reminder_sent: row.get::<_, i64>(9)? != 0,
    })
}

const TASK_COLUMNS: &str =
    "id, user_id, year, month, day, task, time, reminder, reminder_at, reminder_sent";

/// SQLite-backed repository for users, day markers and tasks.
///
/// Cloning is cheap: all clones share one connection actor, so every
/// multi-statement mutation below runs on a single thread inside an
/// explicit transaction, which is what guards the marker/task invariant
/// against the scheduler and dialog worker interleaving.
#[derive(Clone)]
pub struct CalendarStore {
    conn: Connection,
}

impl CalendarStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, BotError> {
        // open() reports the raw rusqlite error; route it through the
        // wrapper type the rest of the storage layer converts from.
        let conn = Connection::open(path.as_ref())
            .await
            .map_err(tokio_rusqlite::Error::from)?;
        let store = Self { conn };
        store.init_schema().await?;
        Ok(store)
    }

    pub async fn open_in_memory() -> Result<Self, BotError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(tokio_rusqlite::Error::from)?;
        let store = Self { conn };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), BotError> {
        self.conn
            .call(|conn| {
                conn.execute_batch(SCHEMA)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn user_exists(&self, user_id: i64) -> Result<bool, BotError> {
        let found = self
            .conn
            .call(move |conn| {
                Ok(conn
                    .query_row("SELECT 1 FROM users WHERE user_id = ?1", [user_id], |_| {
                        Ok(())
                    })
                    .optional()?)
            })
            .await?;
        Ok(found.is_some())
    }

    /// Idempotent: a second call for the same id is a no-op.
    pub async fn create_user(&self, user: &UserRef) -> Result<(), BotError> {
        let user = user.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT OR IGNORE INTO users (user_id, username, full_name, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![user.id, user.username, user.full_name, fmt_instant(Utc::now())],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn user_text_field(
        &self,
        user_id: i64,
        sql: &'static str,
    ) -> Result<Option<String>, BotError> {
        let value = self
            .conn
            .call(move |conn| Ok(conn.query_row(sql, [user_id], |row| row.get(0)).optional()?))
            .await?;
        Ok(value)
    }

    async fn set_user_field(
        &self,
        user_id: i64,
        sql: &'static str,
        value: String,
    ) -> Result<(), BotError> {
        self.conn
            .call(move |conn| {
                conn.execute(sql, params![value, user_id])?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn mode(&self, user_id: i64) -> Result<Mode, BotError> {
        let raw = self
            .user_text_field(user_id, "SELECT mode FROM users WHERE user_id = ?1")
            .await?;
        Ok(raw.as_deref().and_then(Mode::parse).unwrap_or(DEFAULT_MODE))
    }

    pub async fn set_mode(&self, user_id: i64, mode: Mode) -> Result<(), BotError> {
        self.set_user_field(
            user_id,
            "UPDATE users SET mode = ?1 WHERE user_id = ?2",
            mode.as_str().to_string(),
        )
        .await
    }

    pub async fn reminder_default(&self, user_id: i64) -> Result<u32, BotError> {
        let value = self
            .conn
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT reminder FROM users WHERE user_id = ?1",
                        [user_id],
                        |row| row.get::<_, u32>(0),
                    )
                    .optional()?)
            })
            .await?;
        Ok(value.unwrap_or(DEFAULT_REMINDER_MINUTES))
    }

    pub async fn set_reminder_default(&self, user_id: i64, minutes: u32) -> Result<(), BotError> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE users SET reminder = ?1 WHERE user_id = ?2",
                    params![minutes, user_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn timezone(&self, user_id: i64) -> Result<String, BotError> {
        let raw = self
            .user_text_field(user_id, "SELECT timezone FROM users WHERE user_id = ?1")
            .await?;
        Ok(raw.unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()))
    }

    pub async fn set_timezone(&self, user_id: i64, timezone: &str) -> Result<(), BotError> {
        self.set_user_field(
            user_id,
            "UPDATE users SET timezone = ?1 WHERE user_id = ?2",
            timezone.to_string(),
        )
        .await
    }

    pub async fn theme(&self, user_id: i64) -> Result<String, BotError> {
        let raw = self
            .user_text_field(user_id, "SELECT theme FROM users WHERE user_id = ?1")
            .await?;
        Ok(raw.unwrap_or_else(|| DEFAULT_THEME.to_string()))
    }

    pub async fn set_theme(&self, user_id: i64, theme: &str) -> Result<(), BotError> {
        self.set_user_field(
            user_id,
            "UPDATE users SET theme = ?1 WHERE user_id = ?2",
            theme.to_string(),
        )
        .await
    }

    pub async fn mark_day_busy(
        &self,
        user_id: i64,
        year: i32,
        month: u32,
        day: u32,
    ) -> Result<(), BotError> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO calendar_days (user_id, year, month, day, status, updated_at)
                     VALUES (?1, ?2, ?3, ?4, 'busy', ?5)
                     ON CONFLICT (user_id, year, month, day)
                     DO UPDATE SET status = 'busy', updated_at = excluded.updated_at",
                    params![user_id, year, month, day, fmt_instant(Utc::now())],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Removes the day marker and every task on that day. A no-op on a day
    /// that is already free.
    pub async fn mark_day_free(
        &self,
        user_id: i64,
        year: i32,
        month: u32,
        day: u32,
    ) -> Result<(), BotError> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM calendar_days
                     WHERE user_id = ?1 AND year = ?2 AND month = ?3 AND day = ?4",
                    params![user_id, year, month, day],
                )?;
                tx.execute(
                    "DELETE FROM tasks
                     WHERE user_id = ?1 AND year = ?2 AND month = ?3 AND day = ?4",
                    params![user_id, year, month, day],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Inserts a task and returns its id. The reminder instant comes from
    /// the owner's current timezone; if that zone fails to resolve the
    /// write still succeeds with "now + offset" as a degraded fallback.
    #[allow(clippy::too_many_arguments)]
    pub async fn add_task(
        &self,
        user_id: i64,
        year: i32,
        month: u32,
        day: u32,
        text: &str,
        time: &str,
        reminder_minutes: u32,
    ) -> Result<i64, BotError> {
        let timezone = self.timezone(user_id).await?;
        let reminder_at =
            match reminder_time::reminder_instant(year, month, day, time, reminder_minutes, &timezone)
            {
                Ok(at) => at,
                Err(err) => {
                    warn!(user_id, timezone, %err, "reminder time fallback to now + offset");
                    Utc::now() + Duration::minutes(i64::from(reminder_minutes))
                }
            };
        let text = text.to_string();
        let time = time.to_string();
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO tasks
                         (user_id, year, month, day, task, time, reminder, reminder_at, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        user_id,
                        year,
                        month,
                        day,
                        text,
                        time,
                        reminder_minutes,
                        fmt_instant(reminder_at),
                        fmt_instant(Utc::now())
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn tasks_for_day(
        &self,
        user_id: i64,
        year: i32,
        month: u32,
        day: u32,
    ) -> Result<Vec<Task>, BotError> {
        let tasks = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {TASK_COLUMNS} FROM tasks
                     WHERE user_id = ?1 AND year = ?2 AND month = ?3 AND day = ?4
                     ORDER BY time, id"
                ))?;
                let tasks = stmt
                    .query_map(params![user_id, year, month, day], row_to_task)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(tasks)
            })
            .await?;
        Ok(tasks)
    }

    pub async fn task_by_id(&self, task_id: i64) -> Result<Option<Task>, BotError> {
        let task = self
            .conn
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                        [task_id],
                        row_to_task,
                    )
                    .optional()?)
            })
            .await?;
        Ok(task)
    }

    /// Deletes a task; returns false when no such task exists. When the last
    /// task of a day goes away the day marker goes with it — the marker's
    /// origin (user-set vs task-induced) is not tracked, matching the
    /// historical cascade.
    pub async fn delete_task(&self, task_id: i64) -> Result<bool, BotError> {
        let deleted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let key: Option<(i64, i32, u32, u32)> = tx
                    .query_row(
                        "SELECT user_id, year, month, day FROM tasks WHERE id = ?1",
                        [task_id],
                        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                    )
                    .optional()?;
                let Some((user_id, year, month, day)) = key else {
                    return Ok(false);
                };
                tx.execute("DELETE FROM tasks WHERE id = ?1", [task_id])?;
                let remaining: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM tasks
                     WHERE user_id = ?1 AND year = ?2 AND month = ?3 AND day = ?4",
                    params![user_id, year, month, day],
                    |row| row.get(0),
                )?;
                if remaining == 0 {
                    tx.execute(
                        "DELETE FROM calendar_days
                         WHERE user_id = ?1 AND year = ?2 AND month = ?3 AND day = ?4",
                        params![user_id, year, month, day],
                    )?;
                }
                tx.commit()?;
                Ok(true)
            })
            .await?;
        Ok(deleted)
    }

    /// Occupancy of a whole month: explicit markers merged with task counts.
    pub async fn month_view(
        &self,
        user_id: i64,
        year: i32,
        month: u32,
    ) -> Result<MonthView, BotError> {
        let view = self
            .conn
            .call(move |conn| {
                let mut view: MonthView = BTreeMap::new();
                let mut stmt = conn.prepare(
                    "SELECT day FROM calendar_days
                     WHERE user_id = ?1 AND year = ?2 AND month = ?3 AND status = 'busy'",
                )?;
                let marked = stmt
                    .query_map(params![user_id, year, month], |row| row.get::<_, u32>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                for day in marked {
                    view.insert(
                        day,
                        DaySummary {
                            occupied: true,
                            task_count: 0,
                        },
                    );
                }
                let mut stmt = conn.prepare(
                    "SELECT day, COUNT(*) FROM tasks
                     WHERE user_id = ?1 AND year = ?2 AND month = ?3
                     GROUP BY day",
                )?;
                let counted = stmt
                    .query_map(params![user_id, year, month], |row| {
                        Ok((row.get::<_, u32>(0)?, row.get::<_, u32>(1)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                for (day, count) in counted {
                    view.entry(day)
                        .and_modify(|summary| summary.task_count = count)
                        .or_insert(DaySummary {
                            occupied: true,
                            task_count: count,
                        });
                }
                Ok(view)
            })
            .await?;
        Ok(view)
    }

    /// Drops every marker and task of the month in one transaction.
    pub async fn reset_month(&self, user_id: i64, year: i32, month: u32) -> Result<(), BotError> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM calendar_days WHERE user_id = ?1 AND year = ?2 AND month = ?3",
                    params![user_id, year, month],
                )?;
                tx.execute(
                    "DELETE FROM tasks WHERE user_id = ?1 AND year = ?2 AND month = ?3",
                    params![user_id, year, month],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Resolves handles (without the leading '@') to user ids. Handles that
    /// match nobody are silently dropped.
    pub async fn users_by_handles(&self, handles: &[String]) -> Result<Vec<i64>, BotError> {
        if handles.is_empty() {
            return Ok(Vec::new());
        }
        let handles = handles.to_vec();
        let ids = self
            .conn
            .call(move |conn| {
                let placeholders = vec!["?"; handles.len()].join(", ");
                let mut stmt = conn.prepare(&format!(
                    "SELECT user_id FROM users WHERE username IN ({placeholders})"
                ))?;
                let ids = stmt
                    .query_map(params_from_iter(handles.iter()), |row| row.get::<_, i64>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ids)
            })
            .await?;
        Ok(ids)
    }

    /// Common free days for a group, plus an audit row for the request.
    /// Empty input or more than `MAX_GROUP_USERS` ids yields an empty list.
    pub async fn find_common_free_days(
        &self,
        requested_by: i64,
        user_ids: &[i64],
        year: i32,
        month: u32,
    ) -> Result<Vec<u32>, BotError> {
        if user_ids.is_empty() || user_ids.len() > MAX_GROUP_USERS {
            return Ok(Vec::new());
        }
        let user_ids = user_ids.to_vec();
        let free = self
            .conn
            .call(move |conn| {
                let mut sets: Vec<BTreeSet<u32>> = Vec::with_capacity(user_ids.len());
                for user_id in &user_ids {
                    let mut occupied: BTreeSet<u32> = BTreeSet::new();
                    let mut stmt = conn.prepare(
                        "SELECT day FROM calendar_days
                         WHERE user_id = ?1 AND year = ?2 AND month = ?3 AND status = 'busy'",
                    )?;
                    for day in stmt.query_map(params![user_id, year, month], |row| row.get(0))? {
                        occupied.insert(day?);
                    }
                    let mut stmt = conn.prepare(
                        "SELECT DISTINCT day FROM tasks
                         WHERE user_id = ?1 AND year = ?2 AND month = ?3",
                    )?;
                    for day in stmt.query_map(params![user_id, year, month], |row| row.get(0))? {
                        occupied.insert(day?);
                    }
                    sets.push(occupied);
                }
                let free = free_days::common_free_days(&sets, year, month);
                let ids_json =
                    serde_json::to_string(&user_ids).unwrap_or_else(|_| "[]".to_string());
                conn.execute(
                    "INSERT INTO group_requests (user_id, user_ids, created_at)
                     VALUES (?1, ?2, ?3)",
                    params![requested_by, ids_json, fmt_instant(Utc::now())],
                )?;
                Ok(free)
            })
            .await?;
        Ok(free)
    }

    /// All unsent reminders whose delivery instant has passed.
    pub async fn due_reminders(&self, now: DateTime<Utc>) -> Result<Vec<DueReminder>, BotError> {
        let cutoff = fmt_instant(now);
        let due = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, task FROM tasks
                     WHERE reminder_sent = 0 AND reminder_at <= ?1
                     ORDER BY reminder_at, id",
                )?;
                let due = stmt
                    .query_map([cutoff], |row| {
                        Ok(DueReminder {
                            task_id: row.get(0)?,
                            user_id: row.get(1)?,
                            text: row.get(2)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(due)
            })
            .await?;
        Ok(due)
    }

    /// Monotonic false -> true; calling it again is harmless.
    pub async fn mark_reminder_sent(&self, task_id: i64) -> Result<(), BotError> {
        self.conn
            .call(move |conn| {
                conn.execute("UPDATE tasks SET reminder_sent = 1 WHERE id = ?1", [task_id])?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Housekeeping: drops markers and tasks created before the cutoff.
    pub async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<(), BotError> {
        let cutoff = fmt_instant(cutoff);
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM calendar_days WHERE updated_at < ?1", [&cutoff])?;
                conn.execute("DELETE FROM tasks WHERE created_at < ?1", [&cutoff])?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}
