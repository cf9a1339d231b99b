//! SQLite implementation of the reminder store gateway.
//!
//! # Table design
//!
//! All timestamps are stored as integer Unix milliseconds so that the firing
//! window can be evaluated inside the query:
//! ```text
//! fire_at_ms = tasks.due_at - reminders.lead_hours * 3_600_000
//! ```
//! Reminder ids use `AUTOINCREMENT` so a deleted reminder's id is never
//! reused; an orphaned attempt log therefore can never be mistaken for the
//! history of a newer reminder.

use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};

use crate::error::{NudgeError, Result};
use crate::reminder::{AttemptLog, NewReminder, Reminder, ReminderId, ReminderWithTask, Task};
use crate::types::TaskStatus;

use super::{CandidateQuery, Obsolete, ReminderStore, StoreConnector};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tasks (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    course_name TEXT NOT NULL,
    due_at      INTEGER NOT NULL,
    status      TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'submitted'))
);
CREATE TABLE IF NOT EXISTS students (
    id   INTEGER PRIMARY KEY,
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS reminders (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id  INTEGER NOT NULL,
    task_id     TEXT NOT NULL,
    task_name   TEXT NOT NULL,
    lead_hours  INTEGER NOT NULL CHECK (lead_hours >= 0),
    frequency   INTEGER NOT NULL CHECK (frequency >= 0),
    channel     TEXT NOT NULL CHECK (channel IN ('email', 'whatsapp')),
    destination TEXT NOT NULL,
    active      INTEGER NOT NULL DEFAULT 1,
    created_at  INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_reminders_task ON reminders(task_id);
CREATE TABLE IF NOT EXISTS attempt_logs (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    reminder_id INTEGER NOT NULL,
    channel     TEXT NOT NULL,
    destination TEXT NOT NULL,
    status      TEXT NOT NULL CHECK (status IN ('sent', 'failed')),
    sent_at     INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_attempt_logs_reminder ON attempt_logs(reminder_id, status, sent_at);
";

const JOINED_SELECT: &str = "
SELECT r.id, r.student_id, r.task_id, r.task_name, r.lead_hours, r.frequency,
       r.channel, r.destination, r.active, r.created_at,
       COALESCE(s.name, 'Student'), t.course_name, t.due_at, t.status
FROM reminders r
JOIN tasks t ON r.task_id = t.id
LEFT JOIN students s ON r.student_id = s.id
";

const HOUR_MS: i64 = 3_600_000;

// ---------------------------------------------------------------------------
// Timestamp helpers
// ---------------------------------------------------------------------------

fn to_ms(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_ms(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| NudgeError::QueryFailed(format!("timestamp out of range: {ms}")))
}

// ---------------------------------------------------------------------------
// Row decoding
// ---------------------------------------------------------------------------

/// Column values as SQLite hands them back, before enum/timestamp decoding.
struct JoinedRow {
    id: ReminderId,
    student_id: i64,
    task_id: String,
    task_name: String,
    lead_hours: u32,
    frequency: u32,
    channel: String,
    destination: String,
    active: bool,
    created_at: i64,
    student_name: String,
    course_name: String,
    due_at: i64,
    task_status: String,
}

impl JoinedRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            student_id: row.get(1)?,
            task_id: row.get(2)?,
            task_name: row.get(3)?,
            lead_hours: row.get(4)?,
            frequency: row.get(5)?,
            channel: row.get(6)?,
            destination: row.get(7)?,
            active: row.get(8)?,
            created_at: row.get(9)?,
            student_name: row.get(10)?,
            course_name: row.get(11)?,
            due_at: row.get(12)?,
            task_status: row.get(13)?,
        })
    }

    fn into_domain(self) -> Result<ReminderWithTask> {
        Ok(ReminderWithTask {
            reminder: Reminder {
                id: self.id,
                student_id: self.student_id,
                task_id: self.task_id,
                task_name: self.task_name,
                lead_hours: self.lead_hours,
                frequency: self.frequency,
                channel: self.channel.parse()?,
                destination: self.destination,
                active: self.active,
                created_at: from_ms(self.created_at)?,
            },
            student_name: self.student_name,
            course_name: self.course_name,
            due_at: from_ms(self.due_at)?,
            task_status: self.task_status.parse()?,
        })
    }
}

/// Decode one joined row. A malformed row yields an error for that row only.
fn decode_joined(row: &Row<'_>) -> Result<ReminderWithTask> {
    let id: ReminderId = row.get(0)?;
    JoinedRow::read(row)
        .map_err(NudgeError::from)
        .and_then(JoinedRow::into_domain)
        .map_err(|e| NudgeError::QueryFailed(format!("reminder {id}: {e}")))
}

// ---------------------------------------------------------------------------
// SqliteConnector
// ---------------------------------------------------------------------------

/// Opens one SQLite connection per cycle against a database file.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    path: PathBuf,
    busy_timeout: StdDuration,
}

impl SqliteConnector {
    /// Open or create the database at `path` and make sure the schema exists.
    pub fn open(path: &Path) -> Result<Self> {
        let conn =
            Connection::open(path).map_err(|e| NudgeError::StoreUnavailable(e.to_string()))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            path: path.to_path_buf(),
            busy_timeout: StdDuration::from_secs(5),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StoreConnector for SqliteConnector {
    type Store = SqliteStore;

    /// Connects without `SQLITE_OPEN_CREATE`: a database that has gone missing
    /// is reported as unavailable rather than silently recreated empty.
    fn connect(&self) -> Result<SqliteStore> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| NudgeError::StoreUnavailable(e.to_string()))?;
        conn.busy_timeout(self.busy_timeout)
            .map_err(|e| NudgeError::StoreUnavailable(e.to_string()))?;
        Ok(SqliteStore { conn })
    }
}

// ---------------------------------------------------------------------------
// SqliteStore
// ---------------------------------------------------------------------------

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Run a joined query. The outer error means the query itself failed;
    /// each inner result is one row, decoded independently.
    fn query_joined(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Result<ReminderWithTask>>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, |row| Ok(decode_joined(row)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // -- administration / seeding --------------------------------------------

    pub fn upsert_task(&self, task: &Task) -> Result<()> {
        self.conn.execute(
            "INSERT INTO tasks (id, name, course_name, due_at, status)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                course_name = excluded.course_name,
                due_at = excluded.due_at,
                status = excluded.status",
            params![
                task.id,
                task.name,
                task.course_name,
                to_ms(task.due_at),
                task.status.as_str()
            ],
        )?;
        Ok(())
    }

    pub fn set_task_status(&self, task_id: &str, status: TaskStatus) -> Result<()> {
        self.conn.execute(
            "UPDATE tasks SET status = ?1 WHERE id = ?2",
            params![status.as_str(), task_id],
        )?;
        Ok(())
    }

    pub fn upsert_student(&self, id: i64, name: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO students (id, name) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
            params![id, name],
        )?;
        Ok(())
    }

    pub fn insert_reminder(
        &self,
        reminder: &NewReminder,
        created_at: DateTime<Utc>,
    ) -> Result<ReminderId> {
        self.conn.execute(
            "INSERT INTO reminders
                (student_id, task_id, task_name, lead_hours, frequency, channel, destination, active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8)",
            params![
                reminder.student_id,
                reminder.task_id,
                reminder.task_name,
                reminder.lead_hours,
                reminder.frequency,
                reminder.channel.as_str(),
                reminder.destination,
                to_ms(created_at)
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Remove every reminder on a task, e.g. when the task itself is deleted.
    pub fn delete_reminders_for_task(&self, task_id: &str) -> Result<usize> {
        let affected = self
            .conn
            .execute("DELETE FROM reminders WHERE task_id = ?1", params![task_id])?;
        Ok(affected)
    }

    pub fn reminder_exists(&self, id: ReminderId) -> Result<bool> {
        let found = self
            .conn
            .query_row("SELECT 1 FROM reminders WHERE id = ?1", params![id], |_| {
                Ok(())
            })
            .optional()?;
        Ok(found.is_some())
    }

    /// Attempt history for one reminder, oldest first.
    pub fn attempt_logs_for(&self, reminder_id: ReminderId) -> Result<Vec<AttemptLog>> {
        let mut stmt = self.conn.prepare(
            "SELECT reminder_id, channel, destination, status, sent_at
             FROM attempt_logs WHERE reminder_id = ?1 ORDER BY sent_at ASC, id ASC",
        )?;
        let raw = stmt
            .query_map(params![reminder_id], |row| {
                Ok((
                    row.get::<_, ReminderId>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        raw.into_iter()
            .map(|(reminder_id, channel, destination, status, sent_at)| {
                Ok(AttemptLog {
                    reminder_id,
                    channel: channel.parse()?,
                    destination,
                    outcome: status.parse()?,
                    sent_at: from_ms(sent_at)?,
                })
            })
            .collect()
    }
}

impl ReminderStore for SqliteStore {
    fn find_candidate_reminders(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<Result<ReminderWithTask>>> {
        let sql = format!(
            "{JOINED_SELECT}
             WHERE r.active = 1
               AND t.status != 'submitted'
               AND t.due_at > ?1
               AND (t.due_at - r.lead_hours * {HOUR_MS}) <= ?2
               AND (t.due_at - r.lead_hours * {HOUR_MS}) > ?3
             ORDER BY (t.due_at - r.lead_hours * {HOUR_MS}) ASC, r.id ASC"
        );
        let now = to_ms(query.now);
        self.query_joined(
            &sql,
            params![
                to_ms(query.now - query.overdue_grace),
                now,
                to_ms(query.now - query.tick_interval)
            ],
        )
    }

    fn count_recent_sent(&self, reminder_id: ReminderId, since: DateTime<Utc>) -> Result<u32> {
        let n = self.conn.query_row(
            "SELECT COUNT(*) FROM attempt_logs
             WHERE reminder_id = ?1 AND status = 'sent' AND sent_at > ?2",
            params![reminder_id, to_ms(since)],
            |row| row.get::<_, u32>(0),
        )?;
        Ok(n)
    }

    fn count_total_sent(&self, reminder_id: ReminderId) -> Result<u32> {
        let n = self.conn.query_row(
            "SELECT COUNT(*) FROM attempt_logs WHERE reminder_id = ?1 AND status = 'sent'",
            params![reminder_id],
            |row| row.get::<_, u32>(0),
        )?;
        Ok(n)
    }

    fn insert_attempt_log(&self, log: &AttemptLog) -> Result<()> {
        self.conn.execute(
            "INSERT INTO attempt_logs (reminder_id, channel, destination, status, sent_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                log.reminder_id,
                log.channel.as_str(),
                log.destination,
                log.outcome.as_str(),
                to_ms(log.sent_at)
            ],
        )?;
        Ok(())
    }

    fn delete_reminders_where(&self, predicate: Obsolete) -> Result<usize> {
        let affected = match predicate {
            Obsolete::TaskSubmitted => self.conn.execute(
                "DELETE FROM reminders
                 WHERE task_id IN (SELECT id FROM tasks WHERE status = 'submitted')",
                [],
            )?,
            Obsolete::OverdueBeyond { now, grace } => self.conn.execute(
                "DELETE FROM reminders
                 WHERE task_id IN (
                    SELECT id FROM tasks WHERE due_at < ?1 AND status != 'submitted'
                 )",
                params![to_ms(now - grace)],
            )?,
            Obsolete::BudgetExhausted => self.conn.execute(
                "DELETE FROM reminders
                 WHERE frequency <= (
                    SELECT COUNT(*) FROM attempt_logs l
                    WHERE l.reminder_id = reminders.id AND l.status = 'sent'
                 )",
                [],
            )?,
        };
        Ok(affected)
    }

    fn delete_orphaned_logs(&self) -> Result<usize> {
        let affected = self.conn.execute(
            "DELETE FROM attempt_logs WHERE reminder_id NOT IN (SELECT id FROM reminders)",
            [],
        )?;
        Ok(affected)
    }

    fn upcoming_reminders(
        &self,
        now: DateTime<Utc>,
        horizon: Duration,
    ) -> Result<Vec<ReminderWithTask>> {
        let sql = format!(
            "{JOINED_SELECT}
             WHERE r.active = 1
               AND t.status != 'submitted'
               AND (t.due_at - r.lead_hours * {HOUR_MS}) > ?1
               AND (t.due_at - r.lead_hours * {HOUR_MS}) <= ?2
             ORDER BY (t.due_at - r.lead_hours * {HOUR_MS}) ASC, r.id ASC"
        );
        let rows = self.query_joined(&sql, params![to_ms(now), to_ms(now + horizon)])?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                row.map_err(|e| tracing::warn!("skipping unreadable reminder: {e}"))
                    .ok()
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
