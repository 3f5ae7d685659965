//! DuckDB record store for RTI requests.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duckdb::{Connection, OptionalExt, Row, params};
use rti_core::{
    AttachmentMeta, NewAttachment, NewRequest, RtiRequest, RtiSummary, Status, StoredAttachment,
};
use tracing::{debug, info};

use crate::StoreError;
use crate::attachment::{AttachmentStore, check_handle, new_handle};

const SCHEMA: &str = "
    CREATE SEQUENCE IF NOT EXISTS rti_id_seq START 1;
    CREATE TABLE IF NOT EXISTS rti_requests (
        id BIGINT PRIMARY KEY,
        citizen_address VARCHAR NOT NULL,
        title VARCHAR NOT NULL,
        description VARCHAR NOT NULL,
        file_handle VARCHAR,
        file_name VARCHAR,
        file_type VARCHAR,
        bounty DOUBLE NOT NULL,
        deadline BIGINT NOT NULL,
        status VARCHAR NOT NULL DEFAULT 'Pending',
        response_text VARCHAR,
        officer_address VARCHAR,
        rejection_reason VARCHAR,
        created_at BIGINT NOT NULL,
        blockchain_id BIGINT,
        chain_synced BOOLEAN NOT NULL DEFAULT TRUE,
        sync_error VARCHAR
    );
    CREATE TABLE IF NOT EXISTS rti_attachments (
        handle VARCHAR PRIMARY KEY,
        file_name VARCHAR NOT NULL,
        content_type VARCHAR NOT NULL,
        data BLOB NOT NULL
    );
";

const REQUEST_COLUMNS: &str = "id, citizen_address, title, description, file_handle, file_name, \
     file_type, bounty, deadline, status, response_text, officer_address, rejection_reason, \
     created_at, blockchain_id, chain_synced, sync_error";

/// DuckDB store for RTI request rows.
///
/// Supports both in-memory (ephemeral) and persistent (file-backed) modes.
/// The store itself only owns the root connection; all row operations go
/// through a [`Session`] obtained per request with [`session`](Self::session).
pub struct RtiStore {
    conn: Mutex<Connection>,
}

impl RtiStore {
    /// Open an in-memory DuckDB database with the schema created.
    pub fn open() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Open or create a persistent DuckDB database at the given path.
    ///
    /// Schema creation is idempotent, so reopening an existing file keeps its rows.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let store = Self::init(Connection::open(path)?)?;
        info!(path = %path.display(), "opened rti store");
        Ok(store)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// A fresh connection to the same database, scoped to one unit of work.
    pub fn session(&self) -> Result<Session, StoreError> {
        let root = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(Session {
            conn: root.try_clone()?,
        })
    }

    /// Attachment storage backed by the `rti_attachments` table of this database.
    pub fn blob_attachments(&self) -> Result<BlobAttachments, StoreError> {
        let session = self.session()?;
        Ok(BlobAttachments {
            conn: Mutex::new(session.conn),
        })
    }
}

/// Field changes for [`Session::update`]. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RtiUpdate {
    pub status: Option<Status>,
    pub response_text: Option<String>,
    pub officer_address: Option<String>,
    pub rejection_reason: Option<String>,
}

impl RtiUpdate {
    pub fn status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// One connection's view of the store. Each statement auto-commits.
pub struct Session {
    conn: Connection,
}

impl Session {
    /// Insert a new Pending request submitted at `now` and return the stored row.
    pub fn insert(
        &self,
        request: &NewRequest,
        attachment: Option<&AttachmentMeta>,
        now: DateTime<Utc>,
    ) -> Result<RtiRequest, StoreError> {
        // Whole seconds, so the returned record matches what a later read sees.
        let created_at = from_epoch(0, now.timestamp())?;
        let deadline = request.deadline_from(created_at);
        let id: i64 = self
            .conn
            .query_row("SELECT nextval('rti_id_seq')::BIGINT", [], |row| row.get(0))?;

        self.conn.execute(
            "INSERT INTO rti_requests (id, citizen_address, title, description, file_handle, \
             file_name, file_type, bounty, deadline, status, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                id,
                request.citizen_address,
                request.title,
                request.description,
                attachment.map(|a| a.handle.as_str()),
                attachment.map(|a| a.file_name.as_str()),
                attachment.map(|a| a.content_type.as_str()),
                request.bounty,
                deadline.timestamp(),
                Status::Pending.as_str(),
                created_at.timestamp(),
            ],
        )?;
        debug!(id, "inserted rti request");

        Ok(RtiRequest {
            id,
            citizen_address: request.citizen_address.clone(),
            title: request.title.clone(),
            description: request.description.clone(),
            attachment: attachment.cloned(),
            bounty: request.bounty,
            deadline,
            status: Status::Pending,
            response_text: None,
            officer_address: None,
            rejection_reason: None,
            created_at,
            blockchain_id: None,
            chain_synced: true,
            sync_error: None,
        })
    }

    pub fn get(&self, id: i64) -> Result<Option<RtiRequest>, StoreError> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM rti_requests WHERE id = ?");
        let raw = self.conn.query_row(&sql, [id], RawRow::read).optional()?;
        raw.map(RawRow::into_request).transpose()
    }

    /// Like [`get`](Self::get), but a missing row is [`StoreError::NotFound`].
    pub fn require(&self, id: i64) -> Result<RtiRequest, StoreError> {
        self.get(id)?.ok_or(StoreError::NotFound(id))
    }

    /// Every request in id order.
    pub fn all(&self) -> Result<Vec<RtiRequest>, StoreError> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM rti_requests ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], RawRow::read)?;
        let mut out = Vec::new();
        for raw in rows {
            out.push(raw?.into_request()?);
        }
        Ok(out)
    }

    /// Summaries of every request in id order.
    pub fn list(&self) -> Result<Vec<RtiSummary>, StoreError> {
        Ok(self.all()?.iter().map(RtiSummary::from).collect())
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT count(*)::BIGINT FROM rti_requests", [], |row| {
                row.get(0)
            })?;
        Ok(n as usize)
    }

    /// Apply field changes. Last write wins; no version check is made.
    pub fn update(&self, id: i64, changes: &RtiUpdate) -> Result<(), StoreError> {
        let affected = self.conn.execute(
            "UPDATE rti_requests SET \
             status = COALESCE(?, status), \
             response_text = COALESCE(?, response_text), \
             officer_address = COALESCE(?, officer_address), \
             rejection_reason = COALESCE(?, rejection_reason) \
             WHERE id = ?",
            params![
                changes.status.map(Status::as_str),
                changes.response_text,
                changes.officer_address,
                changes.rejection_reason,
                id,
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound(id));
        }
        debug!(id, ?changes, "updated rti request");
        Ok(())
    }

    /// Record the contract-assigned id. Refused once a value is present.
    pub fn set_blockchain_id(&self, id: i64, blockchain_id: u64) -> Result<(), StoreError> {
        let value = i64::try_from(blockchain_id).map_err(|_| StoreError::Corrupt {
            id,
            reason: format!("blockchain id {blockchain_id} out of range"),
        })?;
        let affected = self.conn.execute(
            "UPDATE rti_requests SET blockchain_id = ? WHERE id = ? AND blockchain_id IS NULL",
            params![value, id],
        )?;
        if affected == 0 {
            self.require(id)?;
            return Err(StoreError::BlockchainIdAlreadySet(id));
        }
        Ok(())
    }

    /// Flag a request whose local state was kept although the chain call failed.
    pub fn mark_unsynced(&self, id: i64, error: &str) -> Result<(), StoreError> {
        self.set_sync_state(id, false, Some(error))
    }

    pub fn mark_synced(&self, id: i64) -> Result<(), StoreError> {
        self.set_sync_state(id, true, None)
    }

    fn set_sync_state(&self, id: i64, synced: bool, error: Option<&str>) -> Result<(), StoreError> {
        let affected = self.conn.execute(
            "UPDATE rti_requests SET chain_synced = ?, sync_error = ? WHERE id = ?",
            params![synced, error, id],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    /// Remove a row. Only used to undo a create whose chain call failed.
    pub fn delete(&self, id: i64) -> Result<(), StoreError> {
        let affected = self
            .conn
            .execute("DELETE FROM rti_requests WHERE id = ?", [id])?;
        if affected == 0 {
            return Err(StoreError::NotFound(id));
        }
        debug!(id, "deleted rti request");
        Ok(())
    }
}

/// Column values as read, before status and timestamp conversion.
struct RawRow {
    id: i64,
    citizen_address: String,
    title: String,
    description: String,
    file_handle: Option<String>,
    file_name: Option<String>,
    file_type: Option<String>,
    bounty: f64,
    deadline: i64,
    status: String,
    response_text: Option<String>,
    officer_address: Option<String>,
    rejection_reason: Option<String>,
    created_at: i64,
    blockchain_id: Option<i64>,
    chain_synced: bool,
    sync_error: Option<String>,
}

impl RawRow {
    fn read(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            citizen_address: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            file_handle: row.get(4)?,
            file_name: row.get(5)?,
            file_type: row.get(6)?,
            bounty: row.get(7)?,
            deadline: row.get(8)?,
            status: row.get(9)?,
            response_text: row.get(10)?,
            officer_address: row.get(11)?,
            rejection_reason: row.get(12)?,
            created_at: row.get(13)?,
            blockchain_id: row.get(14)?,
            chain_synced: row.get(15)?,
            sync_error: row.get(16)?,
        })
    }

    fn into_request(self) -> Result<RtiRequest, StoreError> {
        let id = self.id;
        let status: Status = self.status.parse().map_err(|_| StoreError::Corrupt {
            id,
            reason: format!("unknown status {:?}", self.status),
        })?;
        let blockchain_id = self
            .blockchain_id
            .map(|v| {
                u64::try_from(v).map_err(|_| StoreError::Corrupt {
                    id,
                    reason: format!("negative blockchain id {v}"),
                })
            })
            .transpose()?;
        let attachment = self.file_handle.map(|handle| AttachmentMeta {
            handle,
            file_name: self.file_name.unwrap_or_default(),
            content_type: self.file_type.unwrap_or_default(),
        });

        Ok(RtiRequest {
            id,
            citizen_address: self.citizen_address,
            title: self.title,
            description: self.description,
            attachment,
            bounty: self.bounty,
            deadline: from_epoch(id, self.deadline)?,
            status,
            response_text: self.response_text,
            officer_address: self.officer_address,
            rejection_reason: self.rejection_reason,
            created_at: from_epoch(id, self.created_at)?,
            blockchain_id,
            chain_synced: self.chain_synced,
            sync_error: self.sync_error,
        })
    }
}

fn from_epoch(id: i64, secs: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| StoreError::Corrupt {
        id,
        reason: format!("timestamp {secs} out of range"),
    })
}

/// Attachment bytes kept in the `rti_attachments` table.
///
/// Each call clones its own connection and runs on the blocking pool, so one
/// large upload never holds a lock other requests wait on.
pub struct BlobAttachments {
    conn: Mutex<Connection>,
}

impl BlobAttachments {
    async fn with_conn<T, F>(&self, work: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = {
            let root = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
            root.try_clone()?
        };
        tokio::task::spawn_blocking(move || work(&conn)).await?
    }
}

#[async_trait]
impl AttachmentStore for BlobAttachments {
    async fn put(&self, file: NewAttachment) -> Result<AttachmentMeta, StoreError> {
        let meta = AttachmentMeta {
            handle: new_handle(None),
            file_name: file.file_name,
            content_type: file.content_type,
        };
        let row = meta.clone();
        let bytes = file.data.len();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO rti_attachments (handle, file_name, content_type, data) VALUES (?, ?, ?, ?)",
                params![row.handle, row.file_name, row.content_type, file.data],
            )?;
            Ok(())
        })
        .await?;
        debug!(handle = %meta.handle, bytes, "stored blob attachment");
        Ok(meta)
    }

    async fn get(&self, handle: &str) -> Result<Option<StoredAttachment>, StoreError> {
        check_handle(handle)?;
        let handle = handle.to_string();
        self.with_conn(move |conn| {
            let found = conn
                .query_row(
                    "SELECT file_name, content_type, data FROM rti_attachments WHERE handle = ?",
                    [handle.as_str()],
                    |row| {
                        Ok(StoredAttachment {
                            meta: AttachmentMeta {
                                handle: handle.clone(),
                                file_name: row.get(0)?,
                                content_type: row.get(1)?,
                            },
                            data: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(found)
        })
        .await
    }

    async fn remove(&self, handle: &str) -> Result<(), StoreError> {
        check_handle(handle)?;
        let handle = handle.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM rti_attachments WHERE handle = ?", [handle.as_str()])?;
            Ok(())
        })
        .await
    }

    fn backend(&self) -> &'static str {
        "blob"
    }
}
