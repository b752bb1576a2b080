//! # Request Repository
//!
//! Persistence boundary for lending requests. Snapshots are stored as
//! serialized JSON and every load re-validates the snapshot's structural
//! invariants, so a corrupted row surfaces as an error instead of driving
//! the state machine from an impossible state.
//!
//! Writes use optimistic concurrency: `save` takes the version returned by
//! the preceding `load` and fails with `VersionConflict` if another writer
//! got there first. Within one process the service's per-request lock makes
//! conflicts impossible; the version check guards against writers the lock
//! cannot see.

use std::collections::HashMap;

use parking_lot::RwLock;
use thiserror::Error;

use ethlend_core::{RequestId, TransferHandle, UserId};
use ethlend_state::LendingRequest;

/// A loaded value and the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: u64,
}

/// Errors from the persistence boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("{id} not found")]
    NotFound { id: RequestId },

    #[error("{id} already exists")]
    AlreadyExists { id: RequestId },

    #[error("{id} was modified concurrently: expected version {expected}, found {actual}")]
    VersionConflict {
        id: RequestId,
        expected: u64,
        actual: u64,
    },

    #[error("corrupt snapshot for {id}: {reason}")]
    Corrupt { id: RequestId, reason: String },

    #[error("cannot serialize {id}: {reason}")]
    Serialization { id: RequestId, reason: String },
}

/// Storage contract for lending requests.
pub trait RequestRepository: Send + Sync {
    /// Store a new request at version 1.
    fn insert(&self, request: &LendingRequest) -> Result<u64, RepositoryError>;

    /// Load and validate a request.
    fn load(&self, id: RequestId) -> Result<Versioned<LendingRequest>, RepositoryError>;

    /// Overwrite a request. Returns the new version.
    fn save(&self, request: &LendingRequest, expected_version: u64) -> Result<u64, RepositoryError>;

    /// Whether an ID is taken.
    fn contains(&self, id: RequestId) -> bool;

    /// Number of stored requests.
    fn count(&self) -> usize;

    /// A borrower's requests, oldest first.
    fn ids_for_borrower(&self, borrower: UserId) -> Vec<RequestId>;

    /// All requests, oldest first.
    fn all_ids(&self) -> Vec<RequestId>;

    /// The request that submitted a transfer.
    fn find_by_transfer(&self, handle: TransferHandle) -> Option<RequestId>;
}

// ── In-memory implementation ─────────────────────────────────────────

#[derive(Debug)]
struct Row {
    snapshot: String,
    version: u64,
    borrower: UserId,
}

#[derive(Debug, Default)]
struct Tables {
    rows: HashMap<RequestId, Row>,
    order: Vec<RequestId>,
    transfers: HashMap<TransferHandle, RequestId>,
}

/// Repository held in process memory.
///
/// Stores JSON rather than live values so that loads exercise the same
/// decode-and-validate path as a database-backed repository.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a stored snapshot with raw JSON, bypassing validation.
    ///
    /// For operational repair and corruption tests.
    pub fn overwrite_raw(&self, id: RequestId, snapshot: impl Into<String>) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write();
        let row = tables.rows.get_mut(&id).ok_or(RepositoryError::NotFound { id })?;
        row.snapshot = snapshot.into();
        row.version += 1;
        Ok(())
    }

    fn encode(request: &LendingRequest) -> Result<String, RepositoryError> {
        serde_json::to_string(request).map_err(|e| RepositoryError::Serialization {
            id: request.id(),
            reason: e.to_string(),
        })
    }
}

fn index_transfers(tables: &mut Tables, request: &LendingRequest) {
    for tracked in request.transfers() {
        tables.transfers.insert(tracked.handle, request.id());
    }
}

impl RequestRepository for InMemoryRepository {
    fn insert(&self, request: &LendingRequest) -> Result<u64, RepositoryError> {
        let snapshot = Self::encode(request)?;
        let id = request.id();
        let mut tables = self.tables.write();
        if tables.rows.contains_key(&id) {
            return Err(RepositoryError::AlreadyExists { id });
        }
        tables.rows.insert(
            id,
            Row {
                snapshot,
                version: 1,
                borrower: request.borrower_id(),
            },
        );
        tables.order.push(id);
        index_transfers(&mut tables, request);
        Ok(1)
    }

    fn load(&self, id: RequestId) -> Result<Versioned<LendingRequest>, RepositoryError> {
        let (snapshot, version) = {
            let tables = self.tables.read();
            let row = tables.rows.get(&id).ok_or(RepositoryError::NotFound { id })?;
            (row.snapshot.clone(), row.version)
        };
        let request: LendingRequest =
            serde_json::from_str(&snapshot).map_err(|e| RepositoryError::Corrupt {
                id,
                reason: e.to_string(),
            })?;
        if request.id() != id {
            return Err(RepositoryError::Corrupt {
                id,
                reason: format!("snapshot belongs to {}", request.id()),
            });
        }
        request.validate().map_err(|e| RepositoryError::Corrupt {
            id,
            reason: e.to_string(),
        })?;
        Ok(Versioned {
            value: request,
            version,
        })
    }

    fn save(&self, request: &LendingRequest, expected_version: u64) -> Result<u64, RepositoryError> {
        let snapshot = Self::encode(request)?;
        let id = request.id();
        let mut tables = self.tables.write();
        let row = tables.rows.get_mut(&id).ok_or(RepositoryError::NotFound { id })?;
        if row.version != expected_version {
            return Err(RepositoryError::VersionConflict {
                id,
                expected: expected_version,
                actual: row.version,
            });
        }
        row.snapshot = snapshot;
        row.version += 1;
        let version = row.version;
        index_transfers(&mut tables, request);
        Ok(version)
    }

    fn contains(&self, id: RequestId) -> bool {
        self.tables.read().rows.contains_key(&id)
    }

    fn count(&self) -> usize {
        self.tables.read().order.len()
    }

    fn ids_for_borrower(&self, borrower: UserId) -> Vec<RequestId> {
        let tables = self.tables.read();
        tables
            .order
            .iter()
            .filter(|id| tables.rows.get(*id).is_some_and(|row| row.borrower == borrower))
            .copied()
            .collect()
    }

    fn all_ids(&self) -> Vec<RequestId> {
        self.tables.read().order.clone()
    }

    fn find_by_transfer(&self, handle: TransferHandle) -> Option<RequestId> {
        self.tables.read().transfers.get(&handle).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethlend_core::{Address, Timestamp};

    fn request(id: u64, borrower: u64) -> LendingRequest {
        LendingRequest::open(
            RequestId::from_raw(id),
            UserId::from_raw(borrower),
            Address::parse("0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee").unwrap(),
            0,
            Timestamp::parse("2026-05-01T09:00:00Z").unwrap(),
        )
        .0
    }

    #[test]
    fn insert_then_load() {
        let repo = InMemoryRepository::new();
        let r = request(1, 10);
        assert_eq!(repo.insert(&r).unwrap(), 1);
        let loaded = repo.load(r.id()).unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.value, r);
        assert!(repo.contains(r.id()));
    }

    #[test]
    fn duplicate_insert_rejected() {
        let repo = InMemoryRepository::new();
        repo.insert(&request(1, 10)).unwrap();
        assert_eq!(
            repo.insert(&request(1, 11)),
            Err(RepositoryError::AlreadyExists {
                id: RequestId::from_raw(1)
            })
        );
    }

    #[test]
    fn stale_save_rejected() {
        let repo = InMemoryRepository::new();
        let r = request(1, 10);
        repo.insert(&r).unwrap();
        assert_eq!(repo.save(&r, 1).unwrap(), 2);
        assert_eq!(
            repo.save(&r, 1),
            Err(RepositoryError::VersionConflict {
                id: r.id(),
                expected: 1,
                actual: 2,
            })
        );
    }

    #[test]
    fn missing_request() {
        let repo = InMemoryRepository::new();
        assert!(matches!(
            repo.load(RequestId::from_raw(5)),
            Err(RepositoryError::NotFound { .. })
        ));
        assert!(matches!(
            repo.save(&request(5, 1), 1),
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[test]
    fn registry_queries_keep_creation_order() {
        let repo = InMemoryRepository::new();
        for (id, borrower) in [(30, 1), (10, 2), (20, 1)] {
            repo.insert(&request(id, borrower)).unwrap();
        }
        assert_eq!(repo.count(), 3);
        assert_eq!(
            repo.all_ids(),
            vec![
                RequestId::from_raw(30),
                RequestId::from_raw(10),
                RequestId::from_raw(20)
            ]
        );
        assert_eq!(
            repo.ids_for_borrower(UserId::from_raw(1)),
            vec![RequestId::from_raw(30), RequestId::from_raw(20)]
        );
        assert!(repo.ids_for_borrower(UserId::from_raw(9)).is_empty());
    }

    #[test]
    fn garbage_snapshot_is_corrupt() {
        let repo = InMemoryRepository::new();
        let r = request(1, 10);
        repo.insert(&r).unwrap();
        repo.overwrite_raw(r.id(), "{not json").unwrap();
        assert!(matches!(repo.load(r.id()), Err(RepositoryError::Corrupt { .. })));
    }

    #[test]
    fn out_of_range_state_code_is_corrupt() {
        let repo = InMemoryRepository::new();
        let r = request(1, 10);
        repo.insert(&r).unwrap();
        let mut json = serde_json::to_value(&r).unwrap();
        json["state"] = serde_json::json!(9);
        repo.overwrite_raw(r.id(), json.to_string()).unwrap();
        assert!(matches!(repo.load(r.id()), Err(RepositoryError::Corrupt { .. })));
    }

    #[test]
    fn inconsistent_snapshot_is_corrupt() {
        let repo = InMemoryRepository::new();
        let r = request(1, 10);
        repo.insert(&r).unwrap();
        let mut json = serde_json::to_value(&r).unwrap();
        // Finished without terms or lender.
        json["state"] = serde_json::json!(6);
        repo.overwrite_raw(r.id(), json.to_string()).unwrap();
        let err = repo.load(r.id()).unwrap_err();
        assert!(matches!(err, RepositoryError::Corrupt { ref reason, .. } if reason.contains("terms missing")));
    }

    #[test]
    fn snapshot_under_wrong_key_is_corrupt() {
        let repo = InMemoryRepository::new();
        repo.insert(&request(1, 10)).unwrap();
        let other = serde_json::to_string(&request(2, 10)).unwrap();
        repo.overwrite_raw(RequestId::from_raw(1), other).unwrap();
        assert!(matches!(
            repo.load(RequestId::from_raw(1)),
            Err(RepositoryError::Corrupt { .. })
        ));
    }
}
