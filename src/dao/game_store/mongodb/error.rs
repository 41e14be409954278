use mongodb::error::Error as MongoError;
use thiserror::Error;

use crate::dao::storage::StorageError;

/// Result alias for MongoDB DAO operations.
pub type MongoResult<T> = Result<T, MongoDaoError>;

/// Errors raised by the MongoDB backend.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// The connection URI could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// The offending URI.
        uri: String,
        #[source]
        /// Driver-level cause.
        source: MongoError,
    },
    /// The driver client could not be constructed from the parsed options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        /// Driver-level cause.
        source: MongoError,
    },
    /// The initial ping never succeeded within the retry budget.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// How many pings were attempted.
        attempts: u32,
        #[source]
        /// Driver-level cause.
        source: MongoError,
    },
    /// A health-check ping failed on an established connection.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        /// Driver-level cause.
        source: MongoError,
    },
    /// An index could not be created at startup.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Collection the index belongs to.
        collection: &'static str,
        /// Index name.
        index: &'static str,
        #[source]
        /// Driver-level cause.
        source: MongoError,
    },
    /// A write against a collection failed.
    #[error("MongoDB write failed on collection `{collection}`")]
    Write {
        /// Collection the write targeted.
        collection: &'static str,
        #[source]
        /// Driver-level cause.
        source: MongoError,
    },
    /// A read against a collection failed.
    #[error("MongoDB read failed on collection `{collection}`")]
    Read {
        /// Collection the read targeted.
        collection: &'static str,
        #[source]
        /// Driver-level cause.
        source: MongoError,
    },
    /// A uniqueness index rejected the write.
    #[error("MongoDB uniqueness violation on collection `{collection}`")]
    Duplicate {
        /// Collection the write targeted.
        collection: &'static str,
    },
}

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::Duplicate { collection } => {
                StorageError::conflict(format!("uniqueness violation on `{collection}`"))
            }
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
