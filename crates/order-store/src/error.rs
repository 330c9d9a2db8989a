use thiserror::Error;

/// A single repository operation, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Begin,
    InsertOrder,
    InsertShippingRecord,
    InsertPrintJob,
    ListCartItems,
    InsertAssetFile,
    Commit,
    Rollback,
    /// Read-side lookups outside an order run.
    Read,
}

impl Operation {
    /// Returns a short name for logs and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Begin => "begin transaction",
            Operation::InsertOrder => "insert order",
            Operation::InsertShippingRecord => "insert shipping record",
            Operation::InsertPrintJob => "insert print job",
            Operation::ListCartItems => "list cart items",
            Operation::InsertAssetFile => "insert asset file",
            Operation::Commit => "commit transaction",
            Operation::Rollback => "roll back transaction",
            Operation::Read => "read",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database rejected or failed a statement.
    #[error("Database error during {operation}: {source}")]
    Database {
        operation: Operation,
        #[source]
        source: sqlx::Error,
    },

    /// The store could not be reached. Raised by the in-memory store when a
    /// failure has been injected for the operation.
    #[error("Store unavailable during {operation}: {message}")]
    Unavailable {
        operation: Operation,
        message: String,
    },

    /// A row violated a constraint or could not be read back.
    #[error("Integrity error during {operation}: {message}")]
    Integrity {
        operation: Operation,
        message: String,
    },

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Labels a sqlx error. Constraint violations become `Integrity`.
    pub(crate) fn database(operation: Operation) -> impl FnOnce(sqlx::Error) -> StoreError {
        move |source| {
            let violation = source
                .as_database_error()
                .filter(|db| {
                    db.is_foreign_key_violation()
                        || db.is_unique_violation()
                        || db.is_check_violation()
                })
                .map(|db| db.message().to_string());

            match violation {
                Some(message) => StoreError::Integrity { operation, message },
                None => StoreError::Database { operation, source },
            }
        }
    }

    pub(crate) fn integrity(operation: Operation, message: impl Into<String>) -> StoreError {
        StoreError::Integrity {
            operation,
            message: message.into(),
        }
    }

    /// Returns the operation that failed, if the error is tied to one.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            StoreError::Database { operation, .. }
            | StoreError::Unavailable { operation, .. }
            | StoreError::Integrity { operation, .. } => Some(*operation),
            StoreError::Migration(_) => None,
        }
    }

    /// Returns true for constraint and read-back failures.
    pub fn is_integrity(&self) -> bool {
        matches!(self, StoreError::Integrity { .. })
    }
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
