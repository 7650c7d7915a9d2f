use sea_orm::{DbErr, RuntimeErr};
use thiserror::Error;

const SQLITE_UNIQUE_CONSTRAINT_FAILED_CODE: &str = "2067";
const POSTGRES_UNIQUE_CONSTRAINT_FAILED_CODE: &str = "23505";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("database error: {0}")]
    Db(DbErr),

    #[error("serialization error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("constraint error: violated unique constraint")]
    DuplicateRecord,

    #[error("record not found")]
    NotFound,
}

impl From<DbErr> for DatabaseError {
    fn from(value: DbErr) -> Self {
        if is_duplicate_record_error(&value) {
            DatabaseError::DuplicateRecord
        } else {
            DatabaseError::Db(value)
        }
    }
}

fn is_duplicate_record_error(db_err: &DbErr) -> bool {
    let DbErr::Exec(RuntimeErr::SqlxError(e)) = db_err else {
        return false;
    };
    let Some(inner) = e.as_database_error() else {
        return false;
    };
    match inner.code() {
        | Some(code) => {
            code == SQLITE_UNIQUE_CONSTRAINT_FAILED_CODE
                || code == POSTGRES_UNIQUE_CONSTRAINT_FAILED_CODE
        }
        | None => false,
    }
}
