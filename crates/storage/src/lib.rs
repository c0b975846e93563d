pub mod db;
pub mod store;

pub use db::{
    count_transactions, create_db, get_setting, get_transactions, insert_transactions,
    put_setting, DbPool,
};
pub use store::{SqliteProfileStore, SqliteTransactionSink, PROFILES_KEY};
