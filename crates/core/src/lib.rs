pub mod amount;
pub mod mapping;
pub mod period;
pub mod store;
pub mod transaction;

pub use amount::Amount;
pub use mapping::{BankProfile, CanonicalField, ColumnMapping};
pub use period::DateRange;
pub use store::{
    MemoryProfileStore, ProfileStore, SinkError, SinkReceipt, StoreError, TransactionSink,
};
pub use transaction::{
    parse_final_date, CandidateRecord, RowRejection, TransactionKind, TransactionRecord,
};
