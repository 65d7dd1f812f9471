pub mod ledger;
pub mod member_store;

pub use ledger::{create_shared_ledger, SharedLedger, TransactionLedger};
pub use member_store::{
    create_shared_member_store, MemberRecord, MemberStatus, MemberStore, SharedMemberStore,
};
