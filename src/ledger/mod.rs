//! Ledger module
//!
//! The transfer engine and the account number allocator. This is the only
//! code in the crate allowed to mutate balances or append to the
//! transaction log.

mod allocator;
mod engine;

pub use allocator::AccountNumberAllocator;
pub use engine::{AirtimeReceipt, LedgerEngine, OpenAccount, TransferReceipt};
