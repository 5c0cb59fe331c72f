pub mod catalog;
pub mod ledger;
pub mod parent;
pub mod token;
