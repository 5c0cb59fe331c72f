pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{
    AchievementStore, BadgeStore, LedgerStore, LogStore, ProfileStore, ScheduleStore, SharedStore,
    Store, StoreError,
};
