pub mod paths;
pub mod store;

pub use store::{
    CACHE_MAX_AGE_DAYS, CacheStatus, CacheStatusEntry, CacheStore, StoreError, pin_string_columns,
};
