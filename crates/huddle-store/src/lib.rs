pub mod db;
pub mod error;
pub mod snapshot;
pub mod store;
pub mod types;

pub use error::StoreError;
pub use store::Store;
