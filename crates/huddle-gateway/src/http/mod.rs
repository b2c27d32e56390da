pub mod health;

pub use health::{build_router, HealthState};
