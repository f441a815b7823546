pub mod cost;
pub mod downtime;
pub mod scheduler;
pub mod sla;
pub mod state;
pub mod store;
