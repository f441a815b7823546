pub mod cost;
pub mod event;
pub mod sla;
