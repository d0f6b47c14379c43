mod eviction;
mod replenisher;
mod scheduler;

pub use eviction::Evictor;
pub use replenisher::Replenisher;
pub use scheduler::{ReplenishScheduler, Trigger};
