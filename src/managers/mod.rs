pub mod broadcast_manager;
pub mod escalation_monitor;

pub use broadcast_manager::{create_shared_broadcast_manager, SharedBroadcastManager};
pub use escalation_monitor::EscalationMonitor;
