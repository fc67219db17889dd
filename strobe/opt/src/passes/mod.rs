//! Passes for the strobe compiler.
mod add_triggers;
mod alias_resolve;
mod create_events;
mod force_lower;
mod fork_lower;
mod intra_assign_delay;
mod mark_dynamic;
mod randomize_lower;
mod region_schedule;
mod sel_opt;
mod virt_iface_trigger;

pub use add_triggers::AddTriggers;
pub use alias_resolve::AliasResolve;
pub use create_events::{CreateEvents, EdgeEvents};
pub use force_lower::ForceLower;
pub use fork_lower::{ForkLower, JOIN_CLASS};
pub use intra_assign_delay::IntraAssignDelay;
pub use mark_dynamic::MarkDynamic;
pub use randomize_lower::{RandomizeLower, RANDOMIZE, RELAX_NEXT};
pub use region_schedule::RegionSchedule;
pub use sel_opt::SelOpt;
pub use virt_iface_trigger::{is_virt_iface, reads_virt_iface, VirtIfaceTrigger};
