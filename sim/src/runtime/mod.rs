//! Runtime support shared by the region loops and the interpreter: trigger
//! vectors, event dispatch, the timing wheel, process handles, and
//! semaphores.
mod delay;
mod events;
mod process;
mod semaphore;
mod triggers;

pub use delay::DelayedQueue;
pub use events::EventDispatcher;
pub use process::{ProcessTable, status};
pub use semaphore::Semaphore;
pub use triggers::TriggerVec;

/// Identifier of a coroutine. Process handles store it offset by one so
/// that zero stays the null handle.
pub type CoroutineId = usize;

/// Why a suspended coroutine was put back on the ready queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeReason {
    /// First activation.
    Start,
    /// Its delay expired.
    Delay,
    /// An event it waited on fired.
    Event,
    /// A semaphore granted its keys.
    Semaphore,
    /// A process it awaited finished or was killed.
    ProcessDone,
}
