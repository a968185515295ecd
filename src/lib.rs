pub mod actions;
pub mod agent;
pub mod brain;
pub mod config;
pub mod events;
pub mod face;
pub mod hands;
pub mod memory;
pub mod registry;
pub mod types;

pub use agent::{Agent, LoopConfig};
pub use types::{Action, Event, Step, Task, TaskStatus};
