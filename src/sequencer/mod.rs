// Sequencer module - Musical clock and step scheduling

pub mod scheduler;
pub mod transport;

pub use scheduler::{
    SchedulerStats, SchedulingMiss, StepScheduler, Trigger, TriggerSink, plan_loop,
    step_for_position, triggers_for_step,
};
pub use transport::{Clock, Tick, Transport, TransportState};
