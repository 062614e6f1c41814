pub mod resilience;

pub use resilience::{
    cancellable, sleep_cancellable, with_deadline, Cancelled, FallbackChain, FallbackSuccess,
    PollSchedule, ResilienceError, ResilienceResult, TimeoutError,
};
