//! Order-side building blocks: the tracker contract, the token-bucket rate
//! limiter, the operation timeout tracker, and the compile-time policy
//! bundles the venue executors compose over.

mod error;
mod executor;
mod policies;
mod rate_limit;
mod timeout;
mod tracker;

pub use error::ExecError;
pub use executor::OrderExecutor;
pub use policies::{ExecutorPolicies, FullPolicies, NoPolicies, NoTimeouts, TimeoutTracking, WithTimeouts};
pub use rate_limit::{
    ActiveRateLimit, NoRateLimit, RateLimitCallback, RateLimitConfig, RateLimitMode,
    RateLimitPolicy, TokenBucket,
};
pub use timeout::{OrderTimeoutConfig, TimeoutCallback, TimeoutOrderTracker, TimeoutPolicy};
pub use tracker::{InMemoryOrderTracker, OrderLifecycle, OrderState, OrderTracker};
