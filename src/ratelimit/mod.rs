//! Client-side advisory rate limiting.

mod backend;
mod countdown;
mod guards;
mod key;
mod lockout;
mod window;

pub use backend::CounterStore;
pub use countdown::{format_remaining, Countdown, TICK};
pub use guards::{
    validate_contact_count, ContactCountValidation, Guarded, LoginGuard, SearchGuard, UploadDecision,
    UploadGuard, LOGIN_KEY, SEARCH_KEY, UPLOAD_KEY,
};
pub use key::LimiterKey;
pub use lockout::{LockoutLimiter, LockoutPolicy, LockoutSnapshot, LockoutState, RateLimitRecord};
pub use window::{SlidingWindowLimiter, TimestampWindow, WindowPolicy, WindowSnapshot};
