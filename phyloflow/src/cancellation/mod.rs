//! Cooperative cancellation shared by the process runner and the run worker.

mod token;

pub use token::CancelToken;
