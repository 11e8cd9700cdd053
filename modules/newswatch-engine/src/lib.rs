pub mod commands;
pub mod cycle;
pub mod dispatcher;
pub mod launcher;
pub mod monitor;
pub mod notify;
pub mod report;
pub mod scorer;
pub mod source;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
pub mod worker;
