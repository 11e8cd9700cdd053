pub mod mailer;
pub mod noop;

pub use mailer::HttpMailer;
pub use noop::NoopSink;
