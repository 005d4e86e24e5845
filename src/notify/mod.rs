//! 通知エンジンとメール送信

mod engine;
mod mailer;

pub use engine::{LocationReport, NotificationEngine};
pub use mailer::{RenderedEmail, SmtpMailer};
