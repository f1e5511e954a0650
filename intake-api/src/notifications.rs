use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
    Info,
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NotificationLevel::Success => "success",
            NotificationLevel::Error => "error",
            NotificationLevel::Info => "info",
        };
        f.write_str(label)
    }
}

/// Operator feedback channel. Messages sharing an operation id update one another in place.
pub trait Notifier: Send + Sync {
    fn notify(&self, operation_id: &str, level: NotificationLevel, message: &str);

    fn success(&self, operation_id: &str, message: &str) {
        self.notify(operation_id, NotificationLevel::Success, message);
    }

    fn error(&self, operation_id: &str, message: &str) {
        self.notify(operation_id, NotificationLevel::Error, message);
    }

    fn info(&self, operation_id: &str, message: &str) {
        self.notify(operation_id, NotificationLevel::Info, message);
    }
}

pub fn new_operation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Writes notifications to the service log.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, operation_id: &str, level: NotificationLevel, message: &str) {
        match level {
            NotificationLevel::Error => {
                tracing::error!(operation_id = %operation_id, "{}", message)
            }
            NotificationLevel::Success | NotificationLevel::Info => {
                tracing::info!(operation_id = %operation_id, level = %level, "{}", message)
            }
        }
    }
}
