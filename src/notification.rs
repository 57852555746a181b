const APP_NAME: &str = "retext";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
    Info,
}

impl Severity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Info => "info",
        }
    }
}

/// Fire-and-forget sink for one-line user notices.
pub trait Notifier {
    fn notify(&self, severity: Severity, message: &str);
}

/// Desktop notifications through the session notification daemon.
#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        let mut notification = notify_rust::Notification::new();
        notification
            .appname(APP_NAME)
            .summary(APP_NAME)
            .body(message);
        #[cfg(all(unix, not(target_os = "macos")))]
        notification.urgency(match severity {
            Severity::Error => notify_rust::Urgency::Critical,
            Severity::Success | Severity::Info => notify_rust::Urgency::Normal,
        });

        if let Err(err) = notification.show() {
            tracing::warn!("system notification failed: {err}");
        }
    }
}

/// Writes notices to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Error => tracing::warn!(severity = severity.as_str(), "{message}"),
            Severity::Success | Severity::Info => {
                tracing::info!(severity = severity.as_str(), "{message}")
            }
        }
    }
}
