use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use enrollment::workflows::admission::{Notification, NotificationDispatcher, NotificationError};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Dispatcher for the long-running server: notifications are logged and dropped.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LoggingNotifier;

impl NotificationDispatcher for LoggingNotifier {
    fn dispatch(&self, notification: Notification) -> Result<(), NotificationError> {
        log_notification(&notification);
        Ok(())
    }
}

/// Logs each notification and keeps a copy so the demo can print them afterwards.
#[derive(Default, Clone)]
pub(crate) struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl NotificationDispatcher for RecordingNotifier {
    fn dispatch(&self, notification: Notification) -> Result<(), NotificationError> {
        log_notification(&notification);
        let mut guard = self
            .sent
            .lock()
            .map_err(|_| NotificationError::Transport("notification log poisoned".to_string()))?;
        guard.push(notification);
        Ok(())
    }
}

impl RecordingNotifier {
    pub(crate) fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

fn log_notification(notification: &Notification) {
    info!(
        recipient = %notification.recipient,
        template = notification.template.label(),
        "notification queued"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use enrollment::workflows::admission::NotificationTemplate;
    use std::collections::BTreeMap;

    fn notification(recipient: &str) -> Notification {
        Notification {
            recipient: recipient.to_string(),
            template: NotificationTemplate::EnrollmentConfirmed,
            message: "enrollment confirmed".to_string(),
            details: BTreeMap::new(),
        }
    }

    #[test]
    fn logging_notifier_holds_no_history() {
        let notifier = LoggingNotifier;
        for index in 0..1_000 {
            notifier
                .dispatch(notification(&format!("user-{index}")))
                .expect("dispatch succeeds");
        }
        assert_eq!(std::mem::size_of::<LoggingNotifier>(), 0);
    }

    #[test]
    fn recording_notifier_keeps_dispatch_order() {
        let notifier = RecordingNotifier::default();
        notifier.dispatch(notification("ana")).expect("dispatch");
        notifier.dispatch(notification("bruno")).expect("dispatch");

        let recipients: Vec<_> = notifier
            .sent()
            .into_iter()
            .map(|notification| notification.recipient)
            .collect();
        assert_eq!(recipients, vec!["ana", "bruno"]);
    }
}
