use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use serde::Serialize;

use super::super::domain::{CertificateId, UserId};
use super::super::gateway::{Notification, NotificationCategory, NotificationSink};
use super::super::repository::{
    with_retries, CertificateMutation, CertificateRepository, RepositoryError,
};

/// Result of one expiry pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExpiryOutcome {
    pub expired: Vec<CertificateId>,
    pub failures: Vec<(CertificateId, String)>,
    pub interrupted: bool,
}

/// Periodic sweep retiring Active certificates whose validity has lapsed and
/// telling the holder. Certificates are processed independently.
pub struct ExpirySweep<R, N> {
    repository: Arc<R>,
    notifications: Arc<N>,
    interval: Duration,
}

impl<R, N> ExpirySweep<R, N>
where
    R: CertificateRepository + 'static,
    N: NotificationSink + 'static,
{
    pub fn new(repository: Arc<R>, notifications: Arc<N>, interval: Duration) -> Self {
        Self {
            repository,
            notifications,
            interval,
        }
    }

    pub async fn run(&self, cancel: Arc<AtomicBool>) {
        loop {
            if cancel.load(Ordering::Acquire) {
                tracing::info!("certificate expiry sweep stopping");
                return;
            }

            let today = Local::now().date_naive();
            let outcome = self.run_once(today, &cancel);
            tracing::info!(
                expired = outcome.expired.len(),
                failures = outcome.failures.len(),
                "certificate expiry sweep finished"
            );

            tokio::time::sleep(self.interval).await;
        }
    }

    /// Expire everything overdue as of `today`; the cancellation flag is
    /// observed between certificates.
    pub fn run_once(&self, today: NaiveDate, cancel: &AtomicBool) -> ExpiryOutcome {
        let mut outcome = ExpiryOutcome::default();

        let overdue = match self.repository.active_certificates_expiring_by(today) {
            Ok(certificates) => certificates,
            Err(error) => {
                tracing::error!(%error, "could not list certificates for the expiry sweep");
                return outcome;
            }
        };

        for certificate in overdue {
            if cancel.load(Ordering::Acquire) {
                outcome.interrupted = true;
                return outcome;
            }

            let result: Result<(), RepositoryError> = with_retries(|| {
                self.repository
                    .commit_batch(vec![CertificateMutation::MarkExpired(certificate.id.clone())])
                    .map(|_| ())
            });

            match result {
                Ok(()) => {
                    outcome.expired.push(certificate.id.clone());
                    let notification = Notification {
                        user_id: UserId(certificate.trainee_id.0.clone()),
                        title: "Certificate expired".to_string(),
                        body: format!(
                            "Certificate {} expired on {}.",
                            certificate.code, certificate.expires_on
                        ),
                        category: NotificationCategory::CertificateExpiring,
                    };
                    if let Err(error) = self.notifications.notify(notification) {
                        tracing::warn!(%error, "expiry notification failed");
                    }
                }
                Err(error) => {
                    tracing::warn!(certificate = %certificate.id.0, %error, "expiry update failed");
                    outcome.failures.push((certificate.id, error.to_string()));
                }
            }
        }

        outcome
    }
}
