//! Contact-form submissions. Both operations run as the signed-in user.

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use sominner_rest::{CancellationToken, DataApiExt, Filter, Order, Query, UserScoped};

use crate::error::{Result, SupportError};
use crate::models::{CustomerSubmission, SubmissionStatusUpdate};
use crate::service::{SupportService, CUSTOMER_SUBMISSIONS};

impl<A: UserScoped> SupportService<A> {
    /// Newest first. Without a token the anonymous credential is used and the
    /// backend's row security decides what is visible.
    pub async fn list_submissions(
        &self,
        access_token: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<CustomerSubmission>> {
        let api = self.api.for_user(access_token.unwrap_or_default());
        let query = Query::table(CUSTOMER_SUBMISSIONS).order(Order::desc("submitted_at"));
        Ok(api.select(&query, cancel).await?)
    }

    pub async fn update_submission_status(
        &self,
        submission_id: Uuid,
        status: &str,
        access_token: &str,
        updated_by: Option<&str>,
        updated_at: Option<DateTime<Utc>>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if access_token.trim().is_empty() {
            return Err(SupportError::MissingAccessToken);
        }
        let api = self.api.for_user(access_token);
        let patch = SubmissionStatusUpdate {
            status,
            status_updated_by: updated_by,
            status_updated_at: updated_at,
        };
        api.update_minimal(
            CUSTOMER_SUBMISSIONS,
            &[Filter::eq("id", submission_id)],
            &patch,
            cancel,
        )
        .await?;
        info!(submission_id = %submission_id, status = %status, "submission status updated");
        Ok(())
    }
}
