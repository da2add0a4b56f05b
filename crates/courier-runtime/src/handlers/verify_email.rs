use std::sync::Arc;

use courier_core::error::Result;
use courier_core::mail::{Email, Mailer};
use courier_core::store::{CreateVerifyEmailParams, Store};
use courier_core::task::{
    EnqueueInfo, Task, TaskContext, TaskError, TaskHandler, TaskOptions, TaskPayload,
};
use futures::future::BoxFuture;
use rand::distributions::Uniform;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::tasks::TaskDistributor;

pub const TASK_SEND_VERIFY_EMAIL: &str = "task:send_verify_email";

const SECRET_CODE_LEN: usize = 32;

/// Payload of [`TASK_SEND_VERIFY_EMAIL`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadSendVerifyEmail {
    pub username: String,
}

impl TaskPayload for PayloadSendVerifyEmail {
    const TASK_TYPE: &'static str = TASK_SEND_VERIFY_EMAIL;
}

impl TaskDistributor {
    /// Enqueue a verification email for `payload.username`.
    pub async fn distribute_send_verify_email(
        &self,
        payload: &PayloadSendVerifyEmail,
        options: TaskOptions,
    ) -> Result<EnqueueInfo> {
        self.enqueue_payload(payload, options).await
    }
}

/// Issues a verification code for a user and mails them the link.
///
/// Every run issues a new code, so a duplicate delivery sends a second,
/// equally valid link.
pub struct SendVerifyEmailHandler {
    store: Arc<dyn Store>,
    mailer: Arc<dyn Mailer>,
    verify_url: String,
}

impl SendVerifyEmailHandler {
    pub fn new(
        store: Arc<dyn Store>,
        mailer: Arc<dyn Mailer>,
        verify_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            mailer,
            verify_url: verify_url.into(),
        }
    }

    fn build_email(&self, full_name: &str, to: &str, email_id: i64, secret_code: &str) -> Email {
        let link = format!(
            "{}?email_id={}&secret_code={}",
            self.verify_url, email_id, secret_code
        );
        let content = format!(
            "Hello {},<br/>\n\
             Thank you for registering with us!<br/>\n\
             Please <a href=\"{}\">click here</a> to verify your email address.<br/>\n",
            full_name, link
        );
        Email::new("Verify your email", content, vec![to.to_string()])
    }

    async fn run(&self, ctx: &TaskContext, task: &Task) -> std::result::Result<(), TaskError> {
        let payload: PayloadSendVerifyEmail = task.decode()?;

        let user = ctx
            .until_cancelled(self.store.get_user(&payload.username))
            .await
            .ok_or_else(|| interrupted("loading user"))?
            .map_err(|e| {
                if e.is_not_found() {
                    TaskError::skip_retry(format!("user doesn't exist: {}", payload.username))
                } else {
                    TaskError::retry(format!("failed to get user: {}", e))
                }
            })?;

        let params = CreateVerifyEmailParams {
            username: user.username.clone(),
            email: user.email.clone(),
            secret_code: random_string(SECRET_CODE_LEN),
        };
        let verify_email = ctx
            .until_cancelled(self.store.create_verify_email(params))
            .await
            .ok_or_else(|| interrupted("issuing code"))?
            .map_err(|e| TaskError::retry(format!("failed to create verify email: {}", e)))?;

        let email = self.build_email(
            &user.full_name,
            &user.email,
            verify_email.id,
            &verify_email.secret_code,
        );
        ctx.until_cancelled(self.mailer.send(email))
            .await
            .ok_or_else(|| interrupted("sending email"))?
            .map_err(|e| TaskError::retry(format!("failed to send verify email: {}", e)))?;

        tracing::info!(
            task_id = %ctx.task_id,
            username = %user.username,
            email = %user.email,
            "Sent verify email"
        );
        Ok(())
    }
}

/// Cancellation leaves the task retryable.
fn interrupted(step: &str) -> TaskError {
    TaskError::retry(format!("cancelled while {}", step))
}

impl TaskHandler for SendVerifyEmailHandler {
    fn handle<'a>(
        &'a self,
        ctx: &'a TaskContext,
        task: &'a Task,
    ) -> BoxFuture<'a, std::result::Result<(), TaskError>> {
        Box::pin(self.run(ctx, task))
    }
}

/// Random string of `n` lowercase ASCII letters.
pub fn random_string(n: usize) -> String {
    rand::thread_rng()
        .sample_iter(Uniform::new_inclusive(b'a', b'z'))
        .take(n)
        .map(char::from)
        .collect()
}
