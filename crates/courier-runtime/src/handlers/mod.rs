//! Task handlers shipped with courier.

mod verify_email;

use std::sync::Arc;

use courier_core::config::MailConfig;
use courier_core::error::Result;
use courier_core::mail::Mailer;
use courier_core::store::Store;

pub use verify_email::{
    random_string, PayloadSendVerifyEmail, SendVerifyEmailHandler, TASK_SEND_VERIFY_EMAIL,
};

use crate::tasks::DispatchTable;

/// Register every built-in handler.
pub fn register_builtin(
    table: &mut DispatchTable,
    store: Arc<dyn Store>,
    mailer: Arc<dyn Mailer>,
    mail: &MailConfig,
) -> Result<()> {
    table.register(
        TASK_SEND_VERIFY_EMAIL,
        Arc::new(SendVerifyEmailHandler::new(
            store,
            mailer,
            mail.verify_url.clone(),
        )),
    )
}
