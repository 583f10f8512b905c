//! `cartwheel login`, `verify-email` and `logout`.

use secrecy::SecretString;
use tracing::{info, warn};

use cartwheel_core::UserId;
use cartwheel_storefront::error::Result;
use cartwheel_storefront::reconcile::Outcome;
use cartwheel_storefront::session::{SessionTrigger, UserIdentity};

use super::{Session, print_notices};

/// Start a session after a successful login.
///
/// # Errors
///
/// Returns an error if the session cannot be stored.
pub async fn login(session: &mut Session, user_id: i32, token: String) -> Result<()> {
    start(session, SessionTrigger::Login, user_id, token).await
}

/// Start a session after email verification.
///
/// # Errors
///
/// Returns an error if the session cannot be stored.
pub async fn verify_email(session: &mut Session, user_id: i32, token: String) -> Result<()> {
    start(session, SessionTrigger::EmailVerification, user_id, token).await
}

#[allow(clippy::print_stdout)]
async fn start(
    session: &mut Session,
    trigger: SessionTrigger,
    user_id: i32,
    token: String,
) -> Result<()> {
    let user = UserIdentity::new(UserId::new(user_id), SecretString::from(token));
    let report = session.login(trigger, user).await?;

    println!(
        "Logged in; merged {} and added {} saved line(s)",
        report.merged, report.appended
    );
    for skipped in &report.skipped {
        warn!(
            server_line_id = %skipped.server_line_id,
            reason = %skipped.reason,
            "Saved cart line was not loaded"
        );
    }
    print_notices(&report.notices);
    Ok(())
}

/// Sync the cart back and end the session.
///
/// # Errors
///
/// Returns an error if session state cannot be read or cleared. Failed sync
/// calls are printed, not returned.
#[allow(clippy::print_stdout)]
pub async fn logout(session: &mut Session) -> Result<()> {
    let report = session.logout().await?;

    match &report.sync {
        Some(sync) => {
            for line in &sync.outcomes {
                match &line.outcome {
                    Outcome::Applied => println!("  {:<7} {}", line.operation, line.identity),
                    Outcome::Failed(reason) => {
                        println!("  {:<7} {} FAILED: {reason}", line.operation, line.identity);
                    }
                }
            }
            println!("Logged out; {} call(s) issued", sync.calls_issued());
        }
        None => println!("Not logged in; local cart cleared"),
    }
    print_notices(report.notices());
    if report.cart_kept {
        println!("Your cart was kept on this device; log in again to save it");
    }

    info!("Session ended");
    Ok(())
}
