//! `cartwheel plan` - dry run of the logout sync.

use cartwheel_storefront::error::{ClientError, Result};
use cartwheel_storefront::reconcile::PlannedOp;

use super::{Session, print_notices};

/// Print the calls a logout would issue.
///
/// # Errors
///
/// Returns `NotLoggedIn` without a session.
#[allow(clippy::print_stdout)]
pub async fn show(session: &Session) -> Result<()> {
    let planned = match session.plan().await? {
        None => return Err(ClientError::NotLoggedIn),
        Some(Err(notice)) => {
            print_notices(&[notice]);
            return Ok(());
        }
        Some(Ok(planned)) => planned,
    };

    if planned.plan.is_empty() {
        println!("Remote cart is up to date");
    }
    for op in planned.plan.ops() {
        match op {
            PlannedOp::Create { identity, quantity } => {
                println!("  create  {identity} x{quantity}");
            }
            PlannedOp::Update {
                identity,
                server_line_id,
                from,
                to,
            } => println!("  update  {identity} #{server_line_id} {from} -> {to}"),
            PlannedOp::Delete {
                identity,
                server_line_id,
            } => println!("  delete  {identity} #{server_line_id}"),
        }
    }
    for skipped in &planned.skipped {
        println!(
            "  skip    server line #{} (variant {}): {}",
            skipped.server_line_id, skipped.variant, skipped.reason
        );
    }
    Ok(())
}
