//! `cartwheel cart` - local cart editing.
//!
//! These commands never touch the network. The local cart is authoritative
//! until the next logout syncs it back.

use cartwheel_core::{ProductId, VariantKey};
use cartwheel_storefront::error::{ClientError, Result};
use tracing::info;

use super::LocalCart;

/// Print every line and the total quantity.
#[allow(clippy::print_stdout)]
pub fn show(cart: &LocalCart) {
    if cart.is_empty() {
        println!("Cart is empty");
        return;
    }

    for line in cart.lines() {
        let identity = line.identity();
        let linked = line
            .server_line_id()
            .map(|id| format!("  (server line {id})"))
            .unwrap_or_default();
        println!(
            "{:<24} {:<10} {:<6} x{}{linked}",
            identity.product_id(),
            identity.color().unwrap_or("-"),
            identity.size(),
            line.quantity(),
        );
    }
    println!("{} item(s) in {} line(s)", cart.total_quantity(), cart.len());
}

/// Add a variant to the cart.
///
/// # Errors
///
/// Returns an error for a zero quantity or if the cart cannot be saved.
pub fn add(
    cart: &mut LocalCart,
    product: ProductId,
    color: Option<&str>,
    size: &str,
    quantity: u32,
) -> Result<()> {
    let variant = variant_key(color, size, quantity)?;
    cart.add(product, variant, quantity)?;
    info!(quantity, "Added to cart");
    Ok(())
}

/// Replace the quantity of a line.
///
/// # Errors
///
/// Returns an error for a zero quantity, a missing line, or if the cart
/// cannot be saved.
pub fn set(
    cart: &mut LocalCart,
    product: &ProductId,
    color: Option<&str>,
    size: &str,
    quantity: u32,
) -> Result<()> {
    let variant = variant_key(color, size, quantity)?;
    if !cart.set_quantity(product, &variant, quantity)? {
        return Err(ClientError::BadRequest(format!(
            "{product} ({size}) is not in the cart"
        )));
    }
    info!(quantity, "Updated cart line");
    Ok(())
}

/// Remove a line.
///
/// # Errors
///
/// Returns an error for a missing line or if the cart cannot be saved.
pub fn remove(
    cart: &mut LocalCart,
    product: &ProductId,
    color: Option<&str>,
    size: &str,
) -> Result<()> {
    let variant = VariantKey::new(color, size);
    if !cart.remove(product, &variant)? {
        return Err(ClientError::BadRequest(format!(
            "{product} ({size}) is not in the cart"
        )));
    }
    info!("Removed cart line");
    Ok(())
}

/// Empty the cart.
///
/// # Errors
///
/// Returns an error if the cart cannot be saved.
pub fn clear(cart: &mut LocalCart) -> Result<()> {
    cart.clear()?;
    info!("Cart cleared");
    Ok(())
}

fn variant_key(color: Option<&str>, size: &str, quantity: u32) -> Result<VariantKey> {
    if quantity == 0 {
        return Err(ClientError::BadRequest(
            "quantity must be positive".to_string(),
        ));
    }
    if size.trim().is_empty() {
        return Err(ClientError::BadRequest("size cannot be empty".to_string()));
    }
    Ok(VariantKey::new(color, size))
}
