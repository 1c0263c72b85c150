//! Cart manager
//!
//! Operations on the cart held by a `ChatSession`. Callers hold the chat's
//! lock, so every function here is synchronous.

use crate::config::{INVOICE_CURRENCY, INVOICE_PAYLOAD, INVOICE_TITLE};
use crate::session::{CartLine, ChatSession};
use crate::transport::{Invoice, LabeledAmount};
use thiserror::Error;
use tracing::{info, warn};

/// Payment amounts reported by the transport are scaled by this factor
pub const AMOUNT_SCALE: u64 = 100;

/// Cart errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CartError {
    /// Checkout requested without items
    #[error("cart is empty")]
    EmptyCart,
}

/// Read-only view of the cart
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartListing {
    /// Nothing ordered yet
    Empty,
    Items {
        lines: Vec<CartLine>,
        total: u64,
    },
}

/// Cart contents frozen for payment confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSummary {
    pub lines: Vec<CartLine>,
    pub total: u64,
}

/// Bookkeeping result of a successful payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    /// Lines that were in the cart when the payment arrived
    pub lines: Vec<CartLine>,
    /// Sum of the cart lines
    pub cart_total: u64,
    /// Amount reported by the payment provider, unscaled
    pub paid_amount: u64,
    /// Set when the paid amount differs from the cart total
    pub mismatch: bool,
}

fn total_of(lines: &[CartLine]) -> u64 {
    lines.iter().map(|line| line.unit_price).sum()
}

/// Opens an empty cart unless one already exists.
pub fn open(session: &mut ChatSession) {
    session.cart.get_or_insert_with(Vec::new);
}

/// Appends an item and returns the new running total.
pub fn add_item(session: &mut ChatSession, name: &str, price: u64) -> u64 {
    let cart = session.cart.get_or_insert_with(Vec::new);
    cart.push(CartLine {
        name: name.to_string(),
        unit_price: price,
    });
    total_of(cart)
}

/// Lists the cart without modifying it.
#[must_use]
pub fn list_items(session: &ChatSession) -> CartListing {
    match session.cart.as_deref() {
        None | Some([]) => CartListing::Empty,
        Some(lines) => CartListing::Items {
            lines: lines.to_vec(),
            total: total_of(lines),
        },
    }
}

/// Empties the cart.
pub fn clear(session: &mut ChatSession) {
    session.cart = Some(Vec::new());
}

/// Summarizes the cart for payment.
///
/// # Errors
///
/// Returns `CartError::EmptyCart` if there is nothing to pay for.
pub fn checkout(session: &ChatSession) -> Result<CheckoutSummary, CartError> {
    match list_items(session) {
        CartListing::Empty => Err(CartError::EmptyCart),
        CartListing::Items { lines, total } => Ok(CheckoutSummary { lines, total }),
    }
}

/// Records a payment reported by the transport and removes the cart.
///
/// `paid_amount_scaled` is in hundredths of the currency unit. A mismatch
/// against the cart total is reported in the receipt but never rejected.
pub fn confirm_payment(session: &mut ChatSession, paid_amount_scaled: u32) -> PaymentReceipt {
    let lines = session.cart.take().unwrap_or_default();
    let cart_total = total_of(&lines);
    let scaled = u64::from(paid_amount_scaled);
    let mismatch = scaled != cart_total.saturating_mul(AMOUNT_SCALE);

    if mismatch {
        warn!(
            chat_id = session.chat_id(),
            cart_total,
            paid_scaled = scaled,
            "Paid amount does not match cart total"
        );
    } else {
        info!(chat_id = session.chat_id(), cart_total, "Payment confirmed");
    }

    PaymentReceipt {
        lines,
        cart_total,
        paid_amount: scaled / AMOUNT_SCALE,
        mismatch,
    }
}

/// Builds the invoice for a checkout summary.
#[must_use]
pub fn build_invoice(summary: &CheckoutSummary) -> Invoice {
    let description = summary
        .lines
        .iter()
        .map(|line| line.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let prices = summary
        .lines
        .iter()
        .map(|line| LabeledAmount {
            label: line.name.clone(),
            amount: u32::try_from(line.unit_price.saturating_mul(AMOUNT_SCALE)).unwrap_or(u32::MAX),
        })
        .collect();

    Invoice {
        title: INVOICE_TITLE.to_string(),
        description,
        payload: INVOICE_PAYLOAD.to_string(),
        currency: INVOICE_CURRENCY.to_string(),
        prices,
        need_name: true,
        need_phone_number: true,
        need_shipping_address: true,
    }
}
