//! Cart mutations.
//!
//! Every mutation ends with `recompute_totals`, so totals always derive from
//! the current lines.

use crate::error::Rejection;
use shared_types::{Cart, CartItem, CatalogItem};

/// Upper bound on units in a single line.
pub const MAX_LINE_QUANTITY: u32 = 999;

/// What a cart mutation touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineChange {
    pub line_no: u32,
    pub sku: String,
    /// Quantity after the change; zero when the line is gone.
    pub quantity: u32,
}

fn validate_item(item: &CatalogItem) -> Result<(), Rejection> {
    if item.sku.trim().is_empty() || item.name.trim().is_empty() {
        return Err(Rejection::InvalidItem("sku and name are required".into()));
    }
    if item.unit_price.cents() < 0 {
        return Err(Rejection::InvalidItem("negative unit price".into()));
    }
    if !(0.0..=1.0).contains(&item.vat_rate) {
        return Err(Rejection::InvalidItem(format!(
            "vat rate {} outside 0..=1",
            item.vat_rate
        )));
    }
    Ok(())
}

/// Add `quantity` units; an existing line with the same sku is topped up.
pub fn add_item(cart: &mut Cart, item: &CatalogItem, quantity: u32) -> Result<LineChange, Rejection> {
    validate_item(item)?;
    if quantity == 0 {
        return Err(Rejection::InvalidQuantity(quantity));
    }
    let change = match cart.items.iter_mut().find(|l| l.sku == item.sku) {
        Some(line) => {
            let next = line.quantity.saturating_add(quantity);
            if next > MAX_LINE_QUANTITY {
                return Err(Rejection::InvalidQuantity(next));
            }
            line.quantity = next;
            line.recompute();
            LineChange {
                line_no: line.line_no,
                sku: line.sku.clone(),
                quantity: line.quantity,
            }
        }
        None => {
            if quantity > MAX_LINE_QUANTITY {
                return Err(Rejection::InvalidQuantity(quantity));
            }
            let line = CartItem::new(cart.next_line_no(), item, quantity);
            let change = LineChange {
                line_no: line.line_no,
                sku: line.sku.clone(),
                quantity,
            };
            cart.items.push(line);
            change
        }
    };
    cart.recompute_totals();
    Ok(change)
}

/// Change a line by `delta` units. Reaching zero removes the line.
pub fn change_quantity(cart: &mut Cart, line_no: u32, delta: i64) -> Result<LineChange, Rejection> {
    let index = cart
        .items
        .iter()
        .position(|l| l.line_no == line_no)
        .ok_or(Rejection::UnknownLine(line_no))?;
    let next = i64::from(cart.items[index].quantity) + delta;
    if next > i64::from(MAX_LINE_QUANTITY) {
        return Err(Rejection::InvalidQuantity(next as u32));
    }
    let change = if next <= 0 {
        let removed = cart.items.remove(index);
        LineChange {
            line_no,
            sku: removed.sku,
            quantity: 0,
        }
    } else {
        let line = &mut cart.items[index];
        line.quantity = next as u32;
        line.recompute();
        LineChange {
            line_no,
            sku: line.sku.clone(),
            quantity: line.quantity,
        }
    };
    cart.recompute_totals();
    Ok(change)
}

/// Remove a line entirely.
pub fn remove_line(cart: &mut Cart, line_no: u32) -> Result<LineChange, Rejection> {
    let index = cart
        .items
        .iter()
        .position(|l| l.line_no == line_no)
        .ok_or(Rejection::UnknownLine(line_no))?;
    let removed = cart.items.remove(index);
    cart.recompute_totals();
    Ok(LineChange {
        line_no,
        sku: removed.sku,
        quantity: 0,
    })
}

/// Drop every line; returns how many were removed.
pub fn clear(cart: &mut Cart) -> Result<usize, Rejection> {
    if cart.items.is_empty() {
        return Err(Rejection::CartAlreadyEmpty);
    }
    let removed = cart.items.len();
    cart.items.clear();
    cart.recompute_totals();
    Ok(removed)
}
