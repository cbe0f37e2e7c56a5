use rust_decimal::prelude::*;

use crate::error::BotError;

/// Quote amount to spend on an entry: the configured spend, raised to the
/// instrument's minimum notional when that is larger
pub fn required_spend(spend_quote: f64, min_notional: f64) -> f64 {
    spend_quote.max(min_notional)
}

/// Round `quantity` down to a whole multiple of `step`.
///
/// Uses decimal arithmetic so that e.g. 0.006 at step 0.0001 stays 0.006
/// instead of collapsing to 0.0059 through binary float error.
pub fn floor_to_step(quantity: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return quantity;
    }

    let exact = to_decimal(quantity)
        .zip(to_decimal(step))
        .and_then(|(q, s)| q.checked_div(s)?.floor().checked_mul(s))
        .and_then(|floored| floored.to_f64());

    exact.unwrap_or_else(|| (quantity / step).floor() * step)
}

/// Quantity to buy for `spend` quote units at `price`, floored to `step`.
///
/// Never rounds up, so `quantity * price <= spend` always holds.
pub fn order_quantity(spend: f64, price: f64, step: f64) -> Result<f64, BotError> {
    if !(price > 0.0) || !price.is_finite() {
        return Err(BotError::DataUnavailable(format!(
            "unusable reference price {}",
            price
        )));
    }

    let too_large = || BotError::InvalidOrderSize {
        quantity: spend / price,
        step,
    };

    let quantity = match (to_decimal(spend), to_decimal(price), to_decimal(step)) {
        (Some(spend), Some(price), Some(step)) if step > Decimal::ZERO => spend
            .checked_div(price)
            .and_then(|units| units.checked_div(step))
            .and_then(|steps| steps.floor().checked_mul(step))
            .ok_or_else(too_large)?,
        (Some(spend), Some(price), _) => spend.checked_div(price).ok_or_else(too_large)?,
        _ => {
            let raw = floor_to_step(spend / price, step);
            if !raw.is_finite() {
                return Err(too_large());
            }
            Decimal::from_f64(raw).ok_or_else(too_large)?
        }
    };

    let quantity = quantity.to_f64().unwrap_or(0.0);
    if quantity <= 0.0 {
        return Err(BotError::InvalidOrderSize {
            quantity: spend / price,
            step,
        });
    }

    Ok(quantity)
}

fn to_decimal(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_str(&value.to_string()).ok()
}
