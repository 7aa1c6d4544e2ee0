use serde::{Deserialize, Serialize};

/// Customer classes known to the discount rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CustomerType {
    #[default]
    Regular,
    Preferred,
}

impl CustomerType {
    /// Anything other than "preferred" is treated as a regular customer.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()) {
            Some(s) if s == "preferred" => Self::Preferred,
            _ => Self::Regular,
        }
    }
}

/// Full breakdown returned by `discount_calculator`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscountBreakdown {
    pub unit_price:            f64,
    pub quantity:              u32,
    pub customer_type:         CustomerType,
    pub qty_discount:          f64,
    pub customer_discount:     f64,
    pub total_discount:        f64,
    pub discounted_unit_price: f64,
    pub total:                 f64,
}

/// Volume tier: 15% from 100 units, 10% from 50, 5% from 20.
pub fn quantity_discount(qty: u32) -> f64 {
    match qty {
        100.. => 0.15,
        50..  => 0.10,
        20..  => 0.05,
        _     => 0.0,
    }
}

pub fn customer_discount(customer: CustomerType) -> f64 {
    match customer {
        CustomerType::Preferred => 0.05,
        CustomerType::Regular   => 0.0,
    }
}

/// Rounds a money amount to cents.
pub fn round_money(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Rounds a discount rate to basis points so 0.15 + 0.05 reads as 0.2.
fn round_rate(rate: f64) -> f64 {
    (rate * 10_000.0).round() / 10_000.0
}

pub fn calculate_discount(unit_price: f64, qty: u32, customer: CustomerType) -> Result<DiscountBreakdown, String> {
    if !unit_price.is_finite() || unit_price < 0.0 {
        return Err(format!("unit_price must be a non-negative number, got {}", unit_price));
    }

    let qty_discount = quantity_discount(qty);
    let customer_discount = customer_discount(customer);
    let total_discount = round_rate(qty_discount + customer_discount);
    let discounted_unit_price = unit_price * (1.0 - total_discount);

    Ok(DiscountBreakdown {
        unit_price,
        quantity: qty,
        customer_type: customer,
        qty_discount,
        customer_discount,
        total_discount,
        discounted_unit_price: round_money(discounted_unit_price),
        total: round_money(discounted_unit_price * f64::from(qty)),
    })
}
