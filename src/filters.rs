use askama::Result;
use rust_decimal::Decimal;

// Custom filter to render a money amount with two decimals.
// This allows us to use `|money` in the templates.
#[allow(clippy::unnecessary_wraps)]
pub fn money(amount: &Decimal) -> Result<String> {
    Ok(format!("{:.2}", amount))
}

