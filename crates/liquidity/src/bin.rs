use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, MathematicalOps};

/// Bin id whose price is exactly 1
pub const REAL_ID_SHIFT: u32 = 1 << 23;

const BASIS_POINT_MAX: u32 = 10_000;

/// `1 + bin_step / 10_000`
fn base(bin_step: u16) -> Option<Decimal> {
    let bps = Decimal::from_u16(bin_step)?.checked_div(Decimal::from_u32(BASIS_POINT_MAX)?)?;
    Decimal::ONE.checked_add(bps)
}

/// Price of Y per X in bin `id`: `(1 + bin_step / 10_000) ^ (id - 2^23)`
pub fn price_from_id(id: u32, bin_step: u16) -> Option<Decimal> {
    let exponent = i64::from(id) - i64::from(REAL_ID_SHIFT);
    base(bin_step)?.checked_powi(exponent)
}

/// Bin id whose price is closest to `price`
pub fn id_from_price(price: Decimal, bin_step: u16) -> Option<u32> {
    if price <= Decimal::ZERO || bin_step == 0 {
        return None;
    }

    let exponent = price
        .checked_log10()?
        .checked_div(base(bin_step)?.checked_log10()?)?
        .round()
        .to_i64()?;

    u32::try_from(i64::from(REAL_ID_SHIFT) + exponent).ok()
}
