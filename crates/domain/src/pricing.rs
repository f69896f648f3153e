use gigmarket_core::{MarketError, MarketResult};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// 允许的调价百分比
pub const ALLOWED_PERCENTAGES: [u32; 5] = [10, 20, 25, 50, 75];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PriceDirection {
    Increase,
    Decrease,
}

/// 价格统一保留两位小数
pub fn normalize_price(price: Decimal) -> Decimal {
    let mut normalized = price.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    normalized.rescale(2);
    normalized
}

/// 按允许的百分比调价：`new = old × (1 ± percent/100)`
pub fn adjust_price(old: Decimal, percent: u32, direction: PriceDirection) -> MarketResult<Decimal> {
    if !ALLOWED_PERCENTAGES.contains(&percent) {
        return Err(MarketError::InvalidPercentage { percent });
    }

    let ratio = Decimal::from(percent) / Decimal::ONE_HUNDRED;
    let factor = match direction {
        PriceDirection::Increase => Decimal::ONE + ratio,
        PriceDirection::Decrease => Decimal::ONE - ratio,
    };

    let new_price = normalize_price(old * factor);
    if new_price.is_sign_negative() && !new_price.is_zero() {
        return Err(MarketError::InvalidPrice(format!(
            "调价后价格为负数: {new_price}"
        )));
    }
    Ok(new_price)
}

/// 相对变化的绝对百分比（四舍五入），原价为0时无意义
pub fn change_percent(old: Decimal, new: Decimal) -> Option<u32> {
    if old.is_zero() {
        return None;
    }
    let percent = ((new - old) / old * Decimal::ONE_HUNDRED).abs();
    percent
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u32()
}
