// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use alloy_primitives::U256;

use crate::SponsorshipError;

/// Wei in one whole native unit
pub const WEI_PER_NATIVE: u128 = 1_000_000_000_000_000_000;

/// Converts a native cost to USDC base units and applies the markup.
///
/// `floor(floor(native_wei * price / 10^18) * markup_percent / 100)`, with
/// `price` in USDC base units per whole native unit.
pub fn marked_up_cost(
    native_wei: u128,
    price: u128,
    markup_percent: u128,
) -> Result<u128, SponsorshipError> {
    // u128 * u128 always fits in 256 bits
    let usdc = U256::from(native_wei) * U256::from(price) / U256::from(WEI_PER_NATIVE);
    let marked_up = usdc
        .checked_mul(U256::from(markup_percent))
        .ok_or(SponsorshipError::CostOverflow)?
        / U256::from(100u8);
    u128::try_from(marked_up).map_err(|_| SponsorshipError::CostOverflow)
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    const ETH_AT_3000_USDC: u128 = 3_000_000_000;

    #[rstest]
    #[case::hundredth_of_eth(10_000_000_000_000_000, 100, 30_000_000)]
    #[case::default_markup(10_000_000_000_000_000, 110, 33_000_000)]
    #[case::one_gwei(1_000_000_000, 110, 3)]
    #[case::dust_rounds_to_zero(333_333_333, 110, 0)]
    #[case::floor_before_markup(333_333_333_333, 110, 1_098)]
    #[case::nothing_spent(0, 110, 0)]
    fn converts_and_marks_up(#[case] wei: u128, #[case] markup: u128, #[case] expected: u128) {
        assert_eq!(
            marked_up_cost(wei, ETH_AT_3000_USDC, markup).unwrap(),
            expected
        );
    }

    #[test]
    fn result_beyond_u128_is_rejected() {
        assert!(matches!(
            marked_up_cost(u128::MAX, u128::MAX, 110),
            Err(SponsorshipError::CostOverflow)
        ));
    }
}
