//! Pure share math, kept free of ledger types for Kani.
//!
//! No Pubkey or ledger dependencies. Just arithmetic.
//! Rounding policy: every function rounds DOWN (pool-favoring). A depositor
//! can lose dust to the pool, never the reverse.

/// Basis-point denominator for fees.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Fixed-point scale of the share price index (LP per share).
pub const PRICE_SCALE: u64 = 1_000_000_000;

/// `floor(a * b / c)` through u128. `None` on `c == 0` or a result above u64.
pub fn mul_div_floor(a: u64, b: u64, c: u64) -> Option<u64> {
    if c == 0 {
        return None;
    }
    let v = (a as u128).checked_mul(b as u128)?.checked_div(c as u128)?;
    if v > u64::MAX as u128 {
        None
    } else {
        Some(v as u64)
    }
}

/// Calculate shares to mint for staked LP.
///
/// # Arguments
/// * `total_shares` - Shares outstanding before the deposit
/// * `total_staked_lp` - LP staked by the farm before the deposit
/// * `amount_lp` - LP actually staked by this deposit
///
/// # Returns
/// * `Some(shares)` - Shares to mint (rounds DOWN)
/// * `None` - Overflow, or a state where minting would steal or dilute value
///
/// # Invariant
/// Empty farm (both totals 0): 1:1.
/// Otherwise `shares = amount * total_shares / total_staked_lp`.
pub fn calc_shares_for_deposit(
    total_shares: u64,
    total_staked_lp: u64,
    amount_lp: u64,
) -> Option<u64> {
    if total_shares == 0 && total_staked_lp == 0 {
        Some(amount_lp)
    } else if total_shares == 0 || total_staked_lp == 0 {
        // Orphaned LP with no owners, or owners with no LP behind them.
        // Minting at any price here moves value between holders.
        None
    } else {
        mul_div_floor(amount_lp, total_shares, total_staked_lp)
    }
}

/// Calculate LP released by burning shares.
///
/// # Returns
/// * `Some(lp)` - `floor(shares * total_staked_lp / total_shares)`
/// * `None` - No shares outstanding, or overflow
///
/// Burning every share returns exactly `total_staked_lp`.
pub fn calc_lp_for_shares(total_shares: u64, total_staked_lp: u64, shares: u64) -> Option<u64> {
    mul_div_floor(shares, total_staked_lp, total_shares)
}

/// Fee on `amount` at `fee_bps` (rounds down).
pub fn calc_fee(amount: u64, fee_bps: u16) -> Option<u64> {
    mul_div_floor(amount, fee_bps as u64, BPS_DENOMINATOR)
}

/// Split a harvested amount into `(fee, net)`. `fee + net == amount`.
pub fn split_fee(amount: u64, fee_bps: u16) -> Option<(u64, u64)> {
    let fee = calc_fee(amount, fee_bps)?;
    Some((fee, amount.checked_sub(fee)?))
}

/// Split `amount` into `parts` equal slices; the last slice takes the remainder.
pub fn split_evenly(amount: u64, parts: usize) -> Vec<u64> {
    if parts == 0 {
        return Vec::new();
    }
    let slice = amount / parts as u64;
    let mut out = vec![slice; parts];
    out[parts - 1] = amount - slice * (parts as u64 - 1);
    out
}

/// LP per share scaled by `PRICE_SCALE`. 1:1 when no shares exist.
/// Saturates at u64::MAX.
pub fn share_price(total_staked_lp: u64, total_shares: u64) -> u64 {
    if total_shares == 0 {
        return PRICE_SCALE;
    }
    let v = (total_staked_lp as u128) * (PRICE_SCALE as u128) / (total_shares as u128);
    v.min(u64::MAX as u128) as u64
}


// ═══════════════════════════════════════════════════════════════
// Kani Formal Verification
// ═══════════════════════════════════════════════════════════════
//
// u64 harnesses live in tests/kani.rs; narrow-type mirrors for CBMC
// tractability live in kani-proofs/.
