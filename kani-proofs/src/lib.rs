//! Kani formal verification for farm-router share math.
//!
//! ZERO dependencies. Pure Rust. CBMC-friendly.
//!
//! Functions use u32 inputs / u64 intermediates. The production code uses
//! u64/u128, but conservation, monotonicity and bounds are scale-invariant,
//! and u32 keeps the SAT formulas tractable.
//!
//! Run all:   cargo kani --lib
//! Run one:   cargo kani --harness proof_first_depositor_exact

// ═══════════════════════════════════════════════════════════════
// Share Math (u32/u64 mirror of farm-router/src/math.rs)
// ═══════════════════════════════════════════════════════════════

pub const BPS_DENOMINATOR: u32 = 10_000;

/// Shares for staked LP. Empty farm: 1:1. Orphaned: refuse. Otherwise floor.
pub fn calc_shares_for_deposit(total_shares: u32, total_staked: u32, amount: u32) -> Option<u32> {
    if total_shares == 0 && total_staked == 0 {
        Some(amount)
    } else if total_shares == 0 || total_staked == 0 {
        None
    } else {
        let s = (amount as u64) * (total_shares as u64) / (total_staked as u64);
        u32::try_from(s).ok()
    }
}

/// LP for burned shares. floor(shares * total_staked / total_shares).
pub fn calc_lp_for_shares(total_shares: u32, total_staked: u32, shares: u32) -> Option<u32> {
    if total_shares == 0 {
        return None;
    }
    let lp = (shares as u64) * (total_staked as u64) / (total_shares as u64);
    u32::try_from(lp).ok()
}

/// (fee, net) for a harvested amount.
pub fn split_fee(amount: u32, fee_bps: u16) -> Option<(u32, u32)> {
    let fee = ((amount as u64) * (fee_bps as u64) / BPS_DENOMINATOR as u64) as u32;
    Some((fee, amount.checked_sub(fee)?))
}

/// Equal slices, remainder on the last.
pub fn split_evenly_2(amount: u32) -> (u32, u32) {
    let half = amount / 2;
    (half, amount - half)
}

// ═══════════════════════════════════════════════════════════════
// KANI PROOFS
// ═══════════════════════════════════════════════════════════════

#[cfg(kani)]
mod proofs {
    use super::*;

    // ── 1. Conservation ──

    /// Deposit then exit: can't get back more than deposited.
    #[kani::proof]
    fn proof_deposit_withdraw_no_inflation() {
        let shares: u32 = kani::any();
        let staked: u32 = kani::any();
        let deposit: u32 = kani::any();
        kani::assume(deposit > 0 && deposit < 1_000);
        kani::assume(shares > 0 && shares < 1_000);
        kani::assume(staked > 0 && staked < 1_000);

        let minted = match calc_shares_for_deposit(shares, staked, deposit) {
            Some(s) if s > 0 => s,
            _ => return,
        };
        let back = calc_lp_for_shares(shares + minted, staked + deposit, minted).unwrap();
        assert!(back <= deposit);
    }

    #[kani::proof]
    fn proof_first_depositor_exact() {
        let amount: u32 = kani::any();
        kani::assume(amount > 0);
        let minted = calc_shares_for_deposit(0, 0, amount).unwrap();
        assert_eq!(minted, amount);
        assert_eq!(calc_lp_for_shares(minted, amount, minted), Some(amount));
    }

    /// Two holders exit in turn: everything staked is paid out, nothing more.
    #[kani::proof]
    fn proof_two_holders_drain_exactly() {
        let a: u32 = kani::any();
        let b: u32 = kani::any();
        let staked: u32 = kani::any();
        kani::assume(a > 0 && a < 1_000);
        kani::assume(b > 0 && b < 1_000);
        kani::assume(staked < 10_000);

        let a_out = calc_lp_for_shares(a + b, staked, a).unwrap();
        let b_out = calc_lp_for_shares(b, staked - a_out, b).unwrap();
        assert_eq!(a_out + b_out, staked);
    }

    // ── 2. Orphaned states ──

    #[kani::proof]
    fn proof_orphaned_state_refuses() {
        let shares: u32 = kani::any();
        let staked: u32 = kani::any();
        let amount: u32 = kani::any();
        kani::assume((shares == 0) != (staked == 0));
        assert!(calc_shares_for_deposit(shares, staked, amount).is_none());
    }

    // ── 3. Arithmetic safety ──

    #[kani::proof]
    fn proof_no_panic() {
        let a: u32 = kani::any();
        let b: u32 = kani::any();
        let c: u32 = kani::any();
        let _ = calc_shares_for_deposit(a, b, c);
        let _ = calc_lp_for_shares(a, b, c);
    }

    // ── 4. Fairness ──

    #[kani::proof]
    fn proof_no_dilution() {
        let a_shares: u32 = kani::any();
        let staked: u32 = kani::any();
        let b_dep: u32 = kani::any();
        kani::assume(a_shares > 0 && a_shares < 1_000);
        kani::assume(staked > 0 && staked < 1_000);
        kani::assume(b_dep > 0 && b_dep < 1_000);

        let before = calc_lp_for_shares(a_shares, staked, a_shares).unwrap();
        let b_shares = calc_shares_for_deposit(a_shares, staked, b_dep).unwrap();
        let after = calc_lp_for_shares(a_shares + b_shares, staked + b_dep, a_shares).unwrap();
        assert!(after >= before);
    }

    #[kani::proof]
    fn proof_larger_burn_more_lp() {
        let shares: u32 = kani::any();
        let staked: u32 = kani::any();
        let small: u32 = kani::any();
        kani::assume(shares > 1 && shares < 1_000);
        kani::assume(staked < 1_000);
        kani::assume(small < shares);

        let l1 = calc_lp_for_shares(shares, staked, small).unwrap();
        let l2 = calc_lp_for_shares(shares, staked, small + 1).unwrap();
        assert!(l2 >= l1);
    }

    // ── 5. Bounds ──

    #[kani::proof]
    fn proof_burn_bounded_by_stake() {
        let shares: u32 = kani::any();
        let staked: u32 = kani::any();
        let burn: u32 = kani::any();
        kani::assume(shares > 0 && burn <= shares);
        assert!(calc_lp_for_shares(shares, staked, burn).unwrap() <= staked);
    }

    #[kani::proof]
    fn proof_zero_burn_zero_lp() {
        let shares: u32 = kani::any();
        let staked: u32 = kani::any();
        kani::assume(shares > 0);
        assert_eq!(calc_lp_for_shares(shares, staked, 0), Some(0));
    }

    // ── 6. Fees and splits ──

    #[kani::proof]
    fn proof_fee_split_exact() {
        let amount: u32 = kani::any();
        let fee_bps: u16 = kani::any();
        kani::assume(fee_bps <= 10_000);
        let (fee, net) = split_fee(amount, fee_bps).unwrap();
        assert_eq!(fee as u64 + net as u64, amount as u64);
    }

    #[kani::proof]
    fn proof_split_evenly_exact() {
        let amount: u32 = kani::any();
        let (a, b) = split_evenly_2(amount);
        assert_eq!(a as u64 + b as u64, amount as u64);
        assert!(b >= a && b - a <= 1);
    }
}
