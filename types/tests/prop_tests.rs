use proptest::prelude::*;

use accrue_types::{TokenAmount, Timestamp, WalletBalance};

proptest! {
    /// Balance total always equals the sum of its three pools.
    #[test]
    fn balance_total_is_sum(
        s in 0u128..u64::MAX as u128,
        n in 0u128..u64::MAX as u128,
        p in 0u128..u64::MAX as u128,
    ) {
        let balance = WalletBalance::new(
            TokenAmount::new(s),
            TokenAmount::new(n),
            TokenAmount::new(p),
        ).unwrap();
        prop_assert_eq!(balance.total().raw(), s + n + p);
    }

    /// Debiting and crediting keep the invariant.
    #[test]
    fn balance_mutations_keep_invariant(
        s in 0u128..1_000_000_000_000,
        n in 0u128..1_000_000_000_000,
        debit in 0u128..1_000_000_000_000,
        credit in 0u128..1_000_000_000_000,
    ) {
        let balance = WalletBalance::new(TokenAmount::new(s), TokenAmount::new(n), TokenAmount::ZERO).unwrap();
        let credited = balance.with_non_sendable_credit(TokenAmount::new(credit)).unwrap();
        prop_assert_eq!(
            credited.total(),
            credited.sendable() + credited.non_sendable() + credited.pending()
        );
        match credited.with_sendable_debit(TokenAmount::new(debit)) {
            Some(after) => {
                prop_assert!(debit <= s);
                prop_assert_eq!(after.total().raw(), s - debit + n + credit);
            }
            None => prop_assert!(debit > s),
        }
    }

    /// TokenAmount bincode serialization roundtrip.
    #[test]
    fn token_amount_bincode_roundtrip(raw in 0u128..u128::MAX) {
        let amount = TokenAmount::new(raw);
        let encoded = bincode::serialize(&amount).unwrap();
        let decoded: TokenAmount = bincode::deserialize(&encoded).unwrap();
        prop_assert_eq!(decoded, amount);
    }

    /// checked_sub returns None exactly when b > a.
    #[test]
    fn token_amount_checked_sub_underflow(a in 0u128..1_000_000, b in 0u128..1_000_000) {
        let result = TokenAmount::new(a).checked_sub(TokenAmount::new(b));
        if b > a {
            prop_assert!(result.is_none());
        } else {
            prop_assert_eq!(result, Some(TokenAmount::new(a - b)));
        }
    }

    /// Timestamp elapsed_since: elapsed_since(now) = now - self (saturating).
    #[test]
    fn timestamp_elapsed_since(base in 0u64..1_000_000, offset in 0u64..1_000_000) {
        let t = Timestamp::new(base);
        let now = Timestamp::new(base + offset);
        prop_assert_eq!(t.elapsed_since(now), offset);
        prop_assert_eq!(now.elapsed_since(t), 0);
    }
}
