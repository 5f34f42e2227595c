//! Bridge between session accrual and the wallet display.

use serde::{Deserialize, Serialize};

use crate::{TokenAmount, Timestamp};

/// Confirmed balance plus the provisional earnings of the running session.
///
/// `current_session_earnings` is an overlay recomputed from elapsed time on
/// every observation. It is never folded into `base_balance`; only a backend
/// sync replaces the base.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MiningIntegration {
    pub base_balance: TokenAmount,
    pub current_session_earnings: f64,
    pub last_sync_time: Option<Timestamp>,
    pub is_mining_active: bool,
    pub sync_error: Option<String>,
}

impl MiningIntegration {
    /// Balance shown to the user, in tokens.
    pub fn display_balance(&self) -> f64 {
        if self.is_mining_active {
            self.base_balance.as_tokens() + self.current_session_earnings.max(0.0)
        } else {
            self.base_balance.as_tokens()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_only_counts_while_active() {
        let mut integration = MiningIntegration {
            base_balance: TokenAmount::whole(10),
            current_session_earnings: 1.5,
            ..Default::default()
        };
        assert_eq!(integration.display_balance(), 10.0);
        integration.is_mining_active = true;
        assert_eq!(integration.display_balance(), 11.5);
    }
}
