// src/policy.rs

use crate::config::Config;

/// Static catalog of every action the dispatcher knows how to route.
/// Membership here is what separates "doesn't exist" from "exists but
/// disabled by the allowlist".
pub const ACTION_CATALOG: &[&str] = &[
    "resolveChain",
    "resolveAsset",
    "listChains",
    "blockNumber",
    "gasPrice",
    "estimateGas",
    "nativeBalance",
    "erc20Balance",
    "rpcCall",
    "yieldOpportunities",
    "lendingMarkets",
    "buildTransferNative",
    "buildTransferErc20",
    "buildApproveErc20",
    "buildSwap",
    "sendRawTransaction",
];

/// Decides support and allow/deny for every incoming action.
pub struct PolicyGate<'a> {
    config: &'a Config,
}

impl<'a> PolicyGate<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Membership test against the static catalog.
    pub fn is_supported(&self, action: &str) -> bool {
        ACTION_CATALOG.contains(&action)
    }

    /// Uncataloged actions pass through (forward-compatible); cataloged
    /// actions are restricted by the allowlist when one is set.
    pub fn is_allowed(&self, action: &str) -> bool {
        if !self.is_supported(action) {
            return true;
        }
        match &self.config.allowed_actions {
            None => true,
            Some(list) => list.iter().any(|a| a == action),
        }
    }

    pub fn strict_mode(&self) -> bool {
        self.config.strict_mode
    }

    /// Whether `sendRawTransaction` may reach the network. Broadcast is
    /// opt-in via ALLOW_BROADCAST; strict mode never turns it on.
    pub fn broadcast_allowed(&self) -> bool {
        self.config.broadcast_enabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowlist_unset_allows_all_cataloged() {
        let config = Config::default();
        let gate = PolicyGate::new(&config);
        for action in ACTION_CATALOG {
            assert!(gate.is_allowed(action), "{} should be allowed", action);
        }
    }

    #[test]
    fn allowlist_restricts_every_cataloged_action() {
        let config = Config {
            allowed_actions: Some(vec!["blockNumber".to_string()]),
            ..Config::default()
        };
        let gate = PolicyGate::new(&config);
        for action in ACTION_CATALOG {
            let allowed = gate.is_allowed(action);
            assert_eq!(allowed, *action == "blockNumber", "action {}", action);
        }
    }

    #[test]
    fn uncataloged_actions_pass_through() {
        let config = Config {
            allowed_actions: Some(vec![]),
            ..Config::default()
        };
        let gate = PolicyGate::new(&config);
        assert!(!gate.is_supported("someFutureAction"));
        assert!(gate.is_allowed("someFutureAction"));
    }

    #[test]
    fn broadcast_requires_explicit_opt_in() {
        let config = Config {
            strict_mode: true,
            allow_broadcast: false,
            ..Config::default()
        };
        assert!(!PolicyGate::new(&config).broadcast_allowed());

        let config = Config {
            strict_mode: true,
            allow_broadcast: true,
            ..Config::default()
        };
        assert!(PolicyGate::new(&config).broadcast_allowed());
    }
}
