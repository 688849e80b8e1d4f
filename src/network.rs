//! Network URL and contract address constants.

use crate::shared::Address;

/// Default in-app (embedded) wallet auth service.
pub const DEFAULT_IN_APP_API_URL: &str = "https://embedded-wallet.thirdweb.com";

/// Default JSON-RPC endpoint template. `{chainId}` is substituted per chain.
pub const DEFAULT_RPC_URL_TEMPLATE: &str = "https://{chainId}.rpc.thirdweb.com";

/// Default ERC-4337 bundler + paymaster endpoint template.
pub const DEFAULT_BUNDLER_URL_TEMPLATE: &str = "https://{chainId}.bundler.thirdweb.com/v2";

/// ERC-4337 v0.6 EntryPoint, deployed at the same address on every chain.
pub const ENTRYPOINT_ADDRESS_V0_6: &str = "0x5ff137d4b0fdcd49dca30c7cf57e578a026d2789";

/// Default account factory for v0.6 smart accounts.
pub const DEFAULT_ACCOUNT_FACTORY_V0_6: &str = "0x85e23b94e7f5e9cc1ff78bce78cfb15b81f0df00";

lazy_static::lazy_static! {
    /// [`ENTRYPOINT_ADDRESS_V0_6`] as an `Address`.
    pub static ref ENTRYPOINT_V0_6: Address = Address::parse(ENTRYPOINT_ADDRESS_V0_6).unwrap();

    /// [`DEFAULT_ACCOUNT_FACTORY_V0_6`] as an `Address`.
    pub static ref ACCOUNT_FACTORY_V0_6: Address = Address::parse(DEFAULT_ACCOUNT_FACTORY_V0_6).unwrap();
}

/// Substitute `{chainId}` in an endpoint template.
pub fn resolve_template(template: &str, chain_id: u64) -> String {
    template.replace("{chainId}", &chain_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_template() {
        assert_eq!(
            resolve_template(DEFAULT_BUNDLER_URL_TEMPLATE, 8453),
            "https://8453.bundler.thirdweb.com/v2"
        );
        assert_eq!(resolve_template("https://rpc.example", 1), "https://rpc.example");
    }
}
