//! Smart accounts (ERC-4337 v0.6): a contract wallet administered by a
//! personal account, transacting through a bundler and optional paymaster.
//!
//! The smart account address is counterfactual: the factory's
//! `getAddress(admin, "")` is queried on connect, and the account contract is
//! deployed by the first user operation through `initCode`.

pub mod abi;
pub mod user_op;

use async_lock::RwLock;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::chain::{ethereum, Chain};
use crate::client::Client;
use crate::error::WalletError;
use crate::network::{ACCOUNT_FACTORY_V0_6, ENTRYPOINT_V0_6};
use crate::rpc::wire::CallRequest;
use crate::rpc::RpcClient;
use crate::shared::hex::{decode, to_hex};
use crate::shared::{Address, TxHash, WalletId};
use crate::wallet::{Account, ConnectOptions, TransactionRequest, Wallet};

use user_op::{Bundler, UserOperation, DUMMY_SIGNATURE};

/// Smart wallet configuration.
#[derive(Debug, Clone)]
pub struct SmartWalletOptions {
    pub factory_address: Address,
    pub entry_point: Address,
    /// Ask the paymaster to cover gas.
    pub sponsor_gas: bool,
    /// Chain used when connect options name none.
    pub chain: Option<Chain>,
    pub receipt_poll_interval: Duration,
    pub receipt_poll_attempts: u32,
}

impl Default for SmartWalletOptions {
    fn default() -> Self {
        Self {
            factory_address: ACCOUNT_FACTORY_V0_6.clone(),
            entry_point: ENTRYPOINT_V0_6.clone(),
            sponsor_gas: false,
            chain: None,
            receipt_poll_interval: Duration::from_secs(1),
            receipt_poll_attempts: 60,
        }
    }
}

impl SmartWalletOptions {
    pub fn sponsored(mut self) -> Self {
        self.sponsor_gas = true;
        self
    }

    pub fn with_factory(mut self, factory: Address) -> Self {
        self.factory_address = factory;
        self
    }

    pub fn with_chain(mut self, chain: Chain) -> Self {
        self.chain = Some(chain);
        self
    }
}

/// `initCode` deploying the account: factory address followed by the
/// `createAccount(admin, "")` calldata.
pub fn init_code(factory: &Address, admin: &Address) -> Vec<u8> {
    let mut out = factory.as_bytes().to_vec();
    out.extend(abi::create_account_call(admin, &[]));
    out
}

// ─── Account ─────────────────────────────────────────────────────────────────

pub struct SmartAccount {
    address: Address,
    personal: Arc<dyn Account>,
    chain: Chain,
    rpc: RpcClient,
    bundler: Bundler,
    options: SmartWalletOptions,
}

impl SmartAccount {
    /// The admin signer.
    pub fn personal_account(&self) -> Arc<dyn Account> {
        self.personal.clone()
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    async fn is_deployed(&self) -> Result<bool, WalletError> {
        let code = self.rpc.get_code(&self.address).await?;
        Ok(!matches!(code.as_str(), "" | "0x" | "0x0"))
    }

    async fn entry_point_nonce(&self) -> Result<u128, WalletError> {
        let call = CallRequest {
            to: Some(self.options.entry_point.to_string()),
            data: to_hex(&abi::get_nonce_call(&self.address, 0)),
            ..Default::default()
        };
        let ret = decode(&self.rpc.eth_call(&call).await?).map_err(WalletError::InvalidResponse)?;
        abi::decode_uint(&ret)
            .ok_or_else(|| WalletError::InvalidResponse("getNonce returned no word".into()))
    }

    /// Fill gas limits, from the paymaster when sponsored, else the bundler.
    async fn fill_gas(&self, op: &mut UserOperation) -> Result<(), WalletError> {
        if self.options.sponsor_gas {
            let sponsorship = self.bundler.sponsor(op).await?;
            op.paymaster_and_data = sponsorship.paymaster_and_data;
            if let (Some(pre), Some(verification), Some(call)) = (
                sponsorship.pre_verification_gas,
                sponsorship.verification_gas_limit,
                sponsorship.call_gas_limit,
            ) {
                op.pre_verification_gas = pre;
                op.verification_gas_limit = verification;
                op.call_gas_limit = call;
                return Ok(());
            }
        }
        let estimate = self.bundler.estimate_gas(op).await?;
        op.pre_verification_gas = estimate.pre_verification_gas;
        op.verification_gas_limit = estimate.verification_gas_limit;
        op.call_gas_limit = estimate.call_gas_limit;
        Ok(())
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl Account for SmartAccount {
    fn address(&self) -> &Address {
        &self.address
    }

    /// Signed by the admin; contracts verify through ERC-1271 on the account.
    async fn sign_message(&self, message: &[u8]) -> Result<String, WalletError> {
        self.personal.sign_message(message).await
    }

    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<TxHash, WalletError> {
        let to = tx
            .to
            .as_ref()
            .ok_or(WalletError::Unsupported("contract deployment from a smart account"))?;

        let init = if self.is_deployed().await? {
            Vec::new()
        } else {
            init_code(&self.options.factory_address, self.personal.address())
        };
        let nonce = self.entry_point_nonce().await?;
        let mut op = UserOperation::new(
            self.address.clone(),
            nonce,
            init,
            abi::execute_call(to, tx.value, &tx.data),
        );

        let fees = self.rpc.estimate_fees().await?;
        op.max_fee_per_gas = fees.max_fee_per_gas;
        op.max_priority_fee_per_gas = fees.max_priority_fee_per_gas;
        op.signature = decode(DUMMY_SIGNATURE).map_err(WalletError::InvalidResponse)?;

        self.fill_gas(&mut op).await?;
        if let Some(gas) = tx.gas {
            op.call_gas_limit = op.call_gas_limit.max(gas as u128);
        }

        let hash = op.hash(&self.options.entry_point, self.chain.id);
        let signature = self.personal.sign_message(&hash).await?;
        op.signature = decode(&signature).map_err(WalletError::InvalidResponse)?;

        let user_op_hash = self.bundler.send(&op).await?;
        tracing::debug!(
            sender = %self.address,
            chain_id = self.chain.id,
            nonce = %nonce,
            sponsored = !op.paymaster_and_data.is_empty(),
            %user_op_hash,
            "user operation submitted"
        );

        let receipt = self
            .bundler
            .wait_for_receipt(
                &user_op_hash,
                self.options.receipt_poll_interval,
                self.options.receipt_poll_attempts,
            )
            .await?;
        Ok(receipt.receipt.transaction_hash)
    }
}

// ─── Wallet ──────────────────────────────────────────────────────────────────

/// ERC-4337 smart wallet. Never disconnects its personal wallet.
pub struct SmartWallet {
    client: Client,
    options: SmartWalletOptions,
    personal_wallet: Option<Arc<dyn Wallet>>,
    account: RwLock<Option<Arc<SmartAccount>>>,
}

impl SmartWallet {
    pub fn new(client: Client, options: SmartWalletOptions) -> Self {
        Self {
            client,
            options,
            personal_wallet: None,
            account: RwLock::new(None),
        }
    }

    /// Use `wallet`'s account as the admin when connect options carry none.
    /// Auto-connect reconnects it silently first.
    pub fn with_personal_wallet(mut self, wallet: Arc<dyn Wallet>) -> Self {
        self.personal_wallet = Some(wallet);
        self
    }

    pub fn options(&self) -> &SmartWalletOptions {
        &self.options
    }

    fn target_chain(&self, options: &ConnectOptions) -> Chain {
        options
            .chain
            .clone()
            .or_else(|| self.options.chain.clone())
            .unwrap_or_else(ethereum)
    }

    /// Counterfactual account address on `chain` for `admin`.
    async fn account_address(&self, admin: &Address, chain: &Chain) -> Result<Address, WalletError> {
        let call = CallRequest {
            to: Some(self.options.factory_address.to_string()),
            data: to_hex(&abi::get_address_call(admin, &[])),
            ..Default::default()
        };
        let ret = self.client.rpc(chain).eth_call(&call).await?;
        let bytes = decode(&ret).map_err(WalletError::InvalidResponse)?;
        abi::decode_address(&bytes)
            .ok_or_else(|| WalletError::InvalidResponse("getAddress returned no word".into()))
    }

    fn attach(&self, personal: Arc<dyn Account>, chain: Chain, address: Address) -> Arc<SmartAccount> {
        Arc::new(SmartAccount {
            address,
            personal,
            rpc: self.client.rpc(&chain),
            bundler: Bundler::new(self.client.bundler(&chain), self.options.entry_point.clone()),
            chain,
            options: self.options.clone(),
        })
    }

    async fn open(
        &self,
        personal: Arc<dyn Account>,
        chain: Chain,
    ) -> Result<Arc<dyn Account>, WalletError> {
        let address = self.account_address(personal.address(), &chain).await?;
        tracing::debug!(admin = %personal.address(), %address, chain_id = chain.id, "smart account resolved");
        let account = self.attach(personal, chain, address);
        *self.account.write().await = Some(account.clone());
        Ok(account)
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl Wallet for SmartWallet {
    fn id(&self) -> WalletId {
        WalletId::from(WalletId::SMART)
    }

    async fn connect(&self, options: ConnectOptions) -> Result<Arc<dyn Account>, WalletError> {
        let personal = match options.personal_account.clone() {
            Some(account) => account,
            None => match &self.personal_wallet {
                Some(wallet) => wallet
                    .get_account()
                    .await
                    .ok_or(WalletError::MissingPersonalAccount)?,
                None => return Err(WalletError::MissingPersonalAccount),
            },
        };
        let chain = self.target_chain(&options);
        self.open(personal, chain).await
    }

    async fn auto_connect(
        &self,
        options: ConnectOptions,
    ) -> Result<Arc<dyn Account>, WalletError> {
        let personal = match (options.personal_account.clone(), &self.personal_wallet) {
            (Some(account), _) => account,
            (None, Some(wallet)) => match wallet.get_account().await {
                Some(account) => account,
                None => {
                    let personal_options = ConnectOptions {
                        chain: Some(self.target_chain(&options)),
                        ..options.clone()
                    };
                    wallet.auto_connect(personal_options).await?
                }
            },
            (None, None) => return Err(WalletError::MissingPersonalAccount),
        };
        let chain = self.target_chain(&options);
        self.open(personal, chain).await
    }

    async fn disconnect(&self) -> Result<(), WalletError> {
        *self.account.write().await = None;
        Ok(())
    }

    /// The account address can differ per chain when factories differ, so it
    /// is recomputed.
    async fn switch_chain(&self, chain: &Chain) -> Result<(), WalletError> {
        let current = self.account.read().await.clone();
        match current {
            Some(account) => {
                self.open(account.personal_account(), chain.clone()).await?;
                Ok(())
            }
            None => Err(WalletError::NotConnected),
        }
    }

    async fn get_account(&self) -> Option<Arc<dyn Account>> {
        self.account
            .read()
            .await
            .as_ref()
            .map(|a| a.clone() as Arc<dyn Account>)
    }

    async fn get_chain(&self) -> Option<Chain> {
        self.account.read().await.as_ref().map(|a| a.chain.clone())
    }
}
