//! In-memory ledger for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, B256, TxHash, U256};
use topupgo::chain::ChainId;

use crate::error::LedgerError;
use crate::ledger::{TokenLedger, TransferReceipt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transfer {
    pub token: Address,
    pub to: Address,
    pub amount: U256,
}

#[derive(Debug)]
pub(crate) struct FakeLedger {
    chain_id: ChainId,
    decimals: u8,
    balances: Mutex<HashMap<(Address, Address), U256>>,
    read_failures: Mutex<VecDeque<String>>,
    read_delays: Mutex<HashMap<Address, Duration>>,
    transfer_failure: Mutex<Option<String>>,
    revert: AtomicBool,
    sender: Option<Address>,
    tx_hash: Option<TxHash>,
    transfers: Mutex<Vec<Transfer>>,
    reads: AtomicUsize,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self {
            chain_id: 137,
            decimals: 6,
            balances: Mutex::new(HashMap::new()),
            read_failures: Mutex::new(VecDeque::new()),
            read_delays: Mutex::new(HashMap::new()),
            transfer_failure: Mutex::new(None),
            revert: AtomicBool::new(false),
            sender: None,
            tx_hash: None,
            transfers: Mutex::new(Vec::new()),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn with_decimals(mut self, decimals: u8) -> Self {
        self.decimals = decimals;
        self
    }

    /// Transfers move funds out of `sender`'s balance.
    pub fn with_sender(mut self, sender: Address) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn with_tx_hash(mut self, tx_hash: TxHash) -> Self {
        self.tx_hash = Some(tx_hash);
        self
    }

    pub fn with_balance(self, token: Address, owner: Address, amount: u64) -> Self {
        self.set_balance(token, owner, amount);
        self
    }

    pub fn set_balance(&self, token: Address, owner: Address, amount: u64) {
        self.balances
            .lock()
            .unwrap()
            .insert((token, owner), U256::from(amount));
    }

    pub fn fail_next_reads(&self, messages: &[&str]) {
        self.read_failures
            .lock()
            .unwrap()
            .extend(messages.iter().map(|m| (*m).to_owned()));
    }

    pub fn delay_reads_for(&self, owner: Address, delay: Duration) {
        self.read_delays.lock().unwrap().insert(owner, delay);
    }

    pub fn fail_transfers(&self, message: &str) {
        *self.transfer_failure.lock().unwrap() = Some(message.to_owned());
    }

    pub fn revert_transfers(&self) {
        self.revert.store(true, Ordering::SeqCst);
    }

    pub fn transfers(&self) -> Vec<Transfer> {
        self.transfers.lock().unwrap().clone()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl TokenLedger for FakeLedger {
    async fn chain_id(&self) -> Result<ChainId, LedgerError> {
        Ok(self.chain_id)
    }

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, LedgerError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let delay = self.read_delays.lock().unwrap().get(&owner).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failure = self.read_failures.lock().unwrap().pop_front();
        if let Some(message) = failure {
            return Err(LedgerError::ContractCall(message));
        }
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&(token, owner))
            .copied()
            .unwrap_or_default())
    }

    async fn decimals(&self, _token: Address) -> Result<u8, LedgerError> {
        Ok(self.decimals)
    }

    async fn submit_transfer(
        &self,
        token: Address,
        to: Address,
        amount: U256,
    ) -> Result<TxHash, LedgerError> {
        let failure = self.transfer_failure.lock().unwrap().clone();
        if let Some(message) = failure {
            return Err(LedgerError::ContractCall(message));
        }
        if let Some(sender) = self.sender {
            let mut balances = self.balances.lock().unwrap();
            let from = balances.entry((token, sender)).or_default();
            *from = from.saturating_sub(amount);
            let dest = balances.entry((token, to)).or_default();
            *dest = dest.saturating_add(amount);
        }
        let mut transfers = self.transfers.lock().unwrap();
        transfers.push(Transfer { token, to, amount });
        Ok(self
            .tx_hash
            .unwrap_or_else(|| B256::with_last_byte(u8::try_from(transfers.len()).unwrap())))
    }

    async fn wait_for_confirmation(&self, tx_hash: TxHash) -> Result<TransferReceipt, LedgerError> {
        Ok(TransferReceipt {
            tx_hash,
            block_number: Some(1),
            success: !self.revert.load(Ordering::SeqCst),
        })
    }
}
