#![allow(dead_code)]

use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use ed25519_dalek::SigningKey;
use tracing::Level;
use trellis::core::OutputRef;
use trellis::proto::{Definition, Input, ProtocolConfig, UnitComposer, WitnessListRef};
use trellis::{Accepted, Address, Joint, Ledger, LedgerConfig, RetryPolicy, Unit, UnitId};

// Initialize tracing for tests
#[ctor::ctor]
fn init_tracing() {
    // if LOG_LEVEL env var is set, use it
    if let Ok(level) = std::env::var("LOG_LEVEL") {
        tracing_subscriber::fmt().with_max_level(Level::from_str(&level).unwrap()).with_test_writer().init();
    } else {
        tracing_subscriber::fmt().with_max_level(Level::INFO).with_test_writer().init();
    }
}

pub const TREASURY_SEED: u8 = 100;
pub const USER_SEEDS: [u8; 3] = [200, 201, 202];
pub const COINS_PER_HOLDER: u64 = 4;
pub const COIN: u64 = 1_000_000_000;

pub fn key(seed: u8) -> SigningKey { SigningKey::from_bytes(&[seed; 32]) }

pub fn address_of(key: &SigningKey) -> Address { Definition::from_verifying_key(&key.verifying_key()).address().unwrap() }

/// What a holder's genesis coins add up to.
pub fn genesis_holding() -> u64 { (0..COINS_PER_HOLDER).map(|i| COIN + i).sum() }

pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy { max_attempts, initial_backoff: std::time::Duration::from_millis(1), max_backoff: std::time::Duration::from_millis(5) }
}

/// An output some key can spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coin {
    pub output: OutputRef,
    pub amount: u64,
}

impl Coin {
    pub fn input(&self) -> Input {
        Input::Transfer { unit: self.output.unit, message_index: self.output.message_index, output_index: self.output.output_index }
    }
}

/// Twelve witnesses, a treasury that issues the supply and a few ordinary users.
///
/// Keeps the coins of every key it composed units for, and remembers every unit in the
/// order it was recorded so the same history can be fed to other ledgers.
pub struct Network {
    pub protocol: ProtocolConfig,
    pub treasury: SigningKey,
    /// Sorted by address.
    pub witnesses: Vec<SigningKey>,
    pub users: Vec<SigningKey>,
    pub genesis: Unit,
    pub history: Vec<Unit>,
    coins: BTreeMap<Address, Vec<Coin>>,
    last_authored: BTreeMap<Address, usize>,
}

impl Network {
    pub fn new() -> Result<Self> { Self::with_protocol(ProtocolConfig::default()) }

    pub fn with_protocol(protocol: ProtocolConfig) -> Result<Self> {
        let treasury = key(TREASURY_SEED);
        let mut witnesses: Vec<SigningKey> = (1..=12).map(key).collect();
        witnesses.sort_by_key(address_of);
        let users: Vec<SigningKey> = USER_SEEDS.iter().map(|seed| key(*seed)).collect();

        let mut composer =
            UnitComposer::genesis(&protocol, witnesses.iter().map(address_of).collect()).author(&treasury, true).change_to(address_of(&treasury));
        for holder in witnesses.iter().chain(users.iter()) {
            for i in 0..COINS_PER_HOLDER {
                composer = composer.output(address_of(holder), COIN + i);
            }
        }
        let genesis = composer.compose()?;

        let mut network =
            Self { protocol, treasury, witnesses, users, genesis: genesis.clone(), history: Vec::new(), coins: BTreeMap::new(), last_authored: BTreeMap::new() };
        network.record(&genesis);
        Ok(network)
    }

    pub fn config(&self) -> LedgerConfig { LedgerConfig::new().with_protocol(self.protocol.clone()).with_genesis_unit(self.genesis.unit) }

    pub fn witness_addresses(&self) -> Vec<Address> { self.witnesses.iter().map(address_of).collect() }

    pub fn user(&self, index: usize) -> SigningKey { self.users[index].clone() }

    /// An in-memory ledger that has accepted genesis.
    pub async fn ledger(&self) -> Result<Ledger> {
        let ledger = Ledger::in_memory(self.config()).await?;
        self.start(&ledger).await?;
        Ok(ledger)
    }

    pub async fn start(&self, ledger: &Ledger) -> Result<Accepted> { Ok(ledger.submit_unit(Joint::new(self.genesis.clone())).await?) }

    /// The witness that has gone longest without authoring a unit.
    pub fn next_witness(&self) -> SigningKey {
        let mut best: Option<(Option<usize>, &SigningKey)> = None;
        for witness in &self.witnesses {
            let used = self.last_authored.get(&address_of(witness)).copied();
            if best.as_ref().map_or(true, |(best_used, _)| used < *best_used) {
                best = Some((used, witness));
            }
        }
        best.map(|(_, witness)| witness.clone()).expect("witnesses are configured")
    }

    /// Remember the coins `unit` creates and drops the ones it spends.
    pub fn record(&mut self, unit: &Unit) {
        for message in &unit.messages {
            for input in &message.payload.inputs {
                if let Input::Transfer { unit, message_index, output_index } = input {
                    let spent = OutputRef { unit: *unit, message_index: *message_index, output_index: *output_index };
                    for coins in self.coins.values_mut() {
                        coins.retain(|coin| coin.output != spent);
                    }
                }
            }
        }
        for (message_index, message) in unit.messages.iter().enumerate() {
            for (output_index, output) in message.payload.outputs.iter().enumerate() {
                let output_ref = OutputRef { unit: unit.unit, message_index: message_index as u32, output_index: output_index as u32 };
                self.coins.entry(output.address.clone()).or_default().push(Coin { output: output_ref, amount: output.amount });
            }
        }
        let sequence = self.history.len();
        for author in unit.author_addresses() {
            self.last_authored.insert(author.clone(), sequence);
        }
        self.history.push(unit.clone());
    }

    /// Every coin `author` holds right now.
    pub fn coins(&self, author: &Address) -> Vec<Coin> { self.coins.get(author).cloned().unwrap_or_default() }

    /// A coin of `author` that the given parents include.
    pub async fn coin_for(&self, ledger: &Ledger, author: &Address, parents: &[UnitId]) -> Result<Coin> {
        let coins = self.coins.get(author).ok_or_else(|| anyhow!("{author:#} holds nothing"))?;
        for coin in coins {
            if coin.output.unit == self.genesis.unit {
                return Ok(*coin);
            }
            for parent in parents {
                if *parent == coin.output.unit || ledger.is_included_in(&coin.output.unit, parent).await? {
                    return Ok(*coin);
                }
            }
        }
        Err(anyhow!("no coin of {author:#} is included by the parents"))
    }

    /// Compose a unit by `author` on `parents` spending the given inputs, paying `payments`
    /// and returning the rest to the author. References the ledger's last stable ball.
    pub async fn compose_with(
        &self,
        ledger: &Ledger,
        author: &SigningKey,
        parents: &[UnitId],
        inputs: &[(Input, u64)],
        payments: &[(Address, u64)],
    ) -> Result<Unit> {
        let (last_ball_unit, last_ball) = ledger.last_stable_ball().await.ok_or_else(|| anyhow!("nothing is stable yet"))?;
        let mut composer = UnitComposer::regular(&self.protocol, parents.to_vec(), last_ball_unit, last_ball, WitnessListRef::Unit(self.genesis.unit))
            .author(author, true)
            .change_to(address_of(author));
        for (input, amount) in inputs {
            composer = composer.input(input.clone(), *amount);
        }
        for (address, amount) in payments {
            composer = composer.output(address.clone(), *amount);
        }
        Ok(composer.compose()?)
    }

    /// Compose a unit by `author` on `parents` funded by one of the author's coins.
    pub async fn compose(&self, ledger: &Ledger, author: &SigningKey, parents: &[UnitId], payments: &[(Address, u64)]) -> Result<Unit> {
        let coin = self.coin_for(ledger, &address_of(author), parents).await?;
        self.compose_with(ledger, author, parents, &[(coin.input(), coin.amount)], payments).await
    }

    /// Submit an already composed unit and remember it.
    pub async fn submit_unit(&mut self, ledger: &Ledger, unit: Unit) -> Result<Accepted> {
        let accepted = ledger.submit_unit(Joint::new(unit.clone())).await?;
        self.record(&unit);
        Ok(accepted)
    }

    pub async fn submit(&mut self, ledger: &Ledger, author: &SigningKey, parents: &[UnitId]) -> Result<UnitId> {
        let unit = self.compose(ledger, author, parents, &[]).await?;
        let id = unit.unit;
        self.submit_unit(ledger, unit).await?;
        Ok(id)
    }

    pub async fn pay(&mut self, ledger: &Ledger, author: &SigningKey, parents: &[UnitId], to: &Address, amount: u64) -> Result<UnitId> {
        let unit = self.compose(ledger, author, parents, &[(to.clone(), amount)]).await?;
        let id = unit.unit;
        self.submit_unit(ledger, unit).await?;
        Ok(id)
    }

    /// Grow the DAG by `count` units, each built on all free units by the next witness.
    pub async fn extend(&mut self, ledger: &Ledger, count: usize) -> Result<Vec<UnitId>> {
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            let parents = ledger.free_units().await;
            let author = self.next_witness();
            ids.push(self.submit(ledger, &author, &parents).await?);
        }
        Ok(ids)
    }
}

/// Feed `units` to `ledger` in the given order.
pub async fn replay(ledger: &Ledger, units: &[Unit]) -> Result<()> {
    for unit in units {
        ledger.submit_unit(Joint::new(unit.clone())).await?;
    }
    Ok(())
}
