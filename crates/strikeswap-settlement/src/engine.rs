//! The engine: pair storage, frames and the public operation surface.
//!
//! Every public entry point runs inside a frame. A frame records the
//! pre-image of each pair it locks or creates, opens a ledger savepoint,
//! checkpoints the asset service and remembers how many events existed. On
//! success the frame's locks are released and its pre-images fold into the
//! enclosing frame; on failure everything it recorded is put back. Frames
//! nest because a settlement callback receives the engine and may call
//! straight back into it.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use strikeswap_curve::{PairState, Tick};
use strikeswap_types::{
    AccountId, AccrueParams, Amount, AssetId, Command, EngineConfig, EngineEvent, EventRecord,
    LiquidityParams, NetDeltas, PairDelta, PairId, PairKey, PositionKey, Result,
    StrikeswapError, SwapParams,
};
use tracing::{debug, info, warn};

use crate::assets::AssetTransferService;
use crate::coordinator::{NoPayment, SettlementCallback};
use crate::ledger::{Position, PositionLedger};
use crate::lock::PairLock;
use crate::ops::{self, OpContext};

/// A stored pair: identity, curve state, ticks and lock.
#[derive(Debug, Clone)]
pub struct Pair {
    key: PairKey,
    state: PairState,
    ticks: BTreeMap<i32, Tick>,
    lock: PairLock,
}

impl Pair {
    #[must_use]
    pub fn key(&self) -> &PairKey {
        &self.key
    }

    #[must_use]
    pub fn state(&self) -> &PairState {
        &self.state
    }

    #[must_use]
    pub fn ticks(&self) -> &BTreeMap<i32, Tick> {
        &self.ticks
    }

    /// A tick by index; untouched ticks read as empty.
    #[must_use]
    pub fn tick(&self, index: i32) -> Tick {
        self.ticks.get(&index).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }
}

/// Per-asset totals of a settled batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReceipt {
    /// Delta of each command, in order.
    pub deltas: Vec<PairDelta>,
    /// What was settled.
    pub net: NetDeltas,
}

struct Frame<C> {
    /// `None` marks a pair created inside the frame.
    pre_images: HashMap<PairId, Option<Pair>>,
    locked: Vec<PairId>,
    checkpoint: C,
    events_len: usize,
    /// Flows accounted by settlements committed in this frame: pay-ins
    /// claimed are positive, payouts negative.
    settled: NetDeltas,
}

pub struct Engine<S: AssetTransferService> {
    config: EngineConfig,
    pairs: HashMap<PairId, Pair>,
    ledger: PositionLedger,
    assets: S,
    now: u64,
    frames: Vec<Frame<S::Checkpoint>>,
    events: Vec<EventRecord>,
}

impl<S: AssetTransferService> Engine<S> {
    /// Create an engine over `assets`.
    ///
    /// # Errors
    /// `Configuration` if `config` fails validation.
    pub fn new(config: EngineConfig, assets: S) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            pairs: HashMap::new(),
            ledger: PositionLedger::new(),
            assets,
            now: 0,
            frames: Vec::new(),
            events: Vec::new(),
        })
    }

    // -----------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------

    /// Register a pair with every spread active at `initial_tick`.
    pub fn create_pair(&mut self, key: PairKey, initial_tick: i32) -> Result<PairId> {
        self.transact(|engine| engine.insert_pair(&key, initial_tick))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_liquidity<C: SettlementCallback<S>>(
        &mut self,
        owner: &AccountId,
        key: &PairKey,
        tick: i32,
        tier: u8,
        liquidity: Decimal,
        data: &[u8],
        callback: &mut C,
    ) -> Result<PairDelta> {
        let command = Command::AddLiquidity(LiquidityParams {
            pair: key.clone(),
            tick,
            tier,
            liquidity,
        });
        self.run_single(owner, &command, data, callback)
    }

    /// Withdraw liquidity. Pays out immediately; never calls back.
    pub fn remove_liquidity(
        &mut self,
        owner: &AccountId,
        key: &PairKey,
        tick: i32,
        tier: u8,
        liquidity: Decimal,
    ) -> Result<PairDelta> {
        let command = Command::RemoveLiquidity(LiquidityParams {
            pair: key.clone(),
            tick,
            tier,
            liquidity,
        });
        self.run_single(owner, &command, &[], &mut NoPayment)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn borrow_liquidity<C: SettlementCallback<S>>(
        &mut self,
        owner: &AccountId,
        key: &PairKey,
        tick: i32,
        tier: u8,
        liquidity: Decimal,
        data: &[u8],
        callback: &mut C,
    ) -> Result<PairDelta> {
        let command = Command::BorrowLiquidity(LiquidityParams {
            pair: key.clone(),
            tick,
            tier,
            liquidity,
        });
        self.run_single(owner, &command, data, callback)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn repay_liquidity<C: SettlementCallback<S>>(
        &mut self,
        owner: &AccountId,
        key: &PairKey,
        tick: i32,
        tier: u8,
        liquidity: Decimal,
        data: &[u8],
        callback: &mut C,
    ) -> Result<PairDelta> {
        let command = Command::RepayLiquidity(LiquidityParams {
            pair: key.clone(),
            tick,
            tier,
            liquidity,
        });
        self.run_single(owner, &command, data, callback)
    }

    /// Swap against a pair. `amount > 0` is an exact input of the token
    /// named by `is_token0`, `amount < 0` an exact output.
    pub fn swap<C: SettlementCallback<S>>(
        &mut self,
        owner: &AccountId,
        key: &PairKey,
        is_token0: bool,
        amount: Decimal,
        data: &[u8],
        callback: &mut C,
    ) -> Result<PairDelta> {
        let command = Command::Swap(SwapParams {
            pair: key.clone(),
            is_token0,
            amount: Amount::Exact(amount),
        });
        self.run_single(owner, &command, data, callback)
    }

    /// Bring a tick's borrow index up to the current ledger time.
    pub fn accrue(&mut self, key: &PairKey, tick: i32, tier: u8) -> Result<Decimal> {
        let params = AccrueParams {
            pair: key.clone(),
            tick,
            tier,
        };
        self.transact(|engine| {
            let id = key.id();
            engine.acquire(id)?;
            let Engine {
                config,
                pairs,
                ledger,
                now,
                ..
            } = engine;
            let pair = pairs.get_mut(&id).ok_or(StrikeswapError::PairNotFound(id))?;
            let mut ctx = OpContext {
                config,
                now: *now,
                key: &pair.key,
                state: &mut pair.state,
                ticks: &mut pair.ticks,
                book: ledger,
            };
            let borrow_index = ops::accrue(&mut ctx, &params)?;
            engine.record(EngineEvent::Accrued {
                pair: id,
                tick,
                tier,
                borrow_index,
            });
            Ok(borrow_index)
        })
    }

    /// Apply `commands` in order and settle their net deltas once.
    ///
    /// Nothing is transferred per command. A pair touched several times is
    /// locked once. Any failure undoes the entire batch.
    ///
    /// # Errors
    /// - `UnresolvedAmount` if a command still carries a symbolic amount
    /// - anything a command or the settlement reports
    pub fn execute_batch<C: SettlementCallback<S>>(
        &mut self,
        owner: &AccountId,
        commands: &[Command],
        data: &[u8],
        callback: &mut C,
    ) -> Result<BatchReceipt> {
        self.transact(|engine| {
            let mut net = NetDeltas::new();
            let mut deltas = Vec::with_capacity(commands.len());
            for (index, command) in commands.iter().enumerate() {
                if let Some(asset) = command.unresolved() {
                    warn!(index, command = command.tag(), asset = %asset, "unresolved batch amount");
                    return Err(StrikeswapError::UnresolvedAmount(asset.clone()));
                }
                debug!(index, command = command.tag(), "applying batch command");
                let (key, delta) = engine.apply(owner, command)?;
                net.add_pair(&key, delta)?;
                deltas.push(delta);
            }
            engine.settle(owner, &net, data, callback)?;
            info!(owner = %owner, commands = commands.len(), assets = net.len(), "batch settled");
            Ok(BatchReceipt { deltas, net })
        })
    }

    fn run_single<C: SettlementCallback<S>>(
        &mut self,
        owner: &AccountId,
        command: &Command,
        data: &[u8],
        callback: &mut C,
    ) -> Result<PairDelta> {
        self.transact(|engine| {
            let (key, delta) = engine.apply(owner, command)?;
            let mut net = NetDeltas::new();
            net.add_pair(&key, delta)?;
            engine.settle(owner, &net, data, callback)?;
            Ok(delta)
        })
    }

    // -----------------------------------------------------------------
    // Frames
    // -----------------------------------------------------------------

    /// Run `f` inside a new frame, keeping its effects only if it succeeds.
    fn transact<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        self.frames.push(Frame {
            pre_images: HashMap::new(),
            locked: Vec::new(),
            checkpoint: self.assets.checkpoint(),
            events_len: self.events.len(),
            settled: NetDeltas::new(),
        });
        self.ledger.savepoint();

        match f(self) {
            Ok(value) => match self.commit_frame() {
                Ok(()) => Ok(value),
                Err(err) => {
                    self.rollback_frame();
                    Err(err)
                }
            },
            Err(err) => {
                self.rollback_frame();
                debug!(depth = self.frames.len(), error = %err, "frame rolled back");
                Err(err)
            }
        }
    }

    fn commit_frame(&mut self) -> Result<()> {
        if let [.., parent, frame] = self.frames.as_mut_slice() {
            let mut settled = parent.settled.clone();
            settled.merge(&frame.settled)?;
            parent.settled = settled;
        }
        let Some(frame) = self.frames.pop() else {
            return Ok(());
        };
        for id in &frame.locked {
            if let Some(pair) = self.pairs.get_mut(id) {
                pair.lock.release();
            }
        }
        if let Some(parent) = self.frames.last_mut() {
            for (id, image) in frame.pre_images {
                parent.pre_images.entry(id).or_insert(image);
            }
        }
        self.ledger.release_savepoint();
        Ok(())
    }

    /// Flows accounted by settlements committed in the current frame.
    pub(crate) fn settled_flows(&self) -> Result<&NetDeltas> {
        self.frames
            .last()
            .map(|frame| &frame.settled)
            .ok_or_else(|| StrikeswapError::Internal("settlement outside a frame".into()))
    }

    /// Record a settled flow on the current frame.
    pub(crate) fn account_settled(&mut self, asset: &AssetId, amount: Decimal) -> Result<()> {
        self.frames
            .last_mut()
            .ok_or_else(|| StrikeswapError::Internal("settlement outside a frame".into()))?
            .settled
            .accumulate(asset, amount)
    }

    fn rollback_frame(&mut self) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        for (id, image) in frame.pre_images {
            match image {
                Some(pair) => {
                    self.pairs.insert(id, pair);
                }
                None => {
                    self.pairs.remove(&id);
                }
            }
        }
        self.ledger.rollback_to_savepoint();
        self.assets.restore(frame.checkpoint);
        self.events.truncate(frame.events_len);
    }

    /// Lock a pair for the current frame, journaling its pre-image.
    fn acquire(&mut self, id: PairId) -> Result<()> {
        let frame = self
            .frames
            .last_mut()
            .ok_or_else(|| StrikeswapError::Internal("pair access outside a frame".into()))?;
        if frame.locked.contains(&id) {
            return Ok(());
        }
        let pair = self
            .pairs
            .get_mut(&id)
            .ok_or(StrikeswapError::PairNotFound(id))?;
        let image = pair.clone();
        pair.lock.acquire(id)?;
        frame.pre_images.entry(id).or_insert(Some(image));
        frame.locked.push(id);
        Ok(())
    }

    fn insert_pair(&mut self, key: &PairKey, initial_tick: i32) -> Result<PairId> {
        let id = key.id();
        if self.pairs.contains_key(&id) {
            return Err(StrikeswapError::PairAlreadyExists(id));
        }
        let state = PairState::initialize(key, initial_tick)?;
        let frame = self
            .frames
            .last_mut()
            .ok_or_else(|| StrikeswapError::Internal("pair creation outside a frame".into()))?;
        frame.pre_images.insert(id, None);
        frame.locked.push(id);
        self.pairs.insert(
            id,
            Pair {
                key: key.clone(),
                state,
                ticks: BTreeMap::new(),
                lock: PairLock::Locked,
            },
        );
        self.record(EngineEvent::PairCreated {
            pair: id,
            key: key.clone(),
            initial_tick,
        });
        Ok(id)
    }

    /// Apply one command inside the current frame.
    fn apply(&mut self, owner: &AccountId, command: &Command) -> Result<(PairKey, PairDelta)> {
        if let Command::CreatePair(create) = command {
            self.insert_pair(&create.pair, create.initial_tick)?;
            return Ok((create.pair.clone(), PairDelta::default()));
        }
        let id = command.pair().id();
        self.acquire(id)?;

        let Self {
            config,
            pairs,
            ledger,
            now,
            ..
        } = self;
        let pair = pairs.get_mut(&id).ok_or(StrikeswapError::PairNotFound(id))?;
        let mut ctx = OpContext {
            config,
            now: *now,
            key: &pair.key,
            state: &mut pair.state,
            ticks: &mut pair.ticks,
            book: ledger,
        };
        let applied = ops::apply(&mut ctx, owner, command)?;
        let key = pair.key.clone();
        self.record(applied.event);
        Ok((key, applied.delta))
    }

    fn record(&mut self, event: EngineEvent) {
        info!(event = event.name(), ledger_time = self.now, "engine event");
        self.events.push(EventRecord::new(event, self.now));
    }

    // -----------------------------------------------------------------
    // Clock
    // -----------------------------------------------------------------

    #[must_use]
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn set_time(&mut self, now: u64) {
        self.now = now;
    }

    pub fn advance_time(&mut self, seconds: u64) {
        self.now = self.now.saturating_add(seconds);
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn pair(&self, id: &PairId) -> Option<&Pair> {
        self.pairs.get(id)
    }

    #[must_use]
    pub fn pair_by_key(&self, key: &PairKey) -> Option<&Pair> {
        self.pairs.get(&key.id())
    }

    pub fn pairs(&self) -> impl Iterator<Item = &Pair> {
        self.pairs.values()
    }

    /// A tick of a stored pair; untouched ticks read as empty.
    #[must_use]
    pub fn tick(&self, id: &PairId, index: i32) -> Option<Tick> {
        self.pairs.get(id).map(|pair| pair.tick(index))
    }

    #[must_use]
    pub fn position(&self, owner: &AccountId, key: &PositionKey) -> Option<&Position> {
        self.ledger.position(owner, key)
    }

    #[must_use]
    pub fn balance_of(&self, owner: &AccountId, key: &PositionKey) -> Decimal {
        self.ledger.balance_of(owner, key)
    }

    #[must_use]
    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    #[must_use]
    pub fn assets(&self) -> &S {
        &self.assets
    }

    /// Direct access to custody, for pay-ins from a settlement callback.
    pub fn assets_mut(&mut self) -> &mut S {
        &mut self.assets
    }

    #[must_use]
    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    /// Drain the event log.
    pub fn take_events(&mut self) -> Vec<EventRecord> {
        std::mem::take(&mut self.events)
    }
}
