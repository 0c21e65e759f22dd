//! Netting simulator.
//!
//! Replays a batch against a read-only view of the engine to find out what
//! it will net to, and resolves symbolic amounts along the way. Pair headers
//! are copied on first reference; ticks and positions are copied lazily the
//! first time the replay reads them, so a simulation costs what it touches.
//! The engine itself is never mutated.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use rust_decimal::Decimal;
use strikeswap_curve::{PairState, Tick, TickStore};
use strikeswap_settlement::ops::{self, OpContext};
use strikeswap_settlement::{AssetTransferService, Engine, Position, PositionBook, PositionLedger};
use strikeswap_types::{
    AccountId, Amount, Command, NetDeltas, PairDelta, PairId, PairKey, PositionDescriptor,
    PositionKey, Result, StrikeswapError, SwapParams,
};
use tracing::debug;

// ---------------------------------------------------------------------------
// Lazy state
// ---------------------------------------------------------------------------

/// Copy-on-read view over a pair's live ticks.
#[derive(Debug, Clone)]
pub struct LazyTicks<'e> {
    live: Option<&'e BTreeMap<i32, Tick>>,
    /// Every tick read or written so far. Wins over `live`.
    cache: BTreeMap<i32, Tick>,
}

impl<'e> LazyTicks<'e> {
    #[must_use]
    pub fn new(live: Option<&'e BTreeMap<i32, Tick>>) -> Self {
        Self {
            live,
            cache: BTreeMap::new(),
        }
    }

    /// Number of ticks copied so far.
    #[must_use]
    pub fn fetched(&self) -> usize {
        self.cache.len()
    }
}

fn nearest(
    map: &BTreeMap<i32, Tick>,
    from: i32,
    upward: bool,
    accept: impl Fn(i32, &Tick) -> bool,
) -> Option<i32> {
    if upward {
        map.range((Bound::Excluded(from), Bound::Unbounded))
            .find(|(index, tick)| accept(**index, tick))
            .map(|(index, _)| *index)
    } else {
        map.range(..from)
            .rev()
            .find(|(index, tick)| accept(**index, tick))
            .map(|(index, _)| *index)
    }
}

impl TickStore for LazyTicks<'_> {
    fn tick(&mut self, index: i32) -> Tick {
        if let Some(tick) = self.cache.get(&index) {
            return *tick;
        }
        let tick = self
            .live
            .and_then(|live| live.get(&index).copied())
            .unwrap_or_default();
        self.cache.insert(index, tick);
        tick
    }

    fn set_tick(&mut self, index: i32, tick: Tick) {
        self.cache.insert(index, tick);
    }

    fn next_initialized(&mut self, tier: usize, from: i32, upward: bool) -> Option<i32> {
        let cache = &self.cache;
        let cached = nearest(cache, from, upward, |_, t| t.has_liquidity(tier));
        let live = self.live.and_then(|live| {
            nearest(live, from, upward, |index, t| {
                !cache.contains_key(&index) && t.has_liquidity(tier)
            })
        });
        let found = match (cached, live) {
            (Some(a), Some(b)) => Some(if upward { a.min(b) } else { a.max(b) }),
            (a, b) => a.or(b),
        };
        if let Some(index) = found {
            self.tick(index);
        }
        found
    }
}

type Slot = (AccountId, PositionKey);

/// Copy-on-read view over the position ledger that tracks net changes.
#[derive(Debug, Clone)]
pub struct PositionOverlay<'e> {
    ledger: &'e PositionLedger,
    cache: BTreeMap<Slot, Position>,
    /// Balance at first reference.
    original: BTreeMap<Slot, Decimal>,
}

/// Net change of one position over a simulated batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionChange {
    pub owner: AccountId,
    pub descriptor: PositionDescriptor,
    pub delta: Decimal,
}

impl<'e> PositionOverlay<'e> {
    #[must_use]
    pub fn new(ledger: &'e PositionLedger) -> Self {
        Self {
            ledger,
            cache: BTreeMap::new(),
            original: BTreeMap::new(),
        }
    }

    /// Positions whose balance moved, in owner/key order.
    #[must_use]
    pub fn changes(&self) -> Vec<PositionChange> {
        self.cache
            .iter()
            .filter_map(|(slot, position)| {
                let before = self.original.get(slot).copied().unwrap_or(Decimal::ZERO);
                let delta = position.balance - before;
                (!delta.is_zero()).then(|| PositionChange {
                    owner: slot.0,
                    descriptor: position.descriptor.clone(),
                    delta,
                })
            })
            .collect()
    }

    fn remember(&mut self, slot: Slot) {
        let ledger = self.ledger;
        self.original
            .entry(slot)
            .or_insert_with(|| ledger.balance_of(&slot.0, &slot.1));
    }
}

impl PositionBook for PositionOverlay<'_> {
    fn position_of(&mut self, owner: &AccountId, key: &PositionKey) -> Option<Position> {
        let slot = (*owner, *key);
        if let Some(position) = self.cache.get(&slot) {
            return Some(position.clone());
        }
        let position = self.ledger.position(owner, key).cloned()?;
        self.remember(slot);
        self.cache.insert(slot, position.clone());
        Some(position)
    }

    fn put_position(&mut self, owner: &AccountId, position: Position) {
        let slot = (*owner, position.descriptor.key());
        self.remember(slot);
        self.cache.insert(slot, position);
    }
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// A pair as the simulation sees it.
#[derive(Debug, Clone)]
struct SimPair<'e> {
    key: PairKey,
    state: PairState,
    ticks: LazyTicks<'e>,
}

/// Result of replaying a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Simulation {
    /// The batch with every symbolic amount replaced by a literal.
    pub commands: Vec<Command>,
    /// Delta of each command, in order.
    pub deltas: Vec<PairDelta>,
    /// Per-asset net, positive = owed by the caller.
    pub net: NetDeltas,
    pub positions: Vec<PositionChange>,
}

/// Replays commands against a read-only engine.
pub struct Simulator<'e, S: AssetTransferService> {
    engine: &'e Engine<S>,
    now: u64,
    pairs: HashMap<PairId, SimPair<'e>>,
    positions: PositionOverlay<'e>,
    net: NetDeltas,
    commands: Vec<Command>,
    deltas: Vec<PairDelta>,
}

impl<'e, S: AssetTransferService> Simulator<'e, S> {
    /// Simulate as if executed at ledger time `at_time`.
    #[must_use]
    pub fn new(engine: &'e Engine<S>, at_time: u64) -> Self {
        Self {
            engine,
            now: at_time,
            pairs: HashMap::new(),
            positions: PositionOverlay::new(engine.ledger()),
            net: NetDeltas::new(),
            commands: Vec::new(),
            deltas: Vec::new(),
        }
    }

    /// Replay a whole batch.
    pub fn simulate(mut self, owner: &AccountId, commands: &[Command]) -> Result<Simulation> {
        for command in commands {
            self.step(owner, command)?;
        }
        debug!(commands = commands.len(), assets = self.net.len(), "batch simulated");
        Ok(self.finish())
    }

    /// Replay one command, resolving a symbolic amount against the net so
    /// far.
    ///
    /// # Errors
    /// - `InvalidCommand` if a symbolic amount names the wrong token or
    ///   nothing is owed to the caller in it
    /// - anything the command itself would fail with on the engine
    pub fn step(&mut self, owner: &AccountId, command: &Command) -> Result<PairDelta> {
        let command = self.resolve(command)?;
        let delta = match &command {
            Command::CreatePair(create) => {
                self.create(&create.pair, create.initial_tick)?;
                PairDelta::default()
            }
            _ => {
                let id = command.pair().id();
                self.load(id)?;
                let pair = self
                    .pairs
                    .get_mut(&id)
                    .ok_or(StrikeswapError::PairNotFound(id))?;
                let mut ctx = OpContext {
                    config: self.engine.config(),
                    now: self.now,
                    key: &pair.key,
                    state: &mut pair.state,
                    ticks: &mut pair.ticks,
                    book: &mut self.positions,
                };
                let applied = ops::apply(&mut ctx, owner, &command)?;
                self.net.add_pair(&pair.key, applied.delta)?;
                applied.delta
            }
        };
        self.commands.push(command);
        self.deltas.push(delta);
        Ok(delta)
    }

    /// Net per-asset delta so far.
    #[must_use]
    pub fn net(&self) -> &NetDeltas {
        &self.net
    }

    /// Ticks copied from the engine for `pair` so far.
    #[must_use]
    pub fn fetched_ticks(&self, pair: &PairId) -> usize {
        self.pairs.get(pair).map_or(0, |p| p.ticks.fetched())
    }

    #[must_use]
    pub fn finish(self) -> Simulation {
        Simulation {
            positions: self.positions.changes(),
            commands: self.commands,
            deltas: self.deltas,
            net: self.net,
        }
    }

    fn resolve(&self, command: &Command) -> Result<Command> {
        let Command::Swap(SwapParams {
            pair,
            is_token0,
            amount: Amount::BatchBalance(asset),
        }) = command
        else {
            return Ok(command.clone());
        };
        if pair.token(*is_token0) != asset {
            return Err(StrikeswapError::InvalidCommand {
                reason: format!(
                    "batch balance of {asset} cannot fund a swap specified in {}",
                    pair.token(*is_token0)
                ),
            });
        }
        let owed_to_caller = -self.net.get(asset);
        if owed_to_caller <= Decimal::ZERO {
            return Err(StrikeswapError::InvalidCommand {
                reason: format!("no {asset} owed to the caller at this point of the batch"),
            });
        }
        debug!(asset = %asset, amount = %owed_to_caller, "resolved batch balance");
        Ok(Command::Swap(SwapParams {
            pair: pair.clone(),
            is_token0: *is_token0,
            amount: Amount::Exact(owed_to_caller),
        }))
    }

    fn create(&mut self, key: &PairKey, initial_tick: i32) -> Result<()> {
        let id = key.id();
        if self.pairs.contains_key(&id) || self.engine.pair(&id).is_some() {
            return Err(StrikeswapError::PairAlreadyExists(id));
        }
        self.pairs.insert(
            id,
            SimPair {
                key: key.clone(),
                state: PairState::initialize(key, initial_tick)?,
                ticks: LazyTicks::new(None),
            },
        );
        Ok(())
    }

    fn load(&mut self, id: PairId) -> Result<()> {
        if self.pairs.contains_key(&id) {
            return Ok(());
        }
        let engine = self.engine;
        let live = engine.pair(&id).ok_or(StrikeswapError::PairNotFound(id))?;
        self.pairs.insert(
            id,
            SimPair {
                key: live.key().clone(),
                state: live.state().clone(),
                ticks: LazyTicks::new(Some(live.ticks())),
            },
        );
        Ok(())
    }
}
