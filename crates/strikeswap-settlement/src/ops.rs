//! Single-command state transitions.
//!
//! Everything here mutates only what it is handed: a pair's curve state, a
//! tick store and a position book. The engine runs these against its own
//! storage; the router's simulator runs the very same functions against a
//! lazy snapshot, which is what keeps simulated deltas equal to the deltas
//! the engine later realizes.

use rust_decimal::Decimal;
use strikeswap_curve::{PairState, TickStore, math};
use strikeswap_types::{
    AccountId, AccrueParams, Amount, Command, EngineConfig, EngineEvent, LiquidityParams,
    PairDelta, PairKey, PositionDescriptor, PositionKind, Result, StrikeswapError, SwapParams,
    spread_index,
};

use crate::ledger::PositionBook;

/// Everything one command may touch.
pub struct OpContext<'a, T: TickStore, B: PositionBook> {
    pub config: &'a EngineConfig,
    /// Ledger time the command executes at.
    pub now: u64,
    pub key: &'a PairKey,
    pub state: &'a mut PairState,
    pub ticks: &'a mut T,
    pub book: &'a mut B,
}

/// What applying a command produced.
#[derive(Debug, Clone)]
pub struct Applied {
    pub delta: PairDelta,
    pub event: EngineEvent,
}

/// Apply one command to an existing pair.
///
/// # Errors
/// - `InvalidCommand` for `CreatePair`, which needs the pair store
/// - `UnresolvedAmount` for a swap whose amount is still symbolic
/// - anything the curve or the position book reports
pub fn apply<T: TickStore, B: PositionBook>(
    ctx: &mut OpContext<'_, T, B>,
    owner: &AccountId,
    command: &Command,
) -> Result<Applied> {
    let pair = ctx.key.id();
    match command {
        Command::CreatePair(_) => Err(StrikeswapError::InvalidCommand {
            reason: format!("{} cannot be applied to an existing pair", command.tag()),
        }),
        Command::AddLiquidity(p) => {
            let delta = add_liquidity(ctx, owner, p)?;
            Ok(Applied {
                delta,
                event: EngineEvent::LiquidityAdded {
                    pair,
                    owner: *owner,
                    tick: p.tick,
                    tier: p.tier,
                    liquidity: p.liquidity,
                    delta,
                },
            })
        }
        Command::RemoveLiquidity(p) => {
            let delta = remove_liquidity(ctx, owner, p)?;
            Ok(Applied {
                delta,
                event: EngineEvent::LiquidityRemoved {
                    pair,
                    owner: *owner,
                    tick: p.tick,
                    tier: p.tier,
                    liquidity: p.liquidity,
                    delta,
                },
            })
        }
        Command::BorrowLiquidity(p) => {
            let delta = borrow_liquidity(ctx, owner, p)?;
            Ok(Applied {
                delta,
                event: EngineEvent::LiquidityBorrowed {
                    pair,
                    owner: *owner,
                    tick: p.tick,
                    tier: p.tier,
                    liquidity: p.liquidity,
                    delta,
                },
            })
        }
        Command::RepayLiquidity(p) => {
            let delta = repay_liquidity(ctx, owner, p)?;
            Ok(Applied {
                delta,
                event: EngineEvent::LiquidityRepaid {
                    pair,
                    owner: *owner,
                    tick: p.tick,
                    tier: p.tier,
                    liquidity: p.liquidity,
                    delta,
                },
            })
        }
        Command::Swap(s) => {
            let delta = swap(ctx, s)?;
            Ok(Applied {
                delta,
                event: EngineEvent::SwapExecuted {
                    pair,
                    owner: *owner,
                    delta,
                },
            })
        }
        Command::Accrue(a) => {
            let borrow_index = accrue(ctx, a)?;
            Ok(Applied {
                delta: PairDelta::default(),
                event: EngineEvent::Accrued {
                    pair,
                    tick: a.tick,
                    tier: a.tier,
                    borrow_index,
                },
            })
        }
    }
}

fn descriptor(key: &PairKey, p: &LiquidityParams, kind: PositionKind) -> PositionDescriptor {
    PositionDescriptor::new(key.clone(), p.tick, p.tier, kind)
}

/// Supply liquidity and credit the owner's liquidity position.
pub fn add_liquidity<T: TickStore, B: PositionBook>(
    ctx: &mut OpContext<'_, T, B>,
    owner: &AccountId,
    p: &LiquidityParams,
) -> Result<PairDelta> {
    math::require_positive(p.liquidity, "liquidity")?;
    let delta =
        strikeswap_curve::update_liquidity(ctx.state, ctx.ticks, p.tier, p.tick, p.liquidity)?;
    ctx.book
        .mint(owner, &descriptor(ctx.key, p, PositionKind::Liquidity), p.liquidity)?;
    Ok(delta)
}

/// Withdraw liquidity the owner supplied.
///
/// The position is debited first, so withdrawing more than the owner holds
/// fails with `InsufficientBalance` even when the tick has enough.
pub fn remove_liquidity<T: TickStore, B: PositionBook>(
    ctx: &mut OpContext<'_, T, B>,
    owner: &AccountId,
    p: &LiquidityParams,
) -> Result<PairDelta> {
    math::require_positive(p.liquidity, "liquidity")?;
    ctx.book
        .burn(owner, &descriptor(ctx.key, p, PositionKind::Liquidity), p.liquidity)?;
    strikeswap_curve::update_liquidity(ctx.state, ctx.ticks, p.tier, p.tick, -p.liquidity)
}

/// Borrow liquidity against token1 collateral worth its full strike value.
pub fn borrow_liquidity<T: TickStore, B: PositionBook>(
    ctx: &mut OpContext<'_, T, B>,
    owner: &AccountId,
    p: &LiquidityParams,
) -> Result<PairDelta> {
    let rate = ctx.config.borrow_rate(spread_index(p.tier)?);
    math::require_positive(p.liquidity, "liquidity")?;

    let debt = descriptor(ctx.key, p, PositionKind::Debt);
    let index = strikeswap_curve::accrue(ctx.ticks, p.tier, p.tick, rate, ctx.now)?;
    ctx.book.rebase(owner, &debt, index)?;

    let (mut delta, _) = strikeswap_curve::borrow(
        ctx.state,
        ctx.ticks,
        p.tier,
        p.tick,
        p.liquidity,
        rate,
        ctx.now,
    )?;
    ctx.book.mint(owner, &debt, p.liquidity)?;

    let collateral = math::round_up(math::mul(p.liquidity, ctx.state.scale)?);
    delta.amount1 = math::add(delta.amount1, collateral)?;
    ctx.book
        .mint(owner, &descriptor(ctx.key, p, PositionKind::Collateral), collateral)?;
    Ok(delta)
}

/// Repay borrowed liquidity and release collateral pro rata.
///
/// The debt is rebased to the current index first, so `liquidity` may be at
/// most the accrued debt.
pub fn repay_liquidity<T: TickStore, B: PositionBook>(
    ctx: &mut OpContext<'_, T, B>,
    owner: &AccountId,
    p: &LiquidityParams,
) -> Result<PairDelta> {
    let rate = ctx.config.borrow_rate(spread_index(p.tier)?);
    math::require_positive(p.liquidity, "liquidity")?;

    let debt = descriptor(ctx.key, p, PositionKind::Debt);
    let collateral = descriptor(ctx.key, p, PositionKind::Collateral);
    let index = strikeswap_curve::accrue(ctx.ticks, p.tier, p.tick, rate, ctx.now)?;
    let owed = ctx.book.rebase(owner, &debt, index)?;
    let posted = ctx.book.balance(owner, &collateral);

    ctx.book.burn(owner, &debt, p.liquidity)?;
    let released = math::round_down(math::div(math::mul(posted, p.liquidity)?, owed)?);
    ctx.book.burn(owner, &collateral, released)?;

    let (mut delta, _) = strikeswap_curve::repay(
        ctx.state,
        ctx.ticks,
        p.tier,
        p.tick,
        p.liquidity,
        rate,
        ctx.now,
    )?;
    delta.amount1 = math::sub(delta.amount1, released)?;
    Ok(delta)
}

pub fn swap<T: TickStore, B: PositionBook>(
    ctx: &mut OpContext<'_, T, B>,
    s: &SwapParams,
) -> Result<PairDelta> {
    let amount = match &s.amount {
        Amount::Exact(amount) => *amount,
        Amount::BatchBalance(asset) => {
            return Err(StrikeswapError::UnresolvedAmount(asset.clone()));
        }
    };
    strikeswap_curve::swap(ctx.state, ctx.ticks, ctx.config, s.is_token0, amount)
}

/// Bring a tick's borrow index up to date and return it.
pub fn accrue<T: TickStore, B: PositionBook>(
    ctx: &mut OpContext<'_, T, B>,
    a: &AccrueParams,
) -> Result<Decimal> {
    let rate = ctx.config.borrow_rate(spread_index(a.tier)?);
    strikeswap_curve::accrue(ctx.ticks, a.tier, a.tick, rate, ctx.now)
}
