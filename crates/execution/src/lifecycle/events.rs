//! Pool events for indexers.

use primitive_types::{H160, U256};
use serde::{Deserialize, Serialize};

/// Type of pool event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolEventType {
    /// Swap between two pool coins.
    TokenExchange,
    /// Swap routed through the base pool of a metapool.
    TokenExchangeUnderlying,
    /// Liquidity was deposited.
    AddLiquidity,
    /// Balanced withdrawal.
    RemoveLiquidity,
    /// Single-coin withdrawal.
    RemoveLiquidityOne,
    /// Withdrawal of arbitrary amounts.
    RemoveLiquidityImbalance,
    /// A ramp of A started.
    RampA,
    /// A ramp of A was stopped.
    StopRampA,
    /// Admin fee changed.
    NewFee,
    /// Swap fee and off-peg multiplier changed.
    ApplyNewFee,
    /// Oracle windows changed.
    SetNewMaTime,
    /// New admin proposed.
    CommitOwnership,
    /// Admin changed.
    ApplyOwnership,
    /// Accrued admin fees were paid out.
    WithdrawAdminFees,
}

/// An event emitted by a committed pool operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolEvent {
    /// Pool address.
    pub pool: H160,
    /// Pool clock at emission, in seconds.
    pub timestamp: u64,
    /// Event type.
    pub event_type: PoolEventType,
    /// Event-specific data.
    pub data: EventData,
}

impl PoolEvent {
    pub fn new(pool: H160, timestamp: u64, event_type: PoolEventType, data: EventData) -> Self {
        Self {
            pool,
            timestamp,
            event_type,
            data,
        }
    }
}

/// Event-specific data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventData {
    Exchange(ExchangeData),
    Liquidity(LiquidityData),
    RemoveOne(RemoveOneData),
    Ramp(RampData),
    StopRamp(StopRampData),
    Fee(FeeData),
    MaTime(MaTimeData),
    Ownership(OwnershipData),
    AdminFees(AdminFeesData),
}

/// Data for exchange events. Indices are underlying indices for
/// `TokenExchangeUnderlying`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeData {
    pub buyer: H160,
    pub sold_id: usize,
    pub tokens_sold: U256,
    pub bought_id: usize,
    pub tokens_bought: U256,
}

/// Data for add, balanced remove and imbalanced remove events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityData {
    pub provider: H160,
    pub token_amounts: Vec<U256>,
    /// Imbalance fee charged per coin, zero for balanced removals.
    pub fees: Vec<U256>,
    /// Invariant after the operation. Not reported for balanced removals.
    pub invariant: Option<U256>,
    /// LP supply after the operation.
    pub token_supply: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveOneData {
    pub provider: H160,
    pub token_id: usize,
    pub token_amount: U256,
    pub coin_amount: U256,
    pub token_supply: U256,
}

/// Ramp endpoints, A in precise units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RampData {
    pub old_a: U256,
    pub new_a: U256,
    pub initial_time: u64,
    pub future_time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopRampData {
    pub a: U256,
    pub time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeData {
    pub fee: U256,
    pub offpeg_fee_multiplier: U256,
    pub admin_fee: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaTimeData {
    pub ma_exp_time: u64,
    pub d_ma_time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipData {
    pub admin: H160,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminFeesData {
    pub receiver: H160,
    pub amounts: Vec<U256>,
}

/// Append-only event buffer owned by a pool.
///
/// Lives inside the pool state so that a rolled-back operation also drops
/// the events it emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<PoolEvent>,
}

impl EventLog {
    pub fn push(&mut self, event: PoolEvent) {
        self.events.push(event);
    }

    /// Removes and returns every buffered event, oldest first.
    pub fn drain(&mut self) -> Vec<PoolEvent> {
        std::mem::take(&mut self.events)
    }

    /// Drops every event past the first `len`.
    pub fn truncate(&mut self, len: usize) {
        self.events.truncate(len);
    }

    pub fn iter(&self) -> impl Iterator<Item = &PoolEvent> {
        self.events.iter()
    }

    /// Buffered events of one type.
    pub fn of_type(&self, event_type: PoolEventType) -> impl Iterator<Item = &PoolEvent> {
        self.events
            .iter()
            .filter(move |event| event.event_type == event_type)
    }

    pub fn last(&self) -> Option<&PoolEvent> {
        self.events.last()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
