//! Exchange-agnostic domain types.

pub mod arbitrage;
pub mod market;
pub mod order;
pub mod position;
pub mod state;
pub mod trade;
pub mod triangle;

pub use arbitrage::{ArbitrageId, ArbitragePosition, ArbitrageStatus, LegFill, TransitionError};
pub use market::{
    split_instrument, AccountBalance, Balance, OrderBook, PriceLevel, Side, Ticker, TickerSnapshot,
};
pub use order::{
    AccountPosition, CancelRequest, OrderAck, OrderRecord, OrderRequest, OrderType, TradeMode,
};
pub use position::{ExitReason, Position, PositionId, PositionStatus, Thresholds};
pub use state::{LedgerEntry, StateDocument, StrategyState};
pub use trade::{to_decimal, TradeAction, TradeRecord};
pub use triangle::{Direction, Evaluation, Triangle, TriangleError};
