//! # StableSwap AMM Library - Stable Pool Mathematics Engine
//!
//! ## Purpose
//!
//! Numerical core of an automated market maker for same-value assets. Solves
//! the StableSwap invariant and its inverse, prices swaps, joins and exits,
//! and attributes invariant growth between swap fees and asset yield so the
//! protocol's share can be minted as pool shares.
//!
//! ## Integration Points
//!
//! - **Input Sources**: balances from the custody layer, amplification and
//!   swap fee from [`config::PoolConfig`], rates and protocol fee percentages
//!   from the collaborators in [`pool_traits`]
//! - **Output Destinations**: quotes returned to the caller, share mints and
//!   burns applied through [`ShareLedger`]
//! - **Precision**: 18-decimal [`FixedPoint`] with an explicit rounding
//!   direction on every multiply and divide
//! - **Validation**: domain checks at entry, checked arithmetic throughout
//!
//! ## Architecture Role
//!
//! Leaves first: [`invariant`] depends only on the fixed-point types;
//! [`swap_math`] and [`liquidity_math`] quote against it; [`protocol_fees`]
//! runs the growth attribution around every join and exit; [`pool`] sequences
//! the whole operation and commits it in one step.
//!
//! See [`architecture_diagram()`] for visual representation of the data flow.
//!
//! ## Rounding Profile
//!
//! - **Swaps**: one unit shaved off amounts out, one unit added to amounts in
//! - **Joins**: shares out round down, amounts in round up
//! - **Exits**: shares in round up, amounts out round down
//! - **Protocol fees**: minted shares round down

pub mod errors;
pub mod in_memory;
pub mod invariant;
pub mod liquidity_math;
pub mod pool;
pub mod pool_traits;
pub mod protocol_fees;
pub mod swap_math;

pub use errors::{Result, SlippageViolation, StableMathError};
pub use in_memory::{InMemoryRateCache, InMemoryShareLedger, StaticFeeCache};
pub use invariant::{
    calculate_invariant, calculate_invariant_bounded, solve_balance_given_invariant, Convergence,
};
pub use liquidity_math::{quote_exit, quote_join, ExitKind, ExitQuote, JoinKind, JoinQuote};
pub use pool::StablePool;
pub use pool_traits::{
    ProtocolFeePercentages, ProtocolFeeType, ShareLedger, SupplyChange, TokenRateCache, TokenRates,
};
pub use protocol_fees::{
    bpt_for_pool_ownership_percentage, GrowthAttribution, GrowthInvariants, LastJoinExit,
    PostJoinExit, PreJoinExit, ProtocolFeeAccrual, YieldExemptions,
};
pub use swap_math::{
    quote_swap_given_in, quote_swap_given_out, SwapKind, SwapQuote, SwapRequest,
};

/// Common types for stable pool calculations
pub use types::{FixedPoint, U256};

/// Architecture diagram showing the stable pool data flow
#[cfg_attr(doc, aquamarine::aquamarine)]
/// ```mermaid
/// graph LR
///     subgraph Input["📊 Input Layer"]
///         BV[Balance Vector]
///         AMP[Amplification]
///         RC[Rate Cache]
///         FC[Fee Cache]
///     end
///
///     subgraph Solver["🧮 Invariant Solver"]
///         CI[calculate_invariant]
///         SB[solve_balance_given_invariant]
///     end
///
///     subgraph Quoting["📐 Quoting"]
///         SW[Swap Math]
///         JE[Join / Exit Math]
///     end
///
///     subgraph Fees["💰 Growth Attribution"]
///         PRE[Pre-charge]
///         POST[Post-charge]
///         SNAP[Last Join/Exit Snapshot]
///     end
///
///     subgraph Output["🎯 Settlement"]
///         LED[Share Ledger]
///         Q[Quotes]
///     end
///
///     BV --> CI
///     AMP --> CI
///     CI --> SB
///     SB --> SW
///     SB --> JE
///     RC --> PRE
///     FC --> PRE
///     SNAP --> PRE
///     PRE --> JE
///     JE --> POST
///     POST --> SNAP
///     POST --> LED
///     SW --> Q
///     JE --> Q
///
///     style Input fill:#e1f5fe
///     style Solver fill:#fff3e0
///     style Quoting fill:#f3e5f5
///     style Fees fill:#fffde7
///     style Output fill:#e8f5e9
/// ```
pub fn architecture_diagram() {
    // This function exists solely for documentation purposes
    // The diagram is rendered by aquamarine in rustdoc
}
