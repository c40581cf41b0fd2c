// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free indicator implementations. Every function returns a
// series aligned with its input: one slot per input bar, `None` until the
// window's minimum period is satisfied (and for numerical edge cases such as
// a zero true range). Computation never errors; undefined values simply
// propagate to the signal rules, which treat them as "condition not met".

pub mod bollinger;
pub mod dmi;
pub mod rsi;
pub mod sma;
pub mod williams_r;
