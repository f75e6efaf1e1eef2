// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators used by the signal
// engine. Insufficient data is never an error: functions return `None` or an
// absent-padded series and callers degrade to a neutral result.

pub mod atr;
pub mod ema;
pub mod rsi;
