// =============================================================================
// Shared types used across the Vertex signal engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// Three-state trend classification for a single (symbol, timeframe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendLabel {
    Bullish,
    Bearish,
    Neutral,
}

impl Default for TrendLabel {
    fn default() -> Self {
        Self::Neutral
    }
}

impl std::fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bullish => write!(f, "BULLISH"),
            Self::Bearish => write!(f, "BEARISH"),
            Self::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Discrete signal classifications emitted by the decision engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalKind {
    LongBuildup,
    ShortBuildup,
    ShortCovering,
    LongUnwinding,
    Long,
    Short,
    NoTrade,
    Ignore,
}

impl SignalKind {
    /// Whether this kind represents an actionable directional call.
    pub fn is_directional(&self) -> bool {
        !matches!(self, Self::NoTrade | Self::Ignore)
    }

    /// Bearish-leaning rate-of-change kinds are subject to the extra
    /// confirmation gate before they may fire.
    pub fn is_bearish_leaning(&self) -> bool {
        matches!(self, Self::ShortBuildup | Self::LongUnwinding)
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LongBuildup => write!(f, "LONG BUILDUP"),
            Self::ShortBuildup => write!(f, "SHORT BUILDUP"),
            Self::ShortCovering => write!(f, "SHORT COVERING"),
            Self::LongUnwinding => write!(f, "LONG UNWINDING"),
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
            Self::NoTrade => write!(f, "NO TRADE"),
            Self::Ignore => write!(f, "IGNORE"),
        }
    }
}

/// A single evaluated signal. Ephemeral: recomputed on every evaluation and
/// never persisted beyond emission (the audit log keeps its own record).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub kind: SignalKind,
    pub reason: String,
    pub volume_confirmed: bool,
}

impl Signal {
    pub fn new(kind: SignalKind, reason: impl Into<String>, volume_confirmed: bool) -> Self {
        Self {
            kind,
            reason: reason.into(),
            volume_confirmed,
        }
    }

    /// A non-actionable signal with an explanatory reason.
    pub fn no_trade(reason: impl Into<String>) -> Self {
        Self::new(SignalKind::NoTrade, reason, false)
    }

    pub fn ignore(reason: impl Into<String>) -> Self {
        Self::new(SignalKind::Ignore, reason, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trend_label_display_matches_wire_format() {
        assert_eq!(TrendLabel::Bullish.to_string(), "BULLISH");
        assert_eq!(TrendLabel::Bearish.to_string(), "BEARISH");
        assert_eq!(TrendLabel::Neutral.to_string(), "NEUTRAL");
    }

    #[test]
    fn trend_label_serde_roundtrip() {
        let json = serde_json::to_string(&TrendLabel::Bullish).unwrap();
        assert_eq!(json, "\"BULLISH\"");
        let back: TrendLabel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TrendLabel::Bullish);
    }

    #[test]
    fn directional_classification() {
        assert!(SignalKind::LongBuildup.is_directional());
        assert!(SignalKind::Short.is_directional());
        assert!(!SignalKind::NoTrade.is_directional());
        assert!(!SignalKind::Ignore.is_directional());
    }

    #[test]
    fn bearish_leaning_kinds() {
        assert!(SignalKind::ShortBuildup.is_bearish_leaning());
        assert!(SignalKind::LongUnwinding.is_bearish_leaning());
        assert!(!SignalKind::ShortCovering.is_bearish_leaning());
        assert!(!SignalKind::LongBuildup.is_bearish_leaning());
    }
}
