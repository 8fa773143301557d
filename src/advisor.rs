use crate::phase::Phase;

/// Returned for any label outside the phase enumeration.
pub const UNKNOWN_PHASE_ADVICE: &str = "Unknown phase.";

/// Recommended action for a phase.
pub fn advise(phase: Phase) -> &'static str {
    match phase {
        Phase::Bitcoin => "Favour holding or longing BTC; do not go all-in on altcoins.",
        Phase::Ethereum => "Long ETH and ETH-ecosystem tokens (L2s, liquid staking).",
        Phase::LargeCaps => "Focus on top 10-30 coins with strong narratives.",
        Phase::Altseason => "Trade short swings and take profit continuously.",
        Phase::Reset => "Exit positions, move to USDT, stop trading.",
    }
}

/// Advice for a free-form label, e.g. one restored from session state.
pub fn advise_label(label: &str) -> &'static str {
    label
        .parse::<Phase>()
        .map(advise)
        .unwrap_or(UNKNOWN_PHASE_ADVICE)
}
