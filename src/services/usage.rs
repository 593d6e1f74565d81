//! Usage normalization and cost
//!
//! Prices are per million tokens. Cost is only known when both counts and
//! both prices are; anything missing means "no cost", never zero.

use crate::config::ModelConfig;
use crate::models::openai::WireUsage;
use crate::models::Usage;
use std::fmt;

/// Smallest allowed cost multiplier
pub const MIN_MULTIPLIER: u32 = 1;
/// Largest allowed cost multiplier
pub const MAX_MULTIPLIER: u32 = 999_999;

const TOKENS_PER_PRICE_UNIT: f64 = 1_000_000.0;

/// Convert a provider usage record into the uniform shape
///
/// `total` is derived only when the provider sent both counts but no total.
/// Returns `None` when the record carries no count at all.
pub fn normalize_usage(wire: WireUsage) -> Option<Usage> {
    let total_tokens = wire.total_tokens.or_else(|| match (wire.prompt_tokens, wire.completion_tokens) {
        (Some(prompt), Some(completion)) => Some(prompt.saturating_add(completion)),
        _ => None,
    });

    let usage = Usage {
        prompt_tokens: wire.prompt_tokens,
        completion_tokens: wire.completion_tokens,
        total_tokens,
    };

    if usage.is_empty() {
        None
    } else {
        Some(usage)
    }
}

/// `prompt × input/1e6 + completion × output/1e6`
pub fn compute_cost(usage: &Usage, model: &ModelConfig) -> Option<f64> {
    let prompt = usage.prompt_tokens?;
    let completion = usage.completion_tokens?;
    let input_price = model.input_token_price?;
    let output_price = model.output_token_price?;

    Some(
        f64::from(prompt) * input_price / TOKENS_PER_PRICE_UNIT
            + f64::from(completion) * output_price / TOKENS_PER_PRICE_UNIT,
    )
}

/// Fixed six-digit display
pub fn format_cost(cost: f64) -> String {
    format!("{:.6}", cost)
}

/// Cost as displayed, rounded to six fractional digits
pub fn round_cost(cost: f64) -> f64 {
    (cost * TOKENS_PER_PRICE_UNIT).round() / TOKENS_PER_PRICE_UNIT
}

/// Clamp a requested multiplier into the accepted range
pub fn clamp_multiplier(multiplier: u32) -> u32 {
    multiplier.clamp(MIN_MULTIPLIER, MAX_MULTIPLIER)
}

/// Cost of one session, optionally scaled
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostBreakdown {
    /// Cost of a single request
    pub cost: f64,
    /// Multiplier applied to `scaled`
    pub multiplier: u32,
    /// Displayed cost times the multiplier, present when the multiplier is above 1
    pub scaled: Option<f64>,
}

impl CostBreakdown {
    pub fn new(cost: f64, multiplier: u32) -> Self {
        let multiplier = clamp_multiplier(multiplier);
        let scaled = (multiplier > 1).then(|| round_cost(cost) * f64::from(multiplier));
        Self { cost, multiplier, scaled }
    }

    /// Compute from usage and prices, `None` when anything is missing
    pub fn from_usage(usage: &Usage, model: &ModelConfig, multiplier: u32) -> Option<Self> {
        compute_cost(usage, model).map(|cost| Self::new(cost, multiplier))
    }

    pub fn formatted_cost(&self) -> String {
        format_cost(self.cost)
    }

    pub fn formatted_scaled(&self) -> Option<String> {
        self.scaled.map(format_cost)
    }
}

impl fmt::Display for CostBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scaled {
            Some(scaled) => write!(
                f,
                "{} (x{}: {})",
                format_cost(self.cost),
                self.multiplier,
                format_cost(scaled)
            ),
            None => f.write_str(&format_cost(self.cost)),
        }
    }
}
