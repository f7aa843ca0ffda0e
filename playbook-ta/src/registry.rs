//! Indicator registry: tagged-variant dispatch from a [`FeatureDecl`]'s `indicator` kind string to
//! a boxed [`Indicator`], its warmup budget, and its output field names.
//!
//! Dispatch is a `match` over known kind strings rather than dynamic class lookup, mirroring how
//! the rest of this codebase resolves declarative "kind" tags (§9 redesign notes).

use crate::core::Indicator;
use crate::error::TaError;
use crate::macd::Macd;
use crate::momentum::{
    Cci, Cmo, Fisher, Mfi, Mom, Ppo, Roc, Rsi, SqueezeMomentum, Stochastic, StochRsi, Trix, Tsi,
    UltimateOscillator, WilliamsR,
};
use crate::trend::{Alma, Dema, Ema, Kama, LinReg, Sma, Tema, Trima, Wma, Zlma};
use crate::trend_strength::{Adx, Aroon, Dm, Psar, Vortex};
use crate::volatility::{Atr, BollingerBands, Donchian, KeltnerChannel, SuperTrend};
use crate::volume::{Cmf, Obv, Vwap};
use playbook_instrument::FeatureDecl;

/// A built indicator plus the metadata callers need before they ever call `update`: how many
/// closed bars of warmup it needs, and which field names its `IndicatorOutput` will expose.
pub struct RegisteredIndicator {
    pub indicator: Box<dyn Indicator>,
    pub warmup_bars: usize,
    pub output_keys: &'static [&'static str],
}

impl std::fmt::Debug for RegisteredIndicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredIndicator")
            .field("indicator", &self.indicator)
            .field("warmup_bars", &self.warmup_bars)
            .field("output_keys", &self.output_keys)
            .finish()
    }
}

/// Build an indicator instance from a compiled [`FeatureDecl`]. Unknown `indicator` kinds are a
/// compile-time error surfaced by `playbook-dsl`, not a runtime one here, but this function still
/// returns a `Result` so a dangling reference from a stale compiled artifact fails loudly instead
/// of panicking mid-run.
pub fn build_indicator(decl: &FeatureDecl) -> Result<RegisteredIndicator, TaError> {
    let length = decl.param_usize("length", 14);

    let (indicator, warmup_bars, output_keys): (Box<dyn Indicator>, usize, &'static [&'static str]) =
        match decl.indicator.as_str() {
            "sma" => (Box::new(Sma::new(length)), length, &["value"]),
            "ema" => (Box::new(Ema::new(length)), length, &["value"]),
            "wma" => (Box::new(Wma::new(length)), length, &["value"]),
            "dema" => (Box::new(Dema::new(length)), 2 * length, &["value"]),
            "tema" => (Box::new(Tema::new(length)), 3 * length, &["value"]),
            "trima" => (Box::new(Trima::new(length)), length, &["value"]),
            "zlma" => (Box::new(Zlma::new(length)), length, &["value"]),
            "alma" => {
                let sigma = decl.param_f64("sigma", 6.0);
                let offset = decl.param_f64("offset", 0.85);
                (Box::new(Alma::new(length, sigma, offset)), length, &["value"])
            }
            "kama" => {
                let fast = decl.param_usize("fast_length", 2);
                let slow = decl.param_usize("slow_length", 30);
                (Box::new(Kama::new(length, fast, slow)), length + 1, &["value"])
            }
            "linreg" => (Box::new(LinReg::new(length)), length, &["value"]),

            "atr" => (Box::new(Atr::new(length)), length, &["value"]),
            "bollinger" => {
                let k = decl.param_f64("k", 2.0);
                (
                    Box::new(BollingerBands::new(length, k)),
                    length,
                    &["lower", "middle", "upper", "bandwidth", "percent_b"],
                )
            }
            "keltner" => {
                let atr_length = decl.param_usize("atr_length", length);
                let multiplier = decl.param_f64("multiplier", 2.0);
                (
                    Box::new(KeltnerChannel::new(length, atr_length, multiplier)),
                    length.max(atr_length),
                    &["lower", "middle", "upper"],
                )
            }
            "donchian" => (
                Box::new(Donchian::new(length)),
                length,
                &["upper", "lower", "middle"],
            ),
            "supertrend" => {
                let multiplier = decl.param_f64("multiplier", 3.0);
                (
                    Box::new(SuperTrend::new(length, multiplier)),
                    length,
                    &["value", "direction"],
                )
            }

            "aroon" => (
                Box::new(Aroon::new(length)),
                length + 1,
                &["aroon_up", "aroon_down"],
            ),
            "vortex" => (
                Box::new(Vortex::new(length)),
                length,
                &["vi_plus", "vi_minus"],
            ),
            "dm" => (
                Box::new(Dm::new(length)),
                length,
                &["plus_di", "minus_di"],
            ),
            "adx" => (Box::new(Adx::new(length)), 2 * length, &["value"]),
            "psar" => {
                let af_step = decl.param_f64("af_step", 0.02);
                let af_max = decl.param_f64("af_max", 0.2);
                (Box::new(Psar::new(af_step, af_max)), 2, &["value", "direction"])
            }

            "macd" => {
                let fast = decl.param_usize("fast_length", 12);
                let slow = decl.param_usize("slow_length", 26);
                let signal = decl.param_usize("signal_length", 9);
                (
                    Box::new(Macd::new(fast, slow, signal)),
                    slow + signal,
                    &["macd", "signal", "histogram"],
                )
            }
            "ppo" => {
                let fast = decl.param_usize("fast_length", 12);
                let slow = decl.param_usize("slow_length", 26);
                let signal = decl.param_usize("signal_length", 9);
                (
                    Box::new(Ppo::new(fast, slow, signal)),
                    slow + signal,
                    &["ppo", "signal", "histogram"],
                )
            }

            "cci" => (Box::new(Cci::new(length)), length, &["value"]),
            "williams_r" => (Box::new(WilliamsR::new(length)), length, &["value"]),
            "stochastic" => {
                let d_length = decl.param_usize("d_length", 3);
                (
                    Box::new(Stochastic::new(length, d_length)),
                    length + d_length,
                    &["k", "d"],
                )
            }
            "stoch_rsi" => {
                let rsi_length = decl.param_usize("rsi_length", length);
                let stoch_length = decl.param_usize("stoch_length", length);
                let d_length = decl.param_usize("d_length", 3);
                (
                    Box::new(StochRsi::new(rsi_length, stoch_length, d_length)),
                    rsi_length + stoch_length + d_length,
                    &["k", "d"],
                )
            }
            "rsi" => (Box::new(Rsi::new(length)), length, &["value"]),
            "cmo" => (Box::new(Cmo::new(length)), length, &["value"]),
            "mfi" => (Box::new(Mfi::new(length)), length, &["value"]),
            "uo" => {
                let short = decl.param_usize("short_length", 7);
                let medium = decl.param_usize("medium_length", 14);
                let long = decl.param_usize("long_length", 28);
                (
                    Box::new(UltimateOscillator::new(short, medium, long)),
                    long,
                    &["value"],
                )
            }
            "roc" => (Box::new(Roc::new(length)), length + 1, &["value"]),
            "mom" => (Box::new(Mom::new(length)), length + 1, &["value"]),
            "trix" => (Box::new(Trix::new(length)), 3 * length, &["value"]),
            "tsi" => {
                let long = decl.param_usize("long_length", 25);
                let short = decl.param_usize("short_length", 13);
                (Box::new(Tsi::new(long, short)), long + short, &["value"])
            }
            "fisher" => (
                Box::new(Fisher::new(length)),
                length + 1,
                &["value", "signal"],
            ),
            "squeeze" => {
                let kc_atr_length = decl.param_usize("kc_atr_length", length);
                let kc_multiplier = decl.param_f64("kc_multiplier", 1.5);
                let bb_k = decl.param_f64("bb_k", 2.0);
                (
                    Box::new(SqueezeMomentum::new(length, bb_k, kc_atr_length, kc_multiplier)),
                    length.max(kc_atr_length),
                    &["momentum", "squeeze_on"],
                )
            }

            "obv" => (Box::new(Obv::new()), 1, &["value"]),
            "cmf" => (Box::new(Cmf::new(length)), length, &["value"]),
            "vwap" => (Box::new(Vwap::new()), 1, &["value"]),

            other => return Err(TaError::UnknownIndicatorKind(other.to_string())),
        };

    Ok(RegisteredIndicator {
        indicator,
        warmup_bars,
        output_keys,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use playbook_instrument::TfRole;
    use smol_str::SmolStr;

    fn decl(indicator: &str, params: Vec<(&str, f64)>) -> FeatureDecl {
        let mut map = IndexMap::new();
        for (k, v) in params {
            map.insert(SmolStr::new(k), v.into());
        }
        FeatureDecl {
            id: SmolStr::new("f1"),
            indicator: SmolStr::new(indicator),
            params: map,
            tf_role: TfRole::LowTf,
            input: Default::default(),
        }
    }

    #[test]
    fn builds_known_kinds() {
        assert!(build_indicator(&decl("ema", vec![("length", 20.0)])).is_ok());
        assert!(build_indicator(&decl("macd", vec![])).is_ok());
        assert!(build_indicator(&decl("adx", vec![("length", 14.0)])).is_ok());
    }

    #[test]
    fn unknown_kind_is_an_error() {
        assert!(build_indicator(&decl("not_a_real_indicator", vec![])).is_err());
    }
}
