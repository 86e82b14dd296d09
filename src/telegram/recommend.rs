//! Color recommendation over a user's spin history.
//!
//! Two triggers are checked in order: a short run (3 of the last 4 non-zero
//! spins on one side) and a chi-square test of the red/black balance over a
//! longer window. MODO GOD forces the aggressive reading and inverts the pick.

use strum::{Display, EnumString};

/// Spins considered by the run trigger
pub const RUN_WINDOW: usize = 4;
/// Same-side spins within [`RUN_WINDOW`] that make a run
pub const RUN_THRESHOLD: usize = 3;
/// Spins considered by the deviation test
pub const DEVIATION_WINDOW: usize = 36;
/// Deviation is significant below this p-value
pub const SIGNIFICANCE: f64 = 0.05;

/// One recorded roulette result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Spin {
    Red,
    Black,
    Zero,
}

impl Spin {
    pub fn side(self) -> Option<Side> {
        match self {
            Spin::Red => Some(Side::Red),
            Spin::Black => Some(Side::Black),
            Spin::Zero => None,
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Spin::Red => "🔴",
            Spin::Black => "⚫",
            Spin::Zero => "🟢",
        }
    }
}

/// A color that can be recommended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Red,
    Black,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Red => Side::Black,
            Side::Black => Side::Red,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Side::Red => "🔴 Vermelho",
            Side::Black => "⚫ Preto",
        }
    }
}

/// Risk profile: revert against a pattern or follow it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
pub enum RiskMode {
    #[default]
    #[strum(serialize = "Conservador")]
    Conservative,
    #[strum(serialize = "Agressivo")]
    Aggressive,
}

impl RiskMode {
    pub fn toggled(self) -> RiskMode {
        match self {
            RiskMode::Conservative => RiskMode::Aggressive,
            RiskMode::Aggressive => RiskMode::Conservative,
        }
    }

    fn pick(self, pattern: Side) -> Side {
        match self {
            RiskMode::Conservative => pattern.opposite(),
            RiskMode::Aggressive => pattern,
        }
    }
}

/// What made the recommendation fire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Trigger {
    Run(Side),
    Deviation { chi2: f64, p: f64, majority: Side },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Recommendation {
    /// The last spin was zero; the short reading starts over
    ZeroReset,
    /// Nothing significant yet
    Waiting,
    Pick {
        side: Side,
        trigger: Trigger,
        mode: RiskMode,
        /// Flipped by MODO GOD
        inverted: bool,
    },
}

impl Recommendation {
    pub fn side(&self) -> Option<Side> {
        match self {
            Recommendation::Pick { side, .. } => Some(*side),
            _ => None,
        }
    }
}

fn last_sides(history: &[Spin], window: usize) -> impl Iterator<Item = Side> + '_ {
    let start = history.len().saturating_sub(window);
    history[start..].iter().filter_map(|spin| spin.side())
}

fn count_sides(sides: impl Iterator<Item = Side>) -> (usize, usize) {
    sides.fold((0, 0), |(r, b), side| match side {
        Side::Red => (r + 1, b),
        Side::Black => (r, b + 1),
    })
}

/// The side holding at least 3 of the last 4 non-zero spins, if any.
pub fn run_trigger(history: &[Spin]) -> Option<Side> {
    let (r, b) = count_sides(last_sides(history, RUN_WINDOW));
    if r + b < RUN_THRESHOLD {
        return None;
    }
    if r >= RUN_THRESHOLD {
        Some(Side::Red)
    } else if b >= RUN_THRESHOLD {
        Some(Side::Black)
    } else {
        None
    }
}

/// Chi-square statistic of red against black over the last `window` spins,
/// with an approximate p-value. No red or black spins gives `(0.0, 1.0)`.
pub fn chi_square_rb(history: &[Spin], window: usize) -> (f64, f64) {
    let (r, b) = count_sides(last_sides(history, window));
    let n = r + b;
    if n == 0 {
        return (0.0, 1.0);
    }
    let expected = n as f64 / 2.0;
    let chi2 = ((r as f64 - expected).powi(2) + (b as f64 - expected).powi(2)) / expected;
    let p = (-chi2 / 2.0).exp() * (1.0 + chi2).sqrt();
    (chi2, p)
}

/// Next color to play under `mode`.
pub fn recommend(history: &[Spin], mode: RiskMode) -> Recommendation {
    if history.last() == Some(&Spin::Zero) {
        return Recommendation::ZeroReset;
    }

    if let Some(run) = run_trigger(history) {
        return Recommendation::Pick {
            side: mode.pick(run),
            trigger: Trigger::Run(run),
            mode,
            inverted: false,
        };
    }

    let (chi2, p) = chi_square_rb(history, DEVIATION_WINDOW);
    if p < SIGNIFICANCE {
        let (r, b) = count_sides(last_sides(history, DEVIATION_WINDOW));
        let majority = if r > b { Side::Red } else { Side::Black };
        return Recommendation::Pick {
            side: mode.pick(majority),
            trigger: Trigger::Deviation { chi2, p, majority },
            mode,
            inverted: false,
        };
    }

    Recommendation::Waiting
}

/// [`recommend`] with MODO GOD applied: when `god` is on the aggressive
/// pick is inverted and `mode` is ignored.
pub fn recommend_with_god(history: &[Spin], mode: RiskMode, god: bool) -> Recommendation {
    if !god {
        return recommend(history, mode);
    }
    match recommend(history, RiskMode::Aggressive) {
        Recommendation::Pick { side, trigger, mode, .. } => Recommendation::Pick {
            side: side.opposite(),
            trigger,
            mode,
            inverted: true,
        },
        other => other,
    }
}
