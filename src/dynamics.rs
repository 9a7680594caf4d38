//! The ascent engine: two interchangeable integrators driving the three-leg ascent
//! state machine.
//!
//! Both integrators walk the same one-directional machine, MoistAdiabatic to
//! PseudoAdiabatic to DryAdiabatic to Done. A bounds check runs before every step in
//! every leg, and hitting a bound is the normal terminal condition rather than an
//! error: the run stops cleanly and all remaining time indexes stay "not computed".

use crate::{
    environment::Environment,
    error::Result,
    parcel::{AscentConfig, Parcel},
};
use metfor::Meters;
use strum_macros::EnumString;

mod finite_difference;
mod runge_kutta;

pub use finite_difference::FiniteDifferenceDynamics;
pub use runge_kutta::RungeKuttaDynamics;

/// Which integrator advances the parcel.
///
/// Parses from the configuration identifiers `"1"` and `"2"` or from the spelled-out
/// names. An unrecognized identifier fails the parse; callers treat that as a fatal
/// configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
pub enum DynamicSchemeKind {
    /// Leapfrog finite differences, first order on the very first step.
    #[strum(serialize = "1", serialize = "finite-difference")]
    FiniteDifference,
    /// Classical 4th order Runge-Kutta.
    #[strum(serialize = "2", serialize = "runge-kutta")]
    RungeKutta,
}

/// Run a full ascent: build the parcel from the configuration and drive the configured
/// integrator over it until a leg exit chain or a bound ends the run.
pub fn run_ascent(config: &AscentConfig, env: &Environment) -> Result<Parcel> {
    let mut parcel = Parcel::new(config, env)?;

    match config.dynamic_scheme {
        DynamicSchemeKind::FiniteDifference => {
            FiniteDifferenceDynamics::new(env, config.pseudoadiabatic_scheme).run(&mut parcel)?
        }
        DynamicSchemeKind::RungeKutta => {
            RungeKuttaDynamics::new(env, config.pseudoadiabatic_scheme).run(&mut parcel)?
        }
    }

    Ok(parcel)
}

/// How a leg ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LegOutcome {
    /// The leg's exit condition fired; the next leg takes over.
    Transition,
    /// A bound was hit; the whole run is over and later legs must not start.
    Terminated,
}

/// The bounds check applied before every step.
///
/// The parcel may keep going only while it is strictly inside the sounding column and
/// there is at least one unwritten time index left.
pub(crate) fn parcel_within_bounds(parcel: &Parcel, env: &Environment) -> bool {
    let position = parcel.location().position;

    position > Meters(0.0)
        && position < env.top()
        && parcel.current_time_step() < parcel.ascent_steps() - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pseudoadiabat::PseudoAdiabaticSchemeKind;
    use metfor::{Celsius, HectoPascal, MetersPSec};
    use std::str::FromStr;

    fn test_env() -> Environment {
        Environment::new(
            vec![Meters(0.0), Meters(2000.0), Meters(5000.0)],
            vec![HectoPascal(1000.0), HectoPascal(780.0), HectoPascal(540.0)],
            vec![Celsius(15.0), Celsius(2.0), Celsius(-18.0)],
            vec![Celsius(10.0), Celsius(-2.0), Celsius(-25.0)],
        )
        .unwrap()
    }

    #[test]
    fn kind_parses_configuration_ids() {
        assert_eq!(
            DynamicSchemeKind::from_str("1"),
            Ok(DynamicSchemeKind::FiniteDifference)
        );
        assert_eq!(
            DynamicSchemeKind::from_str("runge-kutta"),
            Ok(DynamicSchemeKind::RungeKutta)
        );
        assert!(DynamicSchemeKind::from_str("3").is_err());
    }

    #[test]
    fn bounds_check_rejects_launch_at_or_above_the_top() {
        let env = test_env();
        let config = AscentConfig {
            initial_height: Meters(5000.0),
            initial_velocity: MetersPSec(1.0),
            initial_temperature: Celsius(-18.0),
            initial_dew_point: Celsius(-25.0),
            time_step: 1.0,
            period: 0.1,
            dynamic_scheme: DynamicSchemeKind::FiniteDifference,
            pseudoadiabatic_scheme: PseudoAdiabaticSchemeKind::Numerical,
        };
        let parcel = Parcel::new(&config, &env).unwrap();

        assert!(!parcel_within_bounds(&parcel, &env));
    }

    #[test]
    fn bounds_check_accepts_an_interior_launch() {
        let env = test_env();
        let config = AscentConfig {
            initial_height: Meters(500.0),
            initial_velocity: MetersPSec(1.0),
            initial_temperature: Celsius(14.0),
            initial_dew_point: Celsius(9.0),
            time_step: 1.0,
            period: 0.1,
            dynamic_scheme: DynamicSchemeKind::FiniteDifference,
            pseudoadiabatic_scheme: PseudoAdiabaticSchemeKind::Numerical,
        };
        let parcel = Parcel::new(&config, &env).unwrap();

        assert!(parcel_within_bounds(&parcel, &env));
    }
}
