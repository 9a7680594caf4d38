#![warn(missing_docs)]
//! Simulate the vertical ascent of an idealized air parcel through a stratified atmosphere.
//!
//! The model lifts a single parcel through an environmental sounding, integrating its motion
//! under buoyancy while its thermodynamic state passes through three regimes in order: moist
//! adiabatic ascent up to saturation, pseudoadiabatic ascent while condensate is removed, and
//! finally dry adiabatic ascent until the parcel decelerates to its crest.
//!
//! Two interchangeable integrators are provided, a finite difference (leapfrog) scheme and a
//! classical 4th order Runge-Kutta scheme, along with three interchangeable closures for the
//! parcel temperature along the pseudoadiabatic leg.
//!
//! ```rust
//! use parcel_ascent::{run_ascent, AscentConfig, DynamicSchemeKind, Environment,
//!     PseudoAdiabaticSchemeKind};
//! use metfor::{Celsius, HectoPascal, Meters, MetersPSec};
//!
//! let env = Environment::new(
//!     vec![Meters(0.0), Meters(2000.0), Meters(4000.0), Meters(6000.0)],
//!     vec![
//!         HectoPascal(1000.0),
//!         HectoPascal(780.0),
//!         HectoPascal(600.0),
//!         HectoPascal(470.0),
//!     ],
//!     vec![Celsius(15.0), Celsius(2.0), Celsius(-11.0), Celsius(-24.0)],
//!     vec![Celsius(9.0), Celsius(-2.0), Celsius(-16.0), Celsius(-30.0)],
//! )
//! .unwrap();
//!
//! let config = AscentConfig {
//!     initial_height: Meters(100.0),
//!     initial_velocity: MetersPSec(1.0),
//!     initial_temperature: Celsius(16.0),
//!     initial_dew_point: Celsius(10.0),
//!     time_step: 0.5,
//!     period: 0.05,
//!     dynamic_scheme: DynamicSchemeKind::FiniteDifference,
//!     pseudoadiabatic_scheme: PseudoAdiabaticSchemeKind::Numerical,
//! };
//!
//! let parcel = run_ascent(&config, &env).unwrap();
//! assert!(parcel.current_time_step() >= 1);
//! ```

//
// API
//
pub use crate::{
    dynamics::{run_ascent, DynamicSchemeKind, FiniteDifferenceDynamics, RungeKuttaDynamics},
    environment::{Environment, Location, Sector},
    error::{AscentError, Result},
    parcel::{AscentConfig, Parcel, ParcelSlice},
    pseudoadiabat::PseudoAdiabaticSchemeKind,
};

pub mod environment;
pub mod thermo;

mod dynamics;
mod error;
mod parcel;
mod pseudoadiabat;
