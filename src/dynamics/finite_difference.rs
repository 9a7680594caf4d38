//! The finite-difference integrator.

use crate::{
    dynamics::{parcel_within_bounds, LegOutcome},
    environment::Environment,
    error::{AscentError, Result},
    parcel::{Parcel, ParcelSlice},
    pseudoadiabat::PseudoAdiabaticSchemeKind,
    thermo,
};
use log::debug;
use metfor::{Meters, MetersPSec, Quantity};

/// Finite-difference ascent engine.
///
/// The very first step of a run is a one-sided forward difference, since the centered
/// scheme needs two prior positions. Every later step is a centered second-order
/// leapfrog update with velocity recovered as a backward difference.
pub struct FiniteDifferenceDynamics<'a> {
    env: &'a Environment,
    pseudoadiabatic_scheme: PseudoAdiabaticSchemeKind,
}

impl<'a> FiniteDifferenceDynamics<'a> {
    /// Bind the integrator to an environment and a pseudoadiabatic closure.
    pub fn new(env: &'a Environment, pseudoadiabatic_scheme: PseudoAdiabaticSchemeKind) -> Self {
        FiniteDifferenceDynamics {
            env,
            pseudoadiabatic_scheme,
        }
    }

    /// Drive the parcel through the three ascent legs until an exit chain or a bound
    /// ends the run.
    pub fn run(&self, parcel: &mut Parcel) -> Result<()> {
        if let LegOutcome::Terminated = self.moist_adiabatic_leg(parcel)? {
            return Ok(());
        }
        if let LegOutcome::Terminated = self.pseudoadiabatic_leg(parcel)? {
            return Ok(());
        }
        self.dry_adiabatic_leg(parcel)
    }

    fn moist_adiabatic_leg(&self, parcel: &mut Parcel) -> Result<LegOutcome> {
        let entry = parcel.slice(0).ok_or(AscentError::IncompleteState)?;
        let gamma = thermo::gamma(entry.mixing_ratio);
        let lambda = thermo::lambda(entry.temperature, entry.pressure, gamma);

        loop {
            if !parcel_within_bounds(parcel, self.env) {
                return Ok(LegOutcome::Terminated);
            }

            self.step_kinematics(parcel)?;
            parcel.update_current_thermodynamics_adiabatically(lambda, gamma)?;

            let slice = parcel.slice(0).ok_or(AscentError::IncompleteState)?;
            if slice.saturation_mixing_ratio <= slice.mixing_ratio {
                parcel.equalize_mixing_ratio();
                debug!(
                    "saturation at step {}, {:?}; beginning pseudoadiabatic ascent",
                    parcel.current_time_step(),
                    slice.position
                );
                return Ok(LegOutcome::Transition);
            }
        }
    }

    fn pseudoadiabatic_leg(&self, parcel: &mut Parcel) -> Result<LegOutcome> {
        // The leg invariant, fixed from the exit state of the moist leg.
        let entry = parcel.slice(0).ok_or(AscentError::IncompleteState)?;
        let wet_bulb_theta = thermo::wet_bulb_potential_temperature(
            entry.temperature,
            entry.mixing_ratio,
            entry.saturation_mixing_ratio,
            entry.pressure,
        );

        loop {
            if !parcel_within_bounds(parcel, self.env) {
                return Ok(LegOutcome::Terminated);
            }

            self.step_kinematics(parcel)?;

            let previous = parcel.slice(-1).ok_or(AscentError::IncompleteState)?;
            let pressure = parcel.current_pressure().ok_or(AscentError::IncompleteState)?;
            let temperature = self
                .pseudoadiabatic_scheme
                .temperature(&previous, pressure - previous.pressure, wet_bulb_theta)
                .ok_or(AscentError::WetBulbOutOfRange)?;

            parcel.set_current_temperature(temperature);
            parcel.update_current_thermodynamics_pseudoadiabatically()?;

            let slice = parcel.slice(0).ok_or(AscentError::IncompleteState)?;
            if slice.mixing_ratio <= Parcel::NO_MOISTURE_THRESHOLD {
                debug!(
                    "moisture exhausted at step {}; beginning dry adiabatic ascent",
                    parcel.current_time_step()
                );
                return Ok(LegOutcome::Transition);
            }
        }
    }

    fn dry_adiabatic_leg(&self, parcel: &mut Parcel) -> Result<()> {
        let entry = parcel.slice(0).ok_or(AscentError::IncompleteState)?;
        let gamma = thermo::C_P / thermo::C_V;
        let lambda = thermo::lambda(entry.temperature, entry.pressure, gamma);

        loop {
            if !parcel_within_bounds(parcel, self.env) {
                return Ok(());
            }

            self.step_kinematics(parcel)?;
            parcel.update_current_thermodynamics_adiabatically(lambda, gamma)?;

            let slice = parcel.slice(0).ok_or(AscentError::IncompleteState)?;
            if slice.velocity <= MetersPSec(0.0) {
                debug!(
                    "parcel crested at step {}, {:?}",
                    parcel.current_time_step(),
                    slice.position
                );
                return Ok(());
            }
        }
    }

    /// Advance position and velocity by one step and equilibrate pressure at the new
    /// index. Thermodynamics are left to the caller's leg.
    fn step_kinematics(&self, parcel: &mut Parcel) -> Result<()> {
        let current = parcel.slice(0).ok_or(AscentError::IncompleteState)?;

        let (position, velocity) = if parcel.current_time_step() == 0 {
            forward_step(&current, parcel.time_step())
        } else {
            let previous = parcel.slice(-1).ok_or(AscentError::IncompleteState)?;
            let buoyancy = thermo::buoyancy_force(
                current.virtual_temperature,
                self.env.virtual_temperature_at(&parcel.location()),
            );
            leapfrog_step(
                &current,
                &previous,
                buoyancy,
                parcel.time_step(),
                parcel.time_step_squared(),
            )
        };

        parcel.set_next_kinematics(position, velocity);
        parcel.advance();
        parcel.update_current_dynamics_and_pressure(self.env)
    }
}

/// One-sided first-order step used at the start of a run.
pub(crate) fn forward_step(current: &ParcelSlice, time_step: f64) -> (Meters, MetersPSec) {
    let position = Meters(current.position.unpack() + current.velocity.unpack() * time_step);
    (position, current.velocity)
}

/// Centered second-order leapfrog step, velocity as a backward difference at the new
/// index.
pub(crate) fn leapfrog_step(
    current: &ParcelSlice,
    previous: &ParcelSlice,
    buoyancy: f64,
    time_step: f64,
    time_step_squared: f64,
) -> (Meters, MetersPSec) {
    let position = Meters(
        time_step_squared * buoyancy + 2.0 * current.position.unpack()
            - previous.position.unpack(),
    );
    let velocity = MetersPSec((position - current.position).unpack() / time_step);
    (position, velocity)
}
