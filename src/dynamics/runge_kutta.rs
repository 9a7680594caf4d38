//! The classical 4th order Runge-Kutta integrator.

use crate::{
    dynamics::{parcel_within_bounds, LegOutcome},
    environment::Environment,
    error::{AscentError, Result},
    parcel::Parcel,
    pseudoadiabat::PseudoAdiabaticSchemeKind,
    thermo,
};
use log::debug;
use metfor::{Kelvin, Meters, MetersPSec, Quantity};

/// Runge-Kutta ascent engine.
///
/// Each step integrates the coupled system `dx/dt = v`, `dv/dt = buoyancy(x)` with the
/// classical (1,2,2,1)/6 weighting. Every intermediate stage re-brackets its own stage
/// position and re-derives pressure, temperature, mixing ratio and virtual temperature
/// through the active leg's thermodynamic closure; no stage reuses leg-entry values.
pub struct RungeKuttaDynamics<'a> {
    env: &'a Environment,
    pseudoadiabatic_scheme: PseudoAdiabaticSchemeKind,
}

impl<'a> RungeKuttaDynamics<'a> {
    /// Bind the integrator to an environment and a pseudoadiabatic closure.
    pub fn new(env: &'a Environment, pseudoadiabatic_scheme: PseudoAdiabaticSchemeKind) -> Self {
        RungeKuttaDynamics {
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

            self.step_adiabatically(parcel, lambda, gamma)?;

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

            self.step_pseudoadiabatically(parcel, wet_bulb_theta)?;

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

            self.step_adiabatically(parcel, lambda, gamma)?;

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

    /// One Runge-Kutta step on the moist or dry adiabatic leg, stages evaluated along
    /// the adiabat fixed by `lambda` and `gamma` with the mixing ratio conserved.
    fn step_adiabatically(&self, parcel: &mut Parcel, lambda: f64, gamma: f64) -> Result<()> {
        let current = parcel.slice(0).ok_or(AscentError::IncompleteState)?;
        let location = parcel.location();
        let mixing_ratio = current.mixing_ratio;

        let (position, velocity) = rk4_step(
            current.position,
            current.velocity,
            parcel.time_step(),
            |stage_position| {
                let mut stage_location = location;
                stage_location.position = stage_position;
                self.env.update_sector(&mut stage_location);

                let pressure = self.env.pressure_at(&stage_location);
                let temperature = thermo::temperature_in_adiabat(pressure, gamma, lambda);
                let virtual_temperature = thermo::virtual_temperature(temperature, mixing_ratio);

                Ok(thermo::buoyancy_force(
                    virtual_temperature,
                    self.env.virtual_temperature_at(&stage_location),
                ))
            },
        )?;

        parcel.set_next_kinematics(position, velocity);
        parcel.advance();
        parcel.update_current_dynamics_and_pressure(self.env)?;
        parcel.update_current_thermodynamics_adiabatically(lambda, gamma)
    }

    /// One Runge-Kutta step on the pseudoadiabatic leg. Each stage calls the closure
    /// with its own pressure delta relative to the step-entry state, then re-derives the
    /// stage mixing ratio and virtual temperature from the stage temperature.
    fn step_pseudoadiabatically(&self, parcel: &mut Parcel, wet_bulb_theta: Kelvin) -> Result<()> {
        let current = parcel.slice(0).ok_or(AscentError::IncompleteState)?;
        let location = parcel.location();
        let scheme = self.pseudoadiabatic_scheme;

        let (position, velocity) = rk4_step(
            current.position,
            current.velocity,
            parcel.time_step(),
            |stage_position| {
                let mut stage_location = location;
                stage_location.position = stage_position;
                self.env.update_sector(&mut stage_location);

                let pressure = self.env.pressure_at(&stage_location);
                let temperature = scheme
                    .temperature(&current, pressure - current.pressure, wet_bulb_theta)
                    .ok_or(AscentError::WetBulbOutOfRange)?;
                let mixing_ratio = thermo::mixing_ratio(temperature, pressure);
                let virtual_temperature = thermo::virtual_temperature(temperature, mixing_ratio);

                Ok(thermo::buoyancy_force(
                    virtual_temperature,
                    self.env.virtual_temperature_at(&stage_location),
                ))
            },
        )?;

        parcel.set_next_kinematics(position, velocity);
        parcel.advance();
        parcel.update_current_dynamics_and_pressure(self.env)?;

        let previous = parcel.slice(-1).ok_or(AscentError::IncompleteState)?;
        let pressure = parcel.current_pressure().ok_or(AscentError::IncompleteState)?;
        let temperature = self
            .pseudoadiabatic_scheme
            .temperature(&previous, pressure - previous.pressure, wet_bulb_theta)
            .ok_or(AscentError::WetBulbOutOfRange)?;

        parcel.set_current_temperature(temperature);
        parcel.update_current_thermodynamics_pseudoadiabatically()
    }
}

/// One classical 4th order Runge-Kutta step of `dx/dt = v`, `dv/dt = accel(x)`.
pub(crate) fn rk4_step<F>(
    position: Meters,
    velocity: MetersPSec,
    time_step: f64,
    mut accel: F,
) -> Result<(Meters, MetersPSec)>
where
    F: FnMut(Meters) -> Result<f64>,
{
    let x = position.unpack();
    let v = velocity.unpack();
    let dt = time_step;

    let c0 = v;
    let k0 = accel(position)?;

    let c1 = c0 + 0.5 * dt * k0;
    let k1 = accel(Meters(x + 0.5 * dt * c0))?;

    let c2 = c0 + 0.5 * dt * k1;
    let k2 = accel(Meters(x + 0.5 * dt * c1))?;

    let c3 = c0 + dt * k2;
    let k3 = accel(Meters(x + dt * c2))?;

    let next_position = Meters(x + (dt / 6.0) * (c0 + 2.0 * c1 + 2.0 * c2 + c3));
    let next_velocity = MetersPSec(v + (dt / 6.0) * (k0 + 2.0 * k1 + 2.0 * k2 + k3));

    Ok((next_position, next_velocity))
}
