//! The parcel state model: a preallocated, time-indexed arena of the seven state variables,
//! filled strictly in increasing time order by a dynamic scheme.

use crate::{
    dynamics::DynamicSchemeKind,
    environment::{Environment, Location},
    error::{AscentError, Result},
    pseudoadiabat::PseudoAdiabaticSchemeKind,
    thermo,
};
use metfor::{Celsius, HectoPascal, Kelvin, Meters, MetersPSec};
use optional::{none, some, Optioned};
use std::{collections::HashMap, str::FromStr};

/// Configuration of a single ascent run.
///
/// Built directly, or from the parsed key-value map a configuration file reduces to via
/// [`AscentConfig::from_map`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AscentConfig {
    /// Parcel launch height in meters.
    pub initial_height: Meters,
    /// Parcel launch velocity in m/s, positive upward.
    pub initial_velocity: MetersPSec,
    /// Parcel launch temperature in Celsius.
    pub initial_temperature: Celsius,
    /// Parcel launch dew point in Celsius.
    pub initial_dew_point: Celsius,
    /// Integration time step in seconds.
    pub time_step: f64,
    /// Simulated period in hours.
    pub period: f64,
    /// Which integrator advances the parcel.
    pub dynamic_scheme: DynamicSchemeKind,
    /// Which closure supplies the parcel temperature on the pseudoadiabatic leg.
    pub pseudoadiabatic_scheme: PseudoAdiabaticSchemeKind,
}

impl AscentConfig {
    /// Build a configuration from a parsed key-value map.
    ///
    /// Keys are those of the original configuration format: `init_height`, `init_velocity`,
    /// `init_temp`, `init_dewpoint`, `timestep`, `period`, `dynamic_scheme`,
    /// `pseudoadiabatic_scheme`. An unrecognized scheme identifier is fatal, no default scheme
    /// is substituted.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self> {
        fn required<'a>(map: &'a HashMap<String, String>, key: &'static str) -> Result<&'a str> {
            map.get(key)
                .map(|value| value.trim())
                .ok_or(AscentError::MissingConfigurationKey(key))
        }

        fn numeric(map: &HashMap<String, String>, key: &'static str) -> Result<f64> {
            required(map, key)?
                .parse()
                .map_err(|_| AscentError::InvalidConfiguration(key))
        }

        let dynamic_scheme = DynamicSchemeKind::from_str(required(map, "dynamic_scheme")?)
            .map_err(|_| AscentError::UnknownScheme("dynamic_scheme"))?;
        let pseudoadiabatic_scheme =
            PseudoAdiabaticSchemeKind::from_str(required(map, "pseudoadiabatic_scheme")?)
                .map_err(|_| AscentError::UnknownScheme("pseudoadiabatic_scheme"))?;

        let config = AscentConfig {
            initial_height: Meters(numeric(map, "init_height")?),
            initial_velocity: MetersPSec(numeric(map, "init_velocity")?),
            initial_temperature: Celsius(numeric(map, "init_temp")?),
            initial_dew_point: Celsius(numeric(map, "init_dewpoint")?),
            time_step: numeric(map, "timestep")?,
            period: numeric(map, "period")?,
            dynamic_scheme,
            pseudoadiabatic_scheme,
        };

        config.validate()?;
        Ok(config)
    }

    /// The number of time indexes in the run, step zero included.
    pub fn ascent_steps(&self) -> usize {
        ((self.period * 3600.0) / self.time_step).floor() as usize + 1
    }

    fn validate(&self) -> Result<()> {
        if !(self.time_step > 0.0) {
            return Err(AscentError::InvalidConfiguration("timestep must be positive"));
        }
        if !(self.period > 0.0) {
            return Err(AscentError::InvalidConfiguration("period must be positive"));
        }
        Ok(())
    }
}

/// An immutable snapshot of all seven state variables at one time index.
///
/// Slices are how state is passed into pseudoadiabatic closures without granting them write
/// access to the parcel's history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParcelSlice {
    /// Height in meters.
    pub position: Meters,
    /// Vertical velocity in m/s.
    pub velocity: MetersPSec,
    /// Pressure in hPa.
    pub pressure: HectoPascal,
    /// Temperature in Kelvin.
    pub temperature: Kelvin,
    /// Virtual temperature in Kelvin.
    pub virtual_temperature: Kelvin,
    /// Mixing ratio in kg/kg.
    pub mixing_ratio: f64,
    /// Saturation mixing ratio in kg/kg.
    pub saturation_mixing_ratio: f64,
}

/// Time-indexed parcel state.
///
/// All seven state vectors are allocated once at construction, initialized to "not yet
/// computed", and filled strictly in increasing time-index order. A finalized index is never
/// rewritten, with one documented exception: the mixing ratio is force-equalized to the
/// saturation mixing ratio at the moist-to-pseudoadiabatic leg transition.
#[derive(Debug, Clone)]
pub struct Parcel {
    time_step: f64,
    time_step_squared: f64,
    ascent_steps: usize,
    current: usize,
    location: Location,

    position: Vec<Optioned<Meters>>,
    velocity: Vec<Optioned<MetersPSec>>,
    pressure: Vec<Optioned<HectoPascal>>,
    temperature: Vec<Optioned<Kelvin>>,
    virtual_temperature: Vec<Optioned<Kelvin>>,
    mixing_ratio: Vec<Optioned<f64>>,
    saturation_mixing_ratio: Vec<Optioned<f64>>,
}

impl Parcel {
    /// Mixing ratio below which the parcel is considered effectively dry, in kg/kg.
    pub const NO_MOISTURE_THRESHOLD: f64 = 1.0e-4;

    /// Allocate a parcel and fill its initial conditions from the configuration.
    ///
    /// Index 0 takes the configured height, velocity and temperature; pressure comes from the
    /// environment at the launch height (found with a full bracket search), and the mixing
    /// ratio, virtual temperature, and saturation mixing ratio are derived from those.
    pub fn new(config: &AscentConfig, env: &Environment) -> Result<Self> {
        config.validate()?;

        let ascent_steps = config.ascent_steps();

        let mut parcel = Parcel {
            time_step: config.time_step,
            time_step_squared: config.time_step * config.time_step,
            ascent_steps,
            current: 0,
            location: env.locate(config.initial_height),
            position: vec![none(); ascent_steps],
            velocity: vec![none(); ascent_steps],
            pressure: vec![none(); ascent_steps],
            temperature: vec![none(); ascent_steps],
            virtual_temperature: vec![none(); ascent_steps],
            mixing_ratio: vec![none(); ascent_steps],
            saturation_mixing_ratio: vec![none(); ascent_steps],
        };

        let temperature = Kelvin::from(config.initial_temperature);
        let dew_point = Kelvin::from(config.initial_dew_point);
        let pressure = env.pressure_at(&parcel.location);

        let mixing_ratio = thermo::mixing_ratio(dew_point, pressure);

        parcel.position[0] = some(config.initial_height);
        parcel.velocity[0] = some(config.initial_velocity);
        parcel.pressure[0] = some(pressure);
        parcel.temperature[0] = some(temperature);
        parcel.virtual_temperature[0] = some(thermo::virtual_temperature(temperature, mixing_ratio));
        parcel.mixing_ratio[0] = some(mixing_ratio);
        parcel.saturation_mixing_ratio[0] = some(thermo::mixing_ratio(temperature, pressure));

        Ok(parcel)
    }

    /// The integration time step in seconds.
    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    pub(crate) fn time_step_squared(&self) -> f64 {
        self.time_step_squared
    }

    /// Total number of time indexes allocated for the run.
    pub fn ascent_steps(&self) -> usize {
        self.ascent_steps
    }

    /// The highest finalized time index.
    pub fn current_time_step(&self) -> usize {
        self.current
    }

    /// The parcel's current location in the environment.
    pub fn location(&self) -> Location {
        self.location
    }

    /// Write position and velocity at the next time index.
    ///
    /// This is the only way an integrator touches the state arrays, and it can only write the
    /// index one past the cursor.
    pub(crate) fn set_next_kinematics(&mut self, position: Meters, velocity: MetersPSec) {
        debug_assert!(self.current + 1 < self.ascent_steps);
        debug_assert!(self.position[self.current + 1].is_none());

        self.position[self.current + 1] = some(position);
        self.velocity[self.current + 1] = some(velocity);
    }

    /// Move the cursor to the next time index, finalizing the previous one.
    pub(crate) fn advance(&mut self) {
        debug_assert!(self.current + 1 < self.ascent_steps);
        self.current += 1;
    }

    /// Refresh the location to the freshly written position, re-bracket, and equilibrate the
    /// parcel pressure with the ambient sounding.
    pub(crate) fn update_current_dynamics_and_pressure(&mut self, env: &Environment) -> Result<()> {
        let position = self.position[self.current]
            .into_option()
            .ok_or(AscentError::IncompleteState)?;

        self.location.position = position;
        env.update_sector(&mut self.location);
        self.pressure[self.current] = some(env.pressure_at(&self.location));

        Ok(())
    }

    /// Thermodynamic update for the moist and dry adiabatic legs.
    ///
    /// The mixing ratio is conserved from the previous index, temperature follows the adiabat
    /// fixed by `lambda` and `gamma`, and the saturation mixing ratio and virtual temperature
    /// are recomputed from the new temperature and pressure.
    pub(crate) fn update_current_thermodynamics_adiabatically(
        &mut self,
        lambda: f64,
        gamma: f64,
    ) -> Result<()> {
        if self.current == 0 {
            return Err(AscentError::IncompleteState);
        }

        let mixing_ratio = self.mixing_ratio[self.current - 1]
            .into_option()
            .ok_or(AscentError::IncompleteState)?;
        let pressure = self.pressure[self.current]
            .into_option()
            .ok_or(AscentError::IncompleteState)?;

        let temperature = thermo::temperature_in_adiabat(pressure, gamma, lambda);

        self.mixing_ratio[self.current] = some(mixing_ratio);
        self.temperature[self.current] = some(temperature);
        self.saturation_mixing_ratio[self.current] =
            some(thermo::mixing_ratio(temperature, pressure));
        self.virtual_temperature[self.current] =
            some(thermo::virtual_temperature(temperature, mixing_ratio));

        Ok(())
    }

    /// Thermodynamic update for the pseudoadiabatic leg.
    ///
    /// The temperature at the current index must already have been supplied by a
    /// pseudoadiabatic closure. The saturation mixing ratio is recomputed from it, the mixing
    /// ratio is forced equal to it (condensate is removed instantly, no supersaturation is
    /// retained), and the virtual temperature follows.
    pub(crate) fn update_current_thermodynamics_pseudoadiabatically(&mut self) -> Result<()> {
        let temperature = self.temperature[self.current]
            .into_option()
            .ok_or(AscentError::IncompleteState)?;
        let pressure = self.pressure[self.current]
            .into_option()
            .ok_or(AscentError::IncompleteState)?;

        let saturation_mixing_ratio = thermo::mixing_ratio(temperature, pressure);

        self.saturation_mixing_ratio[self.current] = some(saturation_mixing_ratio);
        self.mixing_ratio[self.current] = some(saturation_mixing_ratio);
        self.virtual_temperature[self.current] =
            some(thermo::virtual_temperature(temperature, saturation_mixing_ratio));

        Ok(())
    }

    /// Pressure at the current index, available as soon as
    /// [`Parcel::update_current_dynamics_and_pressure`] has run, before the full slice is.
    pub(crate) fn current_pressure(&self) -> Option<HectoPascal> {
        self.pressure[self.current].into_option()
    }

    /// Supply an externally computed temperature at the current index.
    pub(crate) fn set_current_temperature(&mut self, temperature: Kelvin) {
        self.temperature[self.current] = some(temperature);
    }

    /// Force the mixing ratio equal to the saturation mixing ratio at the current index.
    ///
    /// The single allowed rewrite of a finalized value, applied at the transition from
    /// moist-adiabatic to pseudoadiabatic ascent.
    pub(crate) fn equalize_mixing_ratio(&mut self) {
        self.mixing_ratio[self.current] = self.saturation_mixing_ratio[self.current];
    }

    /// Snapshot the state at `current_time_step + offset`.
    ///
    /// `offset` may be negative, e.g. `-1` for the previous step. Returns `None` when the index
    /// is out of range or not yet fully computed.
    pub fn slice(&self, offset: isize) -> Option<ParcelSlice> {
        let index = self.current as isize + offset;
        if index < 0 || index as usize >= self.ascent_steps {
            return None;
        }

        self.slice_at(index as usize)
    }

    /// Snapshot the state at an absolute time index, if it has been fully computed.
    pub fn slice_at(&self, index: usize) -> Option<ParcelSlice> {
        if index >= self.ascent_steps {
            return None;
        }

        Some(ParcelSlice {
            position: self.position[index].into_option()?,
            velocity: self.velocity[index].into_option()?,
            pressure: self.pressure[index].into_option()?,
            temperature: self.temperature[index].into_option()?,
            virtual_temperature: self.virtual_temperature[index].into_option()?,
            mixing_ratio: self.mixing_ratio[index].into_option()?,
            saturation_mixing_ratio: self.saturation_mixing_ratio[index].into_option()?,
        })
    }

    /// Iterate over the finalized steps in time order.
    ///
    /// This is the view an output layer serializes: it ends where the run ended, leaving the
    /// never-computed tail out.
    pub fn finalized_steps(&self) -> impl Iterator<Item = ParcelSlice> + '_ {
        (0..=self.current).filter_map(move |index| self.slice_at(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Environment;

    fn test_env() -> Environment {
        Environment::new(
            vec![Meters(0.0), Meters(1000.0), Meters(3000.0), Meters(6000.0)],
            vec![
                HectoPascal(1000.0),
                HectoPascal(890.0),
                HectoPascal(700.0),
                HectoPascal(480.0),
            ],
            vec![Celsius(15.0), Celsius(8.0), Celsius(-5.0), Celsius(-25.0)],
            vec![Celsius(10.0), Celsius(4.0), Celsius(-10.0), Celsius(-35.0)],
        )
        .unwrap()
    }

    fn test_config() -> AscentConfig {
        AscentConfig {
            initial_height: Meters(200.0),
            initial_velocity: MetersPSec(0.5),
            initial_temperature: Celsius(16.0),
            initial_dew_point: Celsius(12.0),
            time_step: 600.0,
            period: 1.0,
            dynamic_scheme: DynamicSchemeKind::FiniteDifference,
            pseudoadiabatic_scheme: PseudoAdiabaticSchemeKind::Numerical,
        }
    }

    #[test]
    fn ascent_steps_includes_step_zero() {
        assert_eq!(test_config().ascent_steps(), 7);

        let odd = AscentConfig {
            time_step: 7.0,
            period: 0.01,
            ..test_config()
        };
        assert_eq!(odd.ascent_steps(), 6); // floor(36 / 7) + 1
    }

    #[test]
    fn initial_conditions_are_derived() {
        let env = test_env();
        let parcel = Parcel::new(&test_config(), &env).unwrap();

        assert_eq!(parcel.current_time_step(), 0);

        let s = parcel.slice(0).unwrap();
        assert_eq!(s.position, Meters(200.0));
        assert_eq!(s.temperature, Kelvin(289.15));
        assert!(s.pressure < HectoPascal(1000.0) && s.pressure > HectoPascal(890.0));
        assert!(s.mixing_ratio > 0.0 && s.mixing_ratio < s.saturation_mixing_ratio);
        assert!(s.virtual_temperature > s.temperature);
    }

    #[test]
    fn saturated_launch_has_equal_mixing_ratios() {
        let env = test_env();
        let config = AscentConfig {
            initial_dew_point: Celsius(16.0),
            ..test_config()
        };
        let parcel = Parcel::new(&config, &env).unwrap();

        let s = parcel.slice(0).unwrap();
        assert_eq!(s.mixing_ratio, s.saturation_mixing_ratio);
    }

    #[test]
    fn slices_respect_the_cursor() {
        let env = test_env();
        let mut parcel = Parcel::new(&test_config(), &env).unwrap();

        assert!(parcel.slice(0).is_some());
        assert!(parcel.slice(-1).is_none());
        assert!(parcel.slice(1).is_none());
        assert!(parcel.slice_at(parcel.ascent_steps()).is_none());

        parcel.set_next_kinematics(Meters(230.0), MetersPSec(0.5));
        parcel.advance();
        parcel.update_current_dynamics_and_pressure(&env).unwrap();

        // Kinematics and pressure alone do not make a full slice.
        assert!(parcel.slice(0).is_none());

        let gamma = thermo::gamma(0.01);
        let lambda = thermo::lambda(Kelvin(289.15), HectoPascal(980.0), gamma);
        parcel
            .update_current_thermodynamics_adiabatically(lambda, gamma)
            .unwrap();
        assert!(parcel.slice(0).is_some());
        assert!(parcel.slice(-1).is_some());
        assert_eq!(parcel.finalized_steps().count(), 2);
    }

    #[test]
    fn mixing_ratio_is_conserved_by_the_adiabatic_update() {
        let env = test_env();
        let mut parcel = Parcel::new(&test_config(), &env).unwrap();
        let s0 = parcel.slice(0).unwrap();

        let gamma = thermo::gamma(s0.mixing_ratio);
        let lambda = thermo::lambda(s0.temperature, s0.pressure, gamma);

        parcel.set_next_kinematics(Meters(500.0), MetersPSec(0.5));
        parcel.advance();
        parcel.update_current_dynamics_and_pressure(&env).unwrap();
        parcel
            .update_current_thermodynamics_adiabatically(lambda, gamma)
            .unwrap();

        let s1 = parcel.slice(0).unwrap();
        assert_eq!(s1.mixing_ratio, s0.mixing_ratio);
        assert!(s1.temperature < s0.temperature);
    }

    #[test]
    fn config_from_map() {
        let mut map: HashMap<String, String> = vec![
            ("init_height", "150.0"),
            ("init_velocity", "1.0"),
            ("init_temp", "17.5"),
            ("init_dewpoint", "11.0"),
            ("timestep", "0.5"),
            ("period", "2.0"),
            ("dynamic_scheme", "2"),
            ("pseudoadiabatic_scheme", "3"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();

        let config = AscentConfig::from_map(&map).unwrap();
        assert_eq!(config.dynamic_scheme, DynamicSchemeKind::RungeKutta);
        assert_eq!(
            config.pseudoadiabatic_scheme,
            PseudoAdiabaticSchemeKind::Numerical
        );
        assert_eq!(config.initial_height, Meters(150.0));
        assert_eq!(config.ascent_steps(), 14401);

        map.insert("pseudoadiabatic_scheme".to_owned(), "7".to_owned());
        assert_eq!(
            AscentConfig::from_map(&map),
            Err(AscentError::UnknownScheme("pseudoadiabatic_scheme"))
        );

        map.remove("timestep");
        map.insert("pseudoadiabatic_scheme".to_owned(), "3".to_owned());
        assert_eq!(
            AscentConfig::from_map(&map),
            Err(AscentError::MissingConfigurationKey("timestep"))
        );
    }

    #[test]
    fn config_validation() {
        let bad = AscentConfig {
            time_step: 0.0,
            ..test_config()
        };
        assert!(Parcel::new(&bad, &test_env()).is_err());
    }
}
