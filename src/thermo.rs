//! Pure, stateless thermodynamic primitives used throughout the ascent model.
//!
//! All functions take typed quantities at the API boundary and do their arithmetic in SI units
//! internally, so pressures are unpacked from hPa to Pa before entering any formula.

use metfor::{HectoPascal, Kelvin, Quantity};

/// Ratio of the molar mass of water vapour to the molar mass of dry air.
///
/// Non SI, but every formula in this module is adapted to it.
pub const EPSILON: f64 = 0.621_945_729_475_937_3;

/// Gravitational acceleration in m s^-2.
pub const G: f64 = 9.80665;

/// Specific heat of dry air at constant pressure in J kg^-1 K^-1.
pub const C_P: f64 = 1005.7;

/// Specific heat of dry air at constant volume in J kg^-1 K^-1.
pub const C_V: f64 = 718.0;

/// Specific heat of water vapour at constant pressure in J kg^-1 K^-1.
pub const C_PV: f64 = 1870.0;

/// Specific heat of water vapour at constant volume in J kg^-1 K^-1.
pub const C_VV: f64 = 1410.0;

/// Latent heat of vapourization in J kg^-1, consistent with the wet-bulb fit below.
pub const L_V: f64 = 2.555e6;

/// Gas constant for dry air in J kg^-1 K^-1.
pub const R_D: f64 = C_P - C_V;

/// Saturation vapour pressure over liquid water in Pa.
///
/// Buck (1981) empirical fit with the pressure-dependent enhancement factor.
pub fn vapour_pressure(temperature: Kelvin, pressure: HectoPascal) -> f64 {
    let t = temperature.unpack() - 273.15;
    let p_hpa = pressure.unpack();

    let enhancement = 1.0 + 7.2e-4 + p_hpa * (3.2e-6 + 5.9e-10 * t * t);
    let e_hpa = 6.1121 * f64::exp(((18.729 - t / 227.3) * t) / (t + 257.87)) * enhancement;

    e_hpa * 100.0
}

/// Mixing ratio in kg of vapour per kg of dry air.
///
/// Evaluated at the dew point this is the actual mixing ratio, evaluated at the air temperature
/// it is the saturation mixing ratio.
pub fn mixing_ratio(temperature: Kelvin, pressure: HectoPascal) -> f64 {
    let e = vapour_pressure(temperature, pressure);
    let p = pressure.unpack() * 100.0;

    EPSILON * (e / (p - e))
}

/// The temperature dry air would need to match the density of moist air at the same pressure.
pub fn virtual_temperature(temperature: Kelvin, mixing_ratio: f64) -> Kelvin {
    Kelvin(temperature.unpack() * ((1.0 + (mixing_ratio / EPSILON)) / (1.0 + mixing_ratio)))
}

/// Moist heat-capacity ratio, a mixing-ratio weighted blend of the dry air and water vapour
/// specific heats. Bailyn (1994).
pub fn gamma(mixing_ratio: f64) -> f64 {
    let cp_moist = C_P * ((1.0 + (mixing_ratio * (C_PV / C_P))) / (1.0 + mixing_ratio));
    let cv_moist = C_V * ((1.0 + (mixing_ratio * (C_VV / C_V))) / (1.0 + mixing_ratio));

    cp_moist / cv_moist
}

/// The adiabatic invariant `P^(1-gamma) * T^gamma`, conserved along an adiabat.
pub fn lambda(temperature: Kelvin, pressure: HectoPascal, gamma: f64) -> f64 {
    let p = pressure.unpack() * 100.0;

    p.powf(1.0 - gamma) * temperature.unpack().powf(gamma)
}

/// Parcel temperature on the adiabat identified by `lambda` at the given pressure.
pub fn temperature_in_adiabat(pressure: HectoPascal, gamma: f64, lambda: f64) -> Kelvin {
    let p = pressure.unpack() * 100.0;

    Kelvin((lambda / p.powf(1.0 - gamma)).powf(1.0 / gamma))
}

/// Buoyant acceleration in m s^-2 from the virtual temperature contrast with the environment.
pub fn buoyancy_force(parcel_virtual_t: Kelvin, env_virtual_t: Kelvin) -> f64 {
    G * ((parcel_virtual_t.unpack() - env_virtual_t.unpack()) / env_virtual_t.unpack())
}

/// Wet-bulb potential temperature, the invariant carried along a pseudoadiabat.
///
/// Pseudo-equivalent potential temperature after Bryan (2008), mapped through an empirical
/// wet-bulb fit.
pub fn wet_bulb_potential_temperature(
    temperature: Kelvin,
    mixing_ratio: f64,
    saturation_mixing_ratio: f64,
    pressure: HectoPascal,
) -> Kelvin {
    let t = temperature.unpack();
    let p = pressure.unpack() * 100.0;
    let e = vapour_pressure(temperature, pressure);

    let dry_t = t * (100_000.0 / (p - e)).powf(0.2854);
    let equivalent_t = dry_t
        * (mixing_ratio / saturation_mixing_ratio)
            .powf(-(0.2854 * (mixing_ratio / EPSILON)))
        * f64::exp((L_V * mixing_ratio) / (C_P * t));
    let wet_t = 45.114 - 51.489 * (273.15 / equivalent_t).powf(3.504);

    Kelvin(wet_t + 273.15)
}
