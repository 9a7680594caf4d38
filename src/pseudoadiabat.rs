//! Interchangeable closures for the parcel temperature along the pseudoadiabatic leg.
//!
//! All three variants honor the same contract: given the previous parcel state, a pressure
//! increment, and the leg's invariant wet-bulb potential temperature, produce the parcel
//! temperature after that increment. The `Numerical` variant is a closed-form empirical fit;
//! the other two integrate the pseudoadiabatic lapse-rate ODE stepwise and conserve the
//! invariant to their truncation order, so the variants are interchangeable behind the common
//! contract.

use crate::{parcel::ParcelSlice, thermo};
use metfor::{HectoPascal, Kelvin, Quantity};
use strum_macros::EnumString;

/// Which closure supplies the parcel temperature during pseudoadiabatic ascent.
///
/// Parses from the configuration identifiers `"1"`, `"2"`, `"3"` or from the spelled-out
/// names. An unrecognized identifier fails the parse; callers treat that as a fatal
/// configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
pub enum PseudoAdiabaticSchemeKind {
    /// Forward-Euler integration of the pseudoadiabatic lapse-rate ODE.
    #[strum(serialize = "1", serialize = "finite-difference")]
    FiniteDifference,
    /// Classical 4th order Runge-Kutta integration of the same ODE.
    #[strum(serialize = "2", serialize = "runge-kutta")]
    RungeKutta,
    /// Closed-form empirical fit after Bakhshaii & Stull (2013).
    #[strum(serialize = "3", serialize = "numerical")]
    Numerical,
}

impl PseudoAdiabaticSchemeKind {
    /// Parcel temperature after a pressure increment along the pseudoadiabat.
    ///
    /// Returns `None` when the wet-bulb potential temperature falls outside the domain of the
    /// closure; callers must not treat that as a physical result.
    pub fn temperature(
        self,
        slice: &ParcelSlice,
        delta_pressure: HectoPascal,
        wet_bulb_theta: Kelvin,
    ) -> Option<Kelvin> {
        match self {
            PseudoAdiabaticSchemeKind::FiniteDifference => {
                Some(euler_along_pseudoadiabat(slice, delta_pressure))
            }
            PseudoAdiabaticSchemeKind::RungeKutta => {
                Some(runge_kutta_along_pseudoadiabat(slice, delta_pressure))
            }
            PseudoAdiabaticSchemeKind::Numerical => {
                bakhshaii_stull(slice.pressure + delta_pressure, wet_bulb_theta)
            }
        }
    }
}

/// Pseudoadiabatic lapse rate dT/dp in K/Pa, from the latent-heat balance of a saturated
/// parcel losing its condensate as it expands.
fn pseudoadiabatic_lapse(temperature: f64, pressure: f64) -> f64 {
    let r_s = thermo::mixing_ratio(Kelvin(temperature), HectoPascal(pressure / 100.0));

    let numerator = thermo::R_D * temperature + thermo::L_V * r_s;
    let denominator = thermo::C_P
        + (thermo::L_V * thermo::L_V * r_s * thermo::EPSILON)
            / (thermo::R_D * temperature * temperature);

    numerator / (pressure * denominator)
}

/// Split a pressure increment into substeps of at most 1 hPa.
fn substeps(delta_pressure_pa: f64) -> (usize, f64) {
    let n = (delta_pressure_pa.abs() / 100.0).ceil().max(1.0) as usize;
    (n, delta_pressure_pa / n as f64)
}

fn euler_along_pseudoadiabat(slice: &ParcelSlice, delta_pressure: HectoPascal) -> Kelvin {
    let (n, h) = substeps(delta_pressure.unpack() * 100.0);

    let mut temperature = slice.temperature.unpack();
    let mut pressure = slice.pressure.unpack() * 100.0;

    for _ in 0..n {
        temperature += h * pseudoadiabatic_lapse(temperature, pressure);
        pressure += h;
    }

    Kelvin(temperature)
}

fn runge_kutta_along_pseudoadiabat(slice: &ParcelSlice, delta_pressure: HectoPascal) -> Kelvin {
    let (n, h) = substeps(delta_pressure.unpack() * 100.0);

    let mut temperature = slice.temperature.unpack();
    let mut pressure = slice.pressure.unpack() * 100.0;

    for _ in 0..n {
        let k1 = pseudoadiabatic_lapse(temperature, pressure);
        let k2 = pseudoadiabatic_lapse(temperature + 0.5 * h * k1, pressure + 0.5 * h);
        let k3 = pseudoadiabatic_lapse(temperature + 0.5 * h * k2, pressure + 0.5 * h);
        let k4 = pseudoadiabatic_lapse(temperature + h * k3, pressure + h);

        temperature += (h / 6.0) * (k1 + 2.0 * k2 + 2.0 * k3 + k4);
        pressure += h;
    }

    Kelvin(temperature)
}

/// Closed-form (pressure, wet-bulb potential temperature) to temperature fit of
/// Bakhshaii & Stull (2013), three disjoint wet-bulb bands.
///
/// Returns `None` outside every band.
fn bakhshaii_stull(pressure: HectoPascal, wet_bulb_theta: Kelvin) -> Option<Kelvin> {
    // The fit wants pressure in kPa and wet-bulb temperature in Celsius.
    let p = pressure.unpack() / 10.0;
    let wb = wet_bulb_theta.unpack() - 273.15;

    let celsius = if wb > -30.0 && wb <= 4.0 {
        let g1 = -20.3313 - (0.0253 * p);
        let g2 = f64::sin((wb + p).powf(0.5)) + (wb / p) + p - 2.8565;
        let g3 = f64::cos(19.6836 + (1.0 + f64::exp(-wb)).powf(-1.0 / 3.0) + (p / 15.0252));
        let g4 = (4.4653 * f64::sin(p.powf(0.5))) - 71.9358;
        let g5 = f64::exp(wb - (2.71828 * f64::cos(p / 18.5219))).powf(1.0 / 6.0);
        let g6 = wb - f64::sin((p + wb + f64::atan(wb) + 6.6165).powf(0.5));

        g1 + g2 + g3 + g4 + g5 + g6
    } else if wb > 4.0 && wb <= 21.0 {
        let g1 = -9.6285 + f64::cos(f64::ln(f64::atan(f64::atan(f64::exp((-9.2121 * wb) / p)))));
        let g2 = wb - ((19.9563 / p) * f64::atan(wb)) + (wb.powi(2) / (5.47162 * p));
        let g3 = f64::sin(f64::ln(8.0 * p.powi(3))) * f64::ln(2.0 * p.powf(1.5));
        let g4 = wb + (((p * wb) - p + wb) / (p - 190.2578));
        let g5 = p - ((p - 383.0292) / ((15.4014 * p) - p.powi(2)));
        let g6 = ((1.0 / 3.0) * f64::ln(339.0316 - p)) + f64::atan(wb - p + 95.9839);
        let g7 = -(f64::ln(p) * ((298.2909 + (16.5109 * p)) / (p - 2.2183)));

        g1 + g2 + g3 + g4 + g5 + g6 + g7
    } else if wb > 21.0 && wb < 45.0 {
        let g1 = 0.3919 * wb.powf(7.0 / 3.0) * (p * (p + 15.8148)).powf(-1.0);
        let g2 = (19.9724 + (797.7921 / p)) * f64::sin(-19.9724 / wb);
        let g3 = (f64::ln(-3.927765 + wb + p) * f64::cos(f64::ln(wb + p))).powi(3);
        let g4 = f64::exp((wb + (1.0 + f64::exp(-p)).powi(-1)).powf(0.5) - 1.5603).powf(0.5);
        let g5 = (p + wb).powf(0.5) * f64::exp(f64::atan((p + wb) / 7.9081));
        let g6 = ((p / wb.powi(2)) * f64::min(9.6112, p - wb)) - 13.73;
        let g7 = f64::sin(f64::sin(f64::min(p, 17.3170)).powi(3) - p.powf(0.5) + (25.5113 / wb));

        g1 + g2 + g3 + g4 + g5 + g6 + g7
    } else {
        return None;
    };

    Some(Kelvin(celsius + 273.15))
}
