//! The environmental sounding and the locality-aware lookup used to query it.
//!
//! An [`Environment`] holds a fixed vertical profile of pressure, temperature, and dew point
//! against height. Queries are made through a [`Location`], which carries the bracketing
//! interval ([`Sector`]) the height was last found in. Because a time-stepped parcel moves only
//! a little between queries, re-bracketing is a short linear walk from the previous sector
//! rather than a full search.

use crate::{
    error::{AscentError, Result},
    thermo,
};
use itertools::Itertools;
use metfor::{Celsius, HectoPascal, Kelvin, Meters, Quantity};

/// A pair of adjacent sounding indexes used to linearly interpolate a field at a given height.
///
/// Invariant: `upper == lower + 1` and `upper <= len - 1` for the owning sounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sector {
    /// Index of the sounding level at or below the position.
    pub lower: usize,
    /// Index of the sounding level above the position, always `lower + 1`.
    pub upper: usize,
}

impl Default for Sector {
    fn default() -> Self {
        Sector { lower: 0, upper: 1 }
    }
}

/// A height paired with the sector currently believed to contain it.
///
/// Mutated only through [`Environment::update_sector`], which restores the sector invariant
/// after the position changes. At the domain edges the sector clamps to the extreme bracket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    /// Height above the surface in meters.
    pub position: Meters,
    /// The bracketing sounding interval for `position`.
    pub sector: Sector,
}

/// An immutable atmospheric sounding: parallel profiles of height, pressure, temperature, and
/// dew point.
///
/// Heights are strictly increasing. Pressure is stored in hPa and temperatures in Celsius as
/// they appear on disk; queries convert to Pa-backed and Kelvin quantities.
#[derive(Debug, Clone)]
pub struct Environment {
    height: Vec<Meters>,
    pressure: Vec<HectoPascal>,
    temperature: Vec<Celsius>,
    dew_point: Vec<Celsius>,
}

impl Environment {
    /// Build an environment from parallel profile vectors.
    ///
    /// Requires at least two levels, equal lengths, and strictly increasing heights.
    pub fn new(
        height: Vec<Meters>,
        pressure: Vec<HectoPascal>,
        temperature: Vec<Celsius>,
        dew_point: Vec<Celsius>,
    ) -> Result<Self> {
        if height.len() < 2 {
            return Err(AscentError::InvalidProfile("fewer than two levels"));
        }

        if pressure.len() != height.len()
            || temperature.len() != height.len()
            || dew_point.len() != height.len()
        {
            return Err(AscentError::InvalidProfile("profile lengths differ"));
        }

        if !height.iter().tuple_windows().all(|(h0, h1)| h0 < h1) {
            return Err(AscentError::InvalidProfile(
                "heights not strictly increasing",
            ));
        }

        Ok(Environment {
            height,
            pressure,
            temperature,
            dew_point,
        })
    }

    /// Parse a sounding from its on-disk text form.
    ///
    /// Two header lines are skipped, then each row is `height;pressure;temperature;dewpoint`
    /// with height in meters, pressure in hPa, and temperatures in Celsius.
    pub fn from_profile_text(text: &str) -> Result<Self> {
        let mut height = Vec::new();
        let mut pressure = Vec::new();
        let mut temperature = Vec::new();
        let mut dew_point = Vec::new();

        for (row, line) in text
            .lines()
            .skip(2)
            .filter(|line| !line.trim().is_empty())
            .enumerate()
        {
            let mut fields = line.split(';').map(|field| field.trim().parse::<f64>());

            let mut next_field = || -> Result<f64> {
                fields
                    .next()
                    .and_then(|parsed| parsed.ok())
                    .ok_or(AscentError::MalformedProfileRow(row))
            };

            height.push(Meters(next_field()?));
            pressure.push(HectoPascal(next_field()?));
            temperature.push(Celsius(next_field()?));
            dew_point.push(Celsius(next_field()?));
        }

        Environment::new(height, pressure, temperature, dew_point)
    }

    /// The height profile.
    pub fn height_profile(&self) -> &[Meters] {
        &self.height
    }

    /// The pressure profile in hPa.
    pub fn pressure_profile(&self) -> &[HectoPascal] {
        &self.pressure
    }

    /// The temperature profile in Celsius.
    pub fn temperature_profile(&self) -> &[Celsius] {
        &self.temperature
    }

    /// The dew point profile in Celsius.
    pub fn dew_point_profile(&self) -> &[Celsius] {
        &self.dew_point
    }

    /// The sounding ceiling, the highest level in the profile.
    pub fn top(&self) -> Meters {
        self.height[self.height.len() - 1]
    }

    /// Locate a height with a full, non-incremental bracket search.
    ///
    /// Used once at parcel initialization; afterwards [`Environment::update_sector`] keeps the
    /// bracket current incrementally. Heights outside the profile clamp to the extreme bracket.
    pub fn locate(&self, height: Meters) -> Location {
        let pos = height.unpack();

        let below = self
            .height
            .iter()
            .rposition(|h| h.unpack() <= pos)
            .unwrap_or(0);
        let lower = below.min(self.height.len() - 2);

        Location {
            position: height,
            sector: Sector {
                lower,
                upper: lower + 1,
            },
        }
    }

    /// Re-bracket a location after its position changed.
    ///
    /// Walks the sector one level at a time toward the boundary nearest the new position until
    /// the distance stops improving. A linear walk beats a binary search here: per-step parcel
    /// displacement is small relative to the sounding resolution, so the previous bracket is
    /// almost always still correct or adjacent. Never indexes outside the profile; at either
    /// domain edge the sector clamps to the extreme bracket.
    pub fn update_sector(&self, location: &mut Location) {
        let heights = &self.height;
        let len = heights.len();
        let pos = location.position.unpack();
        let sector = &mut location.sector;

        let dist_to_lower = (pos - heights[sector.lower].unpack()).abs();
        let dist_to_upper = (pos - heights[sector.upper].unpack()).abs();

        let nearest = if dist_to_lower == dist_to_upper {
            // Dead center, the current bracket still holds.
            return;
        } else if dist_to_lower < dist_to_upper {
            if sector.lower == 0 {
                *sector = Sector { lower: 0, upper: 1 };
                return;
            }

            // Walk the bracket gradually down.
            let mut nearest = sector.lower;
            let mut dist = dist_to_lower;
            while nearest > 0 {
                let next_dist = (pos - heights[nearest - 1].unpack()).abs();
                if next_dist < dist {
                    dist = next_dist;
                    nearest -= 1;
                } else {
                    break;
                }
            }
            nearest
        } else {
            if sector.upper == len - 1 {
                *sector = Sector {
                    lower: len - 2,
                    upper: len - 1,
                };
                return;
            }

            // Walk the bracket gradually up.
            let mut nearest = sector.upper;
            let mut dist = dist_to_upper;
            while nearest < len - 1 {
                let next_dist = (pos - heights[nearest + 1].unpack()).abs();
                if next_dist < dist {
                    dist = next_dist;
                    nearest += 1;
                } else {
                    break;
                }
            }
            nearest
        };

        *sector = if nearest == 0 {
            Sector { lower: 0, upper: 1 }
        } else if nearest == len - 1 {
            Sector {
                lower: len - 2,
                upper: len - 1,
            }
        } else if pos >= heights[nearest].unpack() {
            Sector {
                lower: nearest,
                upper: nearest + 1,
            }
        } else {
            Sector {
                lower: nearest - 1,
                upper: nearest,
            }
        };
    }

    /// Ambient pressure at a location, in hPa.
    pub fn pressure_at(&self, location: &Location) -> HectoPascal {
        HectoPascal(self.field_at(&self.pressure, location))
    }

    /// Ambient temperature at a location, converted to Kelvin.
    pub fn temperature_at(&self, location: &Location) -> Kelvin {
        Kelvin(self.field_at(&self.temperature, location) + 273.15)
    }

    /// Ambient dew point at a location, converted to Kelvin.
    pub fn dew_point_at(&self, location: &Location) -> Kelvin {
        Kelvin(self.field_at(&self.dew_point, location) + 273.15)
    }

    /// Ambient virtual temperature at a location, composed from the interpolated temperature,
    /// dew point, and pressure.
    pub fn virtual_temperature_at(&self, location: &Location) -> Kelvin {
        let temperature = self.temperature_at(location);
        let dew_point = self.dew_point_at(location);
        let pressure = self.pressure_at(location);

        let mixing_ratio = thermo::mixing_ratio(dew_point, pressure);
        thermo::virtual_temperature(temperature, mixing_ratio)
    }

    /// Linear interpolation of a field inside the location's sector.
    ///
    /// The evaluation height is clamped into the profile's range so a clamped edge sector never
    /// extrapolates.
    fn field_at<T: Quantity + Copy>(&self, field: &[T], location: &Location) -> f64 {
        let Sector { lower, upper } = location.sector;

        let h_lower = self.height[lower].unpack();
        let h_upper = self.height[upper].unpack();
        let f_lower = field[lower].unpack();
        let f_upper = field[upper].unpack();

        let floor = self.height[0].unpack();
        let ceiling = self.top().unpack();
        let position = location.position.unpack().max(floor).min(ceiling);

        let b = (f_upper - f_lower) / (h_upper - h_lower);
        f_lower - h_lower * b + b * position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn test_env() -> Environment {
        Environment::new(
            vec![
                Meters(0.0),
                Meters(500.0),
                Meters(1500.0),
                Meters(3000.0),
                Meters(5000.0),
            ],
            vec![
                HectoPascal(1000.0),
                HectoPascal(945.0),
                HectoPascal(845.0),
                HectoPascal(700.0),
                HectoPascal(540.0),
            ],
            vec![
                Celsius(15.0),
                Celsius(12.0),
                Celsius(5.0),
                Celsius(-5.0),
                Celsius(-18.0),
            ],
            vec![
                Celsius(10.0),
                Celsius(8.0),
                Celsius(0.0),
                Celsius(-12.0),
                Celsius(-30.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn rejects_bad_profiles() {
        let short = Environment::new(
            vec![Meters(0.0)],
            vec![HectoPascal(1000.0)],
            vec![Celsius(15.0)],
            vec![Celsius(10.0)],
        );
        assert_eq!(short, Err(AscentError::InvalidProfile("fewer than two levels")));

        let unsorted = Environment::new(
            vec![Meters(0.0), Meters(1000.0), Meters(900.0)],
            vec![HectoPascal(1000.0), HectoPascal(900.0), HectoPascal(910.0)],
            vec![Celsius(15.0), Celsius(9.0), Celsius(10.0)],
            vec![Celsius(10.0), Celsius(5.0), Celsius(6.0)],
        );
        assert!(unsorted.is_err());
    }

    #[test]
    fn parses_profile_text() {
        let text = "Test sounding\nheight;pressure;temperature;dewpoint\n\
                    0.0;1000.0;15.0;10.0\n500.0;945.0;12.0;8.0\n1500.0;845.0;5.0;0.0\n";
        let env = Environment::from_profile_text(text).unwrap();

        assert_eq!(env.height_profile().len(), 3);
        assert_eq!(env.pressure_profile()[1], HectoPascal(945.0));
        assert_eq!(env.dew_point_profile()[2], Celsius(0.0));

        let bad = "h\nh\n0.0;1000.0;15.0\n";
        assert_eq!(
            Environment::from_profile_text(bad),
            Err(AscentError::MalformedProfileRow(0))
        );
    }

    #[test]
    fn interpolation_recovers_grid_values() {
        let env = test_env();

        // Position on a grid point, bracketed from below.
        let loc = Location {
            position: Meters(1500.0),
            sector: Sector { lower: 1, upper: 2 },
        };
        assert_relative_eq!(env.pressure_at(&loc).unpack(), 845.0, epsilon = 1e-9);
        assert_relative_eq!(env.temperature_at(&loc).unpack(), 278.15, epsilon = 1e-9);

        // Same grid point, bracketed from above.
        let loc = Location {
            position: Meters(1500.0),
            sector: Sector { lower: 2, upper: 3 },
        };
        assert_relative_eq!(env.pressure_at(&loc).unpack(), 845.0, epsilon = 1e-9);

        // Midpoint interpolates halfway.
        let loc = Location {
            position: Meters(250.0),
            sector: Sector { lower: 0, upper: 1 },
        };
        assert_relative_eq!(env.pressure_at(&loc).unpack(), 972.5, epsilon = 1e-9);
    }

    #[test]
    fn locate_finds_the_bracket() {
        let env = test_env();

        assert_eq!(env.locate(Meters(800.0)).sector, Sector { lower: 1, upper: 2 });
        assert_eq!(env.locate(Meters(0.0)).sector, Sector { lower: 0, upper: 1 });

        // Outside the profile clamps to the extreme bracket.
        assert_eq!(env.locate(Meters(-50.0)).sector, Sector { lower: 0, upper: 1 });
        assert_eq!(env.locate(Meters(9000.0)).sector, Sector { lower: 3, upper: 4 });
    }

    #[test]
    fn update_sector_follows_the_position() {
        let env = test_env();
        let mut loc = env.locate(Meters(100.0));

        // Jump up several sectors.
        loc.position = Meters(3200.0);
        env.update_sector(&mut loc);
        assert_eq!(loc.sector, Sector { lower: 3, upper: 4 });

        // And back down.
        loc.position = Meters(600.0);
        env.update_sector(&mut loc);
        assert_eq!(loc.sector, Sector { lower: 1, upper: 2 });
    }

    #[test]
    fn update_sector_is_idempotent() {
        let env = test_env();

        for &h in &[100.0, 600.0, 2000.0, 4000.0] {
            let mut loc = env.locate(Meters(h));
            env.update_sector(&mut loc);
            let first = loc.sector;
            env.update_sector(&mut loc);
            assert_eq!(loc.sector, first);

            assert_eq!(first.upper, first.lower + 1);
            assert!(first.upper <= env.height_profile().len() - 1);
        }
    }

    #[test]
    fn update_sector_clamps_at_the_edges() {
        let env = test_env();

        let mut loc = env.locate(Meters(2000.0));
        loc.position = Meters(8000.0);
        env.update_sector(&mut loc);
        assert_eq!(loc.sector, Sector { lower: 3, upper: 4 });

        loc.position = Meters(-100.0);
        env.update_sector(&mut loc);
        assert_eq!(loc.sector, Sector { lower: 0, upper: 1 });
    }

    impl PartialEq for Environment {
        fn eq(&self, other: &Self) -> bool {
            self.height == other.height
                && self.pressure == other.pressure
                && self.temperature == other.temperature
                && self.dew_point == other.dew_point
        }
    }
}
