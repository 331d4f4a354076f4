use std::fmt;
use std::str::FromStr;

use crate::error::LayoutError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum GridUnitType {
    #[default]
    Auto,
    Pixel,
    Star,
}

/// Length of one grid track: `Auto`, a pixel size, or a star weight.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridLength {
    pub value: f32,
    pub unit: GridUnitType,
}

impl Default for GridLength {
    fn default() -> Self {
        Self::star(1.0)
    }
}

impl GridLength {
    pub const AUTO: Self = Self {
        value: 1.0,
        unit: GridUnitType::Auto,
    };

    pub const fn pixel(value: f32) -> Self {
        Self {
            value,
            unit: GridUnitType::Pixel,
        }
    }

    pub const fn star(weight: f32) -> Self {
        Self {
            value: weight,
            unit: GridUnitType::Star,
        }
    }

    pub fn is_auto(self) -> bool {
        self.unit == GridUnitType::Auto
    }

    pub fn is_star(self) -> bool {
        self.unit == GridUnitType::Star
    }

    /// Parses `input`, logging and falling back to `Auto` when it is malformed.
    pub fn parse_or_auto(input: &str) -> Self {
        match input.parse::<Self>() {
            Ok(length) => length,
            Err(err) => {
                tracing::warn!(%err, "falling back to Auto track");
                Self::AUTO
            }
        }
    }
}

impl FromStr for GridLength {
    type Err = LayoutError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("auto") {
            return Ok(Self::AUTO);
        }

        let (number, unit) = match trimmed.strip_suffix('*') {
            Some("") => return Ok(Self::star(1.0)),
            Some(weight) => (weight.trim_end(), GridUnitType::Star),
            None => (trimmed, GridUnitType::Pixel),
        };

        let value = number
            .parse::<f32>()
            .map_err(|_| LayoutError::invalid_track_length(input))?;
        if !value.is_finite() || value < 0.0 {
            return Err(LayoutError::invalid_track_length(input));
        }
        Ok(Self { value, unit })
    }
}

impl fmt::Display for GridLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.unit {
            GridUnitType::Auto => f.write_str("Auto"),
            GridUnitType::Pixel => write!(f, "{}", self.value),
            GridUnitType::Star if self.value == 1.0 => f.write_str("*"),
            GridUnitType::Star => write!(f, "{}*", self.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{GridLength, GridUnitType};
    use crate::error::LayoutError;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_the_track_grammar() {
        assert_eq!("Auto".parse::<GridLength>(), Ok(GridLength::AUTO));
        assert_eq!("auto".parse::<GridLength>(), Ok(GridLength::AUTO));
        assert_eq!("120".parse::<GridLength>(), Ok(GridLength::pixel(120.0)));
        assert_eq!(" 2.5* ".parse::<GridLength>(), Ok(GridLength::star(2.5)));
        assert_eq!("*".parse::<GridLength>(), Ok(GridLength::star(1.0)));
    }

    #[test]
    fn rejects_out_of_domain_lengths() {
        assert_eq!(
            "-4".parse::<GridLength>(),
            Err(LayoutError::invalid_track_length("-4"))
        );
        assert!("abc*".parse::<GridLength>().is_err());
        assert!("NaN".parse::<GridLength>().is_err());
        assert!("1e40".parse::<GridLength>().is_err());
    }

    #[test_log::test]
    fn malformed_length_degrades_to_auto() {
        let length = GridLength::parse_or_auto("3**");
        assert_eq!(length.unit, GridUnitType::Auto);
    }

    #[test]
    fn display_round_trips_common_forms() {
        assert_eq!(GridLength::star(1.0).to_string(), "*");
        assert_eq!(GridLength::star(2.0).to_string(), "2*");
        assert_eq!(GridLength::pixel(40.0).to_string(), "40");
        assert_eq!(GridLength::AUTO.to_string(), "Auto");
    }
}
