//! Air-quality index values and their health categories.
//!
//! An [`Aqi`] is always within `0..=500`; anything outside that range is
//! clamped on construction and anything unparseable becomes [`Aqi::DEFAULT`].
//! [`classify`] maps a reading onto one of five [`Category`] bands.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// An air-quality index reading, clamped into `0..=500`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Aqi(u16);

impl Aqi {
    /// Lowest representable reading.
    pub const MIN: Self = Self(0);

    /// Highest representable reading.
    pub const MAX: Self = Self(500);

    /// Reading used when a value is missing or unparseable.
    pub const DEFAULT: Self = Self(50);

    /// Create a reading, clamping it into `0..=500`.
    #[must_use]
    pub fn clamped(value: i64) -> Self {
        let clamped = value.clamp(i64::from(Self::MIN.0), i64::from(Self::MAX.0));
        // Cannot fail after the clamp above.
        Self(u16::try_from(clamped).unwrap_or(Self::DEFAULT.0))
    }

    /// Parse user-entered text.
    ///
    /// Accepts integers and decimals (decimals are truncated). Anything else,
    /// including empty input, yields [`Aqi::DEFAULT`].
    #[must_use]
    pub fn parse_lenient(text: &str) -> Self {
        let text = text.trim();
        if let Ok(value) = text.parse::<i64>() {
            return Self::clamped(value);
        }
        match text.parse::<f64>() {
            Ok(value) if value.is_finite() => Self::from_float(value),
            _ => Self::DEFAULT,
        }
    }

    /// Read a stored JSON value, which may be a number, numeric text or absent.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Number(number) => number
                .as_i64()
                .map(Self::clamped)
                .or_else(|| number.as_f64().map(Self::from_float))
                .unwrap_or(Self::DEFAULT),
            Value::String(text) => Self::parse_lenient(text),
            _ => Self::DEFAULT,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn from_float(value: f64) -> Self {
        if value.is_nan() {
            return Self::DEFAULT;
        }
        // Saturating float-to-int cast, then clamp.
        Self::clamped(value.trunc() as i64)
    }

    /// The numeric reading.
    #[must_use]
    pub fn value(self) -> u16 {
        self.0
    }

    /// The health category this reading falls into.
    #[must_use]
    pub fn category(self) -> Category {
        match self.0 {
            0..=50 => Category::Excellent,
            51..=100 => Category::Good,
            101..=150 => Category::Moderate,
            151..=200 => Category::Unhealthy,
            _ => Category::Hazardous,
        }
    }
}

impl Default for Aqi {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Aqi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for Aqi {
    fn from(value: u16) -> Self {
        Self::clamped(i64::from(value))
    }
}

impl<'de> Deserialize<'de> for Aqi {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_json(&value))
    }
}

/// One of five ordered health bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    /// 0 to 50.
    Excellent,
    /// 51 to 100.
    Good,
    /// 101 to 150.
    Moderate,
    /// 151 to 200.
    Unhealthy,
    /// 201 to 500.
    Hazardous,
}

impl Category {
    /// Every category, best air first.
    pub const ALL: [Self; 5] = [
        Self::Excellent,
        Self::Good,
        Self::Moderate,
        Self::Unhealthy,
        Self::Hazardous,
    ];

    /// Display label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Moderate => "Moderate",
            Self::Unhealthy => "Unhealthy",
            Self::Hazardous => "Hazardous",
        }
    }

    /// Inclusive AQI bounds of this band.
    #[must_use]
    pub fn range(self) -> (u16, u16) {
        match self {
            Self::Excellent => (0, 50),
            Self::Good => (51, 100),
            Self::Moderate => (101, 150),
            Self::Unhealthy => (151, 200),
            Self::Hazardous => (201, 500),
        }
    }

    /// Primary display color as a hex string.
    #[must_use]
    pub fn color(self) -> &'static str {
        self.gradient()[0]
    }

    /// Two-stop display gradient, lighter stop first.
    #[must_use]
    pub fn gradient(self) -> [&'static str; 2] {
        match self {
            Self::Excellent => ["#10B981", "#059669"],
            Self::Good => ["#4ADE80", "#22C55E"],
            Self::Moderate => ["#FACC15", "#EAB308"],
            Self::Unhealthy => ["#F97316", "#EA580C"],
            Self::Hazardous => ["#DC2626", "#991B1B"],
        }
    }

    /// Emoji glyph shown next to readings in this band.
    #[must_use]
    pub fn emoji(self) -> &'static str {
        match self {
            Self::Excellent => "😊",
            Self::Good => "🙂",
            Self::Moderate => "😐",
            Self::Unhealthy => "😷",
            Self::Hazardous => "⚠️",
        }
    }

    /// One-line health guidance.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Excellent => "Perfect for outdoor activities",
            Self::Good => "Great day for exercise",
            Self::Moderate => "Sensitive groups beware",
            Self::Unhealthy => "Reduce outdoor activities",
            Self::Hazardous => "Stay indoors!",
        }
    }

    /// The reading used when this category is chosen directly.
    ///
    /// Always classifies back to `self`.
    #[must_use]
    pub fn midpoint(self) -> Aqi {
        let (min, max) = self.range();
        Aqi((min + max) / 2)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a category name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown AQI category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// Classify a raw reading. Out-of-range values are clamped, never rejected.
#[must_use]
pub fn classify(aqi: i64) -> Category {
    Aqi::clamped(aqi).category()
}

/// `floor((min + max) / 2)` of the category's band.
#[must_use]
pub fn category_midpoint(category: Category) -> u16 {
    category.midpoint().value()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_boundaries() {
        assert_eq!(classify(0), Category::Excellent);
        assert_eq!(classify(50), Category::Excellent);
        assert_eq!(classify(51), Category::Good);
        assert_eq!(classify(100), Category::Good);
        assert_eq!(classify(101), Category::Moderate);
        assert_eq!(classify(150), Category::Moderate);
        assert_eq!(classify(151), Category::Unhealthy);
        assert_eq!(classify(200), Category::Unhealthy);
        assert_eq!(classify(201), Category::Hazardous);
        assert_eq!(classify(500), Category::Hazardous);
    }

    #[test]
    fn test_bands_partition_full_range() {
        for value in 0..=500_i64 {
            let matching: Vec<_> = Category::ALL
                .into_iter()
                .filter(|c| {
                    let (min, max) = c.range();
                    (i64::from(min)..=i64::from(max)).contains(&value)
                })
                .collect();
            assert_eq!(matching.len(), 1, "value {value} matched {matching:?}");
            assert_eq!(classify(value), matching[0]);
        }
    }

    #[test]
    fn test_midpoint_round_trip() {
        for category in Category::ALL {
            assert_eq!(classify(i64::from(category_midpoint(category))), category);
        }
        assert_eq!(category_midpoint(Category::Excellent), 25);
        assert_eq!(category_midpoint(Category::Good), 75);
        assert_eq!(category_midpoint(Category::Moderate), 125);
        assert_eq!(category_midpoint(Category::Unhealthy), 175);
        assert_eq!(category_midpoint(Category::Hazardous), 350);
    }

    #[test]
    fn test_clamping() {
        assert_eq!(classify(-5), classify(0));
        assert_eq!(classify(9999), classify(500));
        assert_eq!(Aqi::clamped(-5), Aqi::MIN);
        assert_eq!(Aqi::clamped(i64::MAX), Aqi::MAX);
    }

    #[test]
    fn test_parse_lenient() {
        assert_eq!(Aqi::parse_lenient("180").value(), 180);
        assert_eq!(Aqi::parse_lenient(" 42 ").value(), 42);
        assert_eq!(Aqi::parse_lenient("0").value(), 0);
        assert_eq!(Aqi::parse_lenient("12.9").value(), 12);
        assert_eq!(Aqi::parse_lenient("-3").value(), 0);
        assert_eq!(Aqi::parse_lenient("700").value(), 500);
        assert_eq!(Aqi::parse_lenient(""), Aqi::DEFAULT);
        assert_eq!(Aqi::parse_lenient("smoky"), Aqi::DEFAULT);
        assert_eq!(Aqi::parse_lenient("NaN"), Aqi::DEFAULT);
    }

    #[test]
    fn test_from_json() {
        assert_eq!(Aqi::from_json(&serde_json::json!(120)).value(), 120);
        assert_eq!(Aqi::from_json(&serde_json::json!("77")).value(), 77);
        assert_eq!(Aqi::from_json(&serde_json::json!(88.6)).value(), 88);
        assert_eq!(Aqi::from_json(&serde_json::json!(1200)).value(), 500);
        assert_eq!(Aqi::from_json(&Value::Null), Aqi::DEFAULT);
        assert_eq!(Aqi::from_json(&serde_json::json!(true)), Aqi::DEFAULT);
    }

    #[test]
    fn test_deserialize_lenient() {
        let aqi: Aqi = serde_json::from_str("\"  210 \"").unwrap();
        assert_eq!(aqi.value(), 210);
        let aqi: Aqi = serde_json::from_str("null").unwrap();
        assert_eq!(aqi, Aqi::DEFAULT);
        assert_eq!(serde_json::to_string(&Aqi::clamped(99)).unwrap(), "99");
    }

    #[test]
    fn test_category_metadata() {
        assert_eq!(Category::Unhealthy.emoji(), "😷");
        assert_eq!(Category::Excellent.color(), "#10B981");
        assert_eq!(Category::Hazardous.description(), "Stay indoors!");
        assert_eq!(Category::Moderate.to_string(), "Moderate");
        for category in Category::ALL {
            assert!(category.color().starts_with('#'));
            assert!(!category.emoji().is_empty());
        }
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("good".parse::<Category>().unwrap(), Category::Good);
        assert_eq!(" Hazardous ".parse::<Category>().unwrap(), Category::Hazardous);
        let err = "Smoggy".parse::<Category>().unwrap_err();
        assert!(err.to_string().contains("Smoggy"));
    }

    #[test]
    fn test_category_serializes_as_label() {
        let json = serde_json::to_string(&Category::Unhealthy).unwrap();
        assert_eq!(json, "\"Unhealthy\"");
    }
}
