use helixkit::engine::config::SearchRange;
use serde::Deserialize;
use serde::de::IntoDeserializer;
use serde::de::value::{Error as ValueError, StrDeserializer};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid range '{0}'. Expected 'start:end:step' (e.g., '0:360:5').")]
    InvalidRangeFormat(String),

    #[error("Component '{component}' of range '{range}' is not a number.")]
    InvalidRangeComponent {
        component: &'static str,
        range: String,
    },

    #[error("Invalid --set format: '{0}'. Expected KEY=VALUE.")]
    InvalidKeyValue(String),

    #[error("Invalid value '{value}'. Expected one of: {expected}.")]
    InvalidVariant {
        value: String,
        expected: &'static str,
    },
}

/// Parses `start:end:step`. Bounds are checked later by the core config
/// builders.
pub fn parse_range(s: &str) -> Result<SearchRange, ParseError> {
    let parts: Vec<&str> = s.split(':').map(str::trim).collect();
    let [start, end, step] = parts.as_slice() else {
        return Err(ParseError::InvalidRangeFormat(s.to_string()));
    };
    let number = |component: &'static str, text: &str| {
        text.parse::<f64>()
            .map_err(|_| ParseError::InvalidRangeComponent {
                component,
                range: s.to_string(),
            })
    };
    Ok(SearchRange {
        start: number("start", start)?,
        end: number("end", end)?,
        step: number("step", step)?,
    })
}

pub fn parse_key_value(s: &str) -> Result<(&str, &str), ParseError> {
    s.split_once('=')
        .map(|(k, v)| (k.trim(), v.trim()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| ParseError::InvalidKeyValue(s.to_string()))
}

/// Parses a kebab-case enum value the same way the TOML file would.
pub fn parse_variant<'de, T: Deserialize<'de>>(
    value: &'de str,
    expected: &'static str,
) -> Result<T, ParseError> {
    let de: StrDeserializer<'de, ValueError> = value.into_deserializer();
    T::deserialize(de).map_err(|_| ParseError::InvalidVariant {
        value: value.to_string(),
        expected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use helixkit::engine::config::{CoordinateFormat, DihedralMode};

    #[test]
    fn parses_colon_separated_range() {
        let r = parse_range("0:360:5").unwrap();
        assert_eq!((r.start, r.end, r.step), (0.0, 360.0, 5.0));
        let r = parse_range(" -2.5 : 2.5 : 0.25 ").unwrap();
        assert_eq!((r.start, r.end, r.step), (-2.5, 2.5, 0.25));
    }

    #[test]
    fn range_with_wrong_arity_is_rejected() {
        assert_eq!(
            parse_range("0:360"),
            Err(ParseError::InvalidRangeFormat("0:360".to_string()))
        );
        assert!(parse_range("0:1:2:3").is_err());
    }

    #[test]
    fn range_with_non_numeric_component_names_it() {
        assert_eq!(
            parse_range("0:x:1"),
            Err(ParseError::InvalidRangeComponent {
                component: "end",
                range: "0:x:1".to_string()
            })
        );
    }

    #[test]
    fn key_value_splits_on_first_equals() {
        assert_eq!(
            parse_key_value("programs.program-dir=/opt/a=b").unwrap(),
            ("programs.program-dir", "/opt/a=b")
        );
        assert!(parse_key_value("no-equals").is_err());
        assert!(parse_key_value("=value").is_err());
    }

    #[test]
    fn variants_follow_kebab_case_names() {
        assert_eq!(
            parse_variant::<DihedralMode>("force-x", "none, search, force-x").unwrap(),
            DihedralMode::ForceX
        );
        assert_eq!(
            parse_variant::<CoordinateFormat>("star", "box, star").unwrap(),
            CoordinateFormat::Star
        );
        assert!(parse_variant::<DihedralMode>("ForceX", "none, search, force-x").is_err());
    }
}
