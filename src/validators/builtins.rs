//! XSD built-in types
//!
//! Lexical checks for the built-in simple types, and the ordered value space
//! used by the range facets.

use std::cmp::Ordering;
use std::str::FromStr;

use base64::Engine;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use rust_decimal::Decimal;
use url::Url;

use super::facets::WhiteSpace;
use crate::names::{is_valid_language, is_valid_name, is_valid_ncname, is_valid_nmtoken, is_valid_qname};

macro_rules! builtins {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// Built-in simple type
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Builtin {
            $(
                #[doc = concat!("`xs:", $name, "`")]
                $variant,
            )*
        }

        impl Builtin {
            /// Every built-in simple type
            pub const ALL: &'static [Builtin] = &[$(Builtin::$variant),*];

            /// Local name in the XML Schema namespace
            pub fn name(self) -> &'static str {
                match self {
                    $(Builtin::$variant => $name,)*
                }
            }

            /// Look a built-in type up by local name
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(Builtin::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

builtins! {
    AnySimpleType => "anySimpleType",
    String => "string",
    NormalizedString => "normalizedString",
    Token => "token",
    Language => "language",
    Name => "Name",
    NCName => "NCName",
    Id => "ID",
    IdRef => "IDREF",
    IdRefs => "IDREFS",
    Entity => "ENTITY",
    Entities => "ENTITIES",
    NmToken => "NMTOKEN",
    NmTokens => "NMTOKENS",
    QName => "QName",
    Notation => "NOTATION",
    AnyUri => "anyURI",
    Boolean => "boolean",
    Decimal => "decimal",
    Integer => "integer",
    NonPositiveInteger => "nonPositiveInteger",
    NegativeInteger => "negativeInteger",
    Long => "long",
    Int => "int",
    Short => "short",
    Byte => "byte",
    NonNegativeInteger => "nonNegativeInteger",
    UnsignedLong => "unsignedLong",
    UnsignedInt => "unsignedInt",
    UnsignedShort => "unsignedShort",
    UnsignedByte => "unsignedByte",
    PositiveInteger => "positiveInteger",
    Float => "float",
    Double => "double",
    Duration => "duration",
    DateTime => "dateTime",
    Date => "date",
    Time => "time",
    GYear => "gYear",
    GYearMonth => "gYearMonth",
    GMonth => "gMonth",
    GMonthDay => "gMonthDay",
    GDay => "gDay",
    HexBinary => "hexBinary",
    Base64Binary => "base64Binary",
}

const TZ: &str = r"(Z|[+-][0-9]{2}:[0-9]{2})?";

static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?[0-9]+$").expect("integer pattern is valid"));

static DECIMAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?([0-9]+(\.[0-9]*)?|\.[0-9]+)$").expect("decimal pattern is valid")
});

static FLOAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+-]?([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][+-]?[0-9]+)?|-?INF|NaN)$")
        .expect("float pattern is valid")
});

static DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?P([0-9]+Y)?([0-9]+M)?([0-9]+D)?(T([0-9]+H)?([0-9]+M)?([0-9]+(\.[0-9]+)?S)?)?$")
        .expect("duration pattern is valid")
});

static DATE_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(-?[0-9]{{4,}})-([0-9]{{2}})-([0-9]{{2}})T([0-9]{{2}}):([0-9]{{2}}):([0-9]{{2}})(\.[0-9]+)?{}$",
        TZ
    ))
    .expect("dateTime pattern is valid")
});

static DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^(-?[0-9]{{4,}})-([0-9]{{2}})-([0-9]{{2}}){}$", TZ)).expect("date pattern is valid")
});

static TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^([0-9]{{2}}):([0-9]{{2}}):([0-9]{{2}})(\.[0-9]+)?{}$", TZ))
        .expect("time pattern is valid")
});

static G_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^(-?[0-9]{{4,}}){}$", TZ)).expect("gYear pattern is valid"));

static G_YEAR_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^(-?[0-9]{{4,}})-([0-9]{{2}}){}$", TZ)).expect("gYearMonth pattern is valid")
});

static G_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^--([0-9]{{2}}){}$", TZ)).expect("gMonth pattern is valid"));

static G_MONTH_DAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^--([0-9]{{2}})-([0-9]{{2}}){}$", TZ)).expect("gMonthDay pattern is valid")
});

static G_DAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^---([0-9]{{2}}){}$", TZ)).expect("gDay pattern is valid"));

static HEX_BINARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9a-fA-F]{2})*$").expect("hexBinary pattern is valid"));

/// A value of an ordered built-in type
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum OrderedValue {
    Decimal(Decimal),
    Float(f64),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl PartialOrd for OrderedValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        use OrderedValue::*;
        match (self, other) {
            (Decimal(a), Decimal(b)) => a.partial_cmp(b),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (DateTime(a), DateTime(b)) => a.partial_cmp(b),
            (Date(a), Date(b)) => a.partial_cmp(b),
            (Time(a), Time(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl Builtin {
    /// whiteSpace facet value of the type
    pub fn white_space(self) -> WhiteSpace {
        match self {
            Builtin::AnySimpleType | Builtin::String => WhiteSpace::Preserve,
            Builtin::NormalizedString => WhiteSpace::Replace,
            _ => WhiteSpace::Collapse,
        }
    }

    /// Types whose values are whitespace separated lists
    pub fn is_list(self) -> bool {
        matches!(self, Builtin::IdRefs | Builtin::Entities | Builtin::NmTokens)
    }

    /// Length of a value in the units of the length facets
    pub fn length_of(self, value: &str) -> usize {
        match self {
            Builtin::HexBinary => value.len() / 2,
            Builtin::Base64Binary => decode_base64(value).map(|bytes| bytes.len()).unwrap_or(0),
            builtin if builtin.is_list() => value.split_whitespace().count(),
            _ => value.chars().count(),
        }
    }

    fn integer_bounds(self) -> Option<(Option<i128>, Option<i128>)> {
        Some(match self {
            Builtin::Integer => (None, None),
            Builtin::NonPositiveInteger => (None, Some(0)),
            Builtin::NegativeInteger => (None, Some(-1)),
            Builtin::Long => (Some(i64::MIN.into()), Some(i64::MAX.into())),
            Builtin::Int => (Some(i32::MIN.into()), Some(i32::MAX.into())),
            Builtin::Short => (Some(i16::MIN.into()), Some(i16::MAX.into())),
            Builtin::Byte => (Some(i8::MIN.into()), Some(i8::MAX.into())),
            Builtin::NonNegativeInteger => (Some(0), None),
            Builtin::UnsignedLong => (Some(0), Some(u64::MAX.into())),
            Builtin::UnsignedInt => (Some(0), Some(u32::MAX.into())),
            Builtin::UnsignedShort => (Some(0), Some(u16::MAX.into())),
            Builtin::UnsignedByte => (Some(0), Some(u8::MAX.into())),
            Builtin::PositiveInteger => (Some(1), None),
            _ => return None,
        })
    }

    /// Check a whitespace-normalized value; the error is the reason
    pub fn validate(self, value: &str) -> Result<(), String> {
        let valid = match self {
            Builtin::AnySimpleType | Builtin::String => true,
            Builtin::NormalizedString => !value.contains(['\t', '\n', '\r']),
            Builtin::Token => !value.contains(['\t', '\n', '\r']) && !value.contains("  ") && value.trim() == value,
            Builtin::Language => is_valid_language(value),
            Builtin::Name => is_valid_name(value),
            Builtin::NCName | Builtin::Id | Builtin::IdRef | Builtin::Entity => is_valid_ncname(value),
            Builtin::IdRefs | Builtin::Entities => {
                !value.is_empty() && value.split_whitespace().all(is_valid_ncname)
            }
            Builtin::NmToken => is_valid_nmtoken(value),
            Builtin::NmTokens => !value.is_empty() && value.split_whitespace().all(is_valid_nmtoken),
            Builtin::QName | Builtin::Notation => is_valid_qname(value),
            Builtin::AnyUri => is_valid_uri(value),
            Builtin::Boolean => matches!(value, "true" | "false" | "1" | "0"),
            Builtin::Decimal => DECIMAL.is_match(value),
            Builtin::Float | Builtin::Double => FLOAT.is_match(value),
            Builtin::Duration => is_valid_duration(value),
            Builtin::DateTime => return parse_date_time(value).map(|_| ()),
            Builtin::Date => return parse_date(value).map(|_| ()),
            Builtin::Time => return parse_time(value).map(|_| ()),
            Builtin::GYear => G_YEAR
                .captures(value)
                .map_or(false, |caps| year(&caps[1]).is_ok() && timezone(&caps).is_ok()),
            Builtin::GYearMonth => G_YEAR_MONTH.captures(value).map_or(false, |caps| {
                year(&caps[1]).is_ok() && (1..=12).contains(&number(&caps[2])) && timezone(&caps).is_ok()
            }),
            Builtin::GMonth => G_MONTH
                .captures(value)
                .map_or(false, |caps| (1..=12).contains(&number(&caps[1])) && timezone(&caps).is_ok()),
            Builtin::GMonthDay => G_MONTH_DAY.captures(value).map_or(false, |caps| {
                NaiveDate::from_ymd_opt(2000, number(&caps[1]), number(&caps[2])).is_some()
                    && timezone(&caps).is_ok()
            }),
            Builtin::GDay => G_DAY
                .captures(value)
                .map_or(false, |caps| (1..=31).contains(&number(&caps[1])) && timezone(&caps).is_ok()),
            Builtin::HexBinary => HEX_BINARY.is_match(value),
            Builtin::Base64Binary => decode_base64(value).is_some(),
            _ => match self.integer_bounds() {
                Some((min, max)) => return validate_integer(value, min, max),
                None => false,
            },
        };
        if valid {
            Ok(())
        } else {
            Err(format!("'{}' is not a valid value for xs:{}", value, self.name()))
        }
    }

    /// Value in the ordered value space, for types that have one
    pub(crate) fn ordered(self, value: &str) -> Option<OrderedValue> {
        match self {
            Builtin::Float | Builtin::Double => value.parse::<f64>().ok().map(OrderedValue::Float),
            Builtin::Decimal => parse_decimal(value).map(OrderedValue::Decimal),
            _ if self.integer_bounds().is_some() => parse_decimal(value).map(OrderedValue::Decimal),
            Builtin::DateTime => parse_date_time(value).ok().map(OrderedValue::DateTime),
            Builtin::Date => parse_date(value).ok().map(OrderedValue::Date),
            Builtin::Time => parse_time(value).ok().map(OrderedValue::Time),
            _ => None,
        }
    }
}

/// Parse an `xs:decimal` lexical value; `1.`, `.5` and a leading `+` are accepted
pub(crate) fn parse_decimal(value: &str) -> Option<Decimal> {
    if !DECIMAL.is_match(value) {
        return None;
    }
    let unsigned = value.strip_prefix('+').unwrap_or(value);
    let (sign, digits) = match unsigned.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", unsigned),
    };
    let digits = digits.strip_suffix('.').unwrap_or(digits);
    let normalized = if digits.starts_with('.') {
        format!("{}0{}", sign, digits)
    } else {
        format!("{}{}", sign, digits)
    };
    Decimal::from_str(&normalized).ok()
}

fn validate_integer(value: &str, min: Option<i128>, max: Option<i128>) -> Result<(), String> {
    if !INTEGER.is_match(value) {
        return Err(format!("'{}' is not a valid integer", value));
    }
    let in_range = match value.parse::<i128>() {
        Ok(n) => min.map_or(true, |min| n >= min) && max.map_or(true, |max| n <= max),
        // Beyond i128: only unbounded sides accept it
        Err(_) if value.starts_with('-') => min.is_none(),
        Err(_) => max.is_none(),
    };
    if in_range {
        Ok(())
    } else {
        Err(format!(
            "value {} is out of range [{}, {}]",
            value,
            min.map_or("-inf".to_string(), |n| n.to_string()),
            max.map_or("inf".to_string(), |n| n.to_string())
        ))
    }
}

fn is_valid_uri(value: &str) -> bool {
    static BASE: Lazy<Url> = Lazy::new(|| Url::parse("http://base.invalid/").expect("base url is valid"));
    if value.is_empty() {
        return true;
    }
    Url::parse(value).is_ok() || BASE.join(value).is_ok()
}

fn is_valid_duration(value: &str) -> bool {
    if !DURATION.is_match(value) {
        return false;
    }
    let body = value.trim_start_matches('-').trim_start_matches('P');
    !body.is_empty() && !body.ends_with('T')
}

fn decode_base64(value: &str) -> Option<Vec<u8>> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD.decode(compact).ok()
}

fn number(digits: &str) -> u32 {
    digits.parse().unwrap_or(0)
}

fn year(digits: &str) -> Result<i32, String> {
    let unsigned = digits.trim_start_matches('-');
    if unsigned.len() > 4 && unsigned.starts_with('0') {
        return Err(format!("year '{}' has leading zeros", digits));
    }
    match digits.parse::<i32>() {
        Ok(0) => Err("year 0000 is not allowed".to_string()),
        Ok(year) => Ok(year),
        Err(_) => Err(format!("year '{}' is out of range", digits)),
    }
}

/// Timezone offset in minutes; the timezone is the last capture group
fn timezone(caps: &Captures<'_>) -> Result<i64, String> {
    let Some(tz) = caps.get(caps.len() - 1) else {
        return Ok(0);
    };
    let tz = tz.as_str();
    if tz == "Z" {
        return Ok(0);
    }
    let sign = if tz.starts_with('-') { -1 } else { 1 };
    let hours: i64 = tz[1..3].parse().unwrap_or(99);
    let minutes: i64 = tz[4..6].parse().unwrap_or(99);
    if minutes > 59 || hours > 14 || (hours == 14 && minutes > 0) {
        return Err(format!("timezone '{}' is out of range", tz));
    }
    Ok(sign * (hours * 60 + minutes))
}

fn clock(hour: &str, minute: &str, second: &str, fraction: Option<&str>) -> Result<(NaiveTime, bool), String> {
    let (hour, minute, second) = (number(hour), number(minute), number(second));
    let nanos = fraction
        .map(|f| {
            let digits: String = f[1..].chars().chain(std::iter::repeat('0')).take(9).collect();
            digits.parse::<u32>().unwrap_or(0)
        })
        .unwrap_or(0);
    if hour == 24 && minute == 0 && second == 0 && nanos == 0 {
        return Ok((NaiveTime::default(), true));
    }
    NaiveTime::from_hms_nano_opt(hour, minute, second, nanos)
        .map(|time| (time, false))
        .ok_or_else(|| format!("{:02}:{:02}:{:02} is not a valid time", hour, minute, second))
}

fn parse_date_time(value: &str) -> Result<NaiveDateTime, String> {
    let caps = DATE_TIME
        .captures(value)
        .ok_or_else(|| format!("'{}' is not a valid value for xs:dateTime", value))?;
    let date = NaiveDate::from_ymd_opt(year(&caps[1])?, number(&caps[2]), number(&caps[3]))
        .ok_or_else(|| format!("'{}' is not a valid date", value))?;
    let (time, end_of_day) = clock(&caps[4], &caps[5], &caps[6], caps.get(7).map(|m| m.as_str()))?;
    let offset = timezone(&caps)?;
    let mut date_time = date.and_time(time);
    if end_of_day {
        date_time += Duration::days(1);
    }
    Ok(date_time - Duration::minutes(offset))
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    let caps = DATE
        .captures(value)
        .ok_or_else(|| format!("'{}' is not a valid value for xs:date", value))?;
    timezone(&caps)?;
    NaiveDate::from_ymd_opt(year(&caps[1])?, number(&caps[2]), number(&caps[3]))
        .ok_or_else(|| format!("'{}' is not a valid date", value))
}

fn parse_time(value: &str) -> Result<NaiveTime, String> {
    let caps = TIME
        .captures(value)
        .ok_or_else(|| format!("'{}' is not a valid value for xs:time", value))?;
    let (time, _) = clock(&caps[1], &caps[2], &caps[3], caps.get(4).map(|m| m.as_str()))?;
    let offset = timezone(&caps)?;
    Ok(time - Duration::minutes(offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name() {
        assert_eq!(Builtin::from_name("int"), Some(Builtin::Int));
        assert_eq!(Builtin::from_name("NCName"), Some(Builtin::NCName));
        assert_eq!(Builtin::from_name("integer").map(Builtin::name), Some("integer"));
        assert_eq!(Builtin::from_name("varchar"), None);
    }

    #[test]
    fn test_integer_ranges() {
        assert!(Builtin::Byte.validate("127").is_ok());
        assert!(Builtin::Byte.validate("128").is_err());
        assert!(Builtin::UnsignedByte.validate("-1").is_err());
        assert!(Builtin::PositiveInteger.validate("0").is_err());
        assert!(Builtin::NonNegativeInteger.validate("+0").is_ok());
        assert!(Builtin::Integer.validate("123456789012345678901234567890123456789012").is_ok());
        assert!(Builtin::Long.validate("123456789012345678901234567890123456789012").is_err());
        assert!(Builtin::Int.validate("1.0").is_err());
    }

    #[test]
    fn test_decimal_and_float() {
        assert!(Builtin::Decimal.validate("-1.23").is_ok());
        assert!(Builtin::Decimal.validate(".5").is_ok());
        assert!(Builtin::Decimal.validate("1e3").is_err());
        assert!(Builtin::Double.validate("1e3").is_ok());
        assert!(Builtin::Float.validate("INF").is_ok());
        assert!(Builtin::Float.validate("abc").is_err());
        assert_eq!(parse_decimal("1."), Decimal::from_str("1").ok());
        assert_eq!(parse_decimal("-.5"), Decimal::from_str("-0.5").ok());
    }

    #[test]
    fn test_boolean() {
        for value in ["true", "false", "1", "0"] {
            assert!(Builtin::Boolean.validate(value).is_ok());
        }
        assert!(Builtin::Boolean.validate("yes").is_err());
    }

    #[test]
    fn test_dates() {
        assert!(Builtin::Date.validate("2024-02-29").is_ok());
        assert!(Builtin::Date.validate("2023-02-29").is_err());
        assert!(Builtin::DateTime.validate("2024-01-01T12:30:00Z").is_ok());
        assert!(Builtin::DateTime.validate("2024-01-01T24:00:00").is_ok());
        assert!(Builtin::DateTime.validate("2024-01-01T25:00:00").is_err());
        assert!(Builtin::DateTime.validate("2024-01-01T10:00:00+15:00").is_err());
        assert!(Builtin::Time.validate("13:20:00.5").is_ok());
        assert!(Builtin::GYearMonth.validate("2024-13").is_err());
        assert!(Builtin::GMonthDay.validate("--02-29").is_ok());
        assert!(Builtin::GDay.validate("---31").is_ok());
        assert!(Builtin::GYear.validate("0000").is_err());
    }

    #[test]
    fn test_date_time_ordering_uses_timezone() {
        let a = Builtin::DateTime.ordered("2024-01-01T12:00:00+02:00").unwrap();
        let b = Builtin::DateTime.ordered("2024-01-01T11:00:00Z").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_duration() {
        assert!(Builtin::Duration.validate("P1Y2M3DT4H5M6.7S").is_ok());
        assert!(Builtin::Duration.validate("-PT5M").is_ok());
        assert!(Builtin::Duration.validate("P").is_err());
        assert!(Builtin::Duration.validate("P1DT").is_err());
    }

    #[test]
    fn test_binary() {
        assert!(Builtin::HexBinary.validate("0FB7").is_ok());
        assert!(Builtin::HexBinary.validate("0FB").is_err());
        assert_eq!(Builtin::HexBinary.length_of("0FB7"), 2);
        assert!(Builtin::Base64Binary.validate("aGVsbG8=").is_ok());
        assert_eq!(Builtin::Base64Binary.length_of("aGVsbG8="), 5);
        assert!(Builtin::Base64Binary.validate("not base64!").is_err());
    }

    #[test]
    fn test_names_and_lists() {
        assert!(Builtin::NCName.validate("a:b").is_err());
        assert!(Builtin::QName.validate("a:b").is_ok());
        assert!(Builtin::NmTokens.validate("a b c").is_ok());
        assert_eq!(Builtin::NmTokens.length_of("a b c"), 3);
        assert!(Builtin::Language.validate("en-US").is_ok());
        assert!(Builtin::AnyUri.validate("../relative/path.xml").is_ok());
        assert!(Builtin::AnyUri.validate("http://example.com/x").is_ok());
    }
}
