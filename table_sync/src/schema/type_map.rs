//! Mapping between abstract column types and MySQL native column types
//!
//! Comparison happens on a canonical form of the native string: both sides are
//! run through the same normalization table and compared for equality, which
//! keeps [`native_matches`] symmetric.

use std::collections::HashMap;

use crate::config::TypeMappingConfig;
use crate::schema::types::{AbstractType, ColumnDescriptor, TypeParams};

pub const DEFAULT_STRING_LENGTH: u32 = 255;
pub const DEFAULT_DECIMAL_PRECISION: u32 = 8;
pub const DEFAULT_DECIMAL_SCALE: u32 = 2;

/// Render an abstract type as a MySQL column type
pub fn to_native_type(column_type: &AbstractType, params: &TypeParams, unsigned: bool) -> String {
    let base = match column_type {
        AbstractType::TinyInteger => "tinyint".to_string(),
        AbstractType::SmallInteger => "smallint".to_string(),
        AbstractType::MediumInteger => "mediumint".to_string(),
        AbstractType::Integer => "int".to_string(),
        AbstractType::BigInteger => "bigint".to_string(),
        AbstractType::Decimal => {
            let (precision, scale) = match params {
                TypeParams::Precision { precision, scale } => (*precision, *scale),
                TypeParams::Length(precision) => (*precision, 0),
                _ => (DEFAULT_DECIMAL_PRECISION, DEFAULT_DECIMAL_SCALE),
            };
            format!("decimal({},{})", precision, scale)
        }
        AbstractType::Float => with_precision("float", params),
        AbstractType::Double => with_precision("double", params),
        AbstractType::String => format!("varchar({})", length_or(params, DEFAULT_STRING_LENGTH)),
        AbstractType::Char => format!("char({})", length_or(params, DEFAULT_STRING_LENGTH)),
        AbstractType::TinyText => "tinytext".to_string(),
        AbstractType::Text => "text".to_string(),
        AbstractType::MediumText => "mediumtext".to_string(),
        AbstractType::LongText => "longtext".to_string(),
        AbstractType::Date => "date".to_string(),
        AbstractType::DateTime => with_fraction("datetime", params),
        AbstractType::Time => with_fraction("time", params),
        AbstractType::Timestamp => with_fraction("timestamp", params),
        AbstractType::Year => "year".to_string(),
        AbstractType::Boolean => "tinyint(1)".to_string(),
        AbstractType::Json => "json".to_string(),
        AbstractType::Binary => "blob".to_string(),
        AbstractType::Enum => format!("enum({})", quoted_values(params)),
        AbstractType::Set => format!("set({})", quoted_values(params)),
        AbstractType::Uuid => "char(36)".to_string(),
        AbstractType::IpAddress => "varchar(45)".to_string(),
        AbstractType::MacAddress => "varchar(17)".to_string(),
        AbstractType::Other(name) => match params {
            TypeParams::Length(length) => format!("{}({})", name, length),
            TypeParams::Precision { precision, scale } => format!("{}({},{})", name, precision, scale),
            TypeParams::Values(_) => format!("{}({})", name, quoted_values(params)),
            TypeParams::None => name.clone(),
        },
    };

    if unsigned && column_type.is_numeric() && *column_type != AbstractType::Boolean {
        format!("{} unsigned", base)
    } else {
        base
    }
}

fn length_or(params: &TypeParams, fallback: u32) -> u32 {
    match params {
        TypeParams::Length(length) => *length,
        _ => fallback,
    }
}

fn with_precision(base: &str, params: &TypeParams) -> String {
    match params {
        TypeParams::Precision { precision, scale } => format!("{}({},{})", base, precision, scale),
        _ => base.to_string(),
    }
}

fn with_fraction(base: &str, params: &TypeParams) -> String {
    match params {
        TypeParams::Length(fraction) if *fraction > 0 => format!("{}({})", base, fraction),
        _ => base.to_string(),
    }
}

fn quoted_values(params: &TypeParams) -> String {
    match params {
        TypeParams::Values(values) => values
            .iter()
            .map(|v| format!("'{}'", v.replace('\'', "''")))
            .collect::<Vec<_>>()
            .join(","),
        _ => String::new(),
    }
}

/// Keyword used for an abstract type in definition text
pub fn definition_keyword(column_type: &AbstractType) -> &str {
    match column_type {
        AbstractType::TinyInteger => "tinyInteger",
        AbstractType::SmallInteger => "smallInteger",
        AbstractType::MediumInteger => "mediumInteger",
        AbstractType::Integer => "integer",
        AbstractType::BigInteger => "bigInteger",
        AbstractType::Decimal => "decimal",
        AbstractType::Float => "float",
        AbstractType::Double => "double",
        AbstractType::String => "string",
        AbstractType::Char => "char",
        AbstractType::TinyText => "tinyText",
        AbstractType::Text => "text",
        AbstractType::MediumText => "mediumText",
        AbstractType::LongText => "longText",
        AbstractType::Date => "date",
        AbstractType::DateTime => "dateTime",
        AbstractType::Time => "time",
        AbstractType::Timestamp => "timestamp",
        AbstractType::Year => "year",
        AbstractType::Boolean => "boolean",
        AbstractType::Json => "json",
        AbstractType::Binary => "binary",
        AbstractType::Enum => "enum",
        AbstractType::Set => "set",
        AbstractType::Uuid => "uuid",
        AbstractType::IpAddress => "ipAddress",
        AbstractType::MacAddress => "macAddress",
        AbstractType::Other(name) => name,
    }
}

/// Canonical form of a native type string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalType {
    pub base: String,
    pub params: Vec<String>,
    pub unsigned: bool,
}

const INTEGER_BASES: &[&str] = &["tinyint", "smallint", "mediumint", "int", "bigint"];

/// Split a native type into base, raw parameters and trailing flags
fn split_native(native: &str) -> (String, Vec<String>, Vec<String>) {
    let lowered = native.trim().to_lowercase();

    let (head, params, tail) = match (lowered.find('('), lowered.rfind(')')) {
        (Some(open), Some(close)) if close > open => (
            lowered[..open].to_string(),
            split_params(&native.trim()[open + 1..close]),
            lowered[close + 1..].to_string(),
        ),
        _ => (lowered.clone(), Vec::new(), String::new()),
    };

    let mut words: Vec<String> = head.split_whitespace().map(str::to_string).collect();
    let mut flags: Vec<String> = tail.split_whitespace().map(str::to_string).collect();
    while let Some(last) = words.last() {
        if matches!(last.as_str(), "unsigned" | "signed" | "zerofill") && words.len() > 1 {
            flags.push(words.pop().unwrap_or_default());
        } else {
            break;
        }
    }

    (words.join(" "), params, flags)
}

/// Split a parameter list on commas outside quotes
fn split_params(raw: &str) -> Vec<String> {
    let mut params = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) if c == q => {
                if chars.peek() == Some(&q) {
                    current.push(q);
                    chars.next();
                } else {
                    quote = None;
                }
            }
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == ',' => params.push(std::mem::take(&mut current).trim().to_string()),
            None => current.push(c),
        }
    }
    if !current.trim().is_empty() || !params.is_empty() {
        params.push(current.trim().to_string());
    }
    params
}

fn normalize_param(param: &str) -> String {
    let trimmed = param.trim();
    match trimmed.parse::<i64>() {
        Ok(number) => number.to_string(),
        Err(_) => trimmed.to_string(),
    }
}

/// Normalize a native type string through the equivalence table
pub fn canonicalize(native: &str) -> CanonicalType {
    let (base, raw_params, flags) = split_native(native);
    let mut params: Vec<String> = raw_params.iter().map(|p| normalize_param(p)).collect();
    let unsigned = flags.iter().any(|f| f == "unsigned");

    let base = match base.as_str() {
        "integer" => "int".to_string(),
        "bool" | "boolean" => "boolean".to_string(),
        "character varying" => "varchar".to_string(),
        "character" => "char".to_string(),
        "numeric" | "dec" | "fixed" => "decimal".to_string(),
        "double precision" | "real" => "double".to_string(),
        "timestamp" => "datetime".to_string(),
        other => other.to_string(),
    };

    if base == "tinyint" && params == ["1"] || base == "boolean" {
        return CanonicalType {
            base: "boolean".to_string(),
            params: Vec::new(),
            unsigned: false,
        };
    }

    if INTEGER_BASES.contains(&base.as_str()) {
        return CanonicalType {
            base,
            params: Vec::new(),
            unsigned,
        };
    }

    match base.as_str() {
        "decimal" => {
            match params.len() {
                0 => params = vec!["10".to_string(), "0".to_string()],
                1 => params.push("0".to_string()),
                _ => {}
            }
            CanonicalType { base, params, unsigned }
        }
        "float" | "double" => CanonicalType { base, params, unsigned },
        "char" if params.is_empty() => CanonicalType {
            base,
            params: vec!["1".to_string()],
            unsigned: false,
        },
        _ => CanonicalType {
            base,
            params,
            unsigned: false,
        },
    }
}

/// Whether two native type strings describe the same column type
pub fn native_matches(desired: &str, actual: &str) -> bool {
    canonicalize(desired) == canonicalize(actual)
}

/// Reverse mapping from a native type to the abstract model
pub fn from_native(native: &str) -> (AbstractType, TypeParams, bool) {
    let (base, raw_params, flags) = split_native(native);
    let unsigned = flags.iter().any(|f| f == "unsigned");
    let numbers: Vec<u32> = raw_params
        .iter()
        .filter_map(|p| p.trim().parse::<u32>().ok())
        .collect();
    let length = numbers.first().copied();

    let column_type = match base.as_str() {
        "tinyint" if numbers == [1] => return (AbstractType::Boolean, TypeParams::None, false),
        "bool" | "boolean" => return (AbstractType::Boolean, TypeParams::None, false),
        "tinyint" => AbstractType::TinyInteger,
        "smallint" => AbstractType::SmallInteger,
        "mediumint" => AbstractType::MediumInteger,
        "int" | "integer" => AbstractType::Integer,
        "bigint" => AbstractType::BigInteger,
        "decimal" | "numeric" => {
            let precision = numbers.first().copied().unwrap_or(10);
            let scale = numbers.get(1).copied().unwrap_or(0);
            return (AbstractType::Decimal, TypeParams::Precision { precision, scale }, unsigned);
        }
        "float" => AbstractType::Float,
        "double" | "double precision" | "real" => AbstractType::Double,
        "varchar" => {
            return (
                AbstractType::String,
                TypeParams::Length(length.unwrap_or(DEFAULT_STRING_LENGTH)),
                false,
            )
        }
        "char" => return (AbstractType::Char, TypeParams::Length(length.unwrap_or(1)), false),
        "tinytext" => AbstractType::TinyText,
        "text" => AbstractType::Text,
        "mediumtext" => AbstractType::MediumText,
        "longtext" => AbstractType::LongText,
        "date" => AbstractType::Date,
        "datetime" | "time" | "timestamp" => {
            let column_type = match base.as_str() {
                "datetime" => AbstractType::DateTime,
                "time" => AbstractType::Time,
                _ => AbstractType::Timestamp,
            };
            let params = length.map(TypeParams::Length).unwrap_or_default();
            return (column_type, params, false);
        }
        "year" => AbstractType::Year,
        "json" => AbstractType::Json,
        "blob" | "tinyblob" | "mediumblob" | "longblob" | "binary" | "varbinary" => AbstractType::Binary,
        "enum" | "set" => {
            let values = raw_params.iter().map(|p| p.trim().to_string()).collect();
            let column_type = if base == "enum" { AbstractType::Enum } else { AbstractType::Set };
            return (column_type, TypeParams::Values(values), false);
        }
        other => AbstractType::Other(other.to_string()),
    };

    let params = match (&column_type, numbers.as_slice()) {
        (t, _) if t.is_integer() => TypeParams::None,
        (_, [precision, scale]) => TypeParams::Precision {
            precision: *precision,
            scale: *scale,
        },
        (_, [length]) => TypeParams::Length(*length),
        _ => TypeParams::None,
    };
    (column_type, params, unsigned)
}

/// Native type rendering with configured keyword overrides
#[derive(Debug, Clone, Default)]
pub struct TypeMapper {
    overrides: HashMap<String, String>,
}

impl TypeMapper {
    pub fn new(config: &TypeMappingConfig) -> Self {
        Self {
            overrides: config.overrides.clone(),
        }
    }

    /// Native type for a column: catalog string, override, or default rendering
    pub fn native_for(&self, column: &ColumnDescriptor) -> String {
        if let Some(native) = &column.native {
            return native.clone();
        }
        match self.overrides.get(definition_keyword(&column.column_type)) {
            Some(native) => native.clone(),
            None => column.native_type(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AbstractType::String, TypeParams::Length(100), false, "varchar(100)")]
    #[case(AbstractType::String, TypeParams::None, false, "varchar(255)")]
    #[case(AbstractType::Integer, TypeParams::None, true, "int unsigned")]
    #[case(AbstractType::BigInteger, TypeParams::None, true, "bigint unsigned")]
    #[case(AbstractType::Boolean, TypeParams::None, true, "tinyint(1)")]
    #[case(AbstractType::Decimal, TypeParams::Precision { precision: 8, scale: 2 }, false, "decimal(8,2)")]
    #[case(AbstractType::Decimal, TypeParams::None, false, "decimal(8,2)")]
    #[case(AbstractType::Uuid, TypeParams::None, false, "char(36)")]
    #[case(AbstractType::Json, TypeParams::None, false, "json")]
    #[case(AbstractType::Other("geometry".to_string()), TypeParams::None, false, "geometry")]
    fn test_to_native_type(
        #[case] column_type: AbstractType,
        #[case] params: TypeParams,
        #[case] unsigned: bool,
        #[case] expected: &str,
    ) {
        assert_eq!(to_native_type(&column_type, &params, unsigned), expected);
    }

    #[test]
    fn test_enum_rendering_escapes_quotes() {
        let params = TypeParams::Values(vec!["draft".to_string(), "it's".to_string()]);
        assert_eq!(to_native_type(&AbstractType::Enum, &params, false), "enum('draft','it''s')");
    }

    #[rstest]
    #[case("int", "int(11)", true)]
    #[case("integer", "int", true)]
    #[case("bigint unsigned", "bigint(20) unsigned", true)]
    #[case("bigint unsigned", "bigint", false)]
    #[case("tinyint(1)", "boolean", true)]
    #[case("tinyint(1)", "tinyint(4)", false)]
    #[case("timestamp", "datetime", true)]
    #[case("varchar(255)", "VARCHAR( 255 )", true)]
    #[case("varchar(255)", "varchar(191)", false)]
    #[case("varchar(10)", "character varying(10)", true)]
    #[case("decimal(8,2)", "decimal(10,2)", false)]
    #[case("decimal(8,2)", "numeric(8, 2)", true)]
    #[case("enum('a','b')", "enum('a', 'b')", true)]
    #[case("enum('a','b')", "enum('b','a')", false)]
    #[case("geometry", "geometry", true)]
    #[case("json", "longtext", false)]
    fn test_native_matches(#[case] a: &str, #[case] b: &str, #[case] expected: bool) {
        assert_eq!(native_matches(a, b), expected, "{} vs {}", a, b);
        assert_eq!(native_matches(b, a), expected, "{} vs {} (swapped)", b, a);
    }

    #[test]
    fn test_native_matches_is_symmetric_over_sample() {
        let samples = [
            "int", "int(11)", "int unsigned", "tinyint(1)", "tinyint", "bool", "varchar(255)",
            "char(36)", "char", "decimal", "decimal(10,0)", "decimal(8,2)", "timestamp",
            "datetime(6)", "datetime", "text", "json", "enum('x','y')", "set('x')", "year",
        ];
        for a in samples {
            for b in samples {
                assert_eq!(native_matches(a, b), native_matches(b, a), "{} / {}", a, b);
            }
        }
    }

    #[rstest]
    #[case("int(10) unsigned", AbstractType::Integer, TypeParams::None, true)]
    #[case("tinyint(1)", AbstractType::Boolean, TypeParams::None, false)]
    #[case("varchar(120)", AbstractType::String, TypeParams::Length(120), false)]
    #[case("decimal(8,2)", AbstractType::Decimal, TypeParams::Precision { precision: 8, scale: 2 }, false)]
    #[case("timestamp", AbstractType::Timestamp, TypeParams::None, false)]
    #[case("point", AbstractType::Other("point".to_string()), TypeParams::None, false)]
    fn test_from_native(
        #[case] native: &str,
        #[case] column_type: AbstractType,
        #[case] params: TypeParams,
        #[case] unsigned: bool,
    ) {
        assert_eq!(from_native(native), (column_type, params, unsigned));
    }

    #[test]
    fn test_from_native_enum_values() {
        let (column_type, params, _) = from_native("enum('draft','published')");
        assert_eq!(column_type, AbstractType::Enum);
        assert_eq!(
            params,
            TypeParams::Values(vec!["draft".to_string(), "published".to_string()])
        );
    }

    #[test]
    fn test_mapper_overrides() {
        let mut config = TypeMappingConfig::default();
        config.overrides.insert("json".to_string(), "longtext".to_string());
        let mapper = TypeMapper::new(&config);

        let column = ColumnDescriptor::new("payload", AbstractType::Json);
        assert_eq!(mapper.native_for(&column), "longtext");

        let mut introspected = column.clone();
        introspected.native = Some("json".to_string());
        assert_eq!(mapper.native_for(&introspected), "json");
    }
}
