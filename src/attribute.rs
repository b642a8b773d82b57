//! Typed attribute values and the accessor used by the classifiers.
//!
//! Attributes are optional by convention, so lookups return `Option` and never
//! fail. Numeric values are rendered as text with a fixed rule (six decimals
//! for floating point, plain integers otherwise) that does not depend on the
//! process locale.

use serde::Serialize;

use crate::store::ElementType;

/// A typed attribute value as stored in the file
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Text attribute
    Text(String),
    /// Signed byte values
    Bytes(Vec<i8>),
    /// Short integer values
    Shorts(Vec<i16>),
    /// Integer values
    Ints(Vec<i32>),
    /// Single precision values
    Floats(Vec<f32>),
    /// Double precision values
    Doubles(Vec<f64>),
    /// A storage type with no canonical form; kept as a debug rendering
    Unsupported(String),
}

/// A named attribute
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub name: String,
    pub value: AttributeValue,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: AttributeValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<f32> for AttributeValue {
    fn from(value: f32) -> Self {
        AttributeValue::Floats(vec![value])
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Doubles(vec![value])
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Ints(vec![value])
    }
}

impl From<i16> for AttributeValue {
    fn from(value: i16) -> Self {
        AttributeValue::Shorts(vec![value])
    }
}

impl From<i8> for AttributeValue {
    fn from(value: i8) -> Self {
        AttributeValue::Bytes(vec![value])
    }
}

impl AttributeValue {
    /// Canonical text of the first stored value.
    pub fn as_text(&self) -> Option<String> {
        match self {
            AttributeValue::Text(s) => Some(s.clone()),
            AttributeValue::Bytes(v) => v.first().map(|x| x.to_string()),
            AttributeValue::Shorts(v) => v.first().map(|x| x.to_string()),
            AttributeValue::Ints(v) => v.first().map(|x| x.to_string()),
            AttributeValue::Floats(v) => v.first().map(|&x| format_fixed(x as f64)),
            AttributeValue::Doubles(v) => v.first().map(|&x| format_fixed(x)),
            AttributeValue::Unsupported(_) => None,
        }
    }

    /// First stored value as a number. Text is parsed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Text(s) => s.trim().parse().ok(),
            AttributeValue::Bytes(v) => v.first().map(|&x| x as f64),
            AttributeValue::Shorts(v) => v.first().map(|&x| x as f64),
            AttributeValue::Ints(v) => v.first().map(|&x| x as f64),
            AttributeValue::Floats(v) => v.first().map(|&x| x as f64),
            AttributeValue::Doubles(v) => v.first().copied(),
            AttributeValue::Unsupported(_) => None,
        }
    }

    /// Element type of the stored values.
    pub fn element(&self) -> ElementType {
        match self {
            AttributeValue::Text(_) => ElementType::Char,
            AttributeValue::Bytes(_) => ElementType::Byte,
            AttributeValue::Shorts(_) => ElementType::Short,
            AttributeValue::Ints(_) => ElementType::Int,
            AttributeValue::Floats(_) => ElementType::Float,
            AttributeValue::Doubles(_) => ElementType::Double,
            AttributeValue::Unsupported(_) => ElementType::Unsupported,
        }
    }

    fn numbers(&self) -> Vec<f64> {
        match self {
            AttributeValue::Text(s) => s.trim().parse::<f64>().into_iter().collect(),
            AttributeValue::Bytes(v) => v.iter().map(|&x| x as f64).collect(),
            AttributeValue::Shorts(v) => v.iter().map(|&x| x as f64).collect(),
            AttributeValue::Ints(v) => v.iter().map(|&x| x as f64).collect(),
            AttributeValue::Floats(v) => v.iter().map(|&x| x as f64).collect(),
            AttributeValue::Doubles(v) => v.clone(),
            AttributeValue::Unsupported(_) => Vec::new(),
        }
    }

    /// The same numbers stored as `element`.
    ///
    /// Used for `_FillValue`/`missing_value`, whose type must equal the type
    /// of the variable carrying them. Returns `None` when there is nothing
    /// numeric to convert or `element` has no attribute representation.
    pub fn retyped(&self, element: ElementType) -> Option<AttributeValue> {
        if self.element() == element {
            return Some(self.clone());
        }
        let numbers = self.numbers();
        if numbers.is_empty() {
            return None;
        }
        let value = match element {
            ElementType::Byte => AttributeValue::Bytes(numbers.iter().map(|&x| x as i8).collect()),
            ElementType::Short => {
                AttributeValue::Shorts(numbers.iter().map(|&x| x as i16).collect())
            }
            ElementType::Int => AttributeValue::Ints(numbers.iter().map(|&x| x as i32).collect()),
            ElementType::Float => {
                AttributeValue::Floats(numbers.iter().map(|&x| x as f32).collect())
            }
            ElementType::Double => AttributeValue::Doubles(numbers),
            ElementType::Char | ElementType::Unsupported => return None,
        };
        Some(value)
    }
}

/// Fixed six-decimal rendering of a floating point value.
pub fn format_fixed(value: f64) -> String {
    format!("{:.6}", value)
}

/// First attribute named `name`.
pub fn find<'a>(attributes: &'a [Attribute], name: &str) -> Option<&'a AttributeValue> {
    attributes
        .iter()
        .find(|attr| attr.name == name)
        .map(|attr| &attr.value)
}

/// Canonical text of the attribute named `name`, if present.
pub fn get_attribute(attributes: &[Attribute], name: &str) -> Option<String> {
    find(attributes, name).and_then(AttributeValue::as_text)
}

/// True when the attribute `name` exists and its canonical text equals `expected`.
pub fn attribute_equals(attributes: &[Attribute], name: &str, expected: &str) -> bool {
    get_attribute(attributes, name).as_deref() == Some(expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs() -> Vec<Attribute> {
        vec![
            Attribute::new("units", "degrees_east".into()),
            Attribute::new("missing_value", AttributeValue::Floats(vec![-999.0, 1.0])),
            Attribute::new("scale", AttributeValue::Doubles(vec![0.25])),
            Attribute::new("flag", AttributeValue::Bytes(vec![-3])),
            Attribute::new("count", AttributeValue::Shorts(vec![12])),
            Attribute::new("axis", "X".into()),
        ]
    }

    #[test]
    fn test_text_and_numbers_are_canonicalised() {
        let attrs = attrs();
        assert_eq!(get_attribute(&attrs, "units").as_deref(), Some("degrees_east"));
        assert_eq!(
            get_attribute(&attrs, "missing_value").as_deref(),
            Some("-999.000000")
        );
        assert_eq!(get_attribute(&attrs, "scale").as_deref(), Some("0.250000"));
        assert_eq!(get_attribute(&attrs, "flag").as_deref(), Some("-3"));
        assert_eq!(get_attribute(&attrs, "count").as_deref(), Some("12"));
    }

    #[test]
    fn test_missing_attribute_is_none() {
        assert_eq!(get_attribute(&attrs(), "standard_name"), None);
        assert!(!attribute_equals(&attrs(), "standard_name", "longitude"));
        assert!(attribute_equals(&attrs(), "axis", "X"));
    }

    #[test]
    fn test_unsupported_has_no_text() {
        let value = AttributeValue::Unsupported("Ulonglong(7)".to_string());
        assert_eq!(value.as_text(), None);
        assert_eq!(value.as_f64(), None);
    }

    #[test]
    fn test_retyped_fill_value() {
        let fill = AttributeValue::Doubles(vec![-999.0]);
        assert_eq!(
            fill.retyped(ElementType::Float),
            Some(AttributeValue::Floats(vec![-999.0]))
        );
        assert_eq!(
            fill.retyped(ElementType::Short),
            Some(AttributeValue::Shorts(vec![-999]))
        );
        assert_eq!(AttributeValue::from("n/a").retyped(ElementType::Float), None);
    }
}
