//! The array-file capability consumed by the semantic layer.
//!
//! Nothing in this crate parses a binary array format. Instead an
//! [`ArrayStore`] opens files into [`ArrayReader`]s, which hand out an
//! immutable [`Schema`] snapshot and typed hyperslab reads, and creates
//! [`ArrayWriter`]s for slice output. Two stores ship with the crate: the
//! in-process [`memory::MemoryStore`] and, behind the `netcdf` feature,
//! [`netcdf::NetcdfStore`].

use serde::Serialize;
use std::fmt;
use std::path::Path;

use crate::attribute::{Attribute, AttributeValue};
use crate::error::{GridError, Result};

pub mod memory;
#[cfg(feature = "netcdf")]
pub mod netcdf;

/// Element types the semantic layer knows how to move around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Byte,
    Char,
    Short,
    Int,
    Float,
    Double,
    /// Any other storage type (unsigned, 64-bit, strings, user types)
    Unsupported,
}

impl ElementType {
    /// NetCDF default fill value for this type, widened to f64.
    pub fn default_fill(self) -> f64 {
        match self {
            ElementType::Byte => -127.0,
            ElementType::Char => 0.0,
            ElementType::Short => -32767.0,
            ElementType::Int => -2147483647.0,
            ElementType::Float => 9.969_209_968_386_869e36_f32 as f64,
            ElementType::Double => 9.969_209_968_386_869e36,
            ElementType::Unsupported => 0.0,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementType::Byte => "byte",
            ElementType::Char => "char",
            ElementType::Short => "short",
            ElementType::Int => "int",
            ElementType::Float => "float",
            ElementType::Double => "double",
            ElementType::Unsupported => "unsupported",
        };
        f.write_str(name)
    }
}

/// A dimension as declared in a file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionInfo {
    /// Name of the dimension
    pub name: String,
    /// Current length (for the unlimited dimension: number of records)
    pub len: usize,
    /// Whether this is the unlimited/record dimension
    pub unlimited: bool,
}

/// A variable as declared in a file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableInfo {
    /// Name of the variable
    pub name: String,
    /// Storage element type
    pub element: ElementType,
    /// Dimension names, in declaration order
    pub dimensions: Vec<String>,
    /// Variable attributes, in file order
    pub attributes: Vec<Attribute>,
}

impl VariableInfo {
    /// Look up one of this variable's attributes by name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        crate::attribute::find(&self.attributes, name)
    }

    /// Position of a dimension in this variable's dimension list.
    pub fn dimension_index(&self, dimension: &str) -> Option<usize> {
        self.dimensions.iter().position(|d| d == dimension)
    }
}

/// Immutable snapshot of a file's structure taken at open time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Schema {
    /// Dimensions in file order
    pub dimensions: Vec<DimensionInfo>,
    /// Variables in file order
    pub variables: Vec<VariableInfo>,
    /// File-scope attributes in file order
    pub attributes: Vec<Attribute>,
}

impl Schema {
    pub fn dimension(&self, name: &str) -> Option<&DimensionInfo> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    pub fn variable(&self, name: &str) -> Option<&VariableInfo> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Lengths of a variable's dimensions in declaration order.
    pub fn shape_of(&self, variable: &VariableInfo) -> Result<Vec<usize>> {
        variable
            .dimensions
            .iter()
            .map(|name| {
                self.dimension(name).map(|d| d.len).ok_or_else(|| {
                    GridError::structural(format!(
                        "Variable {} references non-existent dimension {}",
                        variable.name, name
                    ))
                })
            })
            .collect()
    }
}

/// A rectangular selection: per-dimension start offset and count.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Hyperslab {
    pub start: Vec<usize>,
    pub count: Vec<usize>,
}

impl Hyperslab {
    /// Select everything of a variable with the given shape.
    pub fn full(shape: &[usize]) -> Self {
        Self {
            start: vec![0; shape.len()],
            count: shape.to_vec(),
        }
    }

    /// Number of elements selected. A scalar (zero-rank) selection holds one.
    pub fn len(&self) -> usize {
        self.count.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn rank(&self) -> usize {
        self.start.len()
    }
}

/// A flat, row-major buffer in a variable's native element type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedBuffer {
    Byte(Vec<i8>),
    Char(Vec<u8>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Float(Vec<f32>),
    Double(Vec<f64>),
}

impl TypedBuffer {
    /// A buffer of `len` elements all set to `value` (cast to `element`).
    pub fn filled(element: ElementType, len: usize, value: f64) -> Result<Self> {
        let buffer = match element {
            ElementType::Byte => TypedBuffer::Byte(vec![value as i8; len]),
            ElementType::Char => TypedBuffer::Char(vec![value as u8; len]),
            ElementType::Short => TypedBuffer::Short(vec![value as i16; len]),
            ElementType::Int => TypedBuffer::Int(vec![value as i32; len]),
            ElementType::Float => TypedBuffer::Float(vec![value as f32; len]),
            ElementType::Double => TypedBuffer::Double(vec![value; len]),
            ElementType::Unsupported => {
                return Err(GridError::UnsupportedType {
                    variable: "<buffer>".to_string(),
                    element: element.to_string(),
                })
            }
        };
        Ok(buffer)
    }

    pub fn element(&self) -> ElementType {
        match self {
            TypedBuffer::Byte(_) => ElementType::Byte,
            TypedBuffer::Char(_) => ElementType::Char,
            TypedBuffer::Short(_) => ElementType::Short,
            TypedBuffer::Int(_) => ElementType::Int,
            TypedBuffer::Float(_) => ElementType::Float,
            TypedBuffer::Double(_) => ElementType::Double,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TypedBuffer::Byte(v) => v.len(),
            TypedBuffer::Char(v) => v.len(),
            TypedBuffer::Short(v) => v.len(),
            TypedBuffer::Int(v) => v.len(),
            TypedBuffer::Float(v) => v.len(),
            TypedBuffer::Double(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element `index` widened to f64.
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        match self {
            TypedBuffer::Byte(v) => v.get(index).map(|&x| x as f64),
            TypedBuffer::Char(v) => v.get(index).map(|&x| x as f64),
            TypedBuffer::Short(v) => v.get(index).map(|&x| x as f64),
            TypedBuffer::Int(v) => v.get(index).map(|&x| x as f64),
            TypedBuffer::Float(v) => v.get(index).map(|&x| x as f64),
            TypedBuffer::Double(v) => v.get(index).copied(),
        }
    }

    /// All elements widened to f64.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        (0..self.len()).filter_map(|i| self.get_f64(i)).collect()
    }

    /// Overwrite the leading elements of `self` with `other`.
    ///
    /// Both buffers must share an element type; elements of `self` beyond
    /// `other.len()` keep their previous value.
    pub fn overwrite_from(&mut self, other: &TypedBuffer) -> Result<()> {
        fn copy<T: Copy>(dst: &mut [T], src: &[T]) {
            let n = dst.len().min(src.len());
            dst[..n].copy_from_slice(&src[..n]);
        }

        match (self, other) {
            (TypedBuffer::Byte(d), TypedBuffer::Byte(s)) => copy(d, s),
            (TypedBuffer::Char(d), TypedBuffer::Char(s)) => copy(d, s),
            (TypedBuffer::Short(d), TypedBuffer::Short(s)) => copy(d, s),
            (TypedBuffer::Int(d), TypedBuffer::Int(s)) => copy(d, s),
            (TypedBuffer::Float(d), TypedBuffer::Float(s)) => copy(d, s),
            (TypedBuffer::Double(d), TypedBuffer::Double(s)) => copy(d, s),
            (dst, src) => {
                return Err(GridError::store(format!(
                    "Cannot copy {} elements into a {} buffer",
                    src.element(),
                    dst.element()
                )))
            }
        }
        Ok(())
    }

    /// Convert every element to `element`, casting numerically.
    pub fn cast(&self, element: ElementType) -> Result<TypedBuffer> {
        if self.element() == element {
            return Ok(self.clone());
        }
        let values = self.to_f64_vec();
        let buffer = match element {
            ElementType::Byte => TypedBuffer::Byte(values.iter().map(|&v| v as i8).collect()),
            ElementType::Char => TypedBuffer::Char(values.iter().map(|&v| v as u8).collect()),
            ElementType::Short => TypedBuffer::Short(values.iter().map(|&v| v as i16).collect()),
            ElementType::Int => TypedBuffer::Int(values.iter().map(|&v| v as i32).collect()),
            ElementType::Float => TypedBuffer::Float(values.iter().map(|&v| v as f32).collect()),
            ElementType::Double => TypedBuffer::Double(values),
            ElementType::Unsupported => {
                return Err(GridError::UnsupportedType {
                    variable: "<buffer>".to_string(),
                    element: element.to_string(),
                })
            }
        };
        Ok(buffer)
    }
}

/// Read access to one opened file.
pub trait ArrayReader {
    /// Snapshot of dimensions, variables and attributes.
    fn schema(&self) -> Result<Schema>;

    /// Read a hyperslab of `variable` in its native element type.
    fn read(&self, variable: &str, slab: &Hyperslab) -> Result<TypedBuffer>;
}

/// Write access to a file being created.
pub trait ArrayWriter {
    /// Declare a dimension; `None` declares the unlimited dimension.
    fn add_dimension(&mut self, name: &str, len: Option<usize>) -> Result<()>;

    /// Dimensions declared so far, in declaration order.
    fn dimensions(&self) -> Vec<DimensionInfo>;

    /// Declare a variable over already-declared dimensions.
    fn add_variable(&mut self, name: &str, element: ElementType, dimensions: &[String])
        -> Result<()>;

    /// Attach an attribute to `variable`, or to the file when `variable` is `None`.
    fn put_attribute(
        &mut self,
        variable: Option<&str>,
        name: &str,
        value: &AttributeValue,
    ) -> Result<()>;

    /// Write a hyperslab of `variable`.
    fn put(&mut self, variable: &str, slab: &Hyperslab, values: &TypedBuffer) -> Result<()>;

    /// Flush and close the file.
    fn close(self) -> Result<()>;
}

/// Opens existing files and creates new ones.
pub trait ArrayStore {
    type Reader: ArrayReader;
    type Writer: ArrayWriter;

    fn open(&self, path: &Path) -> Result<Self::Reader>;

    /// Create (or replace) a file, creating missing parent directories.
    fn create(&self, path: &Path) -> Result<Self::Writer>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hyperslab_len() {
        let slab = Hyperslab {
            start: vec![1, 0, 0],
            count: vec![1, 3, 4],
        };
        assert_eq!(slab.len(), 12);
        assert_eq!(slab.rank(), 3);
        assert_eq!(Hyperslab::full(&[]).len(), 1);
    }

    #[test]
    fn test_overwrite_keeps_tail() {
        let mut dst = TypedBuffer::filled(ElementType::Float, 4, 32700.0).unwrap();
        dst.overwrite_from(&TypedBuffer::Float(vec![1.0, 2.0])).unwrap();
        assert_eq!(dst, TypedBuffer::Float(vec![1.0, 2.0, 32700.0, 32700.0]));
    }

    #[test]
    fn test_overwrite_rejects_mixed_types() {
        let mut dst = TypedBuffer::Float(vec![0.0]);
        assert!(dst.overwrite_from(&TypedBuffer::Int(vec![1])).is_err());
    }

    #[test]
    fn test_cast_between_types() {
        let ints = TypedBuffer::Short(vec![1, -2, 300]);
        assert_eq!(
            ints.cast(ElementType::Double).unwrap(),
            TypedBuffer::Double(vec![1.0, -2.0, 300.0])
        );
        assert!(ints.cast(ElementType::Unsupported).is_err());
    }
}
