//! Array store backed by the `netcdf` crate.

use ::netcdf::types::{FloatType, IntType, NcVariableType};
use ::netcdf::Extent;
use std::path::Path;
use tracing::{debug, info};

use super::{
    ArrayReader, ArrayStore, ArrayWriter, DimensionInfo, ElementType, Hyperslab, Schema,
    TypedBuffer, VariableInfo,
};
use crate::attribute::{Attribute, AttributeValue};
use crate::error::{GridError, Result};

/// Opens and creates netCDF files on the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct NetcdfStore;

impl ArrayStore for NetcdfStore {
    type Reader = NetcdfReader;
    type Writer = NetcdfWriter;

    fn open(&self, path: &Path) -> Result<NetcdfReader> {
        if !path.exists() {
            return Err(GridError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File not found: {}", path.display()),
            )));
        }

        let file = ::netcdf::open(path)?;
        info!("Opened NetCDF file: {}", path.display());
        Ok(NetcdfReader { file })
    }

    fn create(&self, path: &Path) -> Result<NetcdfWriter> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
                debug!("Created directory {}", parent.display());
            }
        }

        let file = ::netcdf::create(path)?;
        Ok(NetcdfWriter { file })
    }
}

/// Map a netCDF storage type onto the element types the semantic layer handles.
fn element_type(vartype: &NcVariableType) -> ElementType {
    match vartype {
        NcVariableType::Int(IntType::I8) => ElementType::Byte,
        NcVariableType::Int(IntType::I16) => ElementType::Short,
        NcVariableType::Int(IntType::I32) => ElementType::Int,
        NcVariableType::Float(FloatType::F32) => ElementType::Float,
        NcVariableType::Float(FloatType::F64) => ElementType::Double,
        NcVariableType::Char => ElementType::Char,
        _ => ElementType::Unsupported,
    }
}

fn convert_attribute(attr: &::netcdf::Attribute) -> Result<Attribute> {
    use ::netcdf::AttributeValue as NcAttributeValue;

    let value = match attr.value()? {
        NcAttributeValue::Str(s) => AttributeValue::Text(s),
        NcAttributeValue::Strs(v) => AttributeValue::Text(v.into_iter().next().unwrap_or_default()),
        NcAttributeValue::Schar(v) => AttributeValue::Bytes(vec![v]),
        NcAttributeValue::Schars(v) => AttributeValue::Bytes(v),
        NcAttributeValue::Short(v) => AttributeValue::Shorts(vec![v]),
        NcAttributeValue::Shorts(v) => AttributeValue::Shorts(v),
        NcAttributeValue::Int(v) => AttributeValue::Ints(vec![v]),
        NcAttributeValue::Ints(v) => AttributeValue::Ints(v),
        NcAttributeValue::Float(v) => AttributeValue::Floats(vec![v]),
        NcAttributeValue::Floats(v) => AttributeValue::Floats(v),
        NcAttributeValue::Double(v) => AttributeValue::Doubles(vec![v]),
        NcAttributeValue::Doubles(v) => AttributeValue::Doubles(v),
        other => AttributeValue::Unsupported(format!("{:?}", other)),
    };

    Ok(Attribute::new(attr.name().to_string(), value))
}

fn to_nc_value(value: &AttributeValue) -> Option<::netcdf::AttributeValue> {
    use ::netcdf::AttributeValue as NcAttributeValue;

    let converted = match value {
        AttributeValue::Text(s) => NcAttributeValue::Str(s.clone()),
        AttributeValue::Bytes(v) if v.len() == 1 => NcAttributeValue::Schar(v[0]),
        AttributeValue::Bytes(v) => NcAttributeValue::Schars(v.clone()),
        AttributeValue::Shorts(v) if v.len() == 1 => NcAttributeValue::Short(v[0]),
        AttributeValue::Shorts(v) => NcAttributeValue::Shorts(v.clone()),
        AttributeValue::Ints(v) if v.len() == 1 => NcAttributeValue::Int(v[0]),
        AttributeValue::Ints(v) => NcAttributeValue::Ints(v.clone()),
        AttributeValue::Floats(v) if v.len() == 1 => NcAttributeValue::Float(v[0]),
        AttributeValue::Floats(v) => NcAttributeValue::Floats(v.clone()),
        AttributeValue::Doubles(v) if v.len() == 1 => NcAttributeValue::Double(v[0]),
        AttributeValue::Doubles(v) => NcAttributeValue::Doubles(v.clone()),
        AttributeValue::Unsupported(_) => return None,
    };
    Some(converted)
}

fn to_extents(slab: &Hyperslab) -> Vec<Extent> {
    slab.start
        .iter()
        .zip(&slab.count)
        .map(|(&start, &count)| Extent::from(start..start + count))
        .collect()
}

fn unsupported(variable: &str, element: ElementType) -> GridError {
    GridError::UnsupportedType {
        variable: variable.to_string(),
        element: element.to_string(),
    }
}

/// A netCDF file opened read-only
pub struct NetcdfReader {
    file: ::netcdf::File,
}

impl ArrayReader for NetcdfReader {
    fn schema(&self) -> Result<Schema> {
        let dimensions = self
            .file
            .dimensions()
            .map(|dim| DimensionInfo {
                name: dim.name().to_string(),
                len: dim.len(),
                unlimited: dim.is_unlimited(),
            })
            .collect();

        let mut variables = Vec::new();
        for var in self.file.variables() {
            let attributes = var
                .attributes()
                .map(|attr| convert_attribute(&attr))
                .collect::<Result<Vec<_>>>()?;

            variables.push(VariableInfo {
                name: var.name().to_string(),
                element: element_type(&var.vartype()),
                dimensions: var
                    .dimensions()
                    .iter()
                    .map(|dim| dim.name().to_string())
                    .collect(),
                attributes,
            });
        }

        let attributes = self
            .file
            .attributes()
            .map(|attr| convert_attribute(&attr))
            .collect::<Result<Vec<_>>>()?;

        Ok(Schema {
            dimensions,
            variables,
            attributes,
        })
    }

    fn read(&self, variable: &str, slab: &Hyperslab) -> Result<TypedBuffer> {
        let var = self
            .file
            .variable(variable)
            .ok_or_else(|| GridError::not_found(variable))?;
        let extents = to_extents(slab);
        let extents = extents.as_slice();

        let buffer = match element_type(&var.vartype()) {
            ElementType::Byte => TypedBuffer::Byte(var.get_values::<i8, _>(extents)?),
            ElementType::Short => TypedBuffer::Short(var.get_values::<i16, _>(extents)?),
            ElementType::Int => TypedBuffer::Int(var.get_values::<i32, _>(extents)?),
            ElementType::Float => TypedBuffer::Float(var.get_values::<f32, _>(extents)?),
            ElementType::Double => TypedBuffer::Double(var.get_values::<f64, _>(extents)?),
            element @ (ElementType::Char | ElementType::Unsupported) => {
                return Err(unsupported(variable, element))
            }
        };
        Ok(buffer)
    }
}

/// A netCDF file being created
pub struct NetcdfWriter {
    file: ::netcdf::FileMut,
}

impl ArrayWriter for NetcdfWriter {
    fn add_dimension(&mut self, name: &str, len: Option<usize>) -> Result<()> {
        match len {
            Some(len) => self.file.add_dimension(name, len)?,
            None => self.file.add_unlimited_dimension(name)?,
        };
        Ok(())
    }

    fn dimensions(&self) -> Vec<DimensionInfo> {
        self.file
            .dimensions()
            .map(|dim| DimensionInfo {
                name: dim.name().to_string(),
                len: dim.len(),
                unlimited: dim.is_unlimited(),
            })
            .collect()
    }

    fn add_variable(
        &mut self,
        name: &str,
        element: ElementType,
        dimensions: &[String],
    ) -> Result<()> {
        let dims: Vec<&str> = dimensions.iter().map(String::as_str).collect();
        match element {
            ElementType::Byte => {
                self.file.add_variable::<i8>(name, &dims)?;
            }
            ElementType::Short => {
                self.file.add_variable::<i16>(name, &dims)?;
            }
            ElementType::Int => {
                self.file.add_variable::<i32>(name, &dims)?;
            }
            ElementType::Float => {
                self.file.add_variable::<f32>(name, &dims)?;
            }
            ElementType::Double => {
                self.file.add_variable::<f64>(name, &dims)?;
            }
            ElementType::Char => {
                self.file
                    .add_variable_with_type(name, &dims, &NcVariableType::Char)?;
            }
            ElementType::Unsupported => return Err(unsupported(name, element)),
        }
        Ok(())
    }

    fn put_attribute(
        &mut self,
        variable: Option<&str>,
        name: &str,
        value: &AttributeValue,
    ) -> Result<()> {
        let converted = to_nc_value(value).ok_or_else(|| GridError::UnsupportedType {
            variable: variable.unwrap_or("<global>").to_string(),
            element: format!("attribute {}", name),
        })?;

        match variable {
            None => {
                self.file.add_attribute(name, converted)?;
            }
            Some(var) => {
                let mut var = self
                    .file
                    .variable_mut(var)
                    .ok_or_else(|| GridError::not_found(var))?;
                var.put_attribute(name, converted)?;
            }
        }
        Ok(())
    }

    fn put(&mut self, variable: &str, slab: &Hyperslab, values: &TypedBuffer) -> Result<()> {
        let mut var = self
            .file
            .variable_mut(variable)
            .ok_or_else(|| GridError::not_found(variable))?;
        let values = values.cast(element_type(&var.vartype()))?;
        let extents = to_extents(slab);
        let extents = extents.as_slice();

        match &values {
            TypedBuffer::Byte(v) => var.put_values(v, extents)?,
            TypedBuffer::Short(v) => var.put_values(v, extents)?,
            TypedBuffer::Int(v) => var.put_values(v, extents)?,
            TypedBuffer::Float(v) => var.put_values(v, extents)?,
            TypedBuffer::Double(v) => var.put_values(v, extents)?,
            TypedBuffer::Char(_) => return Err(unsupported(variable, ElementType::Char)),
        }
        Ok(())
    }

    fn close(self) -> Result<()> {
        // pending writes surface here; the handle itself closes on drop
        self.file.sync()?;
        drop(self.file);
        Ok(())
    }
}
