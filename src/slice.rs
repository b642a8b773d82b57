//! Planning and reading one (time, level) slice of a parameter.
//!
//! A [`SlicePlan`] lists, in the variable's own dimension order, the offset
//! and length selected along every dimension. Planning never touches a file;
//! reading is a single hyperslab request built from the plan.

use serde::Serialize;
use tracing::trace;

use crate::coordinates::FLOAT_MISSING;
use crate::dimensions::{DimensionRoles, Role};
use crate::error::{GridError, Result};
use crate::store::{ArrayReader, ElementType, Hyperslab, Schema, TypedBuffer, VariableInfo};

/// Selection along one dimension
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub dimension: String,
    pub role: Option<Role>,
    pub offset: usize,
    pub length: usize,
}

/// Per-dimension selection for one variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlicePlan {
    pub variable: String,
    pub entries: Vec<PlanEntry>,
}

impl SlicePlan {
    /// Plan the slice of `variable` at `time_index` and `level_index`.
    ///
    /// The time dimension is pinned to `time_index`. The level dimension is
    /// pinned to `level_index` unless it is negative, in which case every
    /// level is selected. Indices past the end are not checked here; the
    /// store reports them when the slice is read.
    pub fn build(
        schema: &Schema,
        roles: &DimensionRoles,
        variable: &VariableInfo,
        time_index: i64,
        level_index: i64,
    ) -> Result<Self> {
        let shape = schema.shape_of(variable)?;
        let mut entries = Vec::with_capacity(shape.len());

        for (dimension, &size) in variable.dimensions.iter().zip(&shape) {
            let role = roles.role_of(dimension);
            let (offset, length) = match role {
                Some(Role::T) => {
                    let index = usize::try_from(time_index).map_err(|_| {
                        GridError::range(format!(
                            "Time index {} is not positioned for variable {}",
                            time_index, variable.name
                        ))
                    })?;
                    (index, 1)
                }
                Some(Role::Z) if level_index >= 0 => (level_index as usize, 1),
                _ => (0, size),
            };
            entries.push(PlanEntry {
                dimension: dimension.clone(),
                role,
                offset,
                length,
            });
        }

        Ok(Self {
            variable: variable.name.clone(),
            entries,
        })
    }

    /// Plan covering the whole of `variable`.
    pub fn full(schema: &Schema, roles: &DimensionRoles, variable: &VariableInfo) -> Result<Self> {
        let shape = schema.shape_of(variable)?;
        Ok(Self {
            variable: variable.name.clone(),
            entries: variable
                .dimensions
                .iter()
                .zip(shape)
                .map(|(dimension, length)| PlanEntry {
                    dimension: dimension.clone(),
                    role: roles.role_of(dimension),
                    offset: 0,
                    length,
                })
                .collect(),
        })
    }

    pub fn hyperslab(&self) -> Hyperslab {
        Hyperslab {
            start: self.entries.iter().map(|e| e.offset).collect(),
            count: self.entries.iter().map(|e| e.length).collect(),
        }
    }

    /// Selected lengths in dimension order.
    pub fn shape(&self) -> Vec<usize> {
        self.entries.iter().map(|e| e.length).collect()
    }

    /// Number of selected elements.
    pub fn len(&self) -> usize {
        self.entries.iter().map(|e| e.length).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the planned slice in the variable's native element type.
    pub fn read_native<R: ArrayReader>(&self, reader: &R) -> Result<TypedBuffer> {
        trace!(variable = %self.variable, slab = ?self.hyperslab(), "Reading slice");
        reader.read(&self.variable, &self.hyperslab())
    }

    /// Read the planned slice converted to `T`.
    ///
    /// The output starts filled with [`FLOAT_MISSING`] and is then
    /// overwritten by whatever the store returns.
    pub fn read<T: Sample, R: ArrayReader>(&self, reader: &R) -> Result<Vec<T>> {
        let mut values = TypedBuffer::filled(T::ELEMENT, self.len(), FLOAT_MISSING)?;
        let native = self.read_native(reader)?;
        values.overwrite_from(&native.cast(T::ELEMENT)?)?;
        T::from_buffer(values)
    }
}

/// Floating point types a slice can be returned as
pub trait Sample: Copy + Sized {
    const ELEMENT: ElementType;

    fn from_buffer(buffer: TypedBuffer) -> Result<Vec<Self>>;
}

impl Sample for f32 {
    const ELEMENT: ElementType = ElementType::Float;

    fn from_buffer(buffer: TypedBuffer) -> Result<Vec<Self>> {
        match buffer {
            TypedBuffer::Float(values) => Ok(values),
            other => Err(GridError::store(format!(
                "Expected float values, got {}",
                other.element()
            ))),
        }
    }
}

impl Sample for f64 {
    const ELEMENT: ElementType = ElementType::Double;

    fn from_buffer(buffer: TypedBuffer) -> Result<Vec<Self>> {
        match buffer {
            TypedBuffer::Double(values) => Ok(values),
            other => Err(GridError::store(format!(
                "Expected double values, got {}",
                other.element()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimensions::classify_dimensions;
    use crate::store::memory::{MemoryFile, MemoryReader};
    use pretty_assertions::assert_eq;

    fn transposed_file() -> MemoryFile {
        // level and time deliberately out of the usual order
        let values: Vec<f32> = (0..2 * 3 * 2 * 2).map(|v| v as f32).collect();
        MemoryFile::new()
            .dimension("x", 2)
            .dimension("level", 3)
            .unlimited_dimension("time", 2)
            .dimension("y", 2)
            .variable("field", &["level", "y", "time", "x"], TypedBuffer::Float(values))
    }

    fn plan(file: &MemoryFile, time: i64, level: i64) -> Result<SlicePlan> {
        let schema = file.schema();
        let roles = classify_dimensions(schema)?;
        let var = schema.variable("field").unwrap();
        SlicePlan::build(schema, &roles, var, time, level)
    }

    #[test]
    fn test_plan_follows_declared_order() {
        let plan = plan(&transposed_file(), 1, 2).unwrap();
        let dims: Vec<&str> = plan.entries.iter().map(|e| e.dimension.as_str()).collect();
        assert_eq!(dims, vec!["level", "y", "time", "x"]);
        assert_eq!(
            plan.hyperslab(),
            Hyperslab {
                start: vec![2, 0, 1, 0],
                count: vec![1, 2, 1, 2],
            }
        );
        assert_eq!(plan.len(), 4);
        assert_eq!(plan.entries[0].role, Some(Role::Z));
    }

    #[test]
    fn test_negative_level_selects_all_levels() {
        let plan = plan(&transposed_file(), 0, -1).unwrap();
        assert_eq!(plan.shape(), vec![3, 2, 1, 2]);
    }

    #[test]
    fn test_unpositioned_time_is_range_error() {
        assert!(matches!(
            plan(&transposed_file(), -1, 0).unwrap_err(),
            GridError::Range { .. }
        ));
    }

    #[test]
    fn test_read_picks_strided_values() {
        let file = transposed_file();
        let plan = plan(&file, 1, 2).unwrap();
        let reader = MemoryReader::new(file);
        let values: Vec<f32> = plan.read(&reader).unwrap();
        // flat index = ((level * 2 + y) * 2 + time) * 2 + x
        assert_eq!(values, vec![18.0, 19.0, 22.0, 23.0]);
        let doubles: Vec<f64> = plan.read(&reader).unwrap();
        assert_eq!(doubles, vec![18.0, 19.0, 22.0, 23.0]);
    }

    #[test]
    fn test_out_of_range_time_is_store_error() {
        let file = transposed_file();
        let plan = plan(&file, 5, 0).unwrap();
        let reader = MemoryReader::new(file);
        assert!(reader.schema().is_ok());
        assert!(matches!(
            plan.read::<f32, _>(&reader).unwrap_err(),
            GridError::Store { .. }
        ));
    }
}
