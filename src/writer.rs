//! Writing one (time, level) slice of a parameter to a new file.
//!
//! The output holds the X and Y axes at full size, a single level, a single
//! time step on an unlimited dimension, the member axis when present, the
//! projection container and, for polar stereographic grids, the auxiliary
//! longitude/latitude grids. Any failing step aborts the write; a partially
//! written file is left in place.

use chrono::Local;
use std::path::Path;
use tracing::{debug, info};

use crate::attribute::{get_attribute, Attribute, AttributeValue};
use crate::dimensions::{DimensionRoles, Role};
use crate::error::{GridError, Result};
use crate::slice::SlicePlan;
use crate::store::{
    ArrayReader, ArrayStore, ArrayWriter, ElementType, Hyperslab, Schema, TypedBuffer,
    VariableInfo,
};
use crate::variables::{VariableClasses, AUX_LATITUDE, AUX_LONGITUDE};

/// Default value of the `distributor` file attribute
pub const DEFAULT_DISTRIBUTOR: &str = "Finnish Meteorological Institute";

/// Projection whose auxiliary geographic grids are copied
pub const POLAR_STEREOGRAPHIC: &str = "polar_stereographic";

/// Attributes whose type must equal the type of their variable
const FILL_ATTRIBUTES: &[&str] = &["_FillValue", "missing_value"];

/// Timestamp layout of the `file_creation_time` attribute
const CREATION_TIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// Everything needed to write the slice under the cursors
#[derive(Debug, Clone)]
pub struct SliceRequest<'a> {
    pub schema: &'a Schema,
    pub roles: &'a DimensionRoles,
    pub classes: &'a VariableClasses,
    pub parameter: &'a str,
    pub time_index: Option<usize>,
    pub level_index: Option<usize>,
    /// Level value at the level cursor
    pub level_value: Option<f64>,
    pub distributor: &'a str,
}

/// Write the requested slice to `path`.
///
/// Cursor positions are checked before the output file is created.
pub fn write_slice<S: ArrayStore>(
    store: &S,
    reader: &S::Reader,
    path: &Path,
    request: &SliceRequest<'_>,
) -> Result<()> {
    let schema = request.schema;
    let roles = request.roles;
    let parameter = variable(schema, request.parameter)?;
    let has_level = roles
        .z
        .as_deref()
        .map(|z| parameter.dimension_index(z).is_some())
        .unwrap_or(false);

    let time_index = request.time_index.ok_or_else(|| {
        GridError::range(format!(
            "Time cursor is not on a valid index for {}",
            parameter.name
        ))
    })?;
    let level_index = match (has_level, request.level_index) {
        (true, None) => {
            return Err(GridError::range(format!(
                "Level cursor is not on a valid index for {}",
                parameter.name
            )))
        }
        (true, Some(index)) => index as i64,
        (false, _) => -1,
    };

    let mut writer = store
        .create(path)
        .map_err(|e| e.during_write("creating output file"))?;

    define_dimensions(&mut writer, schema, roles).map_err(|e| e.during_write("dimensions"))?;

    // Axes are copied raw; flipping only affects reads
    for name in [request.classes.x_var(), request.classes.y_var()] {
        let var = variable(schema, name)?;
        let plan = SlicePlan::full(schema, roles, var)?;
        copy_variable(reader, &mut writer, schema, &plan)
            .map_err(|e| e.during_write(&format!("copying {}", name)))?;
    }

    if let (Some(z_dim), Some(z_var)) = (roles.z.as_deref(), request.classes.z.as_deref()) {
        let level = if has_level {
            request.level_value.unwrap_or(0.0)
        } else {
            0.0
        };
        write_level(&mut writer, variable(schema, z_var)?, z_dim, level)
            .map_err(|e| e.during_write("level"))?;
    }

    let time_var = variable(schema, &request.classes.t)?;
    let time_plan = SlicePlan::build(schema, roles, time_var, time_index as i64, -1)?;
    copy_variable(reader, &mut writer, schema, &time_plan)
        .map_err(|e| e.during_write("copying time"))?;

    if let Some(member) = request.classes.member.as_deref() {
        let var = variable(schema, member)?;
        let plan = SlicePlan::full(schema, roles, var)?;
        copy_variable(reader, &mut writer, schema, &plan)
            .map_err(|e| e.during_write("copying member"))?;
    }

    if let Some(projection) = request.classes.projection.as_deref() {
        let var = variable(schema, projection)?;
        writer
            .add_variable(&var.name, var.element, &[])
            .and_then(|_| copy_attributes(&mut writer, &var.name, var.element, &var.attributes))
            .map_err(|e| e.during_write("copying projection"))?;

        if request.classes.projection_name == POLAR_STEREOGRAPHIC {
            if let (Some(lon), Some(lat)) =
                (schema.variable(AUX_LONGITUDE), schema.variable(AUX_LATITUDE))
            {
                let axes = [request.classes.x_var(), request.classes.y_var()];
                // a grid already written as the X or Y axis is not copied again
                for aux in [lon, lat]
                    .into_iter()
                    .filter(|v| !axes.contains(&v.name.as_str()))
                {
                    copy_geographic_grid(reader, &mut writer, schema, roles, aux)
                        .map_err(|e| e.during_write(&format!("copying {}", aux.name)))?;
                }
            }
        }
    }

    let plan = SlicePlan::build(schema, roles, parameter, time_index as i64, level_index)?;
    copy_variable(reader, &mut writer, schema, &plan)
        .map_err(|e| e.during_write(&format!("copying {}", parameter.name)))?;

    stamp_file_attributes(&mut writer, schema, request.distributor)
        .map_err(|e| e.during_write("file attributes"))?;

    writer.close().map_err(|e| e.during_write("closing"))?;

    info!(
        path = %path.display(),
        parameter = %parameter.name,
        time_index,
        level_index,
        "Wrote slice"
    );
    Ok(())
}

fn variable<'a>(schema: &'a Schema, name: &str) -> Result<&'a VariableInfo> {
    schema.variable(name).ok_or_else(|| GridError::not_found(name))
}

fn define_dimensions<W: ArrayWriter>(
    writer: &mut W,
    schema: &Schema,
    roles: &DimensionRoles,
) -> Result<()> {
    let len_of = |name: &str| {
        schema
            .dimension(name)
            .map(|d| d.len)
            .ok_or_else(|| GridError::not_found(name))
    };

    writer.add_dimension(&roles.x, Some(len_of(&roles.x)?))?;
    writer.add_dimension(&roles.y, Some(len_of(&roles.y)?))?;
    if let Some(z) = roles.name(Role::Z) {
        writer.add_dimension(z, Some(1))?;
    }
    writer.add_dimension(&roles.t, None)?;
    if let Some(member) = roles.name(Role::Member) {
        writer.add_dimension(member, Some(len_of(member)?))?;
    }
    Ok(())
}

/// Copy attributes, converting fill attributes to `element`.
fn copy_attributes<W: ArrayWriter>(
    writer: &mut W,
    target: &str,
    element: ElementType,
    attributes: &[Attribute],
) -> Result<()> {
    for attr in attributes {
        let value = if FILL_ATTRIBUTES.contains(&attr.name.as_str()) {
            attr.value.retyped(element)
        } else {
            Some(attr.value.clone())
        };
        match value {
            Some(AttributeValue::Unsupported(_)) | None => {
                debug!(variable = target, attribute = %attr.name, "Skipping attribute");
            }
            Some(value) => writer.put_attribute(Some(target), &attr.name, &value)?,
        }
    }
    Ok(())
}

/// Output dimension names for `dimensions`; every one must already exist.
fn output_dimensions<W: ArrayWriter>(
    writer: &W,
    variable: &str,
    dimensions: &[String],
) -> Result<Vec<String>> {
    let declared = writer.dimensions();
    dimensions
        .iter()
        .map(|name| {
            declared
                .iter()
                .find(|d| &d.name == name)
                .map(|d| d.name.clone())
                .ok_or_else(|| GridError::Write {
                    message: format!(
                        "Dimension {} of variable {} does not exist in the output file",
                        name, variable
                    ),
                })
        })
        .collect()
}

/// Declare a variable like the source one and write the planned selection
/// at the origin of the output variable.
fn copy_variable<R: ArrayReader, W: ArrayWriter>(
    reader: &R,
    writer: &mut W,
    schema: &Schema,
    plan: &SlicePlan,
) -> Result<()> {
    let source = variable(schema, &plan.variable)?;
    let dimensions = output_dimensions(writer, &source.name, &source.dimensions)?;

    writer.add_variable(&source.name, source.element, &dimensions)?;
    copy_attributes(writer, &source.name, source.element, &source.attributes)?;

    let values = plan.read_native(reader)?;
    let target = Hyperslab {
        start: vec![0; plan.entries.len()],
        count: plan.shape(),
    };
    writer.put(&source.name, &target, &values)?;
    debug!(variable = %source.name, values = values.len(), "Copied variable");
    Ok(())
}

fn write_level<W: ArrayWriter>(
    writer: &mut W,
    source: &VariableInfo,
    z_dim: &str,
    level: f64,
) -> Result<()> {
    writer.add_variable(z_dim, ElementType::Float, &[z_dim.to_string()])?;
    copy_attributes(writer, z_dim, ElementType::Float, &source.attributes)?;
    writer.put(
        z_dim,
        &Hyperslab {
            start: vec![0],
            count: vec![1],
        },
        &TypedBuffer::Float(vec![level as f32]),
    )
}

/// Copy an auxiliary longitude/latitude grid as float over the output X/Y
/// dimensions.
fn copy_geographic_grid<R: ArrayReader, W: ArrayWriter>(
    reader: &R,
    writer: &mut W,
    schema: &Schema,
    roles: &DimensionRoles,
    source: &VariableInfo,
) -> Result<()> {
    let horizontal = source
        .dimensions
        .iter()
        .all(|d| d == &roles.x || d == &roles.y);
    if !horizontal {
        return Err(GridError::Write {
            message: format!(
                "Auxiliary grid {} has dimensions {:?} outside the X/Y plane",
                source.name, source.dimensions
            ),
        });
    }

    let dimensions = output_dimensions(writer, &source.name, &source.dimensions)?;
    writer.add_variable(&source.name, ElementType::Float, &dimensions)?;
    copy_attributes(writer, &source.name, ElementType::Float, &source.attributes)?;

    let plan = SlicePlan::full(schema, roles, source)?;
    let values = plan.read_native(reader)?.cast(ElementType::Float)?;
    writer.put(&source.name, &plan.hyperslab(), &values)
}

fn stamp_file_attributes<W: ArrayWriter>(
    writer: &mut W,
    schema: &Schema,
    distributor: &str,
) -> Result<()> {
    for attr in &schema.attributes {
        if matches!(attr.value, AttributeValue::Unsupported(_)) {
            continue;
        }
        writer.put_attribute(None, &attr.name, &attr.value)?;
    }

    if let Some(convention) = get_attribute(&schema.attributes, "Conventions") {
        writer.put_attribute(None, "Conventions", &convention.into())?;
    }

    let created = Local::now().format(CREATION_TIME_FORMAT).to_string();
    writer.put_attribute(None, "file_creation_time", &created.into())?;

    if let Some(institution) = get_attribute(&schema.attributes, "institution") {
        writer.put_attribute(None, "institution", &institution.into())?;
    }

    writer.put_attribute(None, "distributor", &distributor.into())
}
