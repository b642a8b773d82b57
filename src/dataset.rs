//! The opened dataset: classification, cursors, slices and slice output.
//!
//! A [`Dataset`] classifies its file exactly once when it is opened. The
//! schema snapshot, dimension roles and variable classes never change
//! afterwards; cursors are plain indices into them.

use ndarray::{ArrayD, IxDyn};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::attribute::{find, get_attribute};
use crate::coordinates::{CoordinateAxis, PrecisionMode};
use crate::cursor::Cursor;
use crate::diagnostics::{Axis, Diagnostic, DiagnosticsGate, DiagnosticsSink, TracingSink};
use crate::dimensions::{classify_dimensions, DimensionRoles, Role};
use crate::error::{GridError, Result};
use crate::logging::{log_dataset_stats, log_timed_operation};
use crate::slice::{Sample, SlicePlan};
use crate::store::{
    ArrayReader, ArrayStore, DimensionInfo, ElementType, Hyperslab, Schema, VariableInfo,
};
use crate::variables::{classify_variables, VariableClasses, AUX_LATITUDE, AUX_LONGITUDE};
use crate::writer::{self, SliceRequest, DEFAULT_DISTRIBUTOR, POLAR_STEREOGRAPHIC};

/// Options applied when a dataset is opened
#[derive(Clone)]
pub struct OpenOptions {
    pub precision: PrecisionMode,
    pub flip_x: bool,
    pub flip_y: bool,
    /// Value of the `distributor` attribute in written slices
    pub distributor: String,
    pub diagnostics: Arc<dyn DiagnosticsSink>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            precision: PrecisionMode::default(),
            flip_x: false,
            flip_y: false,
            distributor: DEFAULT_DISTRIBUTOR.to_string(),
            diagnostics: Arc::new(TracingSink),
        }
    }
}

impl OpenOptions {
    pub fn with_precision(mut self, precision: PrecisionMode) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_flip_x(mut self, flip: bool) -> Self {
        self.flip_x = flip;
        self
    }

    pub fn with_flip_y(mut self, flip: bool) -> Self {
        self.flip_y = flip;
        self
    }

    pub fn with_distributor(mut self, distributor: impl Into<String>) -> Self {
        self.distributor = distributor.into();
        self
    }

    pub fn with_diagnostics(mut self, sink: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = sink;
        self
    }
}

impl fmt::Debug for OpenOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenOptions")
            .field("precision", &self.precision)
            .field("flip_x", &self.flip_x)
            .field("flip_y", &self.flip_y)
            .field("distributor", &self.distributor)
            .finish_non_exhaustive()
    }
}

/// Serializable summary of how a file was classified
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    pub path: String,
    pub dimensions: Vec<DimensionInfo>,
    pub roles: DimensionRoles,
    pub variables: VariableClasses,
    pub convention: Option<String>,
    pub institution: Option<String>,
    pub size_x: usize,
    pub size_y: usize,
    pub size_z: usize,
    pub size_t: usize,
    pub x_resolution: f64,
    pub y_resolution: f64,
}

/// A classified, read-only dataset with time, level and parameter cursors
pub struct Dataset<S: ArrayStore> {
    store: S,
    reader: S::Reader,
    path: PathBuf,
    schema: Schema,
    roles: DimensionRoles,
    classes: VariableClasses,
    options: OpenOptions,
    gate: DiagnosticsGate,
    x_axis: CoordinateAxis,
    y_axis: CoordinateAxis,
    time: Cursor,
    level: Cursor,
    param: Cursor,
}

#[cfg(feature = "netcdf")]
impl Dataset<crate::store::netcdf::NetcdfStore> {
    /// Open a netCDF file with default options.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(
            crate::store::netcdf::NetcdfStore,
            path,
            OpenOptions::default(),
        )
    }
}

impl<S: ArrayStore> Dataset<S> {
    /// Open and classify `path` from `store`.
    ///
    /// On success the time cursor is on the first time step, the level
    /// cursor on the first level (when a level variable exists) and the
    /// parameter cursor on the first parameter.
    pub fn open_with(store: S, path: impl AsRef<Path>, options: OpenOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let reader = store.open(&path)?;
        let schema = reader.schema()?;
        let gate = DiagnosticsGate::new(options.diagnostics.clone());

        let roles = classify_dimensions(&schema)?;
        for decision in roles.ambiguities() {
            gate.report(Diagnostic::AmbiguousDimension {
                role: decision.role.to_string(),
                candidates: decision.candidates.clone(),
                chosen: decision.chosen.clone().unwrap_or_default(),
            });
        }

        let classes = classify_variables(&schema, &roles)?;

        let size_x = dimension_len(&schema, &roles.x);
        let size_y = dimension_len(&schema, &roles.y);

        // every accepted candidate gets a spacing check, the last one is kept
        let mut x_axis = None;
        for name in &classes.x.accepted {
            let axis = load_axis(&reader, &schema, &roles, name, size_x, options.flip_x)?;
            check_drift(&gate, Axis::X, &axis);
            x_axis = Some(axis);
        }
        let mut y_axis = None;
        for name in &classes.y.accepted {
            let axis = load_axis(&reader, &schema, &roles, name, size_y, options.flip_y)?;
            check_drift(&gate, Axis::Y, &axis);
            y_axis = Some(axis);
        }
        let (Some(x_axis), Some(y_axis)) = (x_axis, y_axis) else {
            return Err(GridError::structural("Missing X or Y coordinate variable"));
        };

        let time = Cursor::new(dimension_len(&schema, &roles.t));
        let level = Cursor::new(
            roles
                .z
                .as_deref()
                .map(|z| dimension_len(&schema, z))
                .unwrap_or(0),
        );
        let param = Cursor::new(classes.parameters.len());

        let mut dataset = Self {
            store,
            reader,
            path,
            schema,
            roles,
            classes,
            options,
            gate,
            x_axis,
            y_axis,
            time,
            level,
            param,
        };

        dataset.reset_time();
        dataset.next_time();
        dataset.reset_level();
        if dataset.classes.z.is_some() {
            dataset.next_level();
        }
        dataset.first_param();

        log_dataset_stats(
            &dataset.path.display().to_string(),
            dataset.schema.dimensions.len(),
            dataset.schema.variables.len(),
            &dataset.classes.parameters,
            &dataset.classes.projection_name,
        );
        Ok(dataset)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn roles(&self) -> &DimensionRoles {
        &self.roles
    }

    pub fn classes(&self) -> &VariableClasses {
        &self.classes
    }

    pub fn options(&self) -> &OpenOptions {
        &self.options
    }

    /// Summary of the classification for reporting.
    pub fn classification(&self) -> Classification {
        Classification {
            path: self.path.display().to_string(),
            dimensions: self.schema.dimensions.clone(),
            roles: self.roles.clone(),
            variables: self.classes.clone(),
            convention: self.convention(),
            institution: self.institution(),
            size_x: self.size_x(),
            size_y: self.size_y(),
            size_z: self.size_z(),
            size_t: self.size_t(),
            x_resolution: self.x_resolution(),
            y_resolution: self.y_resolution(),
        }
    }

    // Sizes

    pub fn size_x(&self) -> usize {
        dimension_len(&self.schema, &self.roles.x)
    }

    pub fn size_y(&self) -> usize {
        dimension_len(&self.schema, &self.roles.y)
    }

    pub fn size_z(&self) -> usize {
        self.roles
            .z
            .as_deref()
            .map(|z| dimension_len(&self.schema, z))
            .unwrap_or(0)
    }

    pub fn size_t(&self) -> usize {
        dimension_len(&self.schema, &self.roles.t)
    }

    pub fn size_params(&self) -> usize {
        self.classes.parameters.len()
    }

    // Types

    pub fn type_x(&self) -> ElementType {
        self.x_axis.element
    }

    pub fn type_y(&self) -> ElementType {
        self.y_axis.element
    }

    pub fn type_z(&self) -> Option<ElementType> {
        self.classes
            .z
            .as_deref()
            .and_then(|z| self.schema.variable(z))
            .map(|v| v.element)
    }

    pub fn type_t(&self) -> ElementType {
        self.schema
            .variable(&self.classes.t)
            .map(|v| v.element)
            .unwrap_or(ElementType::Unsupported)
    }

    // Metadata

    pub fn convention(&self) -> Option<String> {
        get_attribute(&self.schema.attributes, "Conventions").filter(|c| !c.is_empty())
    }

    pub fn is_convention(&self) -> bool {
        self.convention().is_some()
    }

    pub fn institution(&self) -> Option<String> {
        get_attribute(&self.schema.attributes, "institution").filter(|i| !i.is_empty())
    }

    /// Projection identifier, `latitude_longitude` unless a grid mapping says otherwise.
    pub fn projection(&self) -> &str {
        &self.classes.projection_name
    }

    pub fn projection_variable(&self) -> Result<&VariableInfo> {
        self.classes
            .projection
            .as_deref()
            .and_then(|name| self.schema.variable(name))
            .ok_or_else(|| GridError::not_found("projection variable"))
    }

    fn projection_scalar(&self, names: &[&str]) -> Option<f64> {
        let var = self.projection_variable().ok()?;
        names.iter().find_map(|name| {
            let value = var.attribute(name)?;
            let number = value.as_f64()?;
            Some(self.options.precision.same_precision(number, value.element()))
        })
    }

    /// Longitude the projection is oriented along.
    pub fn orientation(&self) -> Option<f64> {
        self.projection_scalar(&[
            "longitude_of_projection_origin",
            "straight_vertical_longitude_from_pole",
        ])
    }

    /// Latitude where the projection is true to scale.
    pub fn true_latitude(&self) -> Option<f64> {
        self.projection_scalar(&["latitude_of_projection_origin", "standard_parallel"])
    }

    fn is_polar_stereographic(&self) -> bool {
        self.classes.projection_name == POLAR_STEREOGRAPHIC
    }

    /// First or last sample of an auxiliary geographic variable.
    fn aux_sample(&self, name: &str, last: bool) -> Option<f64> {
        let var = self.schema.variable(name)?;
        let shape = self.schema.shape_of(var).ok()?;
        let total: usize = shape.iter().product();
        if total == 0 {
            return None;
        }
        let index = if last { total - 1 } else { 0 };
        let value = self.read_element(var, &shape, index).ok()?;
        Some(self.options.precision.same_precision(value, var.element))
    }

    /// Read a single element by flat row-major index.
    fn read_element(&self, var: &VariableInfo, shape: &[usize], index: usize) -> Result<f64> {
        let mut start = vec![0; shape.len()];
        let mut rest = index;
        for (d, &len) in shape.iter().enumerate().rev() {
            if len > 0 {
                start[d] = rest % len;
                rest /= len;
            }
        }
        let slab = Hyperslab {
            start,
            count: vec![1; shape.len()],
        };
        self.reader
            .read(&var.name, &slab)?
            .get_f64(0)
            .ok_or_else(|| GridError::store(format!("Empty read from {}", var.name)))
    }

    pub fn lat0(&self) -> Option<f64> {
        self.aux_sample(AUX_LATITUDE, false)
    }

    pub fn lon0(&self) -> Option<f64> {
        self.aux_sample(AUX_LONGITUDE, false)
    }

    // Coordinates

    pub fn x0(&self) -> Option<f64> {
        if self.is_polar_stereographic() {
            self.aux_sample(AUX_LONGITUDE, false)
        } else {
            self.x_axis.origin(self.options.precision)
        }
    }

    pub fn x1(&self) -> Option<f64> {
        if self.is_polar_stereographic() {
            self.aux_sample(AUX_LONGITUDE, true)
        } else {
            self.x_axis.extent(self.options.precision)
        }
    }

    pub fn y0(&self) -> Option<f64> {
        if self.is_polar_stereographic() {
            self.aux_sample(AUX_LATITUDE, false)
        } else {
            self.y_axis.origin(self.options.precision)
        }
    }

    pub fn y1(&self) -> Option<f64> {
        if self.is_polar_stereographic() {
            self.aux_sample(AUX_LATITUDE, true)
        } else {
            self.y_axis.extent(self.options.precision)
        }
    }

    pub fn x_axis(&self) -> &CoordinateAxis {
        &self.x_axis
    }

    pub fn y_axis(&self) -> &CoordinateAxis {
        &self.y_axis
    }

    /// X coordinates in read order.
    pub fn x_values(&self) -> Vec<f64> {
        self.x_axis.values()
    }

    /// Y coordinates in read order.
    pub fn y_values(&self) -> Vec<f64> {
        self.y_axis.values()
    }

    pub fn x_resolution(&self) -> f64 {
        self.resolution(&self.x_axis)
    }

    pub fn y_resolution(&self) -> f64 {
        self.resolution(&self.y_axis)
    }

    fn resolution(&self, axis: &CoordinateAxis) -> f64 {
        let resolution = axis.resolution(self.options.precision);
        if resolution.degenerate {
            self.gate.report(Diagnostic::DegenerateCoordinates {
                variable: axis.variable.clone(),
            });
        }
        resolution.value
    }

    pub fn flip_x(&self) -> bool {
        self.x_axis.is_flipped()
    }

    /// Reverse the read order of the X axis. Set this before reading coordinates.
    pub fn set_flip_x(&mut self, flip: bool) {
        self.options.flip_x = flip;
        self.x_axis = self.x_axis.clone().with_flip(flip);
    }

    pub fn flip_y(&self) -> bool {
        self.y_axis.is_flipped()
    }

    /// Reverse the read order of the Y axis. Set this before reading coordinates.
    pub fn set_flip_y(&mut self, flip: bool) {
        self.options.flip_y = flip;
        self.y_axis = self.y_axis.clone().with_flip(flip);
    }

    /// True when the X dimension comes after the Y dimension in `parameter`.
    pub fn coordinates_in_row_major_order(&self, parameter: &str) -> Result<bool> {
        let var = self.parameter(parameter)?;
        let x = var.dimension_index(&self.roles.x);
        let y = var.dimension_index(&self.roles.y);
        match (x, y) {
            (Some(x), Some(y)) => Ok(x > y),
            _ => Err(GridError::structural(format!(
                "Parameter {} does not span both horizontal dimensions",
                parameter
            ))),
        }
    }

    // Time

    pub fn reset_time(&mut self) {
        self.time.reset();
    }

    pub fn next_time(&mut self) -> bool {
        self.time.advance()
    }

    pub fn time_index(&self) -> i64 {
        self.time.index()
    }

    /// `units` of the time variable.
    pub fn time_unit(&self) -> Option<String> {
        self.schema
            .variable(&self.classes.t)
            .and_then(|v| get_attribute(&v.attributes, "units"))
    }

    /// Time value at the time cursor.
    pub fn time(&self) -> Result<f64> {
        let index = self
            .time
            .current()
            .ok_or_else(|| GridError::range("Time cursor is not on a valid index"))?;
        self.time_value_at(index)
    }

    pub fn time_value_at(&self, index: usize) -> Result<f64> {
        self.axis_value_at(&self.classes.t, index, self.size_t())
    }

    fn axis_value_at(&self, variable: &str, index: usize, size: usize) -> Result<f64> {
        if index >= size {
            return Err(GridError::range(format!(
                "Index {} is outside 0..{} of {}",
                index, size, variable
            )));
        }
        let var = self
            .schema
            .variable(variable)
            .ok_or_else(|| GridError::not_found(variable))?;
        let shape = self.schema.shape_of(var)?;
        self.read_element(var, &shape, index)
    }

    // Level

    pub fn reset_level(&mut self) {
        self.level.reset();
    }

    pub fn next_level(&mut self) -> bool {
        self.level.advance()
    }

    pub fn level_index(&self) -> i64 {
        self.level.index()
    }

    /// Level value at the level cursor.
    pub fn level(&self) -> Option<f64> {
        let index = self.level.current()?;
        self.level_value_at(index).ok()
    }

    pub fn level_value_at(&self, index: usize) -> Result<f64> {
        let z = self
            .classes
            .z
            .as_deref()
            .ok_or_else(|| GridError::not_found("level variable"))?;
        self.axis_value_at(z, index, self.size_z())
    }

    // Parameters

    pub fn first_param(&mut self) {
        self.param.reset();
        self.param.advance();
    }

    pub fn next_param(&mut self) -> bool {
        self.param.advance()
    }

    pub fn parameters(&self) -> &[String] {
        &self.classes.parameters
    }

    /// The parameter under the parameter cursor.
    pub fn current_parameter(&self) -> Option<&VariableInfo> {
        let index = self.param.current()?;
        self.schema.variable(&self.classes.parameters[index])
    }

    fn current(&self) -> Result<&VariableInfo> {
        self.current_parameter()
            .ok_or_else(|| GridError::range("Parameter cursor is not on a parameter"))
    }

    /// Look up a data parameter by name.
    pub fn parameter(&self, name: &str) -> Result<&VariableInfo> {
        if !self.classes.parameters.iter().any(|p| p == name) {
            return Err(GridError::not_found(name));
        }
        self.schema
            .variable(name)
            .ok_or_else(|| GridError::not_found(name))
    }

    /// Whether any variable of that name exists in the file.
    pub fn has_variable(&self, name: &str) -> bool {
        self.schema.variable(name).is_some()
    }

    /// Whether the current parameter spans a dimension.
    ///
    /// Accepts the role names `x`, `y`, `z`, `t`, `member` and
    /// `ensemble_member`, or a literal dimension name.
    pub fn has_dimension(&self, name: &str) -> bool {
        let Some(var) = self.current_parameter() else {
            return false;
        };
        let dimension = match name {
            "x" => self.roles.name(Role::X),
            "y" => self.roles.name(Role::Y),
            "z" => self.roles.name(Role::Z),
            "t" => self.roles.name(Role::T),
            "member" | "ensemble_member" => self.roles.name(Role::Member),
            other => Some(other),
        };
        dimension
            .map(|d| var.dimension_index(d).is_some())
            .unwrap_or(false)
    }

    /// Attribute of the current parameter as text.
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.current_parameter()
            .and_then(|var| find(&var.attributes, name))
            .and_then(|value| value.as_text())
    }

    // Values

    /// Slice plan for `parameter` at the current time and level cursors.
    pub fn slice_plan(&self, parameter: &str) -> Result<SlicePlan> {
        let var = self.parameter(parameter)?;
        SlicePlan::build(
            &self.schema,
            &self.roles,
            var,
            self.time.index(),
            self.level.index(),
        )
    }

    /// Values of the current parameter at the current time and level.
    pub fn values<T: Sample>(&self) -> Result<Vec<T>> {
        let name = self.current()?.name.clone();
        self.values_of(&name)
    }

    /// Values of `parameter` at the current time and level.
    pub fn values_of<T: Sample>(&self, parameter: &str) -> Result<Vec<T>> {
        self.slice_plan(parameter)?.read(&self.reader)
    }

    /// Values of `parameter` at explicit indices; a negative level selects
    /// every level.
    pub fn extract<T: Sample>(
        &self,
        parameter: &str,
        time_index: i64,
        level_index: i64,
    ) -> Result<Vec<T>> {
        let var = self.parameter(parameter)?;
        SlicePlan::build(&self.schema, &self.roles, var, time_index, level_index)?
            .read(&self.reader)
    }

    /// The current slice shaped by its plan.
    pub fn values_array(&self) -> Result<ArrayD<f32>> {
        let name = self.current()?.name.clone();
        let plan = self.slice_plan(&name)?;
        let values: Vec<f32> = plan.read(&self.reader)?;
        ArrayD::from_shape_vec(IxDyn(&plan.shape()), values)
            .map_err(|e| GridError::store(format!("Cannot shape slice of {}: {}", name, e)))
    }

    // Output

    /// Write the slice under the cursors to a new file at `path`.
    pub fn write_slice(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let parameter = self.current()?;
        let request = SliceRequest {
            schema: &self.schema,
            roles: &self.roles,
            classes: &self.classes,
            parameter: &parameter.name,
            time_index: self.time.current(),
            level_index: self.level.current(),
            level_value: self.level(),
            distributor: &self.options.distributor,
        };
        debug!(path = %path.display(), parameter = %parameter.name, "Writing slice");
        log_timed_operation("write_slice", || {
            writer::write_slice(&self.store, &self.reader, path, &request)
        })
    }
}

fn dimension_len(schema: &Schema, name: &str) -> usize {
    schema.dimension(name).map(|d| d.len).unwrap_or(0)
}

fn load_axis<R: ArrayReader>(
    reader: &R,
    schema: &Schema,
    roles: &DimensionRoles,
    name: &str,
    size: usize,
    flip: bool,
) -> Result<CoordinateAxis> {
    let var = schema
        .variable(name)
        .ok_or_else(|| GridError::not_found(name))?;
    let samples = SlicePlan::full(schema, roles, var)?
        .read_native(reader)?
        .to_f64_vec();
    Ok(CoordinateAxis::new(&var.name, var.element, size, samples, &var.attributes).with_flip(flip))
}

fn check_drift(gate: &DiagnosticsGate, axis: Axis, coordinates: &CoordinateAxis) {
    let probe = Diagnostic::ResolutionDrift {
        axis,
        variable: coordinates.variable.clone(),
        drift: 0.0,
    };
    // the check is skipped once this axis has been reported
    if gate.already_reported(&probe) {
        return;
    }
    let drift = coordinates.drift();
    if drift > 0.0 {
        gate.report(Diagnostic::ResolutionDrift {
            axis,
            variable: coordinates.variable.clone(),
            drift,
        });
    }
}
