//! In-process array store.
//!
//! Files live in a shared map keyed by path. Data is kept row-major per
//! variable, exactly as a netCDF library would hand it out, and hyperslabs
//! are cut from `ndarray` views over those buffers. New or grown
//! storage is initialised with netCDF default fill values. Writes that extend
//! an unlimited dimension re-layout every variable that uses it.

use ndarray::{ArrayViewD, ArrayViewMutD, IxDyn, ShapeError, Slice};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{
    ArrayReader, ArrayStore, ArrayWriter, DimensionInfo, ElementType, Hyperslab, Schema,
    TypedBuffer, VariableInfo,
};
use crate::attribute::{Attribute, AttributeValue};
use crate::error::{GridError, Result};

/// One in-memory file: a schema plus a buffer per variable
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryFile {
    schema: Schema,
    data: HashMap<String, TypedBuffer>,
}

impl MemoryFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fixed-size dimension.
    pub fn dimension(mut self, name: &str, len: usize) -> Self {
        self.schema.dimensions.push(DimensionInfo {
            name: name.to_string(),
            len,
            unlimited: false,
        });
        self
    }

    /// Add the unlimited dimension with `len` records.
    pub fn unlimited_dimension(mut self, name: &str, len: usize) -> Self {
        self.schema.dimensions.push(DimensionInfo {
            name: name.to_string(),
            len,
            unlimited: true,
        });
        self
    }

    /// Add a variable whose element type is taken from `values`.
    pub fn variable(mut self, name: &str, dimensions: &[&str], values: TypedBuffer) -> Self {
        self.schema.variables.push(VariableInfo {
            name: name.to_string(),
            element: values.element(),
            dimensions: dimensions.iter().map(|d| d.to_string()).collect(),
            attributes: Vec::new(),
        });
        self.data.insert(name.to_string(), values);
        self
    }

    /// Add a variable without data, such as a grid-mapping container.
    pub fn empty_variable(mut self, name: &str, element: ElementType, dimensions: &[&str]) -> Self {
        self.schema.variables.push(VariableInfo {
            name: name.to_string(),
            element,
            dimensions: dimensions.iter().map(|d| d.to_string()).collect(),
            attributes: Vec::new(),
        });
        self
    }

    /// Attach an attribute to an already added variable.
    pub fn attribute(mut self, variable: &str, name: &str, value: AttributeValue) -> Self {
        if let Some(var) = self
            .schema
            .variables
            .iter_mut()
            .find(|v| v.name == variable)
        {
            upsert(&mut var.attributes, name, value);
        }
        self
    }

    pub fn global_attribute(mut self, name: &str, value: AttributeValue) -> Self {
        upsert(&mut self.schema.attributes, name, value);
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Every stored element of `variable`, row-major.
    pub fn values(&self, variable: &str) -> Option<&TypedBuffer> {
        self.data.get(variable)
    }

    fn variable_info(&self, name: &str) -> Result<&VariableInfo> {
        self.schema
            .variable(name)
            .ok_or_else(|| GridError::not_found(name))
    }

    /// Buffer of `variable`, materialising fill values for data-less variables.
    fn buffer(&self, variable: &VariableInfo) -> Result<TypedBuffer> {
        let shape = self.schema.shape_of(variable)?;
        let expected: usize = shape.iter().product();
        match self.data.get(&variable.name) {
            Some(buffer) if buffer.len() == expected => Ok(buffer.clone()),
            Some(buffer) => Err(GridError::store(format!(
                "Variable {} holds {} values but its shape {:?} needs {}",
                variable.name,
                buffer.len(),
                shape,
                expected
            ))),
            None => {
                TypedBuffer::filled(variable.element, expected, variable.element.default_fill())
            }
        }
    }

    fn grow_dimension(&mut self, name: &str, new_len: usize) -> Result<()> {
        let old_schema = self.schema.clone();
        let Some(dim) = self.schema.dimensions.iter_mut().find(|d| d.name == name) else {
            return Err(GridError::not_found(name));
        };
        dim.len = new_len;

        for var in old_schema
            .variables
            .iter()
            .filter(|v| v.dimensions.iter().any(|d| d == name))
        {
            let old_shape = old_schema.shape_of(var)?;
            let new_shape = self.schema.shape_of(var)?;
            let old = old_schema_buffer(&self.data, var, &old_shape)?;
            let new_len_total: usize = new_shape.iter().product();
            let mut grown =
                TypedBuffer::filled(var.element, new_len_total, var.element.default_fill())?;
            // old records land in the leading slab of the grown layout
            let leading = Hyperslab::full(&old_shape);
            write_slab(&mut grown, &new_shape, &leading, &old)?;
            self.data.insert(var.name.clone(), grown);
        }
        Ok(())
    }
}

fn old_schema_buffer(
    data: &HashMap<String, TypedBuffer>,
    var: &VariableInfo,
    shape: &[usize],
) -> Result<TypedBuffer> {
    let len: usize = shape.iter().product();
    match data.get(&var.name) {
        Some(buffer) => Ok(buffer.clone()),
        None => TypedBuffer::filled(var.element, len, var.element.default_fill()),
    }
}

fn upsert(attributes: &mut Vec<Attribute>, name: &str, value: AttributeValue) {
    match attributes.iter_mut().find(|a| a.name == name) {
        Some(existing) => existing.value = value,
        None => attributes.push(Attribute::new(name, value)),
    }
}

fn window(slab: &Hyperslab, axis: usize) -> Slice {
    let start = slab.start[axis];
    Slice::from(start..start + slab.count[axis])
}

fn shape_error(e: ShapeError) -> GridError {
    GridError::store(format!("Buffer does not match its shape: {}", e))
}

fn select<T: Copy>(data: &[T], shape: &[usize], slab: &Hyperslab) -> Result<Vec<T>> {
    let array = ArrayViewD::from_shape(IxDyn(shape), data).map_err(shape_error)?;
    Ok(array
        .slice_each_axis(|ax| window(slab, ax.axis.index()))
        .iter()
        .copied()
        .collect())
}

fn assign<T: Copy>(data: &mut [T], shape: &[usize], slab: &Hyperslab, values: &[T]) -> Result<()> {
    let source = ArrayViewD::from_shape(IxDyn(&slab.count), values).map_err(shape_error)?;
    let mut target = ArrayViewMutD::from_shape(IxDyn(shape), data).map_err(shape_error)?;
    target
        .slice_each_axis_mut(|ax| window(slab, ax.axis.index()))
        .assign(&source);
    Ok(())
}

/// Elements of `source` (laid out as `shape`) selected by `slab`, row-major.
fn read_slab(source: &TypedBuffer, shape: &[usize], slab: &Hyperslab) -> Result<TypedBuffer> {
    let values = match source {
        TypedBuffer::Byte(v) => TypedBuffer::Byte(select(v, shape, slab)?),
        TypedBuffer::Char(v) => TypedBuffer::Char(select(v, shape, slab)?),
        TypedBuffer::Short(v) => TypedBuffer::Short(select(v, shape, slab)?),
        TypedBuffer::Int(v) => TypedBuffer::Int(select(v, shape, slab)?),
        TypedBuffer::Float(v) => TypedBuffer::Float(select(v, shape, slab)?),
        TypedBuffer::Double(v) => TypedBuffer::Double(select(v, shape, slab)?),
    };
    Ok(values)
}

/// Overwrite the `slab` region of `target` (laid out as `shape`) with `values`.
fn write_slab(
    target: &mut TypedBuffer,
    shape: &[usize],
    slab: &Hyperslab,
    values: &TypedBuffer,
) -> Result<()> {
    match (target, values) {
        (TypedBuffer::Byte(d), TypedBuffer::Byte(s)) => assign(d, shape, slab, s),
        (TypedBuffer::Char(d), TypedBuffer::Char(s)) => assign(d, shape, slab, s),
        (TypedBuffer::Short(d), TypedBuffer::Short(s)) => assign(d, shape, slab, s),
        (TypedBuffer::Int(d), TypedBuffer::Int(s)) => assign(d, shape, slab, s),
        (TypedBuffer::Float(d), TypedBuffer::Float(s)) => assign(d, shape, slab, s),
        (TypedBuffer::Double(d), TypedBuffer::Double(s)) => assign(d, shape, slab, s),
        (d, s) => Err(GridError::store(format!(
            "Cannot store {} values in a {} variable",
            s.element(),
            d.element()
        ))),
    }
}

fn check_bounds(variable: &str, shape: &[usize], slab: &Hyperslab) -> Result<()> {
    if slab.start.len() != shape.len() || slab.count.len() != shape.len() {
        return Err(GridError::store(format!(
            "Hyperslab rank {} does not match rank {} of variable {}",
            slab.start.len(),
            shape.len(),
            variable
        )));
    }
    for (d, &len) in shape.iter().enumerate() {
        if slab.start[d] + slab.count[d] > len {
            return Err(GridError::store(format!(
                "Index exceeds dimension bound: {} dimension {} start {} count {} length {}",
                variable, d, slab.start[d], slab.count[d], len
            )));
        }
    }
    Ok(())
}

/// Read handle onto a stored [`MemoryFile`]
#[derive(Debug, Clone)]
pub struct MemoryReader {
    file: Arc<MemoryFile>,
}

impl MemoryReader {
    pub fn new(file: MemoryFile) -> Self {
        Self {
            file: Arc::new(file),
        }
    }
}

impl ArrayReader for MemoryReader {
    fn schema(&self) -> Result<Schema> {
        for var in &self.file.schema.variables {
            // surfaces inconsistent shapes at open time
            if var.element != ElementType::Unsupported {
                self.file.buffer(var)?;
            }
        }
        Ok(self.file.schema.clone())
    }

    fn read(&self, variable: &str, slab: &Hyperslab) -> Result<TypedBuffer> {
        let info = self.file.variable_info(variable)?;
        if info.element == ElementType::Unsupported {
            return Err(GridError::UnsupportedType {
                variable: variable.to_string(),
                element: info.element.to_string(),
            });
        }
        let shape = self.file.schema.shape_of(info)?;
        check_bounds(variable, &shape, slab)?;
        let buffer = self.file.buffer(info)?;
        read_slab(&buffer, &shape, slab)
    }
}

/// Writer building a new [`MemoryFile`]; the file becomes visible on close.
#[derive(Debug)]
pub struct MemoryWriter {
    store: MemoryStore,
    path: PathBuf,
    file: MemoryFile,
}

impl ArrayWriter for MemoryWriter {
    fn add_dimension(&mut self, name: &str, len: Option<usize>) -> Result<()> {
        if self.file.schema.dimension(name).is_some() {
            return Err(GridError::store(format!("Dimension {} already exists", name)));
        }
        if len.is_none() && self.file.schema.dimensions.iter().any(|d| d.unlimited) {
            return Err(GridError::store(format!(
                "Cannot add unlimited dimension {}: one already exists",
                name
            )));
        }
        self.file.schema.dimensions.push(DimensionInfo {
            name: name.to_string(),
            len: len.unwrap_or(0),
            unlimited: len.is_none(),
        });
        Ok(())
    }

    fn dimensions(&self) -> Vec<DimensionInfo> {
        self.file.schema.dimensions.clone()
    }

    fn add_variable(
        &mut self,
        name: &str,
        element: ElementType,
        dimensions: &[String],
    ) -> Result<()> {
        if element == ElementType::Unsupported {
            return Err(GridError::UnsupportedType {
                variable: name.to_string(),
                element: element.to_string(),
            });
        }
        if self.file.schema.variable(name).is_some() {
            return Err(GridError::store(format!("Variable {} already exists", name)));
        }
        let info = VariableInfo {
            name: name.to_string(),
            element,
            dimensions: dimensions.to_vec(),
            attributes: Vec::new(),
        };
        let shape = self.file.schema.shape_of(&info)?;
        let buffer = TypedBuffer::filled(element, shape.iter().product(), element.default_fill())?;
        self.file.schema.variables.push(info);
        self.file.data.insert(name.to_string(), buffer);
        Ok(())
    }

    fn put_attribute(
        &mut self,
        variable: Option<&str>,
        name: &str,
        value: &AttributeValue,
    ) -> Result<()> {
        let attributes = match variable {
            None => &mut self.file.schema.attributes,
            Some(var) => {
                &mut self
                    .file
                    .schema
                    .variables
                    .iter_mut()
                    .find(|v| v.name == var)
                    .ok_or_else(|| GridError::not_found(var))?
                    .attributes
            }
        };
        upsert(attributes, name, value.clone());
        Ok(())
    }

    fn put(&mut self, variable: &str, slab: &Hyperslab, values: &TypedBuffer) -> Result<()> {
        let info = self.file.variable_info(variable)?.clone();
        if values.len() != slab.len() {
            return Err(GridError::store(format!(
                "Hyperslab of {} elements given {} values for variable {}",
                slab.len(),
                values.len(),
                variable
            )));
        }
        if slab.rank() != info.dimensions.len() {
            return Err(GridError::store(format!(
                "Hyperslab rank {} does not match rank {} of variable {}",
                slab.rank(),
                info.dimensions.len(),
                variable
            )));
        }

        for (d, dim_name) in info.dimensions.iter().enumerate() {
            let Some(dim) = self.file.schema.dimension(dim_name).cloned() else {
                return Err(GridError::not_found(dim_name.as_str()));
            };
            let needed = slab.start[d] + slab.count[d];
            if dim.unlimited && needed > dim.len {
                self.file.grow_dimension(dim_name, needed)?;
            }
        }

        let shape = self.file.schema.shape_of(&info)?;
        check_bounds(variable, &shape, slab)?;
        let values = values.cast(info.element)?;
        let target = self
            .file
            .data
            .get_mut(variable)
            .ok_or_else(|| GridError::not_found(variable))?;
        write_slab(target, &shape, slab, &values)
    }

    fn close(self) -> Result<()> {
        self.store.insert(&self.path, self.file);
        Ok(())
    }
}

/// Shared map of in-memory files keyed by path
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    files: Arc<Mutex<HashMap<PathBuf, Arc<MemoryFile>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `file` under `path`, replacing any previous file.
    pub fn insert(&self, path: impl AsRef<Path>, file: MemoryFile) {
        self.files
            .lock()
            .insert(path.as_ref().to_path_buf(), Arc::new(file));
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<Arc<MemoryFile>> {
        self.files.lock().get(path.as_ref()).cloned()
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.files.lock().contains_key(path.as_ref())
    }
}

impl ArrayStore for MemoryStore {
    type Reader = MemoryReader;
    type Writer = MemoryWriter;

    fn open(&self, path: &Path) -> Result<MemoryReader> {
        let file = self.get(path).ok_or_else(|| {
            GridError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File not found: {}", path.display()),
            ))
        })?;
        Ok(MemoryReader { file })
    }

    fn create(&self, path: &Path) -> Result<MemoryWriter> {
        Ok(MemoryWriter {
            store: self.clone(),
            path: path.to_path_buf(),
            file: MemoryFile::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn grid() -> MemoryFile {
        MemoryFile::new()
            .unlimited_dimension("time", 2)
            .dimension("y", 2)
            .dimension("x", 3)
            .variable(
                "field",
                &["time", "y", "x"],
                TypedBuffer::Int((0..12).collect()),
            )
    }

    #[test]
    fn test_read_hyperslab_row_major() {
        let reader = MemoryReader::new(grid());
        let slab = Hyperslab {
            start: vec![1, 0, 1],
            count: vec![1, 2, 2],
        };
        let values = reader.read("field", &slab).unwrap();
        assert_eq!(values, TypedBuffer::Int(vec![7, 8, 10, 11]));
    }

    #[test]
    fn test_read_out_of_bounds_is_store_error() {
        let reader = MemoryReader::new(grid());
        let slab = Hyperslab {
            start: vec![2, 0, 0],
            count: vec![1, 2, 3],
        };
        assert!(matches!(
            reader.read("field", &slab),
            Err(GridError::Store { .. })
        ));
    }

    #[test]
    fn test_schema_rejects_inconsistent_buffer() {
        let file = MemoryFile::new()
            .dimension("x", 3)
            .variable("x", &["x"], TypedBuffer::Float(vec![1.0, 2.0]));
        assert!(MemoryReader::new(file).schema().is_err());
    }

    #[test]
    fn test_scalar_variable_reads_fill() {
        let file = MemoryFile::new().empty_variable("crs", ElementType::Int, &[]);
        let reader = MemoryReader::new(file);
        let values = reader.read("crs", &Hyperslab::default()).unwrap();
        assert_eq!(values, TypedBuffer::Int(vec![-2147483647]));
    }

    #[test]
    fn test_writer_grows_unlimited_dimension() {
        let store = MemoryStore::new();
        let path = Path::new("/out/grown.nc");
        let mut writer = store.create(path).unwrap();
        writer.add_dimension("x", Some(2)).unwrap();
        writer.add_dimension("time", None).unwrap();
        writer
            .add_variable("v", ElementType::Short, &["x".to_string(), "time".to_string()])
            .unwrap();
        let slab = Hyperslab {
            start: vec![0, 1],
            count: vec![2, 1],
        };
        writer.put("v", &slab, &TypedBuffer::Short(vec![5, 6])).unwrap();
        writer.close().unwrap();

        let file = store.get(path).unwrap();
        assert_eq!(file.schema().dimension("time").unwrap().len, 2);
        assert_eq!(
            file.values("v").unwrap(),
            &TypedBuffer::Short(vec![-32767, 5, -32767, 6])
        );
    }

    #[test]
    fn test_growth_keeps_earlier_records() {
        let store = MemoryStore::new();
        let path = Path::new("/out/records.nc");
        let mut writer = store.create(path).unwrap();
        writer.add_dimension("x", Some(2)).unwrap();
        writer.add_dimension("time", None).unwrap();
        writer
            .add_variable("v", ElementType::Int, &["x".to_string(), "time".to_string()])
            .unwrap();
        for (t, values) in [(0, vec![1, 2]), (1, vec![3, 4])] {
            let slab = Hyperslab {
                start: vec![0, t],
                count: vec![2, 1],
            };
            writer.put("v", &slab, &TypedBuffer::Int(values)).unwrap();
        }
        writer.close().unwrap();

        let file = store.get(path).unwrap();
        assert_eq!(file.values("v").unwrap(), &TypedBuffer::Int(vec![1, 3, 2, 4]));
    }

    #[test]
    fn test_writer_rejects_second_unlimited_dimension() {
        let store = MemoryStore::new();
        let mut writer = store.create(Path::new("a.nc")).unwrap();
        writer.add_dimension("time", None).unwrap();
        assert!(writer.add_dimension("rec", None).is_err());
    }

    #[test]
    fn test_open_missing_file() {
        let store = MemoryStore::new();
        match store.open(Path::new("/nonexistent/file.nc")) {
            Err(GridError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("Expected IO error, got {other:?}"),
        }
    }

    #[test]
    fn test_file_visible_only_after_close() {
        let store = MemoryStore::new();
        let path = Path::new("later.nc");
        let mut writer = store.create(path).unwrap();
        writer.add_dimension("x", Some(1)).unwrap();
        assert!(!store.contains(path));
        writer.close().unwrap();
        assert!(store.contains(path));
    }
}
