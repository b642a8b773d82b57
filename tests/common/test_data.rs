//! Test data generation utilities.
//!
//! This module writes small NetCDF files with known layouts and values for
//! exercising classification, slicing and slice output.

use std::path::Path;

// Use the netcdf crate's error type directly
use netcdf::Error;
type Result<T> = std::result::Result<T, Error>;

/// Value of `temperature` at (time, lat, lon) in [`create_lat_lon_nc`].
pub fn lat_lon_value(time: usize, lat: usize, lon: usize) -> f32 {
    270.0 + (time * 100 + lat * 10 + lon) as f32
}

/// Creates a regular latitude/longitude grid with two time steps.
///
/// Layout: `time` (unlimited, 2) x `lat` (3) x `lon` (4), spacing 0.5 degrees
/// starting at 60N 20E, one `temperature` parameter in K.
pub fn create_lat_lon_nc(path: &Path) -> Result<()> {
    let mut file = netcdf::create(path)?;

    file.add_unlimited_dimension("time")?;
    file.add_dimension("lat", 3)?;
    file.add_dimension("lon", 4)?;

    file.add_attribute("Conventions", "CF-1.6")?;
    file.add_attribute("institution", "gridslice test suite")?;
    file.add_attribute("title", "Regular lat/lon test grid")?;

    {
        let mut time_var = file.add_variable::<f64>("time", &["time"])?;
        time_var.put_attribute("units", "hours since 2024-01-01 00:00:00")?;
        time_var.put_values(&[0.0, 6.0], &[0..2])?;
    }

    {
        let mut lat_var = file.add_variable::<f32>("lat", &["lat"])?;
        lat_var.put_attribute("units", "degrees_north")?;
        lat_var.put_values(&[60.0f32, 60.5, 61.0], &[..])?;
    }

    {
        let mut lon_var = file.add_variable::<f32>("lon", &["lon"])?;
        lon_var.put_attribute("units", "degrees_east")?;
        lon_var.put_values(&[20.0f32, 20.5, 21.0, 21.5], &[..])?;
    }

    let mut values = Vec::with_capacity(2 * 3 * 4);
    for t in 0..2 {
        for y in 0..3 {
            for x in 0..4 {
                values.push(lat_lon_value(t, y, x));
            }
        }
    }

    {
        let mut data_var = file.add_variable::<f32>("temperature", &["time", "lat", "lon"])?;
        data_var.put_attribute("units", "K")?;
        data_var.put_attribute("long_name", "Air temperature")?;
        data_var.put_values(&values, &[0..2, 0..3, 0..4])?;
    }

    Ok(())
}

/// Creates a pressure-level grid whose parameter lists its dimensions in
/// an unusual order.
///
/// `field` is declared as (`level`, `y`, `time`, `x`) and holds its own
/// flat row-major index. `wind` has no level dimension and is stored as
/// 16-bit integers with an integer `missing_value`.
pub fn create_leveled_nc(path: &Path) -> Result<()> {
    let mut file = netcdf::create(path)?;

    file.add_dimension("x", 2)?;
    file.add_dimension("level", 3)?;
    file.add_unlimited_dimension("time")?;
    file.add_dimension("y", 2)?;

    file.add_attribute("Conventions", "CF-1.6")?;

    {
        let mut x_var = file.add_variable::<f32>("x", &["x"])?;
        x_var.put_attribute("units", "100  km")?;
        x_var.put_values(&[0.0f32, 1.0], &[..])?;
    }

    {
        let mut y_var = file.add_variable::<f32>("y", &["y"])?;
        y_var.put_attribute("units", "100  km")?;
        y_var.put_values(&[0.0f32, 1.0], &[..])?;
    }

    {
        let mut level_var = file.add_variable::<f32>("level", &["level"])?;
        level_var.put_attribute("units", "hPa")?;
        level_var.put_values(&[1000.0f32, 850.0, 500.0], &[..])?;
    }

    {
        let mut time_var = file.add_variable::<i32>("time", &["time"])?;
        time_var.put_attribute("units", "hours since 2024-01-01 00:00:00")?;
        time_var.put_values(&[0i32, 6], &[0..2])?;
    }

    {
        let values: Vec<f32> = (0..3 * 2 * 2 * 2).map(|v| v as f32).collect();
        let mut field_var = file.add_variable::<f32>("field", &["level", "y", "time", "x"])?;
        field_var.put_attribute("units", "m")?;
        field_var.put_values(&values, &[0..3, 0..2, 0..2, 0..2])?;
    }

    {
        let values: Vec<i16> = (0..2 * 2 * 2).map(|v| v as i16 * 10).collect();
        let mut wind_var = file.add_variable::<i16>("wind", &["time", "y", "x"])?;
        wind_var.put_attribute("units", "m s-1")?;
        wind_var.put_attribute("missing_value", -999i32)?;
        wind_var.put_values(&values, &[0..2, 0..2, 0..2])?;
    }

    Ok(())
}

/// Creates a polar stereographic grid with auxiliary geographic coordinates.
pub fn create_polar_stereographic_nc(path: &Path) -> Result<()> {
    let mut file = netcdf::create(path)?;

    file.add_unlimited_dimension("time")?;
    file.add_dimension("y", 2)?;
    file.add_dimension("x", 3)?;

    file.add_attribute("Conventions", "CF-1.6")?;
    file.add_attribute("institution", "gridslice test suite")?;

    {
        let mut time_var = file.add_variable::<f64>("time", &["time"])?;
        time_var.put_attribute("units", "seconds since 1970-01-01 00:00:00")?;
        time_var.put_values(&[1_700_000_000.0], &[0..1])?;
    }

    {
        let mut x_var = file.add_variable::<f64>("x", &["x"])?;
        x_var.put_attribute("axis", "X")?;
        x_var.put_attribute("units", "m")?;
        x_var.put_values(&[-2500.0, 0.0, 2500.0], &[..])?;
    }

    {
        let mut y_var = file.add_variable::<f64>("y", &["y"])?;
        y_var.put_attribute("axis", "Y")?;
        y_var.put_attribute("units", "m")?;
        y_var.put_values(&[-2500.0, 0.0], &[..])?;
    }

    {
        let mut proj_var = file.add_variable::<i32>("stereographic", &[])?;
        proj_var.put_attribute("grid_mapping_name", "polar_stereographic")?;
        proj_var.put_attribute("straight_vertical_longitude_from_pole", 25.0f32)?;
        proj_var.put_attribute("latitude_of_projection_origin", 90.0f64)?;
        proj_var.put_attribute("standard_parallel", 60.0f64)?;
    }

    {
        let mut lon_var = file.add_variable::<f32>("longitude", &["y", "x"])?;
        lon_var.put_attribute("units", "degrees_east")?;
        lon_var.put_values(&[10.0f32, 15.0, 20.0, 11.0, 16.0, 21.0], &[.., ..])?;
    }

    {
        let mut lat_var = file.add_variable::<f32>("latitude", &["y", "x"])?;
        lat_var.put_attribute("units", "degrees_north")?;
        lat_var.put_values(&[58.0f32, 58.5, 59.0, 59.5, 60.0, 60.5], &[.., ..])?;
    }

    {
        let values: Vec<f32> = (0..6).map(|v| 1000.0 + v as f32).collect();
        let mut data_var = file.add_variable::<f32>("pressure", &["time", "y", "x"])?;
        data_var.put_attribute("units", "hPa")?;
        data_var.put_attribute("grid_mapping", "stereographic")?;
        data_var.put_values(&values, &[0..1, 0..2, 0..3])?;
    }

    Ok(())
}

/// Creates an ocean-model style grid with 2-D navigation coordinates whose
/// longitudes are all fill values.
pub fn create_degenerate_nc(path: &Path) -> Result<()> {
    let mut file = netcdf::create(path)?;

    file.add_unlimited_dimension("time_counter")?;
    file.add_dimension("y", 2)?;
    file.add_dimension("x", 3)?;

    {
        let mut time_var = file.add_variable::<f64>("time_counter", &["time_counter"])?;
        time_var.put_values(&[0.0], &[0..1])?;
    }

    {
        let mut lon_var = file.add_variable::<f32>("nav_lon", &["y", "x"])?;
        lon_var.put_attribute("standard_name", "longitude")?;
        lon_var.put_attribute("missing_value", -1.0f32)?;
        lon_var.put_values(&[-1.0f32; 6], &[.., ..])?;
    }

    {
        let mut lat_var = file.add_variable::<f32>("nav_lat", &["y", "x"])?;
        lat_var.put_attribute("standard_name", "latitude")?;
        lat_var.put_values(&[70.0f32, 70.0, 70.0, 71.0, 71.0, 71.0], &[.., ..])?;
    }

    {
        let mut sst_var = file.add_variable::<f32>("sst", &["time_counter", "y", "x"])?;
        sst_var.put_attribute("units", "degC")?;
        sst_var.put_values(&[4.0f32; 6], &[0..1, 0..2, 0..3])?;
    }

    Ok(())
}

/// Creates a file without any time dimension.
pub fn create_timeless_nc(path: &Path) -> Result<()> {
    let mut file = netcdf::create(path)?;

    file.add_dimension("y", 2)?;
    file.add_dimension("x", 2)?;

    {
        let mut y_var = file.add_variable::<f32>("y", &["y"])?;
        y_var.put_values(&[0.0f32, 1.0], &[..])?;
    }

    {
        let mut x_var = file.add_variable::<f32>("x", &["x"])?;
        x_var.put_values(&[0.0f32, 1.0], &[..])?;
    }

    {
        let mut topo_var = file.add_variable::<f32>("topography", &["y", "x"])?;
        topo_var.put_values(&[0.0f32; 4], &[.., ..])?;
    }

    Ok(())
}
