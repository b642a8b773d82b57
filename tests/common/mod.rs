//! Common test utilities for gridslice.
//!
//! This module provides NetCDF fixtures and assertion helpers shared by the
//! integration tests.

#![allow(dead_code)]

pub mod assertions;
pub mod test_data;
