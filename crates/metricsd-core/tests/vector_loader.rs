//! JSON test vector loader shared by batch tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::fs;

use serde::Deserialize;

use metricsd_core::MetricRecord;

#[derive(Debug, Deserialize)]
pub struct TestVector {
    pub description: String,
    pub batch: Vec<MetricRecord>,
    #[serde(default)]
    pub expect: Option<Vec<MetricRecord>>,
    #[serde(default)]
    pub expect_error: Option<ExpectError>,
}

#[derive(Debug, Deserialize)]
pub struct ExpectError {
    pub code: String,
    #[serde(default)]
    pub details: usize,
}

pub fn load(name: &str) -> TestVector {
    let s = fs::read_to_string(format!("tests/vectors/{name}")).unwrap();
    serde_json::from_str(&s).unwrap()
}
