use serde::Deserializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use crate::basic::error::{PfResult, PowerFlowError};

// Typed records for pandapower-style network descriptions.

/// Deserializes a name that may be stored as a string or a number.
fn from_str<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let val: Value = Deserialize::deserialize(deserializer)?;
    match val {
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

fn default_true() -> bool {
    true
}

fn default_one() -> f64 {
    1.0
}

fn default_parallel() -> u32 {
    1
}

fn default_c_max() -> f64 {
    1.1
}

fn default_f_hz() -> f64 {
    50.0
}

/// Represents a bus in the network.
#[derive(Default, Debug, Serialize, Deserialize, Clone)]
pub struct Bus {
    pub index: i64,
    pub vn_kv: f64,
    #[serde(default = "default_true")]
    pub in_service: bool,
    #[serde(default, deserialize_with = "from_str")]
    pub name: Option<String>,
}

/// Represents a line with positive- and zero-sequence per-length parameters.
///
/// The negative-sequence parameters equal the positive-sequence ones.
#[derive(Default, Debug, Serialize, Deserialize, Clone)]
pub struct Line {
    #[serde(default)]
    pub index: i64,
    pub from_bus: i64,
    pub to_bus: i64,
    pub length_km: f64,
    pub r_ohm_per_km: f64,
    pub x_ohm_per_km: f64,
    pub c_nf_per_km: f64,
    #[serde(default)]
    pub g_us_per_km: f64,
    pub r0_ohm_per_km: f64,
    pub x0_ohm_per_km: f64,
    pub c0_nf_per_km: f64,
    #[serde(default)]
    pub g0_us_per_km: f64,
    pub max_i_ka: f64,
    #[serde(default = "default_one")]
    pub df: f64,
    #[serde(default = "default_parallel")]
    pub parallel: u32,
    #[serde(default = "default_true")]
    pub in_service: bool,
    #[serde(default, deserialize_with = "from_str")]
    pub name: Option<String>,
}

/// Series impedance given in per unit of its own rating.
///
/// Transformer equivalents from a catalog arrive in this form; missing
/// zero-sequence values leave the element open in the zero-sequence network.
#[derive(Default, Debug, Serialize, Deserialize, Clone)]
pub struct Impedance {
    #[serde(default)]
    pub index: i64,
    pub from_bus: i64,
    pub to_bus: i64,
    pub rft_pu: f64,
    pub xft_pu: f64,
    pub rft0_pu: Option<f64>,
    pub xft0_pu: Option<f64>,
    pub sn_mva: f64,
    #[serde(default = "default_true")]
    pub in_service: bool,
    #[serde(default, deserialize_with = "from_str")]
    pub name: Option<String>,
}

/// Represents a shunt in the network.
///
/// `p_mw`/`q_mvar` is the consumption at rated voltage. The zero-sequence values are
/// optional; without them the shunt is absent from the zero-sequence network.
#[derive(Default, Debug, Serialize, Deserialize, Clone)]
pub struct Shunt {
    #[serde(default)]
    pub index: i64,
    pub bus: i64,
    pub p_mw: f64,
    pub q_mvar: f64,
    pub p0_mw: Option<f64>,
    pub q0_mvar: Option<f64>,
    pub vn_kv: Option<f64>,
    #[serde(default = "default_parallel")]
    pub step: u32,
    #[serde(default = "default_true")]
    pub in_service: bool,
    #[serde(default, deserialize_with = "from_str")]
    pub name: Option<String>,
}

/// Represents an external grid in the network together with its short-circuit equivalent.
#[derive(Default, Debug, Serialize, Deserialize, Clone)]
pub struct ExtGrid {
    pub bus: i64,
    #[serde(default = "default_one")]
    pub vm_pu: f64,
    #[serde(default)]
    pub va_degree: f64,
    pub s_sc_max_mva: f64,
    pub rx_max: f64,
    pub r0x0_max: Option<f64>,
    pub x0x_max: Option<f64>,
    #[serde(default = "default_c_max")]
    pub c_max: f64,
    #[serde(default = "default_true")]
    pub in_service: bool,
    #[serde(default, deserialize_with = "from_str")]
    pub name: Option<String>,
}

/// Represents a balanced load in the network; each phase carries a third of it.
#[derive(Default, Debug, Serialize, Deserialize, Clone)]
pub struct Load {
    pub bus: i64,
    pub p_mw: f64,
    pub q_mvar: f64,
    #[serde(default = "default_one")]
    pub scaling: f64,
    #[serde(default = "default_true")]
    pub in_service: bool,
    #[serde(default, deserialize_with = "from_str")]
    pub name: Option<String>,
}

/// Represents a wye-connected load with independent demand per phase.
#[derive(Default, Debug, Serialize, Deserialize, Clone)]
pub struct AsymmetricLoad {
    pub bus: i64,
    #[serde(default)]
    pub p_a_mw: f64,
    #[serde(default)]
    pub q_a_mvar: f64,
    #[serde(default)]
    pub p_b_mw: f64,
    #[serde(default)]
    pub q_b_mvar: f64,
    #[serde(default)]
    pub p_c_mw: f64,
    #[serde(default)]
    pub q_c_mvar: f64,
    #[serde(default = "default_one")]
    pub scaling: f64,
    #[serde(default = "default_true")]
    pub in_service: bool,
    #[serde(default, deserialize_with = "from_str")]
    pub name: Option<String>,
}

/// Represents a network.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Network {
    pub bus: Vec<Bus>,
    pub line: Option<Vec<Line>>,
    pub impedance: Option<Vec<Impedance>>,
    pub shunt: Option<Vec<Shunt>>,
    pub ext_grid: Option<Vec<ExtGrid>>,
    pub load: Option<Vec<Load>>,
    pub asymmetric_load: Option<Vec<AsymmetricLoad>>,
    #[serde(default = "default_f_hz")]
    pub f_hz: f64,
    #[serde(default = "default_one")]
    pub sn_mva: f64,
}

impl Default for Network {
    fn default() -> Self {
        Self {
            bus: Vec::new(),
            line: None,
            impedance: None,
            shunt: None,
            ext_grid: None,
            load: None,
            asymmetric_load: None,
            f_hz: 50.0,
            sn_mva: 1.0,
        }
    }
}

impl Network {
    /// Parses a network stored as a plain JSON object of record arrays.
    pub fn from_json_str(s: &str) -> PfResult<Network> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn to_json_string(&self) -> PfResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Loads a network stored as a plain JSON object of record arrays.
pub fn load_json<P: AsRef<Path>>(file_path: P) -> PfResult<Network> {
    Network::from_json_str(&fs::read_to_string(file_path)?)
}

fn malformed(what: impl Into<String>) -> PowerFlowError {
    PowerFlowError::Format { what: what.into() }
}

/// Macro to read network data from a json key.
macro_rules! read_json_network {
    ($net:ident, $map:ident, { $($field:ident: $key:expr),* $(,)? }) => {
        $(
            $net.$field = load_pandapower_element_json(&$map, $key)?;
        )*
    };
}

/// Reads one pandapower data frame (`orient="split"`) into typed records.
///
/// The data-frame index is passed to each record as `index`.
fn load_pandapower_element_json<T: serde::de::DeserializeOwned>(
    object: &Map<String, Value>,
    key: &str,
) -> PfResult<Option<Vec<T>>> {
    let Some(element) = object
        .get(key)
        .and_then(|v| v.as_object())
        .and_then(|v| v.get("_object"))
    else {
        return Ok(None);
    };
    let frame: Map<String, Value> = match element {
        Value::String(s) => serde_json::from_str(s)?,
        Value::Object(m) => m.clone(),
        _ => return Err(malformed(format!("table `{key}` is not a data frame"))),
    };

    let headers = frame
        .get("columns")
        .and_then(|v| v.as_array())
        .ok_or_else(|| malformed(format!("table `{key}` has no columns")))?;
    let rows = frame
        .get("data")
        .and_then(|v| v.as_array())
        .ok_or_else(|| malformed(format!("table `{key}` has no data")))?;
    let index = frame.get("index").and_then(|v| v.as_array());

    let mut elements = Vec::with_capacity(rows.len());
    for (position, row) in rows.iter().enumerate() {
        let row = row
            .as_array()
            .ok_or_else(|| malformed(format!("row {position} of `{key}` is not an array")))?;
        let mut obj: Map<String, Value> = headers
            .iter()
            .zip(row.iter())
            .filter_map(|(k, v)| k.as_str().map(|k| (k.to_string(), v.clone())))
            .collect();
        let id = index
            .and_then(|idx| idx.get(position))
            .cloned()
            .unwrap_or_else(|| Value::from(position as i64));
        obj.insert("index".to_string(), id);
        elements.push(serde_json::from_value(Value::Object(obj))?);
    }
    Ok(Some(elements))
}

/// Parses a network saved with pandapower's `to_json`.
pub fn load_pandapower_json_str(content: &str) -> PfResult<Network> {
    let map: Map<String, Value> = serde_json::from_str(content)?;
    let object = map
        .get("_object")
        .and_then(|v| v.as_object())
        .ok_or_else(|| malformed("missing `_object`"))?;

    let mut net = Network {
        bus: load_pandapower_element_json(object, "bus")?
            .ok_or_else(|| malformed("network has no bus table"))?,
        ..Default::default()
    };
    read_json_network!(net, object, {
        line: "line",
        impedance: "impedance",
        shunt: "shunt",
        ext_grid: "ext_grid",
        load: "load",
        asymmetric_load: "asymmetric_load",
    });
    if let Some(f_hz) = object.get("f_hz").and_then(|v| v.as_f64()) {
        net.f_hz = f_hz;
    }
    if let Some(sn_mva) = object.get("sn_mva").and_then(|v| v.as_f64()) {
        net.sn_mva = sn_mva;
    }
    Ok(net)
}

/// Loads a network saved with pandapower's `to_json`.
pub fn load_pandapower_json<P: AsRef<Path>>(file_path: P) -> PfResult<Network> {
    load_pandapower_json_str(&fs::read_to_string(file_path)?)
}
