//! `esaltest smoke`: VLAN and port check through the vendor library

use std::path::Path;

use serde_json::Value as Json;

use crate::common::Result;
use crate::literal::Value;
use crate::vendor::{CallResult, VendorLib};

const VLAN: i64 = 100;
const PORTS: [i64; 4] = [24, 25, 26, 5];
const ENABLED: [i64; 2] = [24, 25];
const PORT_BUFFER: usize = 512;

pub fn smoke(lib_path: &Path) -> Result<()> {
    let lib = VendorLib::open(lib_path)?;
    println!("================== Start Testing ==================");

    step(lib.call("VendorCreateVlan", &[Value::Int(VLAN)])?);

    let ports = Value::List(PORTS.iter().map(|p| Value::Int(*p)).collect());
    step(lib.call(
        "VendorAddPortsToVlan",
        &[Value::Int(VLAN), Value::Int(PORTS.len() as i64), ports],
    )?);

    for port in ENABLED {
        step(lib.call("VendorEnablePort", &[Value::Int(port)])?);
    }

    let buffer = Value::List(vec![Value::Int(0); PORT_BUFFER]);
    let result = lib.call("VendorGetPortsInVlan", &[Value::Int(VLAN), Value::Int(0), buffer])?;
    if step(result.clone()) {
        let (count, members) = vlan_members(&result);
        println!("num ports = {}", count);
        println!("ports = {:?}", members);
    }

    println!("================== Stop Testing ==================");
    Ok(())
}

/// Print `error` for a non-zero return code
fn step(result: CallResult) -> bool {
    let ok = result.rc.unwrap_or(0) == 0;
    if !ok {
        tracing::debug!("rc={:?}", result.rc);
        println!("error");
    }
    ok
}

/// Port count and the non-zero entries of the port buffer
fn vlan_members(result: &CallResult) -> (u64, Vec<u64>) {
    let count = result.field("numPorts").and_then(Json::as_u64).unwrap_or(0);
    let members = result
        .field("ports")
        .and_then(Json::as_array)
        .map(|ports| {
            ports
                .iter()
                .filter_map(Json::as_u64)
                .filter(|p| *p != 0)
                .collect()
        })
        .unwrap_or_default();
    (count, members)
}
