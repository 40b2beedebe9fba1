//! Builders for configuration documents.

#![allow(dead_code)]

use serde_json::{json, Map, Value};

use confsync::ConfigDocument;

/// Builder for `ConfigDocument` instances shaped like the device editor's
/// saved state.
#[derive(Default)]
pub struct DocumentBuilder {
    root: Map<String, Value>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value at a dotted path, creating intermediate objects.
    pub fn set(mut self, path: &str, value: Value) -> Self {
        let mut segments: Vec<&str> = path.split('.').collect();
        let last = segments.pop().expect("path must not be empty");

        let mut node = &mut self.root;
        for segment in segments {
            let entry = node
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            node = entry.as_object_mut().expect("just ensured object");
        }
        node.insert(last.to_string(), value);
        self
    }

    pub fn device(self, device_type: &str, manufacturer: &str) -> Self {
        self.set("device.type", json!(device_type))
            .set("device.manufacturer", json!(manufacturer))
    }

    pub fn mode(self, mode: &str) -> Self {
        self.set("protocol.mode", json!(mode))
    }

    pub fn rtu_rows(self, rows: Vec<Value>) -> Self {
        self.set("protocol.rtuRows", Value::Array(rows))
    }

    pub fn tcp_rows(self, rows: Vec<Value>) -> Self {
        self.set("protocol.tcpRows", Value::Array(rows))
    }

    pub fn wifi(self, ssid: &str, password: &str) -> Self {
        self.set("connections.wifi.ssid", json!(ssid))
            .set("connections.wifi.password", json!(password))
    }

    pub fn broker(self, url: &str, user: &str, pass: &str) -> Self {
        self.set("connections.mqtt.broker.url", json!(url))
            .set("connections.mqtt.broker.user", json!(user))
            .set("connections.mqtt.broker.pass", json!(pass))
    }

    pub fn build(self) -> ConfigDocument {
        ConfigDocument::from(self.root)
    }
}

/// An RTU register entry with every column set.
pub fn rtu_row(slave_id: i64, slave_addr: i64) -> Value {
    json!({
        "slaveId": slave_id,
        "baud": 9600,
        "parity": "none",
        "dataBits": 8,
        "stopBits": 1,
        "funcCode": 3,
        "slaveAddr": slave_addr,
        "quantity": 2
    })
}

/// A TCP register entry with every column set.
pub fn tcp_row(ip: &str, slave_addr: i64) -> Value {
    json!({
        "ip": ip,
        "port": 502,
        "gateway": "192.168.1.1",
        "funcCode": 4,
        "slaveId": 1,
        "slaveAddr": slave_addr,
        "quantity": 1
    })
}
