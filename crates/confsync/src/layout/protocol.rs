//! Protocol table: one row per configured register entry, schema chosen by
//! the addressing mode.

use serde_json::Value;

use super::table::{Cell, Row, Table};
use crate::document::{lookup, ConfigDocument};

pub const DEFAULT_MODE: &str = "rtu";

const RTU_COLUMNS: [&str; 8] = [
    "slaveId", "baud", "parity", "dataBits", "stopBits", "funcCode", "slaveAddr", "quantity",
];

const TCP_COLUMNS: [&str; 7] = [
    "ip", "port", "gateway", "funcCode", "slaveId", "slaveAddr", "quantity",
];

/// Addressing scheme of the protocol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolMode {
    Rtu,
    /// Any mode other than `"rtu"` uses the TCP schema.
    Tcp,
}

impl ProtocolMode {
    pub fn from_mode(mode: &str) -> Self {
        if mode == DEFAULT_MODE {
            ProtocolMode::Rtu
        } else {
            ProtocolMode::Tcp
        }
    }

    /// Document key holding this mode's entries.
    pub fn rows_key(self) -> &'static str {
        match self {
            ProtocolMode::Rtu => "protocol.rtuRows",
            ProtocolMode::Tcp => "protocol.tcpRows",
        }
    }

    pub fn columns(self) -> &'static [&'static str] {
        match self {
            ProtocolMode::Rtu => &RTU_COLUMNS,
            ProtocolMode::Tcp => &TCP_COLUMNS,
        }
    }
}

/// Builds the protocol table. The mode string is written verbatim as the
/// first cell of every row; an empty table collapses to the single
/// sentinel row `[mode]`.
pub fn protocol_layout(document: &ConfigDocument) -> Table {
    let mode = document.get_str("protocol.mode", DEFAULT_MODE);
    let schema = ProtocolMode::from_mode(&mode);

    let mut rows: Vec<Row> = document
        .get_array(schema.rows_key())
        .iter()
        .map(|entry| entry_row(&mode, schema, entry))
        .collect();

    if rows.is_empty() {
        rows.push(vec![Cell::text(mode)]);
    }
    Table::new(rows)
}

fn entry_row(mode: &str, schema: ProtocolMode, entry: &Value) -> Row {
    std::iter::once(Cell::text(mode))
        .chain(
            schema
                .columns()
                .iter()
                .map(|column| Cell::from_value(lookup(entry, column))),
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> ConfigDocument {
        ConfigDocument::from(value)
    }

    #[test]
    fn test_rtu_rows() {
        let table = protocol_layout(&doc(json!({
            "protocol": {
                "mode": "rtu",
                "rtuRows": [
                    {"slaveId": 1, "baud": 9600, "parity": "none", "dataBits": 8,
                     "stopBits": 1, "funcCode": 3, "slaveAddr": 100, "quantity": 2},
                    {"slaveId": 2, "baud": 19200}
                ]
            }
        })));

        assert_eq!(table.len(), 2);
        let first = &table.rows()[0];
        assert_eq!(first.len(), 9);
        assert_eq!(first[0], Cell::text("rtu"));
        assert_eq!(first[1], Cell::Number(1.into()));
        assert_eq!(first[3], Cell::text("none"));
        assert_eq!(first[8], Cell::Number(2.into()));

        let second = &table.rows()[1];
        assert_eq!(second[0], Cell::text("rtu"));
        assert_eq!(second[2], Cell::Number(19200.into()));
        assert!(second[3..].iter().all(Cell::is_empty));
    }

    #[test]
    fn test_tcp_rows_use_tcp_schema() {
        let table = protocol_layout(&doc(json!({
            "protocol": {
                "mode": "tcp",
                "rtuRows": [{"slaveId": 9}],
                "tcpRows": [{"ip": "10.0.0.5", "port": 502, "gateway": "10.0.0.1",
                             "funcCode": 4, "slaveId": 1, "slaveAddr": 0, "quantity": 10}]
            }
        })));

        assert_eq!(table.len(), 1);
        let row = &table.rows()[0];
        assert_eq!(row.len(), 8);
        assert_eq!(row[0], Cell::text("tcp"));
        assert_eq!(row[1], Cell::text("10.0.0.5"));
        assert_eq!(row[2], Cell::Number(502.into()));
        assert_eq!(row[7], Cell::Number(10.into()));
    }

    #[test]
    fn test_empty_tcp_rows_emit_sentinel() {
        let table = protocol_layout(&doc(json!({"protocol": {"mode": "tcp", "tcpRows": []}})));
        assert_eq!(table.rows(), &[vec![Cell::text("tcp")]]);
    }

    #[test]
    fn test_missing_protocol_defaults_to_rtu_sentinel() {
        let table = protocol_layout(&ConfigDocument::empty());
        assert_eq!(table.rows(), &[vec![Cell::text("rtu")]]);
    }

    #[test]
    fn test_unknown_mode_uses_tcp_schema_and_keeps_name() {
        let table = protocol_layout(&doc(json!({
            "protocol": {"mode": "ascii", "tcpRows": [{"ip": "h"}]}
        })));
        let row = &table.rows()[0];
        assert_eq!(row[0], Cell::text("ascii"));
        assert_eq!(row[1], Cell::text("h"));
        assert_eq!(row.len(), 8);
    }

    #[test]
    fn test_non_object_entry_still_produces_row() {
        let table = protocol_layout(&doc(json!({"protocol": {"rtuRows": [42]}})));
        let row = &table.rows()[0];
        assert_eq!(row[0], Cell::text("rtu"));
        assert_eq!(row.len(), 9);
        assert!(row[1..].iter().all(Cell::is_empty));
    }

    #[test]
    fn test_rows_not_an_array_emit_sentinel() {
        let table = protocol_layout(&doc(json!({"protocol": {"rtuRows": {"slaveId": 1}}})));
        assert_eq!(table.rows(), &[vec![Cell::text("rtu")]]);
    }
}
