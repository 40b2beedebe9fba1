//! Projection of a user and their configuration into the five export
//! tables. Every builder is pure and total over any document.

pub mod protocol;
pub mod table;

use crate::document::ConfigDocument;
use crate::store::User;

pub use protocol::{protocol_layout, ProtocolMode};
pub use table::{Cell, Row, Table};

pub const SETTINGS_PLACEHOLDER: &str = "No additional settings";

/// Connection fields in file order. Consumers read this file positionally.
pub const CONNECTION_FIELDS: [&str; 11] = [
    "connections.activeTab",
    "connections.wifi.ssid",
    "connections.wifi.password",
    "connections.mqtt.platform",
    "connections.mqtt.broker.url",
    "connections.mqtt.broker.user",
    "connections.mqtt.broker.pass",
    "connections.mqtt.deviceId",
    "connections.mqtt.topics.pub",
    "connections.mqtt.topics.sub",
    "connections.mqtt.topics.ack",
];

/// The five files that make up a user's export set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Artifact {
    Identity,
    Device,
    Protocol,
    Connections,
    Settings,
}

impl Artifact {
    pub const ALL: [Artifact; 5] = [
        Artifact::Identity,
        Artifact::Device,
        Artifact::Protocol,
        Artifact::Connections,
        Artifact::Settings,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            Artifact::Identity => "auth.xlsx",
            Artifact::Device => "device.xlsx",
            Artifact::Protocol => "protocol.xlsx",
            Artifact::Connections => "connections.xlsx",
            Artifact::Settings => "settings.xlsx",
        }
    }

    pub fn build(self, user: &User, document: &ConfigDocument) -> Table {
        match self {
            Artifact::Identity => identity_layout(user),
            Artifact::Device => device_layout(document),
            Artifact::Protocol => protocol_layout(document),
            Artifact::Connections => connections_layout(document),
            Artifact::Settings => settings_layout(),
        }
    }
}

impl std::fmt::Display for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.file_name())
    }
}

/// `[username], [password hash]`
pub fn identity_layout(user: &User) -> Table {
    Table::column([user.username.as_str(), user.password_hash.as_str()])
}

/// `[device.type], [device.manufacturer]`, blank when unset.
pub fn device_layout(document: &ConfigDocument) -> Table {
    Table::column(
        ["device.type", "device.manufacturer"].map(|path| Cell::leaf(document.lookup(path))),
    )
}

/// Always exactly eleven rows, see [`CONNECTION_FIELDS`].
pub fn connections_layout(document: &ConfigDocument) -> Table {
    Table::column(
        CONNECTION_FIELDS
            .iter()
            .map(|path| Cell::leaf(document.lookup(path))),
    )
}

pub fn settings_layout() -> Table {
    Table::column([SETTINGS_PLACEHOLDER])
}

/// Builds every artifact from one snapshot, in file order.
pub fn build_all(user: &User, document: &ConfigDocument) -> Vec<(Artifact, Table)> {
    Artifact::ALL
        .iter()
        .map(|artifact| (*artifact, artifact.build(user, document)))
        .collect()
}
