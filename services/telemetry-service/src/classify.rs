use std::fmt;

use crate::payload::{Payload, MISSING};
use crate::snapshot::ConnectionQuality;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataSource {
    VeepeakObd,
    ConnectionStatus,
    NetworkDiagnostics,
    DeviceStatus,
    DummyData,
}

impl DataSource {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "veepeak_obd" => Some(DataSource::VeepeakObd),
            "connection_status" => Some(DataSource::ConnectionStatus),
            "network_diagnostics" => Some(DataSource::NetworkDiagnostics),
            "device_status" => Some(DataSource::DeviceStatus),
            "dummy_data" => Some(DataSource::DummyData),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::VeepeakObd => "veepeak_obd",
            DataSource::ConnectionStatus => "connection_status",
            DataSource::NetworkDiagnostics => "network_diagnostics",
            DataSource::DeviceStatus => "device_status",
            DataSource::DummyData => "dummy_data",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Branch {
    Source(DataSource),
    Status,
    Raw,
}

impl Branch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Branch::Source(source) => source.as_str(),
            Branch::Status => "status",
            Branch::Raw => "raw",
        }
    }
}

pub fn classify(payload: &Payload) -> Branch {
    match payload.data_source() {
        Some(value) => value
            .as_str()
            .and_then(DataSource::parse)
            .map(Branch::Source)
            .unwrap_or(Branch::Raw),
        None if payload.get("status").is_some() => Branch::Status,
        None => Branch::Raw,
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportLine {
    pub label: &'static str,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
    pub branch: Branch,
    pub title: &'static str,
    pub device: String,
    pub data_source: String,
    pub lines: Vec<ReportLine>,
    pub dump: Option<String>,
    pub alert: bool,
}

impl Report {
    pub fn emit(&self) {
        if self.alert {
            tracing::warn!(
                device_id = %self.device,
                data_source = %self.data_source,
                branch = self.branch.as_str(),
                "{self}"
            );
        } else {
            tracing::info!(
                device_id = %self.device,
                data_source = %self.data_source,
                branch = self.branch.as_str(),
                "{self}"
            );
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        writeln!(f, "  Device: {}", self.device)?;
        write!(f, "  Data Source: {}", self.data_source)?;
        for line in &self.lines {
            write!(f, "\n  {}: {}", line.label, line.value)?;
        }
        if let Some(dump) = &self.dump {
            write!(f, "\n{dump}")?;
        }
        Ok(())
    }
}

struct ReportBuilder<'a> {
    payload: &'a Payload,
    lines: Vec<ReportLine>,
    alert: bool,
}

impl<'a> ReportBuilder<'a> {
    fn new(payload: &'a Payload) -> Self {
        Self {
            payload,
            lines: Vec::new(),
            alert: false,
        }
    }

    fn push(&mut self, label: &'static str, value: impl Into<String>) -> &mut Self {
        self.lines.push(ReportLine {
            label,
            value: value.into(),
        });
        self
    }

    fn field(&mut self, label: &'static str, key: &str) -> &mut Self {
        let value = self.payload.display(key);
        self.push(label, value)
    }

    fn field_with_unit(&mut self, label: &'static str, key: &str, unit: &str) -> &mut Self {
        let value = self.payload.display_with_unit(key, unit);
        self.push(label, value)
    }

    fn optional(&mut self, label: &'static str, key: &str) -> &mut Self {
        if self.payload.is_set(key) {
            self.alert = true;
            self.field(label, key);
        }
        self
    }

    fn vehicle(&mut self) -> &mut Self {
        self.field("VIN", "vin")
            .field_with_unit("Mileage", "mileage", "km")
            .field("RPM", "rpm")
            .field_with_unit("Speed", "speed", "km/h")
            .field_with_unit("Engine Temp", "engineTemp", "°C")
            .field_with_unit("Fuel Level", "fuelLevel", "%")
            .field_with_unit("Battery", "batteryVoltage", "V")
            .field_with_unit("Data Quality", "dataQuality", "%")
    }
}

pub fn build_report(payload: &Payload) -> Report {
    let branch = classify(payload);
    let mut builder = ReportBuilder::new(payload);

    let title = match branch {
        Branch::Source(DataSource::VeepeakObd) => {
            builder.vehicle().field("Odometer PID", "odometerPID");
            "OBD vehicle data"
        }
        Branch::Source(DataSource::ConnectionStatus) => {
            builder
                .field("Status", "status")
                .field("Veepeak Connected", "veepeakConnected")
                .field_with_unit("Battery", "batteryVoltage", "V")
                .field("Boot Count", "bootCount")
                .optional("Error", "errorMessage")
                .optional("Troubleshooting", "troubleshooting");
            "Connection status"
        }
        Branch::Source(DataSource::NetworkDiagnostics) => {
            builder
                .field("Operator", "operator")
                .field("Signal", "signal")
                .field("SIM", "sim")
                .field("APN", "apn")
                .field("IP Address", "ipAddress")
                .field("Connected", "isConnected");
            "Network diagnostics"
        }
        Branch::Source(DataSource::DeviceStatus) => {
            builder
                .field("Status", "status")
                .field("Message", "message")
                .field_with_unit("Battery", "batteryVoltage", "V")
                .field("Boot Count", "bootCount");
            if payload.status() == Some("device_not_connected") {
                builder.alert = true;
                builder
                    .push("Device Issue", "OBD device not connected")
                    .push("Check", "Veepeak power and WiFi broadcast");
            }
            "Device status update"
        }
        Branch::Source(DataSource::DummyData) => {
            builder
                .vehicle()
                .push("Note", "dummy data, Veepeak device not connected");
            "Dummy vehicle data (Veepeak unavailable)"
        }
        Branch::Status => {
            let dbm = payload.signal_dbm();
            let signal = match dbm {
                Some(dbm) => format!("{dbm} dBm"),
                None => MISSING.to_string(),
            };
            builder
                .field("Status", "status")
                .field("IP", "ip")
                .field("Network", "ssid")
                .push("Signal", signal)
                .push("Connection Quality", ConnectionQuality::from_dbm(dbm).as_str());
            "WiFi status"
        }
        Branch::Raw => "Raw data",
    };

    let data_source = payload
        .data_source()
        .map(|value| match value.as_str() {
            Some(text) => text.to_string(),
            None => value.to_string(),
        })
        .unwrap_or_else(|| "Unknown".to_string());

    Report {
        branch,
        title,
        device: payload.device_id().unwrap_or_else(|| "Unknown".to_string()),
        data_source,
        lines: builder.lines,
        dump: matches!(branch, Branch::Raw).then(|| payload.pretty()),
        alert: builder.alert,
    }
}
