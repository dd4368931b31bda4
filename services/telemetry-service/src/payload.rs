use serde::Serialize;
use serde_json::{Map, Value};

pub const MISSING: &str = "N/A";

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

impl Payload {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|value| !value.is_null())
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key).map(render_value)
    }

    pub fn non_empty_text(&self, key: &str) -> Option<String> {
        self.text(key).filter(|text| !text.trim().is_empty())
    }

    pub fn display(&self, key: &str) -> String {
        self.text(key).unwrap_or_else(|| MISSING.to_string())
    }

    pub fn display_with_unit(&self, key: &str, unit: &str) -> String {
        match self.text(key) {
            Some(text) => format!("{text} {unit}"),
            None => MISSING.to_string(),
        }
    }

    pub fn is_set(&self, key: &str) -> bool {
        match self.get(key) {
            None => false,
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(text)) => !text.trim().is_empty(),
            Some(_) => true,
        }
    }

    pub fn data_source(&self) -> Option<&Value> {
        self.get("dataSource")
    }

    pub fn status(&self) -> Option<&str> {
        self.str_field("status")
    }

    pub fn device_id(&self) -> Option<String> {
        ["deviceID", "device", "deviceName"]
            .iter()
            .find_map(|key| self.non_empty_text(key))
    }

    pub fn signal_dbm(&self) -> Option<f64> {
        ["rssi", "signal"]
            .iter()
            .find_map(|key| self.get(key).and_then(parse_dbm))
    }

    pub fn pretty(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| format!("{:?}", self.0))
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn parse_dbm(value: &Value) -> Option<f64> {
    let dbm = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => {
            let text = text.trim();
            let text = text
                .strip_suffix("dBm")
                .or_else(|| text.strip_suffix("dbm"))
                .unwrap_or(text);
            text.trim().parse::<f64>().ok()
        }
        _ => None,
    };
    dbm.filter(|dbm| dbm.is_finite())
}
