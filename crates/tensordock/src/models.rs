//! TensorDock API models.
//!
//! Every response type embeds an [`Envelope`]; typed payload fields sit next
//! to it at the top level of the JSON document.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// Envelope
// ============================================================================

/// The `{success, error}` pair every normalized response carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Whether the API call succeeded. Absent means `false`.
    #[serde(default)]
    pub success: bool,
    /// Error text supplied by the API, empty when none.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub error: String,
}

// ============================================================================
// Servers
// ============================================================================

/// Cost breakdown of a server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cost {
    /// Amount charged so far.
    pub charged: f64,
    /// Hourly rate while running.
    pub hour_on: f64,
    /// Hourly rate while stopped.
    pub hour_off: f64,
    /// Minutes accrued while running.
    pub minutes_on: f64,
    /// Minutes accrued while stopped.
    pub minutes_off: f64,
}

/// A named link attached to a server (e.g. `dashboard`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Target URL.
    pub href: String,
}

/// A virtual server as reported by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerRecord {
    /// Server ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Location slug (e.g. `na-us-chi-1`).
    pub location: String,
    /// Provider status, passed through verbatim.
    pub status: String,
    /// Public IP address.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub ip: String,
    /// Instance type (`gpu` or `cpu`).
    #[serde(rename = "type")]
    pub instance_type: String,
    /// CPU model, CPU instances only.
    #[serde(default)]
    pub cpu_model: Option<String>,
    /// GPU model, GPU instances only.
    #[serde(default)]
    pub gpu_model: Option<String>,
    /// GPU count, GPU instances only.
    #[serde(default)]
    pub gpu_count: Option<u32>,
    /// Number of vCPUs.
    pub vcpus: u32,
    /// RAM in GB.
    pub ram: u32,
    /// Storage in GB.
    pub storage: u32,
    /// Storage class (e.g. `io1`).
    pub storage_class: String,
    /// Cost breakdown.
    pub cost: Cost,
    /// Named links.
    #[serde(default)]
    pub links: HashMap<String, Link>,
}

impl ServerRecord {
    /// URL of the web management panel, if the API supplied one.
    pub fn dashboard_url(&self) -> Option<&str> {
        self.links.get("dashboard").map(|link| link.href.as_str())
    }
}

/// Response of `list`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListServersResponse {
    /// Envelope.
    #[serde(flatten)]
    pub envelope: Envelope,
    /// Servers keyed by ID.
    pub servers: BTreeMap<String, ServerRecord>,
}

/// Response of `get/single`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GetServerResponse {
    /// Envelope.
    #[serde(flatten)]
    pub envelope: Envelope,
    /// The server.
    pub server: ServerRecord,
}

/// Response of `deploy/status`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerStatusResponse {
    /// Envelope.
    #[serde(flatten)]
    pub envelope: Envelope,
    /// Deployment status.
    pub status: String,
}

/// Server summary returned by a deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedServer {
    /// New server ID.
    pub id: String,
    /// Public IP, when already assigned.
    #[serde(default)]
    pub ip: Option<String>,
    /// Links, as a list of single-entry maps.
    #[serde(default)]
    pub links: Vec<HashMap<String, String>>,
}

/// Response of `deploy/single/custom`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeployServerResponse {
    /// Envelope.
    #[serde(flatten)]
    pub envelope: Envelope,
    /// The deployed server.
    pub server: DeployedServer,
}

// ============================================================================
// Billing
// ============================================================================

/// Account billing details.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillingDetails {
    /// Account balance.
    pub balance: f64,
    /// Current spend per hour across all servers.
    pub hourly_spending_rate: f64,
}

/// Response of `billing`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BillingResponse {
    /// Envelope.
    #[serde(flatten)]
    pub envelope: Envelope,
    /// Billing details, inlined at the top level.
    #[serde(flatten)]
    pub details: BillingDetails,
}

// ============================================================================
// Stock
// ============================================================================

/// Sentinel the CPU stock endpoint uses for "nothing available".
pub const CPU_STOCK_NONE: &str = "None";

/// GPU availability in one region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuStock {
    /// Units deployable right now.
    pub available_now: u32,
    /// Units available by reservation.
    pub available_reserve: u32,
}

impl GpuStock {
    /// Whether anything can be deployed or reserved.
    pub fn in_stock(&self) -> bool {
        self.available_now > 0 || self.available_reserve > 0
    }
}

/// CPU availability in one region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuStock {
    /// A count, or [`CPU_STOCK_NONE`].
    #[serde(deserialize_with = "string_or_number")]
    pub available_now: String,
}

impl CpuStock {
    /// Whether the region reports anything other than the `None` sentinel.
    pub fn in_stock(&self) -> bool {
        self.available_now != CPU_STOCK_NONE
    }
}

/// Response of `stock/list`: model → region → availability.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GpuStockResponse {
    /// Envelope.
    #[serde(flatten)]
    pub envelope: Envelope,
    /// Stock by GPU model, then region.
    pub stock: BTreeMap<String, BTreeMap<String, GpuStock>>,
}

/// Response of `stock/cpu/list`: model → region → availability.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CpuStockResponse {
    /// Envelope.
    #[serde(flatten)]
    pub envelope: Envelope,
    /// Stock by CPU model, then region.
    pub stock: BTreeMap<String, BTreeMap<String, CpuStock>>,
}

// ============================================================================
// Serde helpers
// ============================================================================

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn server_json() -> serde_json::Value {
        json!({
            "id": "abc123",
            "name": "trainer",
            "location": "na-us-chi-1",
            "status": "running",
            "ip": "10.0.0.5",
            "type": "gpu",
            "cpu_model": null,
            "gpu_model": "Quadro_4000",
            "gpu_count": 1,
            "vcpus": 2,
            "ram": 4,
            "storage": 20,
            "storage_class": "io1",
            "cost": {
                "charged": 1.25,
                "hour_on": 0.5,
                "hour_off": 0.01,
                "minutes_on": 150,
                "minutes_off": 0
            },
            "links": {
                "dashboard": { "href": "https://console.tensordock.com/servers/abc123" }
            }
        })
    }

    #[test]
    fn test_server_record_deserialization() {
        let server: ServerRecord = serde_json::from_value(server_json()).unwrap();
        assert_eq!(server.instance_type, "gpu");
        assert_eq!(server.cpu_model, None);
        assert_eq!(server.gpu_count, Some(1));
        assert!((server.cost.minutes_on - 150.0).abs() < f64::EPSILON);
        assert_eq!(
            server.dashboard_url(),
            Some("https://console.tensordock.com/servers/abc123")
        );
    }

    #[test]
    fn test_server_record_missing_required_field_fails() {
        let mut value = server_json();
        value.as_object_mut().unwrap().remove("vcpus");
        assert!(serde_json::from_value::<ServerRecord>(value).is_err());
    }

    #[test]
    fn test_envelope_null_error_is_empty() {
        let envelope: Envelope = serde_json::from_value(json!({ "error": null })).unwrap();
        assert_eq!(envelope, Envelope::default());
    }

    #[test]
    fn test_billing_fields_are_inlined() {
        let billing: BillingResponse = serde_json::from_value(json!({
            "success": true,
            "balance": 42,
            "hourly_spending_rate": 0.75
        }))
        .unwrap();
        assert!(billing.envelope.success);
        assert!((billing.details.balance - 42.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_stock_availability() {
        let gpu: GpuStockResponse = serde_json::from_value(json!({
            "success": true,
            "stock": {
                "Quadro_4000": {
                    "na-us-chi-1": { "available_now": 0, "available_reserve": 3 },
                    "eu-uk-lon-1": { "available_now": 0, "available_reserve": 0 }
                }
            }
        }))
        .unwrap();
        let regions = &gpu.stock["Quadro_4000"];
        assert!(regions["na-us-chi-1"].in_stock());
        assert!(!regions["eu-uk-lon-1"].in_stock());

        let cpu: CpuStockResponse = serde_json::from_value(json!({
            "success": true,
            "stock": {
                "Intel_Xeon_v4": {
                    "na-us-chi-1": { "available_now": "None" },
                    "eu-uk-lon-1": { "available_now": 12 }
                }
            }
        }))
        .unwrap();
        let regions = &cpu.stock["Intel_Xeon_v4"];
        assert!(!regions["na-us-chi-1"].in_stock());
        assert_eq!(regions["eu-uk-lon-1"].available_now, "12");
    }
}
