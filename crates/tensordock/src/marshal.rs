//! Request marshalling.
//!
//! Write endpoints take `application/x-www-form-urlencoded` bodies where every
//! value is a string. [`DeploySpec`] renders every field; [`ModifySpec`]
//! renders only the fields that are present, since the API treats an empty
//! value differently from a missing key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TensorDockError};
use crate::models::ServerRecord;

/// Instance class discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceType {
    /// GPU-class hardware (`gpu_model`, `gpu_count`).
    Gpu,
    /// CPU-class hardware (`cpu_model`).
    Cpu,
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpu => write!(f, "gpu"),
            Self::Cpu => write!(f, "cpu"),
        }
    }
}

impl FromStr for InstanceType {
    type Err = TensorDockError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gpu" => Ok(Self::Gpu),
            "cpu" => Ok(Self::Cpu),
            other => Err(TensorDockError::Validation(format!(
                "unknown instance type: {other:?}"
            ))),
        }
    }
}

/// Ordered key/value pairs destined for a form-encoded body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormBody {
    pairs: Vec<(String, String)>,
}

impl FormBody {
    /// Empty body.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field, rendering the value with `Display`.
    pub fn push(&mut self, key: &str, value: impl fmt::Display) {
        self.pairs.push((key.to_string(), value.to_string()));
    }

    /// Append a field only when it is present.
    pub fn push_opt<T: fmt::Display>(&mut self, key: &str, value: Option<T>) {
        if let Some(value) = value {
            self.push(key, value);
        }
    }

    /// Append every field of `other`.
    pub fn extend(&mut self, other: Self) {
        self.pairs.extend(other.pairs);
    }

    /// Value of `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Field names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(k, _)| k.as_str())
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether there are no fields.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Borrow the raw pairs.
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Consume into raw pairs (used for query strings).
    pub fn into_pairs(self) -> Vec<(String, String)> {
        self.pairs
    }

    /// Encode as `application/x-www-form-urlencoded`.
    pub fn encode(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.pairs)
            .finish()
    }
}

/// Full server configuration for `deploy/single/custom`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploySpec {
    /// Server display name.
    pub name: String,
    /// Admin account user name.
    pub admin_user: String,
    /// Admin account password.
    pub admin_pass: String,
    /// `gpu` or `cpu`.
    pub instance_type: String,
    /// GPU model, used when `instance_type` is `gpu`.
    pub gpu_model: String,
    /// GPU count, used when `instance_type` is `gpu`.
    pub gpu_count: u32,
    /// CPU model, used when `instance_type` is `cpu`.
    pub cpu_model: String,
    /// Number of vCPUs.
    pub vcpus: u32,
    /// RAM in GB.
    pub ram: u32,
    /// Storage in GB.
    pub storage: u32,
    /// Storage class (`io1` or `st1`).
    pub storage_class: String,
    /// Operating system image.
    pub os: String,
    /// Location slug.
    pub location: String,
}

impl DeploySpec {
    /// Render the deploy form body.
    ///
    /// # Errors
    /// Returns [`TensorDockError::Validation`] for an unknown instance type.
    pub fn to_form(&self) -> Result<FormBody> {
        let instance_type: InstanceType = self.instance_type.parse()?;

        let mut form = FormBody::new();
        form.push("admin_user", &self.admin_user);
        form.push("admin_pass", &self.admin_pass);
        form.push("instance_type", instance_type);
        match instance_type {
            InstanceType::Gpu => {
                form.push("gpu_model", &self.gpu_model);
                form.push("gpu_count", self.gpu_count);
            }
            InstanceType::Cpu => form.push("cpu_model", &self.cpu_model),
        }
        form.push("vcpus", self.vcpus);
        form.push("ram", self.ram);
        form.push("storage", self.storage);
        form.push("storage_class", &self.storage_class);
        form.push("os", &self.os);
        form.push("location", &self.location);
        form.push("name", &self.name);

        Ok(form)
    }
}

/// Partial server configuration for `modify/single/custom`.
///
/// Absent fields are left out of the request. Note that the API has been
/// observed to reject modifications that do not restate the whole hardware
/// configuration; see [`ModifySpec::restate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifySpec {
    /// `gpu` or `cpu`.
    pub instance_type: Option<String>,
    /// GPU model.
    pub gpu_model: Option<String>,
    /// GPU count.
    pub gpu_count: Option<u32>,
    /// CPU model.
    pub cpu_model: Option<String>,
    /// Number of vCPUs.
    pub vcpus: Option<u32>,
    /// RAM in GB.
    pub ram: Option<u32>,
    /// Storage in GB.
    pub storage: Option<u32>,
}

impl ModifySpec {
    /// Fill every absent field from the server's current configuration.
    #[must_use]
    pub fn restate(self, current: &ServerRecord) -> Self {
        Self {
            instance_type: self
                .instance_type
                .or_else(|| Some(current.instance_type.clone())),
            gpu_model: self.gpu_model.or_else(|| current.gpu_model.clone()),
            gpu_count: self.gpu_count.or(current.gpu_count),
            cpu_model: self.cpu_model.or_else(|| current.cpu_model.clone()),
            vcpus: self.vcpus.or(Some(current.vcpus)),
            ram: self.ram.or(Some(current.ram)),
            storage: self.storage.or(Some(current.storage)),
        }
    }

    /// Render the present fields as a form body.
    ///
    /// A present `instance_type` limits the hardware fields to its class.
    ///
    /// # Errors
    /// Returns [`TensorDockError::Validation`] for an unknown instance type.
    pub fn to_form(&self) -> Result<FormBody> {
        let class = self
            .instance_type
            .as_deref()
            .map(str::parse::<InstanceType>)
            .transpose()?;

        let mut form = FormBody::new();
        form.push_opt("instance_type", class);
        if class != Some(InstanceType::Cpu) {
            form.push_opt("gpu_model", self.gpu_model.as_ref());
            form.push_opt("gpu_count", self.gpu_count);
        }
        if class != Some(InstanceType::Gpu) {
            form.push_opt("cpu_model", self.cpu_model.as_ref());
        }
        form.push_opt("vcpus", self.vcpus);
        form.push_opt("ram", self.ram);
        form.push_opt("storage", self.storage);

        Ok(form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const GPU_KEYS: [&str; 2] = ["gpu_model", "gpu_count"];
    const CPU_KEYS: [&str; 1] = ["cpu_model"];

    fn deploy_spec(instance_type: &str) -> DeploySpec {
        DeploySpec {
            name: "trainer".to_string(),
            admin_user: "admin".to_string(),
            admin_pass: "s3cret pass".to_string(),
            instance_type: instance_type.to_string(),
            gpu_model: "Quadro_4000".to_string(),
            gpu_count: 2,
            cpu_model: "Intel_Xeon_v4".to_string(),
            vcpus: 8,
            ram: 32,
            storage: 100,
            storage_class: "io1".to_string(),
            os: "Ubuntu 20.04 LTS".to_string(),
            location: "na-us-chi-1".to_string(),
        }
    }

    #[test]
    fn test_deploy_gpu_has_no_cpu_keys() {
        let form = deploy_spec("gpu").to_form().unwrap();
        assert!(GPU_KEYS.iter().all(|k| form.contains_key(k)));
        assert!(CPU_KEYS.iter().all(|k| !form.contains_key(k)));
        assert_eq!(form.get("gpu_count"), Some("2"));
    }

    #[test]
    fn test_deploy_cpu_has_no_gpu_keys() {
        let form = deploy_spec("cpu").to_form().unwrap();
        assert!(GPU_KEYS.iter().all(|k| !form.contains_key(k)));
        assert_eq!(form.get("cpu_model"), Some("Intel_Xeon_v4"));
    }

    #[test]
    fn test_deploy_renders_every_common_field() {
        let form = deploy_spec("gpu").to_form().unwrap();
        assert_eq!(
            form.keys().collect::<Vec<_>>(),
            vec![
                "admin_user",
                "admin_pass",
                "instance_type",
                "gpu_model",
                "gpu_count",
                "vcpus",
                "ram",
                "storage",
                "storage_class",
                "os",
                "location",
                "name",
            ]
        );
        assert_eq!(form.get("ram"), Some("32"));
    }

    #[test]
    fn test_deploy_unknown_instance_type() {
        for bad in ["tpu", "GPU", ""] {
            let err = deploy_spec(bad).to_form().unwrap_err();
            assert!(matches!(err, TensorDockError::Validation(_)), "input {bad:?}");
            assert!(err.to_string().contains("unknown instance type"));
        }
    }

    #[test]
    fn test_modify_only_ram() {
        let spec = ModifySpec {
            ram: Some(16),
            ..ModifySpec::default()
        };
        let form = spec.to_form().unwrap();
        assert_eq!(form.pairs(), &[("ram".to_string(), "16".to_string())]);
    }

    #[test]
    fn test_modify_empty_spec_renders_nothing() {
        assert!(ModifySpec::default().to_form().unwrap().is_empty());
    }

    #[test]
    fn test_modify_instance_type_selects_class() {
        let spec = ModifySpec {
            instance_type: Some("cpu".to_string()),
            gpu_model: Some("Quadro_4000".to_string()),
            gpu_count: Some(1),
            cpu_model: Some("Intel_Xeon_v4".to_string()),
            ..ModifySpec::default()
        };
        let form = spec.to_form().unwrap();
        assert_eq!(form.keys().collect::<Vec<_>>(), vec!["instance_type", "cpu_model"]);
    }

    #[test]
    fn test_modify_unknown_instance_type() {
        let spec = ModifySpec {
            instance_type: Some("quantum".to_string()),
            ..ModifySpec::default()
        };
        assert!(matches!(
            spec.to_form().unwrap_err(),
            TensorDockError::Validation(_)
        ));
    }

    #[test]
    fn test_encode_escapes_values() {
        let form = deploy_spec("cpu").to_form().unwrap();
        let encoded = form.encode();
        assert!(encoded.contains("admin_pass=s3cret+pass"));
        assert!(encoded.contains("os=Ubuntu+20.04+LTS"));
    }
}
