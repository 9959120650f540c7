//! Flow files.
//!
//! ```json
//! {
//!   "billing": {
//!     "ip": ["10.0.0.5:31000", "10.0.0.6:31000"],
//!     "flow": [
//!       { "type": "localCmd", "data": "mvn -q package" },
//!       { "type": "up", "data": "target/billing.jar", "data2": "/opt/billing/" },
//!       { "type": "cmd", "data": "systemctl restart billing" }
//!     ]
//!   }
//! }
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Step type names as they appear in the file.
pub const STEP_LOCAL_CMD: &str = "localCmd";
pub const STEP_UPLOAD: &str = "up";
pub const STEP_REMOTE_CMD: &str = "cmd";

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("failed to read flow file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse flow file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("flow file defines no services")]
    Empty,

    #[error("service {0}: no ip configured")]
    NoHosts(String),

    #[error("service {0}: no flow configured")]
    NoSteps(String),

    #[error("service {service}: unsupported step type {kind:?}")]
    UnknownStep { service: String, kind: String },

    #[error("service {service}: step {kind} requires {field}")]
    MissingField {
        service: String,
        kind: &'static str,
        field: &'static str,
    },

    #[error("unknown service {0}")]
    UnknownService(String),
}

/// One validated step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Run on the driver's host
    LocalCmd { command: String },
    /// Upload a local file to every host, replacing the remote path
    Upload { local_path: PathBuf, remote_path: String },
    /// Stream a command on every host
    RemoteCmd { command: String },
}

impl Step {
    pub fn kind(&self) -> &'static str {
        match self {
            Step::LocalCmd { .. } => STEP_LOCAL_CMD,
            Step::Upload { .. } => STEP_UPLOAD,
            Step::RemoteCmd { .. } => STEP_REMOTE_CMD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceFlow {
    pub hosts: Vec<String>,
    pub steps: Vec<Step>,
}

/// A validated flow file. Services iterate sorted by name.
#[derive(Debug, Clone, Default)]
pub struct FlowFile {
    services: BTreeMap<String, ServiceFlow>,
}

#[derive(Deserialize)]
struct RawService {
    #[serde(default)]
    ip: Vec<String>,
    #[serde(default)]
    flow: Vec<RawStep>,
}

#[derive(Deserialize)]
struct RawStep {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    data: String,
    #[serde(default)]
    data2: String,
}

impl FlowFile {
    pub fn load(path: &Path) -> Result<Self, FlowError> {
        let raw = std::fs::read_to_string(path).map_err(|source| FlowError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw)
    }

    /// Parse and validate. The whole file is rejected on the first problem.
    pub fn parse(raw: &str) -> Result<Self, FlowError> {
        let parsed: BTreeMap<String, RawService> = serde_json::from_str(raw)?;
        if parsed.is_empty() {
            return Err(FlowError::Empty);
        }

        let mut services = BTreeMap::new();
        for (name, raw) in parsed {
            if raw.ip.is_empty() {
                return Err(FlowError::NoHosts(name));
            }
            if raw.flow.is_empty() {
                return Err(FlowError::NoSteps(name));
            }
            let steps = raw
                .flow
                .into_iter()
                .map(|step| validate_step(&name, step))
                .collect::<Result<Vec<_>, _>>()?;
            services.insert(
                name,
                ServiceFlow {
                    hosts: raw.ip,
                    steps,
                },
            );
        }
        Ok(Self { services })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&ServiceFlow> {
        self.services.get(name)
    }

    /// Resolve a selection. `all` (or an empty selection) picks every
    /// service; the result is sorted by name with duplicates removed.
    pub fn select(
        &self,
        names: &[String],
        all: bool,
    ) -> Result<Vec<(&str, &ServiceFlow)>, FlowError> {
        if all || names.is_empty() {
            return Ok(self
                .services
                .iter()
                .map(|(name, flow)| (name.as_str(), flow))
                .collect());
        }

        let mut selected = BTreeMap::new();
        for name in names {
            let (key, flow) = self
                .services
                .get_key_value(name)
                .ok_or_else(|| FlowError::UnknownService(name.clone()))?;
            selected.insert(key.as_str(), flow);
        }
        Ok(selected.into_iter().collect())
    }
}

fn validate_step(service: &str, step: RawStep) -> Result<Step, FlowError> {
    let missing = |kind, field| FlowError::MissingField {
        service: service.to_string(),
        kind,
        field,
    };

    match step.kind.as_str() {
        STEP_LOCAL_CMD if step.data.is_empty() => Err(missing(STEP_LOCAL_CMD, "data")),
        STEP_LOCAL_CMD => Ok(Step::LocalCmd { command: step.data }),
        STEP_REMOTE_CMD if step.data.is_empty() => Err(missing(STEP_REMOTE_CMD, "data")),
        STEP_REMOTE_CMD => Ok(Step::RemoteCmd { command: step.data }),
        STEP_UPLOAD if step.data.is_empty() => Err(missing(STEP_UPLOAD, "data")),
        STEP_UPLOAD if step.data2.is_empty() => Err(missing(STEP_UPLOAD, "data2")),
        STEP_UPLOAD => Ok(Step::Upload {
            local_path: step.data.into(),
            remote_path: step.data2,
        }),
        other => Err(FlowError::UnknownStep {
            service: service.to_string(),
            kind: other.to_string(),
        }),
    }
}
