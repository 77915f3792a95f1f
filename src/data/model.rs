use crate::error::FlowError;
use crate::navigation::CallEvent;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fs;

/// One scripted caller input, `after_secs` seconds after the previous one.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScriptStep {
    /// `timeout`, `hangup`, or DTMF digits.
    pub input: String,
    #[serde(default)]
    pub after_secs: u32,
}

/// A scripted call used to simulate a flow without a telephony engine.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CallScript {
    #[serde(default = "default_call_id")]
    pub call_id: String,
    pub started_at: DateTime<Utc>,
    pub steps: Vec<ScriptStep>,
}

fn default_call_id() -> String {
    "simulated-call".to_string()
}

impl CallScript {
    /// Load a script from a JSON or YAML file, chosen by extension.
    pub fn from_file(path: &str) -> Result<Self, FlowError> {
        let content = fs::read_to_string(path).map_err(|source| FlowError::Io {
            path: path.to_string(),
            source,
        })?;
        if path.ends_with(".yml") || path.ends_with(".yaml") {
            Ok(serde_yaml::from_str(&content)?)
        } else {
            Ok(serde_json::from_str(&content)?)
        }
    }

    /// Builds a script from raw inputs spaced `spacing_secs` apart.
    pub fn from_inputs<I, S>(started_at: DateTime<Utc>, inputs: I, spacing_secs: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            call_id: default_call_id(),
            started_at,
            steps: inputs
                .into_iter()
                .map(|input| ScriptStep {
                    input: input.into(),
                    after_secs: spacing_secs,
                })
                .collect(),
        }
    }

    /// Parsed events with their absolute timestamps. Unparseable inputs are skipped with a warning.
    pub fn events(&self) -> Vec<(DateTime<Utc>, CallEvent)> {
        let mut at = self.started_at;
        self.steps
            .iter()
            .filter_map(|step| {
                at += Duration::seconds(i64::from(step.after_secs));
                match CallEvent::parse(&step.input) {
                    Some(event) => Some((at, event)),
                    None => {
                        tracing::warn!(input = %step.input, "Skipping unrecognized scripted input");
                        None
                    }
                }
            })
            .collect()
    }
}

impl Default for CallScript {
    /// A caller who picks option 1 on a Monday morning.
    fn default() -> Self {
        let started_at = Utc
            .with_ymd_and_hms(2024, 1, 8, 15, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self::from_inputs(started_at, ["1"], 5)
    }
}
