//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Attack technique vocabulary shared by every component."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

/// Attack primitives understood by the execution engine.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Technique {
    SpoofData,
    InjectLoad,
    Reconnaissance,
    BlockCommand,
    ToggleDevice,
}

impl Technique {
    /// Stable label used for logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// Whether the technique writes to the grid rather than only observing it.
    pub fn is_actuating(&self) -> bool {
        !matches!(self, Technique::Reconnaissance)
    }

    /// Techniques that trigger an adaptive re-plan during AI campaigns.
    pub fn triggers_replan(&self) -> bool {
        matches!(self, Technique::SpoofData | Technique::InjectLoad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn labels_round_trip_through_from_str() {
        for technique in Technique::iter() {
            let parsed = Technique::from_str(technique.as_str()).expect("parse label");
            assert_eq!(parsed, technique);
        }
        assert_eq!(Technique::SpoofData.to_string(), "spoof_data");
    }

    #[test]
    fn only_spoof_and_load_trigger_replans() {
        let triggering: Vec<_> = Technique::iter().filter(|t| t.triggers_replan()).collect();
        assert_eq!(triggering, vec![Technique::SpoofData, Technique::InjectLoad]);
        assert!(!Technique::Reconnaissance.is_actuating());
    }
}
