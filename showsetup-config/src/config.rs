use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sentinel used in place of a membership map for groups that only need to
/// exist.
pub const EMPTY_GROUP_SENTINEL: &str = "empty";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown division {requested:?}, configured divisions: {}", .available.join(", "))]
    UnknownDivision {
        requested: Vec<String>,
        available: Vec<String>,
    },

    #[error("No divisions are configured")]
    NoDivisions,
}

/// Provisioning templates for one division.
///
/// Every string may contain `{show}`, `{user}` and `{mdy_str}` placeholders,
/// resolved once per run. Map order is preserved from the file so streams can
/// list parents before the children that reference them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    /// Protection table lines, inserted contiguously in this order.
    #[serde(default)]
    pub permissions: Vec<String>,

    /// Group name template to membership spec.
    #[serde(default)]
    pub groups: IndexMap<String, GroupSpec>,

    /// Stream name template to stream settings.
    #[serde(default)]
    pub streams: IndexMap<String, StreamTemplate>,
}

/// Membership to merge into a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGroupSpec", into = "RawGroupSpec")]
pub enum GroupSpec {
    /// Create the group if missing, leave membership alone.
    Empty,
    /// Relation to the references to append under it.
    Members(IndexMap<Relation, Vec<MemberRef>>),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawGroupSpec {
    Sentinel(String),
    Members(IndexMap<Relation, Vec<MemberRef>>),
}

impl TryFrom<RawGroupSpec> for GroupSpec {
    type Error = String;

    fn try_from(raw: RawGroupSpec) -> Result<Self, Self::Error> {
        match raw {
            RawGroupSpec::Sentinel(value) if value == EMPTY_GROUP_SENTINEL => Ok(GroupSpec::Empty),
            RawGroupSpec::Sentinel(value) => Err(format!(
                "unexpected group spec {value:?}, expected \"{EMPTY_GROUP_SENTINEL}\" or a membership map"
            )),
            RawGroupSpec::Members(members) => Ok(GroupSpec::Members(members)),
        }
    }
}

impl From<GroupSpec> for RawGroupSpec {
    fn from(spec: GroupSpec) -> Self {
        match spec {
            GroupSpec::Empty => RawGroupSpec::Sentinel(EMPTY_GROUP_SENTINEL.to_string()),
            GroupSpec::Members(members) => RawGroupSpec::Members(members),
        }
    }
}

/// How a member relates to a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relation {
    #[serde(alias = "owners")]
    Owners,
    #[serde(alias = "users")]
    Users,
    #[serde(alias = "subgroups")]
    Subgroups,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Relation::Owners => "Owners",
            Relation::Users => "Users",
            Relation::Subgroups => "Subgroups",
        };
        f.write_str(name)
    }
}

/// A reference to add under a relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemberRef {
    /// A user or group name, added as is.
    Name(String),
    /// Several names, added in order.
    Names(Vec<String>),
    /// Expands to the users of another group (one level deep).
    Group { groups: String },
}

/// Settings for one stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamTemplate {
    #[serde(rename = "type")]
    pub stream_type: StreamType,

    /// Parent stream path template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// Stream whose contents seed the new stream, overriding the parent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

/// Perforce stream types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    Mainline,
    Development,
    Release,
    Virtual,
    Task,
    Sparsedev,
    Sparserel,
}

impl StreamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamType::Mainline => "mainline",
            StreamType::Development => "development",
            StreamType::Release => "release",
            StreamType::Virtual => "virtual",
            StreamType::Task => "task",
            StreamType::Sparsedev => "sparsedev",
            StreamType::Sparserel => "sparserel",
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StreamType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "mainline" => Ok(StreamType::Mainline),
            "development" => Ok(StreamType::Development),
            "release" => Ok(StreamType::Release),
            "virtual" => Ok(StreamType::Virtual),
            "task" => Ok(StreamType::Task),
            "sparsedev" => Ok(StreamType::Sparsedev),
            "sparserel" => Ok(StreamType::Sparserel),
            other => Err(format!("unknown stream type: {other}")),
        }
    }
}

/// Division key to provisioning templates, e.g. `VFX` or `TS`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DivisionConfigs(IndexMap<String, ProvisioningConfig>);

impl DivisionConfigs {
    pub fn get(&self, division: &str) -> Option<&ProvisioningConfig> {
        self.0.get(division)
    }

    pub fn divisions(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First requested division that is configured, compared
    /// case-insensitively. Returns the configured key.
    pub fn find<S: AsRef<str>>(&self, requested: &[S]) -> Option<(&str, &ProvisioningConfig)> {
        requested.iter().find_map(|wanted| {
            self.0
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(wanted.as_ref()))
                .map(|(key, config)| (key.as_str(), config))
        })
    }

    /// Like [`DivisionConfigs::find`], but an unmatched request is an error.
    pub fn select<S: AsRef<str>>(
        &self,
        requested: &[S],
    ) -> Result<(&str, &ProvisioningConfig), ConfigError> {
        if self.is_empty() {
            return Err(ConfigError::NoDivisions);
        }
        self.find(requested).ok_or_else(|| ConfigError::UnknownDivision {
            requested: requested.iter().map(|r| r.as_ref().to_string()).collect(),
            available: self.divisions().map(str::to_string).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TESTDIV: &str = r#"{
        "TESTDIV": {
            "permissions": [
                "write group {show} * //{show}/...## created by {user} {mdy_str}"
            ],
            "groups": {
                "{show}": "empty",
                "{show}-External": {
                    "Owners": ["tjen", ["lead1", "lead2"]],
                    "Users": [{"groups": "dnegvp_volume"}]
                }
            },
            "streams": {
                "//{show}/{show}-main": {"type": "mainline"},
                "//{show}/{show}-dev": {"type": "development", "parent": "//{show}/{show}-main"}
            }
        }
    }"#;

    #[test]
    fn test_parse_division_configs() {
        let configs: DivisionConfigs = serde_json::from_str(TESTDIV).unwrap();
        let config = configs.get("TESTDIV").unwrap();

        assert_eq!(config.permissions.len(), 1);
        assert_eq!(config.groups.get("{show}"), Some(&GroupSpec::Empty));

        let GroupSpec::Members(members) = &config.groups["{show}-External"] else {
            panic!("expected a membership map");
        };
        assert_eq!(
            members[&Relation::Owners],
            vec![
                MemberRef::Name("tjen".to_string()),
                MemberRef::Names(vec!["lead1".to_string(), "lead2".to_string()]),
            ]
        );
        assert_eq!(
            members[&Relation::Users],
            vec![MemberRef::Group {
                groups: "dnegvp_volume".to_string()
            }]
        );

        let dev = &config.streams["//{show}/{show}-dev"];
        assert_eq!(dev.stream_type, StreamType::Development);
        assert_eq!(dev.parent.as_deref(), Some("//{show}/{show}-main"));
        assert_eq!(dev.branch, None);
    }

    #[test]
    fn test_stream_order_is_preserved() {
        let configs: DivisionConfigs = serde_json::from_str(TESTDIV).unwrap();
        let names: Vec<&String> = configs.get("TESTDIV").unwrap().streams.keys().collect();
        assert_eq!(names, ["//{show}/{show}-main", "//{show}/{show}-dev"]);
    }

    #[test]
    fn test_unknown_group_sentinel_is_rejected() {
        let result: Result<GroupSpec, _> = serde_json::from_str(r#""nothing""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_stream_type_is_rejected() {
        let result: Result<StreamTemplate, _> = serde_json::from_str(r#"{"type": "mainlin"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_group_spec_round_trips_as_sentinel() {
        let json = serde_json::to_string(&GroupSpec::Empty).unwrap();
        assert_eq!(json, r#""empty""#);
    }

    #[test]
    fn test_select_division() {
        let configs: DivisionConfigs = serde_json::from_str(TESTDIV).unwrap();

        let (key, _) = configs.select(&["RE", "testdiv"]).unwrap();
        assert_eq!(key, "TESTDIV");

        let err = configs.select(&["VFX"]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownDivision {
                requested: vec!["VFX".to_string()],
                available: vec!["TESTDIV".to_string()],
            }
        );
    }

    #[test]
    fn test_select_without_divisions() {
        let configs = DivisionConfigs::default();
        assert_eq!(configs.select(&["VFX"]).unwrap_err(), ConfigError::NoDivisions);
    }
}
