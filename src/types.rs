use serde::{Deserialize, Serialize};
use std::fmt;

/// A project as returned by the project endpoints.
///
/// `summary` and `root` are only present on the list view of the backend, so
/// they default to empty when a single project is fetched.
///
/// # Examples
///
/// ```rust
/// use phenomate_console::types::Project;
///
/// let json = r#"{
///     "id": 3, "name": "2024_canola", "location": "/projects/2024_canola",
///     "is_valid": true, "updated": "2024-06-01T05:00:00Z", "year": 2024,
///     "internal": true, "researcherName": null, "organisationName": "APPN"
/// }"#;
/// let p: Project = serde_json::from_str(json).unwrap();
/// assert_eq!(p.year, 2024);
/// assert_eq!(p.organisation_name.as_deref(), Some("APPN"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub location: String,
    pub is_valid: bool,
    /// Last modification instant, ISO-8601.
    pub updated: String,
    pub year: i32,
    pub internal: bool,
    #[serde(rename = "researcherName", default)]
    pub researcher_name: Option<String>,
    #[serde(rename = "organisationName", default)]
    pub organisation_name: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub root: Option<String>,
}

/// Body of `POST /api/project/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectCreate {
    pub year: i32,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    pub internal: bool,
    #[serde(rename = "researcherName", skip_serializing_if = "Option::is_none")]
    pub researcher_name: Option<String>,
    #[serde(rename = "organisationName", skip_serializing_if = "Option::is_none")]
    pub organisation_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Researcher {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organisation {
    pub name: String,
}

/// What an activity does to its file.
///
/// Unknown strings coming from a newer backend are preserved in `Other`
/// instead of failing deserialization of the whole listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityKind {
    Copy,
    Preprocess,
    Remove,
    Other(String),
}

impl ActivityKind {
    pub fn as_str(&self) -> &str {
        match self {
            ActivityKind::Copy => "COPY",
            ActivityKind::Preprocess => "PREPROC",
            ActivityKind::Remove => "REMOVE",
            ActivityKind::Other(s) => s,
        }
    }
}

impl From<String> for ActivityKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "COPY" => ActivityKind::Copy,
            "PREPROC" => ActivityKind::Preprocess,
            "REMOVE" => ActivityKind::Remove,
            _ => ActivityKind::Other(value),
        }
    }
}

impl From<ActivityKind> for String {
    fn from(value: ActivityKind) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of an activity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityStatus {
    Queued,
    Error,
    Completed,
    Other(String),
}

impl ActivityStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ActivityStatus::Queued => "QUEUED",
            ActivityStatus::Error => "ERROR",
            ActivityStatus::Completed => "COMPLETED",
            ActivityStatus::Other(s) => s,
        }
    }

    /// Whether the backend accepts a restart request for an activity in this state.
    pub fn is_restartable(&self) -> bool {
        matches!(self, ActivityStatus::Queued | ActivityStatus::Error)
    }
}

impl From<String> for ActivityStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "QUEUED" => ActivityStatus::Queued,
            "ERROR" => ActivityStatus::Error,
            "COMPLETED" => ActivityStatus::Completed,
            _ => ActivityStatus::Other(value),
        }
    }
}

impl From<ActivityStatus> for String {
    fn from(value: ActivityStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queued, running or finished offload/conversion job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,
    pub activity: ActivityKind,
    pub filename: String,
    #[serde(default)]
    pub target: Option<String>,
    pub status: ActivityStatus,
    #[serde(default)]
    pub error_log: Option<String>,
}

/// Form submitted to `POST /api/project/{id}/offload`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OffloadForm {
    pub src_files: Vec<String>,
    pub site: String,
}

impl OffloadForm {
    /// Urlencoded pairs, with one `src_files` entry per selected path.
    pub fn form_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs: Vec<(&'static str, &str)> = self
            .src_files
            .iter()
            .map(|f| ("src_files", f.as_str()))
            .collect();
        pairs.push(("site", self.site.as_str()));
        pairs
    }
}

/// One entry of a remote directory listing (`GET /api/urls/`).
///
/// `size` is the file size, or the summed size of the direct children for a
/// directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirFileItem {
    /// Absolute path, doubles as the entry's identity.
    pub id: String,
    pub name: String,
    #[serde(rename = "isDir")]
    pub is_dir: bool,
    #[serde(rename = "isHidden", default)]
    pub is_hidden: bool,
    #[serde(default)]
    pub size: f64,
    #[serde(rename = "modDate", default)]
    pub mod_date: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_kinds_round_known_and_unknown() {
        let a: Activity = serde_json::from_str(
            r#"{"id":1,"activity":"PREPROC","filename":"a.bin","target":null,
                "status":"RUNNING","error_log":""}"#,
        )
        .unwrap();
        assert_eq!(a.activity, ActivityKind::Preprocess);
        assert_eq!(a.status, ActivityStatus::Other("RUNNING".into()));
        assert_eq!(a.status.to_string(), "RUNNING");
        assert!(!a.status.is_restartable());
    }

    #[test]
    fn dir_item_uses_wire_names() {
        let item: DirFileItem = serde_json::from_str(
            r#"{"id":"/data/a.bin","name":"a.bin","isDir":false,"isHidden":false,
                "size":2048,"modDate":"2024-06-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(!item.is_dir);
        assert_eq!(item.size, 2048.0);
        assert_eq!(item.mod_date.as_deref(), Some("2024-06-01T00:00:00Z"));
    }

    #[test]
    fn offload_form_repeats_src_files() {
        let form = OffloadForm {
            src_files: vec!["/a".into(), "/b".into()],
            site: "roseworthy".into(),
        };
        assert_eq!(
            form.form_pairs(),
            vec![("src_files", "/a"), ("src_files", "/b"), ("site", "roseworthy")]
        );
    }

    #[test]
    fn project_create_skips_unset_optionals() {
        let body = ProjectCreate {
            year: 2024,
            summary: "canola".into(),
            template: None,
            internal: true,
            researcher_name: Some("Jane".into()),
            organisation_name: None,
            root: None,
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["researcherName"], "Jane");
        assert!(v.get("organisationName").is_none());
        assert!(v.get("root").is_none());
    }
}
