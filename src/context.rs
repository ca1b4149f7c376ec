use crate::types::Project;
use crate::vfs::folder_chain;
use chrono_tz::Tz;
use eyre::Result;

/// State shared by every command of one console session.
///
/// Built once from configuration and handed to whatever needs it; nothing
/// reads it from a global.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    pub timezone: Tz,
    /// Current address of the remote file browser.
    pub address: String,
}

impl SessionContext {
    pub fn new(timezone: Tz, address: impl Into<String>) -> Self {
        Self {
            timezone,
            address: address.into(),
        }
    }

    pub fn set_timezone(&mut self, tz: Tz) {
        self.timezone = tz;
    }

    /// Move the browser to `address`; rejected unless it is absolute.
    pub fn set_address(&mut self, address: &str) -> Result<()> {
        folder_chain(address)?;
        self.address = address.to_string();
        Ok(())
    }
}

/// The project a list view hands to its detail views (offload, activities).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProjectSelection {
    pub project_id: i64,
    pub project: String,
    pub site: String,
    pub directory: Option<String>,
}

impl ProjectSelection {
    pub fn from_project(project: &Project) -> Self {
        Self {
            project_id: project.id,
            project: project.name.clone(),
            directory: Some(project.location.clone()).filter(|l| !l.is_empty()),
            ..Default::default()
        }
    }

    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = site.into();
        self
    }

    /// Where offloaded files for the selected site end up.
    pub fn target_dir(&self) -> Option<String> {
        self.directory.as_ref().map(|d| {
            if self.site.is_empty() {
                d.clone()
            } else {
                format!("{}/{}", d.trim_end_matches('/'), self.site)
            }
        })
    }
}
