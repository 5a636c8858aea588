use std::collections::HashMap;
use std::path::Path;

use crate::error::{CpError, CpResult};

/// OpenStack-style identity credentials, loaded either from an OpenRC-style
/// shell file (`export OS_USERNAME=...`) or from `OS_*` environment
/// variables. Supports both v2 (tenant-based) and v3 (project/domain-based)
/// identity.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub auth_url: String,
    pub username: String,
    pub password: Option<String>,
    pub project_name: String,
    pub project_domain_name: Option<String>,
    pub user_domain_name: Option<String>,
    pub tenant_name: Option<String>,
    pub region_name: Option<String>,
}

impl Credentials {
    /// Load from an OpenRC file: a minimal line-oriented parse of
    /// `export OS_KEY=value` / `export OS_KEY="value"` statements. This is not
    /// a shell interpreter; it handles the subset OpenRC files actually use.
    pub fn from_openrc(path: &Path) -> CpResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut vars = HashMap::new();
        for line in text.lines() {
            let line = line.trim();
            let Some(rest) = line.strip_prefix("export ") else {
                continue;
            };
            let Some((key, value)) = rest.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"').trim_matches('\'');
            vars.insert(key.trim().to_string(), value.to_string());
        }
        Self::from_map(vars)
    }

    /// Load from the process environment (`OS_*` variables).
    pub fn from_env() -> CpResult<Self> {
        let vars: HashMap<String, String> = std::env::vars()
            .filter(|(k, _)| k.starts_with("OS_"))
            .collect();
        Self::from_map(vars)
    }

    fn from_map(vars: HashMap<String, String>) -> CpResult<Self> {
        let auth_url = vars
            .get("OS_AUTH_URL")
            .cloned()
            .ok_or_else(|| CpError::Configuration("missing OS_AUTH_URL".into()))?;
        let username = vars
            .get("OS_USERNAME")
            .cloned()
            .ok_or_else(|| CpError::Configuration("missing OS_USERNAME".into()))?;
        let project_name = vars
            .get("OS_PROJECT_NAME")
            .or_else(|| vars.get("OS_TENANT_NAME"))
            .cloned()
            .ok_or_else(|| CpError::Configuration("missing OS_PROJECT_NAME/OS_TENANT_NAME".into()))?;

        let mut creds = Self {
            auth_url,
            username,
            password: vars.get("OS_PASSWORD").cloned(),
            project_name,
            project_domain_name: vars.get("OS_PROJECT_DOMAIN_NAME").cloned(),
            user_domain_name: vars.get("OS_USER_DOMAIN_NAME").cloned(),
            tenant_name: vars.get("OS_TENANT_NAME").cloned(),
            region_name: vars.get("OS_REGION_NAME").cloned(),
        };

        if creds.password.is_none() {
            creds.password = Some(Self::prompt_password(&creds.username)?);
        }

        Ok(creds)
    }

    fn prompt_password(username: &str) -> CpResult<String> {
        rpassword::prompt_password(format!("OpenStack password for {username}: "))
            .map_err(|e| CpError::Configuration(format!("failed to read password: {e}")))
    }

    /// True when v3 identity fields (project/user domain) are present.
    pub fn is_v3(&self) -> bool {
        self.project_domain_name.is_some() || self.user_domain_name.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_openrc_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "export OS_AUTH_URL=https://example.com/v3").unwrap();
        writeln!(file, "export OS_USERNAME=\"demo\"").unwrap();
        writeln!(file, "export OS_PROJECT_NAME='demo-project'").unwrap();
        writeln!(file, "export OS_PASSWORD=hunter2").unwrap();
        let creds = Credentials::from_openrc(file.path()).unwrap();
        assert_eq!(creds.auth_url, "https://example.com/v3");
        assert_eq!(creds.username, "demo");
        assert_eq!(creds.project_name, "demo-project");
        assert_eq!(creds.password.as_deref(), Some("hunter2"));
    }
}
