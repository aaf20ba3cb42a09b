use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use crate::modules::errors::AdminError;

/// The one account allowed into the dashboard, taken from the settings file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct SessionFile {
    email: String,
    since: u64,
}

/// Login state, opened once at startup and changed only by [`Session::login`]
/// and [`Session::logout`]. This is a convenience gate, not access control:
/// the backend does not check it.
#[derive(Debug)]
pub struct Session {
    path: PathBuf,
    user: Option<String>,
}

impl Session {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AdminError> {
        let path = path.as_ref().to_path_buf();
        let user = if path.exists() {
            let file: SessionFile = toml::from_str(&fs::read_to_string(&path)?)?;
            Some(file.email)
        } else {
            None
        };
        Ok(Self { path, user })
    }

    pub fn login(&mut self, email: &str, password: &str, credentials: &Credentials) -> Result<(), AdminError> {
        if email.trim() != credentials.email || password != credentials.password {
            warn!("Rejected login for {email}");
            return Err(AdminError::InvalidCredentials);
        }
        let since = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let file = SessionFile {
            email: credentials.email.clone(),
            since,
        };
        fs::write(&self.path, toml::to_string_pretty(&file)?)?;
        info!("Logged in as {}", credentials.email);
        self.user = Some(credentials.email.clone());
        Ok(())
    }

    /// Ends the session and removes its persisted state.
    pub fn logout(self) -> Result<(), AdminError> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        if let Some(user) = self.user {
            info!("Logged out {user}");
        }
        Ok(())
    }

    pub fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn require(&self) -> Result<&str, AdminError> {
        self.user().ok_or(AdminError::NotLoggedIn)
    }
}
