//! The wpa_supplicant file that doubles as the "configured" flag.

use std::{
    fs::{self, OpenOptions, Permissions},
    io::{self, Write},
    os::unix::fs::{OpenOptionsExt, PermissionsExt},
    path::{Path, PathBuf},
};

use log::{info, warn};

use crate::error::MalformedSubmission;

/// A validated network name and passphrase, safe to write into quoted
/// supplicant fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkCredentials {
    ssid: String,
    passphrase: String,
}

impl NetworkCredentials {
    pub fn new(
        ssid: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Result<Self, MalformedSubmission> {
        let ssid = ssid.into();
        let passphrase = passphrase.into();

        if ssid.is_empty() {
            return Err(MalformedSubmission::MissingSsid);
        }
        if passphrase.is_empty() {
            return Err(MalformedSubmission::MissingPassword);
        }
        if !quotable(&ssid) {
            return Err(MalformedSubmission::InvalidCharacters("network name"));
        }
        if !quotable(&passphrase) {
            return Err(MalformedSubmission::InvalidCharacters("password"));
        }

        Ok(Self { ssid, passphrase })
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    /// The full supplicant config for joining this network.
    pub fn render(&self, country: &str) -> String {
        format!(
            "ctrl_interface=DIR=/var/run/wpa_supplicant GROUP=netdev\n\
             update_config=1\n\
             country={country}\n\
             \n\
             network={{\n    \
             ssid=\"{ssid}\"\n    \
             psk=\"{psk}\"\n    \
             key_mgmt=WPA-PSK\n\
             }}\n",
            country = country,
            ssid = self.ssid,
            psk = self.passphrase,
        )
    }
}

fn quotable(value: &str) -> bool {
    !value.chars().any(|c| c == '"' || c.is_control())
}

/// The first non-empty `ssid=` value in a supplicant config.
pub fn configured_ssid(contents: &str) -> Option<String> {
    contents.lines().find_map(|line| {
        let value = line.trim().strip_prefix("ssid=")?.trim().trim_matches('"');
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Whether a usable record exists. Unreadable counts as unconfigured.
pub fn is_configured(path: &Path) -> bool {
    match fs::read_to_string(path) {
        Ok(contents) => configured_ssid(&contents).is_some(),
        Err(e) => {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Could not read {}: {}", path.display(), e);
            }
            false
        }
    }
}

/// Replaces the record atomically: the new file is fully written and
/// synced under a temporary name before it is renamed into place.
pub fn write_record(path: &Path, credentials: &NetworkCredentials, country: &str) -> io::Result<()> {
    let staging = staging_path(path);

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(&staging)?;
    file.set_permissions(Permissions::from_mode(0o600))?;
    file.write_all(credentials.render(country).as_bytes())?;
    file.sync_all()?;
    drop(file);

    fs::rename(&staging, path)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::File::open(parent)?.sync_all()?;
    }

    info!(
        "Stored credentials for '{}' in {}",
        credentials.ssid(),
        path.display()
    );
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
