//! Reconfiguring the wireless interface through the OS daemons.

use std::{fs, process::Command};

use log::{debug, info};

use crate::{config::ProvisioningConfig, error::NetworkCommandError};

const AP_PREFIX_LEN: u8 = 24;

/// The OS operations the provisioning flow depends on. Each call can be
/// repeated safely; callers decide whether to retry.
pub trait NetworkControl: Send + Sync + 'static {
    /// Names of the wireless networks currently in range.
    fn scan_networks(&self) -> Result<Vec<String>, NetworkCommandError>;

    /// Turns the wireless interface into the setup access point.
    fn apply_access_point_config(&self) -> Result<(), NetworkCommandError>;

    /// Hands the wireless interface back to the normal client services.
    fn restore_station_config(&self) -> Result<(), NetworkCommandError>;
}

/// Drives hostapd, dnsmasq, dhcpcd and wpa_supplicant via systemd and `ip`.
pub struct SystemNetwork {
    config: ProvisioningConfig,
}

impl SystemNetwork {
    pub fn new(config: ProvisioningConfig) -> Self {
        Self { config }
    }

    fn write(&self, path: &std::path::Path, contents: String) -> Result<(), NetworkCommandError> {
        debug!("Writing {}", path.display());
        fs::write(path, contents).map_err(|source| NetworkCommandError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl NetworkControl for SystemNetwork {
    fn scan_networks(&self) -> Result<Vec<String>, NetworkCommandError> {
        let output = run_capture("iwlist", &[&self.config.interface, "scan"])?;
        Ok(parse_essids(&output))
    }

    fn apply_access_point_config(&self) -> Result<(), NetworkCommandError> {
        let iface = self.config.interface.as_str();
        let address = format!("{}/{}", self.config.address, AP_PREFIX_LEN);
        info!(
            "Bringing up access point '{}' on {}",
            self.config.ssid, iface
        );

        self.write(&self.config.hostapd_conf, hostapd_conf(&self.config))?;
        self.write(&self.config.dnsmasq_conf, dnsmasq_conf(&self.config))?;

        run("systemctl", &["stop", "dhcpcd"])?;
        run("systemctl", &["stop", "wpa_supplicant"])?;

        run("ip", &["link", "set", iface, "down"])?;
        run("ip", &["addr", "flush", "dev", iface])?;
        run("ip", &["addr", "add", &address, "dev", iface])?;
        run("ip", &["link", "set", iface, "up"])?;

        run("systemctl", &["restart", "dnsmasq"])?;
        run("systemctl", &["unmask", "hostapd"])?;
        run("systemctl", &["restart", "hostapd"])?;
        Ok(())
    }

    fn restore_station_config(&self) -> Result<(), NetworkCommandError> {
        let iface = self.config.interface.as_str();
        info!("Restoring client networking on {}", iface);

        run("systemctl", &["stop", "hostapd"])?;
        run("systemctl", &["stop", "dnsmasq"])?;

        run("ip", &["addr", "flush", "dev", iface])?;
        run("ip", &["link", "set", iface, "down"])?;
        run("ip", &["link", "set", iface, "up"])?;

        run("systemctl", &["start", "dhcpcd"])?;
        run("systemctl", &["start", "wpa_supplicant"])?;
        Ok(())
    }
}

pub fn hostapd_conf(config: &ProvisioningConfig) -> String {
    format!(
        "interface={iface}\n\
         driver=nl80211\n\
         ssid={ssid}\n\
         hw_mode=g\n\
         channel={channel}\n\
         wmm_enabled=0\n\
         macaddr_acl=0\n\
         auth_algs=1\n\
         ignore_broadcast_ssid=0\n\
         wpa=2\n\
         wpa_passphrase={passphrase}\n\
         wpa_key_mgmt=WPA-PSK\n\
         wpa_pairwise=TKIP\n\
         rsn_pairwise=CCMP\n",
        iface = config.interface,
        ssid = config.ssid,
        channel = config.channel,
        passphrase = config.passphrase,
    )
}

/// DHCP for setup clients, and every DNS name answered with the device so
/// phones open the setup page.
pub fn dnsmasq_conf(config: &ProvisioningConfig) -> String {
    format!(
        "interface={}\ndhcp-range={}\naddress=/#/{}\n",
        config.interface, config.dhcp_range, config.address
    )
}

/// Pulls network names out of `iwlist scan` output, skipping hidden
/// networks and repeats.
pub fn parse_essids(output: &str) -> Vec<String> {
    let mut networks: Vec<String> = Vec::new();
    for line in output.lines() {
        let Some(essid) = line.trim().strip_prefix("ESSID:") else {
            continue;
        };
        let essid = essid.trim().trim_matches('"');
        if !essid.is_empty() && !networks.iter().any(|n| n == essid) {
            networks.push(essid.to_string());
        }
    }
    networks
}

fn describe(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

fn run(program: &str, args: &[&str]) -> Result<(), NetworkCommandError> {
    run_capture(program, args).map(|_| ())
}

fn run_capture(program: &str, args: &[&str]) -> Result<String, NetworkCommandError> {
    let command = describe(program, args);
    info!("Running `{}`", command);

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| NetworkCommandError::Spawn {
            command: command.clone(),
            source,
        })?;

    if !output.status.success() {
        debug!("{}", String::from_utf8_lossy(&output.stderr).trim());
        return Err(NetworkCommandError::Failed {
            command,
            status: output.status.to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
