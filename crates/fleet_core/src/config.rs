//! Configuração da frota via TOML.
//!
//! Um único `fleet.toml` descreve o coletor padrão e a lista de
//! dispositivos. Campos ausentes assumem o valor padrão.

use crate::presets;
use crate::transport::{TransportError, resolve_endpoint};
use crate::types::{DeviceProfile, EnvelopeLayout, EventTypeSpec, ProfileError, TimestampFormat, ValueDomain};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Erros de configuração.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Erro ao ler {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Erro ao parsear {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Erro ao serializar configuração: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Erro ao gravar {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Dispositivo {device_id}: {source}")]
    Profile {
        device_id: String,
        #[source]
        source: ProfileError,
    },

    #[error("Dispositivo {device_id}: {source}")]
    Endpoint {
        device_id: String,
        #[source]
        source: TransportError,
    },

    #[error("Dispositivo {device_id}: intervalo inválido ({interval_secs})")]
    Interval { device_id: String, interval_secs: f64 },

    #[error("deviceID duplicado: {0}")]
    DuplicateDevice(String),

    #[error("Porta local {0} usada por mais de um dispositivo")]
    DuplicatePort(u16),

    #[error("bind_ip inválido: {0}")]
    BindIp(String),
}

/// Um dispositivo da frota, na forma em que aparece no TOML.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    pub device_id: String,
    /// Rótulo fixo ou lista indexada pelo valor emitido
    pub event_type: EventTypeSpec,
    /// Intervalo de amostragem em segundos
    pub interval_secs: f64,
    pub domain: ValueDomain,
    pub timestamp: TimestampFormat,
    pub layout: EnvelopeLayout,
    /// Porta UDP local (0 = efêmera)
    pub local_port: u16,
    /// Host do coletor (vazio = `collector_host` da frota)
    pub collector_host: String,
    /// Porta UDP do coletor
    pub collector_port: u16,
    pub nul_terminated: bool,
    pub listen_inbound: bool,
    pub triggerable: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_id: String::new(),
            event_type: EventTypeSpec::Fixed("status".into()),
            interval_secs: 15.0,
            domain: ValueDomain::Binary,
            timestamp: TimestampFormat::EpochSeconds,
            layout: EnvelopeLayout::Status {
                key: "status".into(),
            },
            local_port: 0,
            collector_host: String::new(),
            collector_port: 1234,
            nul_terminated: false,
            listen_inbound: false,
            triggerable: false,
        }
    }
}

impl DeviceConfig {
    /// Converte para um [`DeviceProfile`] validado.
    pub fn to_profile(&self, default_host: &str) -> Result<DeviceProfile, ConfigError> {
        let sampling_interval = Duration::try_from_secs_f64(self.interval_secs)
            .ok()
            .filter(|d| !d.is_zero())
            .ok_or_else(|| ConfigError::Interval {
                device_id: self.device_id.clone(),
                interval_secs: self.interval_secs,
            })?;

        let host = if self.collector_host.is_empty() {
            default_host
        } else {
            &self.collector_host
        };
        let collector =
            resolve_endpoint(host, self.collector_port).map_err(|source| ConfigError::Endpoint {
                device_id: self.device_id.clone(),
                source,
            })?;

        let profile = DeviceProfile {
            device_id: self.device_id.clone(),
            event_type: self.event_type.clone(),
            sampling_interval,
            domain: self.domain,
            timestamp: self.timestamp.clone(),
            layout: self.layout.clone(),
            local_port: self.local_port,
            collector,
            nul_terminated: self.nul_terminated,
            listen_inbound: self.listen_inbound,
            triggerable: self.triggerable,
        };

        profile.validate().map_err(|source| ConfigError::Profile {
            device_id: self.device_id.clone(),
            source,
        })?;
        Ok(profile)
    }
}

/// Configuração raiz da frota.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FleetConfig {
    /// Host padrão do coletor (IP literal ou nome)
    pub collector_host: String,
    /// IP local para bind (vazio = auto)
    pub bind_ip: String,
    /// Semente do gerador (ausente = entropia do sistema)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub devices: Vec<DeviceConfig>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            collector_host: "::1".into(),
            bind_ip: String::new(),
            seed: None,
            devices: presets::default_fleet(),
        }
    }
}

impl FleetConfig {
    /// Carrega configuração de um arquivo TOML, caindo no padrão se não
    /// existir ou estiver inválido.
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match Self::load_strict(path) {
                Ok(config) => {
                    info!("Configuração carregada de {}", path.display());
                    return config;
                }
                Err(e) => warn!("{e}"),
            }
        }

        info!("Usando configuração padrão");
        FleetConfig::default()
    }

    /// Carrega configuração de um arquivo TOML, propagando qualquer erro.
    pub fn load_strict(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Salva configuração em arquivo TOML.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Configuração salva em {}", path.display());
        Ok(())
    }

    /// Retorna o caminho padrão do fleet.toml.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .map(|p| p.parent().unwrap_or(Path::new(".")).to_path_buf())
            .unwrap_or_else(|_| PathBuf::from("."));
        exe_dir.join("fleet.toml")
    }

    pub fn bind_addr(&self) -> Result<Option<IpAddr>, ConfigError> {
        let ip = self.bind_ip.trim();
        if ip.is_empty() {
            return Ok(None);
        }
        ip.parse()
            .map(Some)
            .map_err(|_| ConfigError::BindIp(self.bind_ip.clone()))
    }

    /// Perfis validados de todos os dispositivos.
    pub fn profiles(&self) -> Result<Vec<DeviceProfile>, ConfigError> {
        let mut ids = HashSet::new();
        let mut ports = HashSet::new();
        let mut profiles = Vec::with_capacity(self.devices.len());

        for device in &self.devices {
            if !ids.insert(device.device_id.as_str()) {
                return Err(ConfigError::DuplicateDevice(device.device_id.clone()));
            }
            if device.local_port != 0 && !ports.insert(device.local_port) {
                return Err(ConfigError::DuplicatePort(device.local_port));
            }
            profiles.push(device.to_profile(&self.collector_host)?);
        }

        Ok(profiles)
    }

    /// Valida a configuração e retorna lista de erros.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if let Err(e) = self.bind_addr() {
            errors.push(e.to_string());
        }
        if self.devices.is_empty() {
            errors.push("Nenhum dispositivo configurado".into());
        }

        let mut ids = HashSet::new();
        let mut ports = HashSet::new();
        for device in &self.devices {
            if !ids.insert(device.device_id.as_str()) {
                errors.push(ConfigError::DuplicateDevice(device.device_id.clone()).to_string());
            }
            if device.local_port != 0 && !ports.insert(device.local_port) {
                errors.push(ConfigError::DuplicatePort(device.local_port).to_string());
            }
            if device.collector_port == 0 {
                errors.push(format!("Porta do coletor de {} não pode ser 0", device.device_id));
            }
            if !(0.1..=3600.0).contains(&device.interval_secs) {
                errors.push(format!(
                    "Intervalo de {} inválido: {} (0.1–3600.0)",
                    device.device_id, device.interval_secs
                ));
            } else if let Err(e) = device.to_profile(&self.collector_host) {
                errors.push(e.to_string());
            }
        }

        errors
    }
}
