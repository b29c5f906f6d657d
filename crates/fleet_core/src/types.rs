//! Tipos do simulador: domínio de valores, perfil de dispositivo,
//! estado do agente e evento.
//!
//! O perfil é a configuração estática de um dispositivo simulado; o estado
//! é a parte mutável que só o agente altera a cada emissão.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

// ──────────────────────────────────────────────
// Domínio de valores
// ──────────────────────────────────────────────

/// Domínio da leitura principal de um dispositivo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueDomain {
    /// {0, 1} – porta trancada/destrancada, movimento sim/não
    Binary,
    /// {0, 1, 2} – ocioso, imprimindo, erro
    Ternary,
    /// {0, 1} alternado de forma determinística a partir de `initial`
    Toggle {
        #[serde(default)]
        initial: i64,
    },
    /// Inteiro em `[min, max]` (ppm, °C, W…)
    Range { min: i64, max: i64 },
}

impl ValueDomain {
    /// Limites inclusivos do domínio.
    pub fn bounds(&self) -> (i64, i64) {
        match *self {
            Self::Binary | Self::Toggle { .. } => (0, 1),
            Self::Ternary => (0, 2),
            Self::Range { min, max } => (min, max),
        }
    }

    pub fn contains(&self, value: i64) -> bool {
        let (min, max) = self.bounds();
        (min..=max).contains(&value)
    }
}

// ──────────────────────────────────────────────
// Formato do envelope
// ──────────────────────────────────────────────

/// Representação do campo `timestamp`.
///
/// Os dois estilos da frota convivem: segundos
/// em string e um literal ISO-8601 fixo que não reflete o instante real.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampFormat {
    /// Segundos Unix do relógio de parede, como string
    EpochSeconds,
    /// Segundos desde o início do agente, como string
    UptimeSeconds,
    /// Literal reproduzido exatamente como configurado
    Literal(String),
}

/// Valor do campo `eventType`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventTypeSpec {
    /// Rótulo fixo (`"access_control"`, `"reading"`…)
    Fixed(String),
    /// Rótulo escolhido pelo valor emitido (ex.: `["off", "on"]`)
    ByValue(Vec<String>),
}

impl EventTypeSpec {
    pub fn label(&self, value: i64) -> Option<&str> {
        match self {
            Self::Fixed(label) => Some(label.as_str()),
            Self::ByValue(labels) => usize::try_from(value)
                .ok()
                .and_then(|i| labels.get(i))
                .map(String::as_str),
        }
    }
}

/// Regra de geração de um sub-campo de `metadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldRule {
    /// Leitura principal já ajustada pela política
    Reading,
    /// Valor secundário sorteado em `[min, max]`, sem restrição de repetição
    Range { min: i64, max: i64 },
    /// Contador de eventos com zeros à esquerda
    Counter {
        #[serde(default = "default_counter_width")]
        width: usize,
    },
}

fn default_counter_width() -> usize {
    3
}

/// Sub-campo `key:<prefix><valor><suffix>` dentro de `metadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub key: String,
    pub rule: FieldRule,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub prefix: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub suffix: String,
}

impl FieldSpec {
    pub fn new(key: &str, rule: FieldRule) -> Self {
        Self {
            key: key.into(),
            rule,
            prefix: String::new(),
            suffix: String::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_suffix(mut self, suffix: &str) -> Self {
        self.suffix = suffix.into();
        self
    }
}

/// Forma do envelope JSON enviado pelo dispositivo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnvelopeLayout {
    /// `{"deviceID","timestamp","eventType","<key>":N}`
    Status { key: String },
    /// `{"eventID","deviceType","deviceID","timestamp","eventType","location","metadata"}`
    Metadata {
        event_id_prefix: String,
        device_type: String,
        location: String,
        fields: Vec<FieldSpec>,
    },
    /// `{"deviceID","timestamp","eventType","challenge","signature"}`
    Authentication { private_key: String },
}

impl EnvelopeLayout {
    /// Limites dos sub-campos sorteados, na ordem em que aparecem.
    pub fn range_fields(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        let fields: &[FieldSpec] = match self {
            Self::Metadata { fields, .. } => fields,
            _ => &[],
        };
        fields.iter().filter_map(|f| match f.rule {
            FieldRule::Range { min, max } => Some((min, max)),
            _ => None,
        })
    }
}

// ──────────────────────────────────────────────
// Perfil do dispositivo
// ──────────────────────────────────────────────

/// Violações das invariantes de um perfil.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("deviceID vazio")]
    EmptyDeviceId,

    #[error("Faixa inválida: min {min} > max {max}")]
    InvalidRange { min: i64, max: i64 },

    #[error("Estado inicial do toggle deve ser 0 ou 1 (recebido {0})")]
    InvalidToggleInitial(i64),

    #[error("Intervalo de amostragem deve ser positivo")]
    InvalidInterval,

    #[error("eventType por valor precisa cobrir [{min}, {max}] (há {labels} rótulos)")]
    EventLabels { min: i64, max: i64, labels: usize },

    #[error("Layout inválido: {0}")]
    Layout(String),
}

/// Configuração estática de um dispositivo simulado.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceProfile {
    pub device_id: String,
    pub event_type: EventTypeSpec,
    pub sampling_interval: Duration,
    pub domain: ValueDomain,
    pub timestamp: TimestampFormat,
    pub layout: EnvelopeLayout,
    /// Porta local do socket (0 = efêmera)
    pub local_port: u16,
    pub collector: SocketAddr,
    /// Acrescenta `\0` ao datagrama
    pub nul_terminated: bool,
    /// Registra datagramas recebidos do coletor
    pub listen_inbound: bool,
    /// Aceita disparo imediato fora do ciclo
    pub triggerable: bool,
}

impl DeviceProfile {
    /// Verifica as invariantes do perfil.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.device_id.trim().is_empty() {
            return Err(ProfileError::EmptyDeviceId);
        }
        if self.sampling_interval.is_zero() {
            return Err(ProfileError::InvalidInterval);
        }

        match self.domain {
            ValueDomain::Range { min, max } if min > max => {
                return Err(ProfileError::InvalidRange { min, max });
            }
            ValueDomain::Toggle { initial } if !matches!(initial, 0 | 1) => {
                return Err(ProfileError::InvalidToggleInitial(initial));
            }
            _ => {}
        }

        if let EventTypeSpec::ByValue(labels) = &self.event_type {
            let (min, max) = self.domain.bounds();
            let covered = min >= 0 && usize::try_from(max).is_ok_and(|m| m < labels.len());
            if !covered {
                return Err(ProfileError::EventLabels {
                    min,
                    max,
                    labels: labels.len(),
                });
            }
        }

        match &self.layout {
            EnvelopeLayout::Status { key } if key.is_empty() => {
                return Err(ProfileError::Layout("chave de status vazia".into()));
            }
            EnvelopeLayout::Metadata { fields, .. } => {
                if fields.is_empty() {
                    return Err(ProfileError::Layout("metadata sem campos".into()));
                }
                for (min, max) in self.layout.range_fields() {
                    if min > max {
                        return Err(ProfileError::InvalidRange { min, max });
                    }
                }
            }
            _ => {}
        }

        Ok(())
    }
}

// ──────────────────────────────────────────────
// Estado do agente
// ──────────────────────────────────────────────

/// Estado mutável de um agente. Nunca é persistido.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentState {
    /// Último valor emitido (ausente antes da primeira emissão)
    pub last_emitted: Option<i64>,
    /// Contador de eventos, começa em 1
    pub event_counter: u64,
    /// Próximo disparo agendado
    pub next_fire: Option<Instant>,
}

impl AgentState {
    pub fn new() -> Self {
        Self {
            last_emitted: None,
            event_counter: 1,
            next_fire: None,
        }
    }

    /// Registra uma emissão codificada com sucesso.
    pub(crate) fn record(&mut self, value: i64) {
        self.last_emitted = Some(value);
        self.event_counter += 1;
    }
}

impl Default for AgentState {
    fn default() -> Self {
        Self::new()
    }
}

/// Valores sorteados em um tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// Leitura principal, já ajustada
    pub value: i64,
    /// Sub-campos `Range` de `metadata`, na ordem do layout
    pub extras: Vec<i64>,
}

impl Sample {
    pub fn new(value: i64) -> Self {
        Self {
            value,
            extras: Vec::new(),
        }
    }
}

/// Instante de um tick, nas duas referências de relógio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickTime {
    pub wall: DateTime<Utc>,
    pub uptime: Duration,
}

// ──────────────────────────────────────────────
// Evento
// ──────────────────────────────────────────────

/// Registro transitório produzido a cada tick.
///
/// `preamble` são as chaves que precedem `deviceID` no JSON e `payload` as
/// que seguem `eventType`; ambos mantêm a ordem de inserção.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Event {
    pub device_id: String,
    pub timestamp: String,
    pub event_type: String,
    pub preamble: Map<String, Value>,
    pub payload: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_profile(domain: ValueDomain) -> DeviceProfile {
        DeviceProfile {
            device_id: "cctv_1".into(),
            event_type: EventTypeSpec::Fixed("cctv".into()),
            sampling_interval: Duration::from_secs(15),
            domain,
            timestamp: TimestampFormat::EpochSeconds,
            layout: EnvelopeLayout::Status {
                key: "motion".into(),
            },
            local_port: 0,
            collector: "127.0.0.1:1234".parse().unwrap(),
            nul_terminated: true,
            listen_inbound: false,
            triggerable: false,
        }
    }

    #[test]
    fn domain_bounds_are_inclusive() {
        let co2 = ValueDomain::Range { min: 400, max: 2000 };
        assert!(co2.contains(400));
        assert!(co2.contains(2000));
        assert!(!co2.contains(2500));
        assert!(ValueDomain::Ternary.contains(2));
        assert!(!ValueDomain::Binary.contains(2));
    }

    #[test]
    fn valid_profile_passes() {
        assert_eq!(status_profile(ValueDomain::Binary).validate(), Ok(()));
    }

    #[test]
    fn rejects_inverted_range() {
        let profile = status_profile(ValueDomain::Range { min: 10, max: 1 });
        assert_eq!(
            profile.validate(),
            Err(ProfileError::InvalidRange { min: 10, max: 1 })
        );
    }

    #[test]
    fn rejects_bad_toggle_initial() {
        let profile = status_profile(ValueDomain::Toggle { initial: 3 });
        assert_eq!(profile.validate(), Err(ProfileError::InvalidToggleInitial(3)));
    }

    #[test]
    fn rejects_blank_device_id_and_zero_interval() {
        let mut profile = status_profile(ValueDomain::Binary);
        profile.device_id = "  ".into();
        assert_eq!(profile.validate(), Err(ProfileError::EmptyDeviceId));

        let mut profile = status_profile(ValueDomain::Binary);
        profile.sampling_interval = Duration::ZERO;
        assert_eq!(profile.validate(), Err(ProfileError::InvalidInterval));
    }

    #[test]
    fn event_labels_must_cover_domain() {
        let mut profile = status_profile(ValueDomain::Ternary);
        profile.event_type = EventTypeSpec::ByValue(vec!["off".into(), "on".into()]);
        assert!(matches!(
            profile.validate(),
            Err(ProfileError::EventLabels { labels: 2, .. })
        ));

        profile.domain = ValueDomain::Toggle { initial: 0 };
        assert_eq!(profile.validate(), Ok(()));
        assert_eq!(profile.event_type.label(1), Some("on"));
        assert_eq!(profile.event_type.label(-1), None);
    }

    #[test]
    fn state_starts_at_counter_one() {
        let mut state = AgentState::new();
        assert_eq!(state.last_emitted, None);
        assert_eq!(state.event_counter, 1);
        state.record(1);
        assert_eq!(state.last_emitted, Some(1));
        assert_eq!(state.event_counter, 2);
    }

    #[test]
    fn layout_lists_range_fields_in_order() {
        let layout = EnvelopeLayout::Metadata {
            event_id_prefix: "light".into(),
            device_type: "light".into(),
            location: "Building B - Corridor".into(),
            fields: vec![
                FieldSpec::new("brightness", FieldRule::Range { min: 50, max: 100 }),
                FieldSpec::new("state", FieldRule::Reading),
                FieldSpec::new("energyConsumption", FieldRule::Range { min: 1, max: 10 })
                    .with_suffix("W"),
            ],
        };
        let ranges: Vec<_> = layout.range_fields().collect();
        assert_eq!(ranges, vec![(50, 100), (1, 10)]);
    }
}
