//! # Fleet Core
//!
//! Crate compartilhada do simulador de frota IoT: perfis de dispositivo,
//! geração de valores, política anti-repetição, envelope JSON, transporte
//! UDP e o agente periódico que compõe tudo isso.
//!
//! ## Módulos
//! - [`types`] – Domínio de valores, perfil, estado e evento
//! - [`generator`] – Sorteio de candidatos dentro do domínio
//! - [`policy`] – Política anti-repetição por domínio
//! - [`protocol`] – Encode/decode do envelope JSON (≤ 256 bytes)
//! - [`transport`] – Envio UDP fire-and-forget
//! - [`agent`] – Loop periódico de um dispositivo
//! - [`config`] – Configuração unificada via TOML
//! - [`presets`] – Frota padrão da simulação

pub mod types;
pub mod generator;
pub mod policy;
pub mod protocol;
pub mod transport;
pub mod agent;
pub mod config;
pub mod presets;

// Re-exports convenientes
pub use agent::{Agent, AgentError, AgentPhase, AgentSummary, Control};
pub use config::{ConfigError, DeviceConfig, FleetConfig};
pub use generator::{RandomSource, ValueSource};
pub use protocol::{MAX_ENVELOPE_BYTES, decode_envelope, encode_envelope};
pub use transport::{Connector, Delivery, Transport, UdpConnector};
pub use types::{DeviceProfile, Event, ValueDomain};
