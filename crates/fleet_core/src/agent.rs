//! Agente periódico de um dispositivo simulado.
//!
//! Ciclo: `Idle → Sampling → Sending → Idle`. O próximo tick é agendado em
//! `agora + intervalo` depois do envio (atraso fixo). Não há estado terminal
//! em operação normal; o loop só termina por [`Control::Shutdown`], canal de
//! controle desconectado ou erro de configuração (`Failed`).

use crate::generator::{GenerateError, ValueSource, draw_range, generate};
use crate::policy::RepeatPolicy;
use crate::protocol::{ProtocolError, encode_envelope};
use crate::transport::{Connector, Delivery, Transport, TransportError};
use crate::types::{AgentState, DeviceProfile, ProfileError, Sample, TickTime};
use chrono::Utc;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Fase do agente.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentPhase {
    Idle,
    Sampling,
    Sending,
    Stopped,
    Failed,
}

/// Mensagens do supervisor para o agente.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Emissão imediata, fora do ciclo (botão)
    Trigger,
    /// Cancela o agente
    Shutdown,
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("{device_id}: transporte indisponível: {source}")]
    TransportUnavailable {
        device_id: String,
        #[source]
        source: TransportError,
    },

    #[error("{device_id}: perfil inválido: {source}")]
    Profile {
        device_id: String,
        #[source]
        source: ProfileError,
    },

    #[error("{device_id}: falha ao codificar envelope: {source}")]
    Encoding {
        device_id: String,
        #[source]
        source: ProtocolError,
    },

    #[error("{device_id}: falha ao gerar valor: {source}")]
    Generation {
        device_id: String,
        #[source]
        source: GenerateError,
    },
}

/// Resultado de um tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub value: i64,
    /// Contador usado neste evento
    pub counter: u64,
    pub bytes: usize,
    pub delivery: Delivery,
}

/// Totais do agente ao encerrar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSummary {
    pub device_id: String,
    pub emitted: u64,
    pub dropped: u64,
}

/// Agente de um dispositivo: dono exclusivo do transporte e do estado.
pub struct Agent<T: Transport> {
    profile: DeviceProfile,
    policy: RepeatPolicy,
    state: AgentState,
    source: Box<dyn ValueSource>,
    transport: T,
    phase: AgentPhase,
    started: Instant,
    emitted: u64,
    dropped: u64,
}

impl<T: Transport> Agent<T> {
    /// Valida o perfil e abre o transporte. Em caso de falha o agente não
    /// é criado e nunca chega a `Idle`.
    pub fn open<C>(profile: DeviceProfile, connector: &C, source: Box<dyn ValueSource>) -> Result<Self, AgentError>
    where
        C: Connector<Link = T>,
    {
        profile.validate().map_err(|source| AgentError::Profile {
            device_id: profile.device_id.clone(),
            source,
        })?;

        let transport = connector
            .open(profile.local_port, profile.collector)
            .map_err(|source| AgentError::TransportUnavailable {
                device_id: profile.device_id.clone(),
                source,
            })?;

        info!(
            "Agente {} pronto → {} a cada {:.1}s",
            profile.device_id,
            profile.collector,
            profile.sampling_interval.as_secs_f64()
        );

        Ok(Self {
            policy: RepeatPolicy::for_domain(&profile.domain),
            profile,
            state: AgentState::new(),
            source,
            transport,
            phase: AgentPhase::Idle,
            started: Instant::now(),
            emitted: 0,
            dropped: 0,
        })
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub fn phase(&self) -> AgentPhase {
        self.phase
    }

    pub fn summary(&self) -> AgentSummary {
        AgentSummary {
            device_id: self.profile.device_id.clone(),
            emitted: self.emitted,
            dropped: self.dropped,
        }
    }

    /// Instante atual nas duas referências usadas pelos timestamps.
    pub fn now(&self) -> TickTime {
        TickTime {
            wall: Utc::now(),
            uptime: self.started.elapsed(),
        }
    }

    /// Sorteia o candidato, aplica a política e sorteia os sub-campos.
    fn sample(&mut self) -> Result<Sample, GenerateError> {
        let candidate = generate(&self.profile.domain, self.source.as_mut())?;
        let value = self.policy.adjust(candidate, self.state.last_emitted);

        let extras = self
            .profile
            .layout
            .range_fields()
            .map(|(min, max)| draw_range(min, max, self.source.as_mut()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Sample { value, extras })
    }

    /// Um ciclo atômico: amostra → ajuste → codificação → envio.
    pub fn tick(&mut self, time: TickTime) -> Result<TickReport, AgentError> {
        self.phase = AgentPhase::Sampling;

        let sample = match self.sample() {
            Ok(sample) => sample,
            Err(source) => {
                self.phase = AgentPhase::Failed;
                return Err(AgentError::Generation {
                    device_id: self.profile.device_id.clone(),
                    source,
                });
            }
        };

        let frame = match encode_envelope(&self.profile, &self.state, &sample, &time) {
            Ok(frame) => frame,
            Err(source) => {
                self.phase = AgentPhase::Failed;
                return Err(AgentError::Encoding {
                    device_id: self.profile.device_id.clone(),
                    source,
                });
            }
        };

        let counter = self.state.event_counter;
        self.state.record(sample.value);

        self.phase = AgentPhase::Sending;
        let delivery = self.transport.send(&frame);
        match delivery {
            Delivery::Sent(sent) => {
                self.emitted += 1;
                info!(
                    "→ {} | {} bytes para {} | valor {} | evento #{}",
                    self.profile.device_id, sent, self.profile.collector, sample.value, counter
                );
            }
            Delivery::Dropped => {
                self.dropped += 1;
                debug!("{}: evento #{} perdido", self.profile.device_id, counter);
            }
        }

        self.phase = AgentPhase::Idle;
        Ok(TickReport {
            value: sample.value,
            counter,
            bytes: frame.len(),
            delivery,
        })
    }

    /// Registra e descarta datagramas vindos do coletor.
    fn log_inbound(&mut self) {
        if !self.profile.listen_inbound {
            return;
        }
        for msg in self.transport.drain_inbound() {
            info!(
                "{}: recebido do coletor {}: {}",
                self.profile.device_id,
                msg.from,
                String::from_utf8_lossy(&msg.data).trim_end_matches('\0')
            );
        }
    }

    fn fire(&mut self) -> Result<(), AgentError> {
        self.log_inbound();
        let time = self.now();
        self.tick(time).map(|_| ()).inspect_err(|e| error!("{e}"))
    }

    /// Loop periódico até `Shutdown` ou desconexão do canal de controle.
    pub fn run(mut self, control: &Receiver<Control>) -> Result<AgentSummary, AgentError> {
        let interval = self.profile.sampling_interval;
        let mut next_fire = Instant::now() + interval;
        self.state.next_fire = Some(next_fire);

        loop {
            let wait = next_fire.saturating_duration_since(Instant::now());
            match control.recv_timeout(wait) {
                Err(RecvTimeoutError::Timeout) => {
                    self.fire()?;
                    next_fire = Instant::now() + interval;
                    self.state.next_fire = Some(next_fire);
                }
                Ok(Control::Trigger) if self.profile.triggerable => {
                    info!("{}: disparo manual", self.profile.device_id);
                    self.fire()?;
                }
                Ok(Control::Trigger) => {
                    warn!("{}: não aceita disparo manual, ignorando", self.profile.device_id);
                }
                Ok(Control::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                    self.phase = AgentPhase::Stopped;
                    info!(
                        "Agente {} encerrado ({} enviados, {} perdidos)",
                        self.profile.device_id, self.emitted, self.dropped
                    );
                    return Ok(self.summary());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{RandomSource, ScriptedSource};
    use crate::presets;
    use crate::protocol::decode_envelope;
    use crate::transport::Inbound;
    use crate::transport::testing::{MemoryConnector, UnavailableConnector};
    use crossbeam_channel::unbounded;
    use serde_json::Value;
    use std::time::Duration;

    fn profile(config: crate::config::DeviceConfig) -> DeviceProfile {
        config.to_profile("127.0.0.1").unwrap()
    }

    #[test]
    fn unavailable_transport_never_reaches_idle() {
        let result = Agent::open(
            profile(presets::access_terminal()),
            &UnavailableConnector,
            Box::new(ScriptedSource::new(&[])),
        );
        assert!(matches!(
            result,
            Err(AgentError::TransportUnavailable { ref device_id, .. }) if device_id == "access_terminal_1"
        ));
    }

    #[test]
    fn invalid_profile_is_rejected_before_transport() {
        let mut p = profile(presets::co2_sensor());
        p.sampling_interval = Duration::ZERO;
        let (connector, _frames) = MemoryConnector::new();
        let result = Agent::open(p, &connector, Box::new(ScriptedSource::new(&[])));
        assert!(matches!(result, Err(AgentError::Profile { .. })));
    }

    #[test]
    fn binary_repeat_is_flipped_on_the_wire() {
        let (connector, frames) = MemoryConnector::new();
        let mut agent = Agent::open(
            profile(presets::access_terminal()),
            &connector,
            Box::new(ScriptedSource::new(&[0, 0])),
        )
        .unwrap();
        assert_eq!(agent.phase(), AgentPhase::Idle);

        let first = agent.tick(agent.now()).unwrap();
        let second = agent.tick(agent.now()).unwrap();
        assert_eq!((first.value, second.value), (0, 1));
        assert_eq!((first.counter, second.counter), (1, 2));
        assert_eq!(agent.state().last_emitted, Some(1));
        assert_eq!(agent.state().event_counter, 3);

        let _ = frames.recv().unwrap();
        let event = decode_envelope(&frames.recv().unwrap()).unwrap();
        assert_eq!(event.device_id, "access_terminal_1");
        assert_eq!(event.payload["status"], Value::from(1));
    }

    #[test]
    fn toggle_agent_alternates() {
        let (connector, _frames) = MemoryConnector::new();
        let mut agent = Agent::open(
            profile(presets::smart_light()),
            &connector,
            Box::new(ScriptedSource::new(&[])),
        )
        .unwrap();

        let values: Vec<i64> = (0..5).map(|_| agent.tick(agent.now()).unwrap().value).collect();
        assert_eq!(values, vec![1, 0, 1, 0, 1]);
    }

    #[test]
    fn co2_agent_fails_on_out_of_domain_draw() {
        let (connector, frames) = MemoryConnector::new();
        let mut agent = Agent::open(
            profile(presets::co2_sensor()),
            &connector,
            Box::new(ScriptedSource::new(&[2500])),
        )
        .unwrap();

        assert!(matches!(
            agent.tick(agent.now()),
            Err(AgentError::Generation {
                source: GenerateError::OutOfDomain { value: 2500, .. },
                ..
            })
        ));
        assert_eq!(agent.phase(), AgentPhase::Failed);
        assert_eq!(agent.state().event_counter, 1);
        assert!(frames.try_recv().is_err());
    }

    #[test]
    fn co2_valid_draw_passes_unchanged() {
        let (connector, frames) = MemoryConnector::new();
        let mut agent = Agent::open(
            profile(presets::co2_sensor()),
            &connector,
            Box::new(ScriptedSource::new(&[1999, 21, 1999, 21])),
        )
        .unwrap();

        assert_eq!(agent.tick(agent.now()).unwrap().value, 1999);
        assert_eq!(agent.tick(agent.now()).unwrap().value, 1999);

        let event = decode_envelope(&frames.recv().unwrap()).unwrap();
        assert_eq!(event.payload["metadata"], Value::from("co2Level:1999; temperature:21"));
    }

    #[test]
    fn overflow_marks_agent_failed() {
        let (connector, _frames) = MemoryConnector::new();
        let mut p = profile(presets::cctv());
        p.device_id = "cam".repeat(100);
        let mut agent = Agent::open(p, &connector, Box::new(RandomSource::seeded(5))).unwrap();

        assert!(matches!(agent.tick(agent.now()), Err(AgentError::Encoding { .. })));
        assert_eq!(agent.phase(), AgentPhase::Failed);
        assert_eq!(agent.state().last_emitted, None);
    }

    #[test]
    fn dropped_sends_are_counted_not_raised() {
        let (mut connector, _frames) = MemoryConnector::new();
        connector.drop_all = true;
        let mut agent = Agent::open(
            profile(presets::printer()),
            &connector,
            Box::new(RandomSource::seeded(9)),
        )
        .unwrap();

        for _ in 0..3 {
            assert_eq!(agent.tick(agent.now()).unwrap().delivery, Delivery::Dropped);
        }
        let summary = agent.summary();
        assert_eq!((summary.emitted, summary.dropped), (0, 3));
        assert_eq!(agent.state().event_counter, 4);
    }

    #[test]
    fn run_ticks_triggers_and_stops() {
        let (mut connector, frames) = MemoryConnector::new();
        connector.inbound = vec![Inbound {
            from: "127.0.0.1:9".parse().unwrap(),
            data: b"hello".to_vec(),
        }];
        let mut p = profile(presets::auth_sensor());
        p.sampling_interval = Duration::from_millis(20);
        p.listen_inbound = true;
        let agent = Agent::open(p, &connector, Box::new(RandomSource::seeded(1))).unwrap();

        let (tx, rx) = unbounded();
        let handle = std::thread::spawn(move || agent.run(&rx));

        for _ in 0..2 {
            frames.recv_timeout(Duration::from_secs(2)).unwrap();
        }
        tx.send(Control::Trigger).unwrap();
        frames.recv_timeout(Duration::from_secs(2)).unwrap();
        tx.send(Control::Shutdown).unwrap();

        let summary = handle.join().unwrap().unwrap();
        assert_eq!(summary.device_id, "device-001");
        assert!(summary.emitted >= 3);
        assert_eq!(summary.dropped, 0);
    }

    #[test]
    fn trigger_ignored_when_not_triggerable() {
        let (connector, frames) = MemoryConnector::new();
        let agent = Agent::open(
            profile(presets::cctv()),
            &connector,
            Box::new(RandomSource::seeded(2)),
        )
        .unwrap();

        let (tx, rx) = unbounded();
        tx.send(Control::Trigger).unwrap();
        tx.send(Control::Shutdown).unwrap();

        // Intervalo de 15s: nada é emitido antes do Shutdown
        let summary = agent.run(&rx).unwrap();
        assert_eq!(summary.emitted, 0);
        assert!(frames.try_recv().is_err());
    }

    #[test]
    fn disconnected_control_stops_agent() {
        let (connector, _frames) = MemoryConnector::new();
        let agent = Agent::open(
            profile(presets::printer()),
            &connector,
            Box::new(RandomSource::seeded(3)),
        )
        .unwrap();

        let (tx, rx) = unbounded::<Control>();
        drop(tx);
        assert!(agent.run(&rx).is_ok());
    }
}
