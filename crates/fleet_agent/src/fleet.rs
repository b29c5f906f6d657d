//! Supervisor da frota: uma thread por agente, cada uma com seu canal de
//! controle.

use crossbeam_channel::{Sender, unbounded};
use fleet_core::{Agent, AgentError, AgentSummary, Connector, Control, DeviceProfile, RandomSource, ValueSource};
use std::thread::JoinHandle;
use tracing::{error, warn};

#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    #[error("Nenhum agente pôde ser iniciado")]
    NoAgents,

    #[error("Falha ao criar thread do agente {device_id}: {source}")]
    Spawn {
        device_id: String,
        #[source]
        source: std::io::Error,
    },
}

struct AgentHandle {
    device_id: String,
    triggerable: bool,
    control: Sender<Control>,
    thread: JoinHandle<Result<AgentSummary, AgentError>>,
}

/// Agentes em execução.
pub struct Fleet {
    agents: Vec<AgentHandle>,
}

impl Fleet {
    /// Abre o transporte de cada perfil e inicia os agentes que conseguiram.
    ///
    /// Falhas de abertura não derrubam a frota: voltam na lista de erros.
    /// Com `seed`, o agente `i` usa a semente `seed + i`.
    pub fn launch<C: Connector>(
        profiles: Vec<DeviceProfile>,
        connector: &C,
        seed: Option<u64>,
    ) -> Result<(Self, Vec<AgentError>), FleetError> {
        let mut agents = Vec::with_capacity(profiles.len());
        let mut failures = Vec::new();

        for (i, profile) in profiles.into_iter().enumerate() {
            let source: Box<dyn ValueSource> = match seed {
                Some(seed) => Box::new(RandomSource::seeded(seed.wrapping_add(i as u64))),
                None => Box::new(RandomSource::from_entropy()),
            };

            let device_id = profile.device_id.clone();
            let triggerable = profile.triggerable;
            let agent = match Agent::open(profile, connector, source) {
                Ok(agent) => agent,
                Err(e) => {
                    error!("{e}");
                    failures.push(e);
                    continue;
                }
            };

            let (tx, rx) = unbounded();
            let thread = std::thread::Builder::new()
                .name(format!("agent-{device_id}"))
                .spawn(move || agent.run(&rx))
                .map_err(|source| FleetError::Spawn {
                    device_id: device_id.clone(),
                    source,
                })?;

            agents.push(AgentHandle {
                device_id,
                triggerable,
                control: tx,
                thread,
            });
        }

        if agents.is_empty() {
            return Err(FleetError::NoAgents);
        }
        Ok((Self { agents }, failures))
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn device_ids(&self) -> impl Iterator<Item = &str> {
        self.agents.iter().map(|a| a.device_id.as_str())
    }

    /// Pressiona o botão de um dispositivo, ou de todos os que aceitam
    /// disparo quando `device` é `None`. Retorna quantos receberam.
    pub fn trigger(&self, device: Option<&str>) -> usize {
        let mut pressed = 0;
        for agent in &self.agents {
            let selected = match device {
                Some(id) => agent.device_id == id,
                None => agent.triggerable,
            };
            if !selected {
                continue;
            }
            if agent.control.send(Control::Trigger).is_ok() {
                pressed += 1;
            } else {
                warn!("Agente {} não está mais ativo", agent.device_id);
            }
        }

        if pressed == 0 {
            warn!("Nenhum agente recebeu o disparo ({})", device.unwrap_or("todos"));
        }
        pressed
    }

    /// Cancela todos os agentes e aguarda o término.
    pub fn shutdown(self) -> Vec<AgentSummary> {
        for agent in &self.agents {
            let _ = agent.control.send(Control::Shutdown);
        }
        self.join_all()
    }

    /// Aguarda os agentes sem cancelá-los (só retornam por erro).
    pub fn wait(self) -> Vec<AgentSummary> {
        self.join_all()
    }

    fn join_all(self) -> Vec<AgentSummary> {
        let mut summaries = Vec::with_capacity(self.agents.len());
        for agent in self.agents {
            // Mantém o canal vivo até o join: `wait` não deve encerrar o agente
            let AgentHandle {
                device_id,
                control,
                thread,
                ..
            } = agent;
            match thread.join() {
                Ok(Ok(summary)) => summaries.push(summary),
                Ok(Err(e)) => error!("{e}"),
                Err(_) => error!("Thread do agente {device_id} entrou em pânico"),
            }
            drop(control);
        }
        summaries
    }
}
