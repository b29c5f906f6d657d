//! # Fleet Agent
//!
//! Simula uma frota de dispositivos IoT de borda. Cada dispositivo roda em
//! sua própria thread e envia eventos JSON via UDP ao coletor.
//!
//! ## Uso
//! ```bash
//! fleet_agent                          # Frota padrão (fleet.toml ao lado do executável)
//! fleet_agent --config frota.toml      # Configuração explícita
//! fleet_agent -d sensor_03 --verbose   # Só um dispositivo, log debug
//! fleet_agent --print-config           # Imprime a configuração padrão
//! ```
//!
//! ## Comandos (stdin)
//! - `Enter` / `trigger`: dispara os dispositivos com botão
//! - `trigger <deviceID>`: dispara um dispositivo
//! - `quit`: encerra a frota

mod button;
mod fleet;

use button::Command;
use clap::Parser;
use crossbeam_channel::Receiver;
use fleet::Fleet;
use fleet_core::config::{ConfigError, FleetConfig};
use fleet_core::{DeviceProfile, UdpConnector, MAX_ENVELOPE_BYTES};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "fleet_agent", version, about = "Simulador de frota IoT – eventos JSON via UDP")]
struct Args {
    /// Arquivo de configuração TOML
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Roda apenas os dispositivos indicados (repetível)
    #[arg(short = 'd', long = "device", value_name = "DEVICE_ID")]
    devices: Vec<String>,

    /// Log em nível debug
    #[arg(short, long)]
    verbose: bool,

    /// Imprime a configuração padrão em TOML e sai
    #[arg(long)]
    print_config: bool,

    /// Não lê comandos da entrada padrão
    #[arg(long)]
    no_stdin: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.print_config {
        return match FleetConfig::default().to_toml() {
            Ok(text) => {
                print!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{e}");
                ExitCode::FAILURE
            }
        };
    }

    // ── Logging ──
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .init();

    // ── Carregar config ──
    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("Configuração inválida: {e}");
        }
        return ExitCode::FAILURE;
    }

    let (mut profiles, bind_ip) = match config.profiles().and_then(|p| Ok((p, config.bind_addr()?))) {
        Ok(parts) => parts,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if !args.devices.is_empty() {
        for id in &args.devices {
            if !profiles.iter().any(|p| &p.device_id == id) {
                warn!("Dispositivo {id} não existe na configuração");
            }
        }
        profiles.retain(|p| args.devices.contains(&p.device_id));
    }

    print_banner(&profiles);

    // ── Agentes ──
    let connector = UdpConnector::new(bind_ip);
    let (fleet, failures) = match Fleet::launch(profiles, &connector, config.seed) {
        Ok(launched) => launched,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    if !failures.is_empty() {
        warn!("{} agente(s) não iniciaram", failures.len());
    }
    info!(
        "{} agente(s) ativos: {}",
        fleet.len(),
        fleet.device_ids().collect::<Vec<_>>().join(", ")
    );

    let summaries = if args.no_stdin {
        fleet.wait()
    } else {
        match button::spawn_stdin_reader() {
            Ok(commands) => {
                run_commands(&fleet, &commands);
                fleet.shutdown()
            }
            Err(e) => {
                warn!("Sem leitura da entrada padrão: {e}");
                fleet.wait()
            }
        }
    };

    for s in &summaries {
        info!("{}: {} enviados, {} perdidos", s.device_id, s.emitted, s.dropped);
    }
    ExitCode::SUCCESS
}

fn load_config(path: Option<&Path>) -> Result<FleetConfig, ConfigError> {
    if let Some(path) = path {
        return FleetConfig::load_strict(path);
    }

    let path = FleetConfig::default_path();
    let config = FleetConfig::load(&path);

    // Salva config padrão se não existir
    if !path.exists() {
        if let Err(e) = config.save(&path) {
            warn!("Não foi possível salvar config padrão: {e}");
        }
    }
    Ok(config)
}

fn run_commands(fleet: &Fleet, commands: &Receiver<Command>) {
    for cmd in commands.iter() {
        match cmd {
            Command::Trigger(device) => {
                let pressed = fleet.trigger(device.as_deref());
                info!("Botão pressionado: {pressed} agente(s)");
            }
            Command::Quit => {
                info!("Encerrando frota...");
                break;
            }
        }
    }
}

fn print_banner(profiles: &[DeviceProfile]) {
    println!();
    println!("══════════════════════════════════════════════");
    println!("   📡 FROTA IoT SIMULADA – ATIVA");
    println!("══════════════════════════════════════════════");
    for p in profiles {
        println!(
            "  {:<18} → {:<22} a cada {:>5.1}s{}",
            p.device_id,
            p.collector.to_string(),
            p.sampling_interval.as_secs_f64(),
            if p.triggerable { "  [botão]" } else { "" }
        );
    }
    println!("  Envelope:  JSON ≤ {MAX_ENVELOPE_BYTES} bytes");
    println!("══════════════════════════════════════════════");
    println!();
}
