//! Botão simulado: comandos lidos da entrada padrão.

use crossbeam_channel::{Receiver, bounded};
use std::io::BufRead;
use tracing::warn;

/// Comando digitado pelo operador.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Disparo imediato; `None` = todos os dispositivos com botão
    Trigger(Option<String>),
    Quit,
}

/// Linha vazia equivale a pressionar o botão.
pub fn parse_command(line: &str) -> Option<Command> {
    let mut parts = line.split_whitespace();
    match parts.next() {
        None => Some(Command::Trigger(None)),
        Some("trigger" | "t") => Some(Command::Trigger(parts.next().map(str::to_string))),
        Some("quit" | "q" | "exit") => Some(Command::Quit),
        Some(_) => None,
    }
}

/// Inicia a thread que lê a entrada padrão. EOF vira [`Command::Quit`].
pub fn spawn_stdin_reader() -> std::io::Result<Receiver<Command>> {
    let (tx, rx) = bounded::<Command>(16);

    std::thread::Builder::new()
        .name("stdin-button".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                match parse_command(&line) {
                    Some(cmd) => {
                        if tx.send(cmd).is_err() {
                            return;
                        }
                    }
                    None => warn!("Comando desconhecido: {line:?} (use: trigger [deviceID] | quit)"),
                }
            }
            let _ = tx.send(Command::Quit);
        })?;

    Ok(rx)
}
