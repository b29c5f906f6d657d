//! Política anti-repetição.
//!
//! Única máquina de estados específica de domínio: o estado é o último valor
//! emitido e a transição é função determinística de (candidato, último).

use crate::types::ValueDomain;

/// Política aplicada ao candidato antes da emissão.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatPolicy {
    /// Binário: inverte (`1 - c`) se repetir o último
    FlipIfEqual,
    /// Ternário: avança `(c + 1) mod modulus` se repetir o último
    CycleIfEqual { modulus: i64 },
    /// Ignora o candidato e nega o último (ou `initial` antes da primeira emissão)
    Toggle { initial: i64 },
    /// Métricas contínuas: repetições permitidas
    Unconstrained,
}

impl RepeatPolicy {
    /// Seleciona a política pelo domínio do perfil.
    pub fn for_domain(domain: &ValueDomain) -> Self {
        match *domain {
            ValueDomain::Binary => Self::FlipIfEqual,
            ValueDomain::Ternary => Self::CycleIfEqual { modulus: 3 },
            ValueDomain::Toggle { initial } => Self::Toggle { initial },
            ValueDomain::Range { .. } => Self::Unconstrained,
        }
    }

    /// Ajusta o candidato contra o último valor emitido.
    pub fn adjust(&self, candidate: i64, last_emitted: Option<i64>) -> i64 {
        match *self {
            Self::FlipIfEqual if last_emitted == Some(candidate) => 1 - candidate,
            Self::CycleIfEqual { modulus } if last_emitted == Some(candidate) => {
                (candidate + 1).rem_euclid(modulus)
            }
            Self::Toggle { initial } => 1 - last_emitted.unwrap_or(initial),
            _ => candidate,
        }
    }
}
