//! Gerador de valores candidatos.
//!
//! Os sorteios vêm de um [`ValueSource`]; todo valor é conferido contra o
//! domínio antes de seguir para a política anti-repetição.

use crate::types::ValueDomain;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Fonte de sorteios inteiros.
pub trait ValueSource: Send {
    /// Sorteia um inteiro em `[min, max]`.
    fn draw(&mut self, min: i64, max: i64) -> i64;
}

/// Fonte pseudoaleatória padrão.
pub struct RandomSource {
    rng: StdRng,
}

impl RandomSource {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Fonte reprodutível, para simulações determinísticas.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl ValueSource for RandomSource {
    fn draw(&mut self, min: i64, max: i64) -> i64 {
        self.rng.gen_range(min..=max)
    }
}

/// Erros de geração.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerateError {
    #[error("Valor sorteado {value} fora do domínio [{min}, {max}]")]
    OutOfDomain { value: i64, min: i64, max: i64 },
}

/// Propõe um valor candidato para o domínio.
///
/// `Toggle` não sorteia nada: devolve o estado inicial e deixa a alternância
/// inteiramente para a política.
pub fn generate(domain: &ValueDomain, source: &mut dyn ValueSource) -> Result<i64, GenerateError> {
    if let ValueDomain::Toggle { initial } = *domain {
        return Ok(initial);
    }

    let (min, max) = domain.bounds();
    let value = source.draw(min, max);
    if domain.contains(value) {
        Ok(value)
    } else {
        Err(GenerateError::OutOfDomain { value, min, max })
    }
}

/// Sorteia um sub-campo de faixa.
pub fn draw_range(min: i64, max: i64, source: &mut dyn ValueSource) -> Result<i64, GenerateError> {
    generate(&ValueDomain::Range { min, max }, source)
}

/// Fonte roteirizada para testes: devolve os valores na ordem dada.
#[cfg(test)]
pub(crate) struct ScriptedSource {
    values: std::collections::VecDeque<i64>,
    pub draws: usize,
}

#[cfg(test)]
impl ScriptedSource {
    pub fn new(values: &[i64]) -> Self {
        Self {
            values: values.iter().copied().collect(),
            draws: 0,
        }
    }
}

#[cfg(test)]
impl ValueSource for ScriptedSource {
    fn draw(&mut self, _min: i64, _max: i64) -> i64 {
        self.draws += 1;
        self.values.pop_front().expect("ScriptedSource sem valores")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_range_stays_inclusive() {
        let domain = ValueDomain::Range { min: 15, max: 30 };
        let mut source = RandomSource::seeded(7);
        let mut seen_min = false;
        let mut seen_max = false;
        for _ in 0..2000 {
            let v = generate(&domain, &mut source).unwrap();
            assert!((15..=30).contains(&v));
            seen_min |= v == 15;
            seen_max |= v == 30;
        }
        assert!(seen_min && seen_max, "extremos devem ser alcançáveis");
    }

    #[test]
    fn binary_and_ternary_cover_domain() {
        let mut source = RandomSource::seeded(42);
        let mut binary = [0usize; 2];
        let mut ternary = [0usize; 3];
        for _ in 0..600 {
            binary[generate(&ValueDomain::Binary, &mut source).unwrap() as usize] += 1;
            ternary[generate(&ValueDomain::Ternary, &mut source).unwrap() as usize] += 1;
        }
        assert!(binary.iter().all(|&n| n > 0));
        assert!(ternary.iter().all(|&n| n > 0));
    }

    #[test]
    fn toggle_never_draws() {
        let mut source = ScriptedSource::new(&[]);
        let v = generate(&ValueDomain::Toggle { initial: 0 }, &mut source).unwrap();
        assert_eq!(v, 0);
        assert_eq!(source.draws, 0);
    }

    #[test]
    fn rejects_co2_draw_outside_domain() {
        let co2 = ValueDomain::Range { min: 400, max: 2000 };
        let mut source = ScriptedSource::new(&[2500, 1999]);
        assert_eq!(
            generate(&co2, &mut source),
            Err(GenerateError::OutOfDomain {
                value: 2500,
                min: 400,
                max: 2000
            })
        );
        assert_eq!(generate(&co2, &mut source), Ok(1999));
    }

    #[test]
    fn seeded_sources_are_reproducible() {
        let mut a = RandomSource::seeded(99);
        let mut b = RandomSource::seeded(99);
        let xs: Vec<i64> = (0..20).map(|_| a.draw(1, 1000)).collect();
        let ys: Vec<i64> = (0..20).map(|_| b.draw(1, 1000)).collect();
        assert_eq!(xs, ys);
    }
}
