//! Envelope JSON dos eventos.
//!
//! Cada datagrama carrega um único objeto JSON compacto (UTF-8) com ordem de
//! chaves fixa por layout:
//!
//! ```text
//! Status:         {"deviceID","timestamp","eventType","<key>":N}
//! Metadata:       {"eventID","deviceType","deviceID","timestamp","eventType","location","metadata"}
//! Authentication: {"deviceID","timestamp","eventType","challenge","signature"}
//! ```
//!
//! Perfis `nul_terminated` acrescentam um `\0` ao final do frame. O frame
//! inteiro precisa caber em [`MAX_ENVELOPE_BYTES`].

use crate::types::{AgentState, DeviceProfile, EnvelopeLayout, Event, FieldRule, Sample, TickTime, TimestampFormat};
use serde_json::{Map, Value};

/// Tamanho máximo do frame, terminador incluso.
pub const MAX_ENVELOPE_BYTES: usize = 256;

pub const KEY_DEVICE_ID: &str = "deviceID";
pub const KEY_TIMESTAMP: &str = "timestamp";
pub const KEY_EVENT_TYPE: &str = "eventType";

/// Erros do protocolo.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Envelope com {len} bytes excede o limite de {max}")]
    Overflow { len: usize, max: usize },

    #[error("Erro de serialização: {0}")]
    Serialize(String),

    #[error("Erro de deserialização: {0}")]
    Deserialize(String),

    #[error("Campo obrigatório ausente: {0}")]
    MissingField(&'static str),

    #[error("Amostra sem valor para o campo {0}")]
    MissingSample(String),

    #[error("Sem rótulo de eventType para o valor {0}")]
    UnknownEventLabel(i64),
}

/// Formata o timestamp conforme o perfil.
pub fn render_timestamp(format: &TimestampFormat, time: &TickTime) -> String {
    match format {
        TimestampFormat::EpochSeconds => time.wall.timestamp().to_string(),
        TimestampFormat::UptimeSeconds => time.uptime.as_secs().to_string(),
        TimestampFormat::Literal(literal) => literal.clone(),
    }
}

/// Monta o [`Event`] de um tick.
pub fn build_event(
    profile: &DeviceProfile,
    state: &AgentState,
    sample: &Sample,
    time: &TickTime,
) -> Result<Event, ProtocolError> {
    let event_type = profile
        .event_type
        .label(sample.value)
        .ok_or(ProtocolError::UnknownEventLabel(sample.value))?;

    let mut event = Event {
        device_id: profile.device_id.clone(),
        timestamp: render_timestamp(&profile.timestamp, time),
        event_type: event_type.to_string(),
        preamble: Map::new(),
        payload: Map::new(),
    };

    match &profile.layout {
        EnvelopeLayout::Status { key } => {
            event.payload.insert(key.clone(), Value::from(sample.value));
        }
        EnvelopeLayout::Metadata {
            event_id_prefix,
            device_type,
            location,
            fields,
        } => {
            event.preamble.insert(
                "eventID".into(),
                Value::from(format!("{event_id_prefix}_{:03}", state.event_counter)),
            );
            event
                .preamble
                .insert("deviceType".into(), Value::from(device_type.as_str()));

            let mut extras = sample.extras.iter();
            let mut parts = Vec::with_capacity(fields.len());
            for field in fields {
                let value = match field.rule {
                    FieldRule::Reading => sample.value.to_string(),
                    FieldRule::Range { .. } => extras
                        .next()
                        .ok_or_else(|| ProtocolError::MissingSample(field.key.clone()))?
                        .to_string(),
                    FieldRule::Counter { width } => {
                        format!("{:0width$}", state.event_counter)
                    }
                };
                parts.push(format!("{}:{}{}{}", field.key, field.prefix, value, field.suffix));
            }

            event
                .payload
                .insert("location".into(), Value::from(location.as_str()));
            event
                .payload
                .insert("metadata".into(), Value::from(parts.join("; ")));
        }
        EnvelopeLayout::Authentication { private_key } => {
            let challenge = format!("challenge-{}", sample.value);
            // Assinatura simulada, não é primitiva criptográfica
            let signature = format!("SIGN({challenge},{private_key})");
            event
                .payload
                .insert("challenge".into(), Value::from(challenge));
            event
                .payload
                .insert("signature".into(), Value::from(signature));
        }
    }

    Ok(event)
}

/// Serializa um evento no frame do datagrama.
pub fn encode_event(event: &Event, nul_terminated: bool) -> Result<Vec<u8>, ProtocolError> {
    let mut record = Map::with_capacity(3 + event.preamble.len() + event.payload.len());
    for (k, v) in &event.preamble {
        record.insert(k.clone(), v.clone());
    }
    record.insert(KEY_DEVICE_ID.into(), Value::from(event.device_id.as_str()));
    record.insert(KEY_TIMESTAMP.into(), Value::from(event.timestamp.as_str()));
    record.insert(KEY_EVENT_TYPE.into(), Value::from(event.event_type.as_str()));
    for (k, v) in &event.payload {
        record.insert(k.clone(), v.clone());
    }

    let mut frame =
        serde_json::to_vec(&Value::Object(record)).map_err(|e| ProtocolError::Serialize(e.to_string()))?;
    if nul_terminated {
        frame.push(0);
    }

    if frame.len() > MAX_ENVELOPE_BYTES {
        return Err(ProtocolError::Overflow {
            len: frame.len(),
            max: MAX_ENVELOPE_BYTES,
        });
    }

    Ok(frame)
}

/// Monta e serializa o envelope de um tick.
pub fn encode_envelope(
    profile: &DeviceProfile,
    state: &AgentState,
    sample: &Sample,
    time: &TickTime,
) -> Result<Vec<u8>, ProtocolError> {
    let event = build_event(profile, state, sample, time)?;
    encode_event(&event, profile.nul_terminated)
}

/// Decodifica um frame recebido em [`Event`].
///
/// Chaves antes de `deviceID` voltam para `preamble`; as demais para
/// `payload`. Um `\0` final é descartado.
pub fn decode_envelope(data: &[u8]) -> Result<Event, ProtocolError> {
    let body = data.strip_suffix(&[0]).unwrap_or(data);
    let record: Map<String, Value> =
        serde_json::from_slice(body).map_err(|e| ProtocolError::Deserialize(e.to_string()))?;

    let mut device_id = None;
    let mut timestamp = None;
    let mut event_type = None;
    let mut event = Event::default();

    for (key, value) in record {
        match key.as_str() {
            KEY_DEVICE_ID => device_id = Some(expect_string(KEY_DEVICE_ID, value)?),
            KEY_TIMESTAMP => timestamp = Some(expect_string(KEY_TIMESTAMP, value)?),
            KEY_EVENT_TYPE => event_type = Some(expect_string(KEY_EVENT_TYPE, value)?),
            _ if device_id.is_none() => {
                event.preamble.insert(key, value);
            }
            _ => {
                event.payload.insert(key, value);
            }
        }
    }

    event.device_id = device_id.ok_or(ProtocolError::MissingField(KEY_DEVICE_ID))?;
    event.timestamp = timestamp.ok_or(ProtocolError::MissingField(KEY_TIMESTAMP))?;
    event.event_type = event_type.ok_or(ProtocolError::MissingField(KEY_EVENT_TYPE))?;
    Ok(event)
}

fn expect_string(key: &'static str, value: Value) -> Result<String, ProtocolError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(ProtocolError::Deserialize(format!(
            "{key} deveria ser string, veio {other}"
        ))),
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
