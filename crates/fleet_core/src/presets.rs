//! Frota padrão: um dispositivo de cada tipo.
//!
//! Nós de status (15 s, timestamp em segundos, frame terminado em `\0`) e
//! nós de telemetria (2 s, timestamp literal, `metadata`). Portas locais são
//! distintas para que a frota inteira rode em um processo.

use crate::config::DeviceConfig;
use crate::types::{EnvelopeLayout, EventTypeSpec, FieldRule, FieldSpec, TimestampFormat, ValueDomain};

fn status_node(device_id: &str, event_type: &str, key: &str, domain: ValueDomain, local_port: u16) -> DeviceConfig {
    DeviceConfig {
        device_id: device_id.into(),
        event_type: EventTypeSpec::Fixed(event_type.into()),
        interval_secs: 15.0,
        domain,
        timestamp: TimestampFormat::EpochSeconds,
        layout: EnvelopeLayout::Status { key: key.into() },
        local_port,
        collector_host: String::new(),
        collector_port: 1234,
        nul_terminated: true,
        listen_inbound: false,
        triggerable: false,
    }
}

/// Terminal de acesso: porta trancada (0) / destrancada (1).
pub fn access_terminal() -> DeviceConfig {
    status_node("access_terminal_1", "access_control", "status", ValueDomain::Binary, 5550)
}

/// Câmera: sem movimento (0) / movimento (1).
pub fn cctv() -> DeviceConfig {
    status_node("cctv_1", "cctv", "motion", ValueDomain::Binary, 5551)
}

/// Impressora: ociosa (0), imprimindo (1), erro (2).
pub fn printer() -> DeviceConfig {
    status_node("printer_1", "printer", "status", ValueDomain::Ternary, 5552)
}

/// Lâmpada inteligente: alterna desligada/ligada a cada ciclo.
pub fn smart_light() -> DeviceConfig {
    status_node(
        "smart_light_1",
        "smart_light",
        "state",
        ValueDomain::Toggle { initial: 0 },
        5553,
    )
}

fn telemetry_node(
    device_id: &str,
    event_type: EventTypeSpec,
    domain: ValueDomain,
    timestamp: &str,
    layout: EnvelopeLayout,
    local_port: u16,
    collector_port: u16,
) -> DeviceConfig {
    DeviceConfig {
        device_id: device_id.into(),
        event_type,
        interval_secs: 2.0,
        domain,
        timestamp: TimestampFormat::Literal(timestamp.into()),
        layout,
        local_port,
        collector_host: String::new(),
        collector_port,
        nul_terminated: false,
        listen_inbound: true,
        triggerable: false,
    }
}

/// Sensor de CO₂ (400–2000 ppm) com temperatura (15–30 °C).
pub fn co2_sensor() -> DeviceConfig {
    telemetry_node(
        "sensor_03",
        EventTypeSpec::Fixed("reading".into()),
        ValueDomain::Range { min: 400, max: 2000 },
        "2025-03-14T20:00:00Z",
        EnvelopeLayout::Metadata {
            event_id_prefix: "sensor".into(),
            device_type: "co2_sensor".into(),
            location: "Building C - Lab".into(),
            fields: vec![
                FieldSpec::new("co2Level", FieldRule::Reading),
                FieldSpec::new("temperature", FieldRule::Range { min: 15, max: 30 }),
            ],
        },
        5555,
        8849,
    )
}

/// Telemetria de iluminação: `on`/`off` alternado, brilho e consumo.
pub fn light_telemetry() -> DeviceConfig {
    telemetry_node(
        "light_05",
        EventTypeSpec::ByValue(vec!["off".into(), "on".into()]),
        ValueDomain::Toggle { initial: 0 },
        "2025-03-14T18:45:00Z",
        EnvelopeLayout::Metadata {
            event_id_prefix: "light".into(),
            device_type: "light".into(),
            location: "Building B - Corridor".into(),
            fields: vec![
                FieldSpec::new("brightness", FieldRule::Range { min: 50, max: 100 }),
                FieldSpec::new("energyConsumption", FieldRule::Range { min: 1, max: 10 })
                    .with_suffix("W"),
            ],
        },
        5556,
        8843,
    )
}

/// Leitor de cartão: usuário e cartão sorteados a cada passagem.
pub fn card_reader() -> DeviceConfig {
    telemetry_node(
        "reader_01",
        EventTypeSpec::Fixed("swipe".into()),
        ValueDomain::Range { min: 0, max: 999 },
        "2025-03-14T10:15:30Z",
        EnvelopeLayout::Metadata {
            event_id_prefix: "card".into(),
            device_type: "card_reader".into(),
            location: "Building A - Main Entrance".into(),
            fields: vec![
                FieldSpec::new("userID", FieldRule::Reading).with_prefix("user"),
                FieldSpec::new("cardID", FieldRule::Range { min: 0, max: 999 }).with_prefix("card"),
            ],
        },
        5557,
        8844,
    )
}

/// Trabalhos de impressão concluídos (1–20 páginas).
pub fn printer_job() -> DeviceConfig {
    telemetry_node(
        "printer_job_1",
        EventTypeSpec::Fixed("completed".into()),
        ValueDomain::Range { min: 1, max: 20 },
        "2025-03-14T09:30:00Z",
        EnvelopeLayout::Metadata {
            event_id_prefix: "printer".into(),
            device_type: "printer".into(),
            location: "Library".into(),
            fields: vec![
                FieldSpec::new("jobID", FieldRule::Counter { width: 3 }).with_prefix("job_"),
                FieldSpec::new("pagesPrinted", FieldRule::Reading),
                FieldSpec::new("userID", FieldRule::Counter { width: 0 }).with_prefix("student"),
            ],
        },
        5558,
        8845,
    )
}

/// Sensor de autenticação: desafio assinado a cada 30 s ou no botão.
pub fn auth_sensor() -> DeviceConfig {
    DeviceConfig {
        device_id: "device-001".into(),
        event_type: EventTypeSpec::Fixed("authentication".into()),
        interval_secs: 30.0,
        domain: ValueDomain::Range { min: 0, max: 999_999 },
        timestamp: TimestampFormat::UptimeSeconds,
        layout: EnvelopeLayout::Authentication {
            private_key: "simulated-private-key".into(),
        },
        local_port: 5559,
        collector_host: String::new(),
        collector_port: 3000,
        nul_terminated: false,
        listen_inbound: false,
        triggerable: true,
    }
}

/// Frota completa, na ordem do banner.
pub fn default_fleet() -> Vec<DeviceConfig> {
    vec![
        access_terminal(),
        cctv(),
        printer(),
        smart_light(),
        co2_sensor(),
        light_telemetry(),
        card_reader(),
        printer_job(),
        auth_sensor(),
    ]
}
