use std::io::IsTerminal;
use std::path::Path;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use telemlink_reader::{Record, StatsSnapshot};
use telemlink_schema::Schema;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Column labels for every value-carrying field: `channel.field`.
pub fn value_columns(schema: &Schema) -> Vec<String> {
    let mut columns = Vec::new();
    for (channel_idx, channel) in schema.channels().iter().enumerate() {
        let channel_name = channel
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("channel_{channel_idx}"));
        for (field_idx, field) in channel.value_fields().enumerate() {
            let field_name = field
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("field_{field_idx}"));
            columns.push(format!("{channel_name}.{field_name}"));
        }
    }
    columns
}

pub fn print_records(records: &[Record], columns: &[String], format: OutputFormat) {
    if records.is_empty() {
        return;
    }
    match format {
        OutputFormat::Json => {
            for record in records {
                println!(
                    "{}",
                    serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut header = vec!["TIME".to_string()];
            header.extend(columns.iter().cloned());
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(header);
            for record in records {
                let mut row = vec![format!("{:.3}", record.timestamp)];
                row.extend(record.values.iter().flatten().map(ToString::to_string));
                table.add_row(row);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for record in records {
                let values: Vec<String> = columns
                    .iter()
                    .zip(record.values.iter().flatten())
                    .map(|(column, value)| format!("{column}={value}"))
                    .collect();
                println!("t={:.3} {}", record.timestamp, values.join(" "));
            }
        }
    }
}

#[derive(Serialize)]
struct FieldOutput<'a> {
    name: Option<&'a str>,
    #[serde(rename = "type")]
    type_name: &'static str,
    bytes: usize,
}

#[derive(Serialize)]
struct ChannelOutput<'a> {
    name: Option<&'a str>,
    byte_size: usize,
    format: String,
    fields: Vec<FieldOutput<'a>>,
}

#[derive(Serialize)]
struct SchemaOutput<'a> {
    path: String,
    byte_size: usize,
    channels: Vec<ChannelOutput<'a>>,
}

pub fn print_schema(schema: &Schema, path: &Path, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = SchemaOutput {
                path: path.display().to_string(),
                byte_size: schema.byte_size(),
                channels: schema
                    .channels()
                    .iter()
                    .map(|channel| ChannelOutput {
                        name: channel.name(),
                        byte_size: channel.byte_size(),
                        format: channel.format_string(),
                        fields: channel
                            .fields()
                            .iter()
                            .map(|field| FieldOutput {
                                name: field.name(),
                                type_name: field.primitive().name(),
                                bytes: field.byte_size(),
                            })
                            .collect(),
                    })
                    .collect(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CHANNEL", "FIELD", "TYPE", "BYTES"]);
            for (channel_idx, channel) in schema.channels().iter().enumerate() {
                let channel_name = channel
                    .name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("channel_{channel_idx}"));
                for (field_idx, field) in channel.fields().iter().enumerate() {
                    table.add_row(vec![
                        channel_name.clone(),
                        field
                            .name()
                            .map(str::to_string)
                            .unwrap_or_else(|| format!("field_{field_idx}")),
                        field.primitive().name().to_string(),
                        field.byte_size().to_string(),
                    ]);
                }
            }
            println!("{table}");
            println!(
                "{} bytes per frame, formats {:?}",
                schema.byte_size(),
                schema.format_strings()
            );
        }
        OutputFormat::Pretty => {
            print!("{schema}");
        }
    }
}

#[cfg(feature = "serial")]
pub fn print_ports(ports: &[telemlink_transport::PortInfo], format: OutputFormat) {
    #[derive(Serialize)]
    struct PortOutput<'a> {
        name: &'a str,
        kind: &'a str,
        description: Option<&'a str>,
    }

    match format {
        OutputFormat::Json => {
            let out: Vec<PortOutput<'_>> = ports
                .iter()
                .map(|port| PortOutput {
                    name: &port.name,
                    kind: port.kind,
                    description: port.description.as_deref(),
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "KIND", "DESCRIPTION"]);
            for port in ports {
                table.add_row(vec![
                    port.name.clone(),
                    port.kind.to_string(),
                    port.description.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for port in ports {
                match &port.description {
                    Some(description) => println!("{}: {description}", port.name),
                    None => println!("{}: {}", port.name, port.kind),
                }
            }
        }
    }
}

#[derive(Serialize)]
struct SimulationOutput {
    sessions: u64,
    frames_sent: u64,
}

pub fn print_simulation_summary(sessions: u64, frames_sent: u64, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = SimulationOutput {
                sessions,
                frames_sent,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("sessions={sessions} frames_sent={frames_sent}");
        }
    }
}

/// Session counters go to stderr so they never mix with record output.
pub fn log_stats(stats: &StatsSnapshot) {
    tracing::info!(
        bytes_read = stats.bytes_read,
        records = stats.records_decoded,
        malformed = stats.dropped_malformed,
        empty = stats.dropped_empty,
        size_mismatch = stats.dropped_size_mismatch,
        overflow_bytes = stats.overflow_discarded,
        "session statistics"
    );
}
