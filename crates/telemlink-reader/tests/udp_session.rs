use std::net::UdpSocket;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use telemlink_frame::{encode_frame_to_vec, ControlToken};
use telemlink_reader::{
    encode_values, PipelineConfig, PipelineError, PipelineState, ReaderPipeline, Value,
};
use telemlink_schema::{from_yaml_str, Schema};
use telemlink_transport::{TransportError, UdpConfig, UdpTransport};

const SCHEMA: &str = r#"
- accel:
    a_x: float
    a_y: float
    a_z: float
- status:
    tick: uint32
    ok: bool
"#;

fn schema() -> Arc<Schema> {
    Arc::new(from_yaml_str(SCHEMA).expect("schema should parse"))
}

fn fast_udp() -> UdpConfig {
    UdpConfig {
        read_timeout: Duration::from_millis(50),
        ..UdpConfig::default()
    }
}

fn fast_pipeline() -> PipelineConfig {
    PipelineConfig {
        read_timeout: Duration::from_millis(50),
        ..PipelineConfig::default()
    }
}

fn frame(schema: &Schema, tick: u32) -> Vec<u8> {
    let values = vec![
        vec![
            Value::Float(f64::from(tick)),
            Value::Float(0.5),
            Value::Float(-1.0),
        ],
        vec![Value::UInt(u64::from(tick)), Value::Bool(tick % 2 == 0)],
    ];
    let payload = encode_values(schema, &values).expect("values should encode");
    encode_frame_to_vec(&payload).expect("payload should frame")
}

fn recv_token(device: &UdpSocket) -> (ControlToken, std::net::SocketAddr) {
    let mut buf = [0u8; 16];
    let (n, from) = device.recv_from(&mut buf).expect("token should arrive");
    let token = ControlToken::parse(&buf[..n]).expect("datagram should be a control token");
    (token, from)
}

#[test]
fn streams_records_over_udp_loopback() {
    let schema = schema();
    let device = UdpSocket::bind("127.0.0.1:0").unwrap();
    device
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let device_addr = device.local_addr().unwrap();

    let device_schema = Arc::clone(&schema);
    let device_thread = thread::spawn(move || {
        let (token, host) = recv_token(&device);
        assert_eq!(token, ControlToken::Start);
        for tick in 0..10 {
            device.send_to(&frame(&device_schema, tick), host).unwrap();
        }
        let (token, _) = recv_token(&device);
        token
    });

    let transport = UdpTransport::connect_with_config(device_addr, &fast_udp()).unwrap();
    let mut pipeline = ReaderPipeline::new(Arc::clone(&schema), fast_pipeline());
    pipeline.start(transport).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut records = Vec::new();
    while records.len() < 10 && Instant::now() < deadline {
        records.extend(pipeline.drain());
        assert_eq!(pipeline.poll().unwrap(), PipelineState::Streaming);
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(records.len(), 10);

    pipeline.stop().unwrap();
    assert_eq!(device_thread.join().unwrap(), ControlToken::Stop);

    for (tick, record) in records.iter().enumerate() {
        assert_eq!(record.values[0][0], Value::Float(tick as f64));
        assert_eq!(record.values[1][0], Value::UInt(tick as u64));
        assert_eq!(record.values[1][1], Value::Bool(tick % 2 == 0));
    }
    assert!(records
        .windows(2)
        .all(|pair| pair[0].timestamp <= pair[1].timestamp));
    assert_eq!(pipeline.stats().records_decoded, 10);
}

#[cfg(target_os = "linux")]
#[test]
fn absent_peer_surfaces_as_disconnect() {
    // Reserve a port, then free it so nothing is listening there.
    let spare = UdpSocket::bind("127.0.0.1:0").unwrap();
    let absent = spare.local_addr().unwrap();
    drop(spare);

    let transport = UdpTransport::connect_with_config(absent, &fast_udp()).unwrap();
    let mut pipeline = ReaderPipeline::new(schema(), fast_pipeline());
    pipeline.start(transport).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    let outcome = loop {
        match pipeline.poll() {
            Ok(PipelineState::Streaming) if Instant::now() < deadline => {
                thread::sleep(Duration::from_millis(10));
            }
            other => break other,
        }
    };

    match outcome {
        Err(PipelineError::Disconnected { source, .. }) => {
            assert!(matches!(source, TransportError::PeerGone(_)));
        }
        other => panic!("expected disconnect, got {other:?}"),
    }
    assert_eq!(pipeline.state(), PipelineState::Disconnected);
    assert!(pipeline.elapsed_time_at_disconnect().is_some());
    pipeline.stop().unwrap();
}

#[test]
fn frames_larger_than_the_read_chunk_survive_udp() {
    let schema = Arc::new(Schema::from_format_strings(&["d".repeat(160)]).unwrap());
    assert_eq!(schema.byte_size(), 1280);

    let device = UdpSocket::bind("127.0.0.1:0").unwrap();
    device
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let device_addr = device.local_addr().unwrap();

    let device_schema = Arc::clone(&schema);
    let device_thread = thread::spawn(move || {
        let (token, host) = recv_token(&device);
        assert_eq!(token, ControlToken::Start);
        for tick in 0..5 {
            let values: Vec<Vec<Value>> = vec![(0..160)
                .map(|i| Value::Float(f64::from(tick * 1000 + i)))
                .collect()];
            let payload = encode_values(&device_schema, &values).unwrap();
            let wire = encode_frame_to_vec(&payload).unwrap();
            assert!(wire.len() > 1024);
            device.send_to(&wire, host).unwrap();
        }
        recv_token(&device).0
    });

    let transport = UdpTransport::connect_with_config(device_addr, &fast_udp()).unwrap();
    let config = PipelineConfig {
        read_chunk_size: 1024,
        ..fast_pipeline()
    };
    let mut pipeline = ReaderPipeline::new(Arc::clone(&schema), config);
    pipeline.start(transport).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut records = Vec::new();
    while records.len() < 5 && Instant::now() < deadline {
        records.extend(pipeline.drain());
        thread::sleep(Duration::from_millis(5));
    }
    pipeline.stop().unwrap();
    assert_eq!(device_thread.join().unwrap(), ControlToken::Stop);

    assert_eq!(records.len(), 5);
    for (tick, record) in records.iter().enumerate() {
        assert_eq!(record.values[0].len(), 160);
        assert_eq!(record.values[0][0], Value::Float((tick * 1000) as f64));
        assert_eq!(record.values[0][159], Value::Float((tick * 1000 + 159) as f64));
    }
    let stats = pipeline.stats();
    assert_eq!(stats.records_decoded, 5);
    assert_eq!(stats.dropped_malformed + stats.dropped_size_mismatch, 0);
}
