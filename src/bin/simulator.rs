use clap::{App, Arg};
use groundtrack::clock::PacingConfig;
use groundtrack::command::{ChannelCommandSource, Command};
use groundtrack::engine::{Simulation, SimulationConfig};
use groundtrack::geometry::{pointing_solution, GeometryError, GroundTarget};
use groundtrack::propagator::CircularOrbit;
use groundtrack::protocol::{Request, Response, WireCodec};
use groundtrack::snapshot::{attach_position_cache, PositionStore};
use groundtrack::telemetry::{attach_telemetry_forwarder, SinkError, TelemetryFrame, TelemetrySink};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::time;
use tracing::{error, info, warn};

const TELEMETRY_BROADCAST_BUFFER_SIZE: usize = 256;

/// Telemetry sink that fans frames out to connected stream subscribers.
struct BroadcastSink(broadcast::Sender<String>);

impl TelemetrySink for BroadcastSink {
    fn deliver(&mut self, frame: &TelemetryFrame) -> Result<(), SinkError> {
        let json = serde_json::to_string(frame).map_err(|e| SinkError(e.to_string()))?;
        // No receivers connected is not a delivery failure.
        let _ = self.0.send(json);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let matches = App::new("groundtrack-simulator")
        .version("0.1.0")
        .about("Satellite ground-track simulator server")
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("TCP port to listen on")
                .takes_value(true)
                .default_value("8080"),
        )
        .arg(
            Arg::with_name("satellite")
                .long("satellite")
                .value_name("NAME")
                .help("Satellite name used in telemetry frames")
                .takes_value(true)
                .default_value("SAT-1"),
        )
        .arg(
            Arg::with_name("step")
                .long("step")
                .value_name("SECONDS")
                .help("Simulated seconds per step")
                .takes_value(true)
                .default_value("10"),
        )
        .arg(
            Arg::with_name("speed")
                .long("speed")
                .value_name("MULT")
                .help("Pacing speed multiplier (0 = as fast as possible)")
                .takes_value(true)
                .default_value("1.0"),
        )
        .arg(
            Arg::with_name("cadence-ms")
                .long("cadence-ms")
                .value_name("MS")
                .help("Wall-clock step loop cadence in milliseconds")
                .takes_value(true)
                .default_value("100"),
        )
        .arg(
            Arg::with_name("step-echo")
                .long("step-echo")
                .value_name("COUNT")
                .help("Republish each advancing step COUNT times with a descending counter")
                .takes_value(true)
                .default_value("0"),
        )
        .get_matches();

    let port: u16 = matches.value_of("port").unwrap().parse()?;
    let satellite = matches.value_of("satellite").unwrap().to_owned();
    let step_seconds: u64 = matches.value_of("step").unwrap().parse()?;
    let speed: f64 = matches.value_of("speed").unwrap().parse()?;
    let cadence_ms: u64 = matches.value_of("cadence-ms").unwrap().parse()?;
    let step_echo: u8 = matches.value_of("step-echo").unwrap().parse()?;

    if step_seconds == 0 {
        return Err("--step must be positive".into());
    }
    if !(speed.is_finite() && speed >= 0.0) {
        return Err("--speed must be finite and non-negative".into());
    }

    let t0_epoch_seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)?
        .as_secs_f64();

    let (command_tx, command_source) = ChannelCommandSource::new();
    let mut simulation = Simulation::new(
        SimulationConfig {
            t0_epoch_seconds,
            pacing: PacingConfig {
                step_size: Duration::from_secs(step_seconds),
                speed,
            },
            step_echo,
        },
        Box::new(CircularOrbit::default()),
        Box::new(command_source),
    );

    let store = Arc::new(PositionStore::new());
    attach_position_cache(simulation.bus_mut(), Arc::clone(&store));

    let (telemetry_tx, _) = broadcast::channel(TELEMETRY_BROADCAST_BUFFER_SIZE);
    attach_telemetry_forwarder(
        simulation.bus_mut(),
        satellite.clone(),
        BroadcastSink(telemetry_tx.clone()),
    );

    let tcp_store = Arc::clone(&store);
    let tcp_telemetry_tx = telemetry_tx.clone();
    let tcp_server = tokio::spawn(async move {
        if let Err(e) = serve(port, tcp_store, command_tx, tcp_telemetry_tx).await {
            error!("TCP server error: {}", e);
        }
    });

    info!(
        satellite = %satellite,
        step_seconds,
        speed,
        cadence_ms,
        "ground-track simulator started; waiting for a start command"
    );

    // The sole stepping owner: one interval loop drives the engine.
    let mut interval = time::interval(Duration::from_millis(cadence_ms));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                simulation.step(Instant::now());
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    tcp_server.abort();
    Ok(())
}

async fn serve(
    port: u16,
    store: Arc<PositionStore>,
    commands: Sender<Command>,
    telemetry_tx: broadcast::Sender<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    info!("TCP server listening on port {}", port);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("client connected: {}", addr);
                let client_store = Arc::clone(&store);
                let client_commands = commands.clone();
                let client_telemetry_rx = telemetry_tx.subscribe();

                tokio::spawn(async move {
                    if let Err(e) =
                        handle_client(stream, client_store, client_commands, client_telemetry_rx)
                            .await
                    {
                        warn!("client {} error: {}", addr, e);
                    }
                    info!("client {} disconnected", addr);
                });
            }
            Err(e) => {
                error!("failed to accept connection: {}", e);
            }
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    store: Arc<PositionStore>,
    commands: Sender<Command>,
    mut telemetry_rx: broadcast::Receiver<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (reader, mut writer) = stream.into_split();
    let mut buf_reader = BufReader::new(reader);
    let mut codec = WireCodec::new();

    let mut line = String::new();
    loop {
        line.clear();
        match buf_reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                let request = match codec.parse_request(trimmed) {
                    Ok(request) => request,
                    Err(e) => {
                        warn!("unparseable request skipped: {}", e);
                        let response = Response::Error {
                            message: e.to_string(),
                        };
                        write_response(&mut writer, &mut codec, &response).await?;
                        continue;
                    }
                };

                if matches!(request, Request::Subscribe) {
                    let ack = Response::Ack {
                        accepted: true,
                        message: Some("streaming telemetry".to_owned()),
                    };
                    write_response(&mut writer, &mut codec, &ack).await?;
                    // The connection becomes a one-way telemetry stream.
                    while let Ok(frame) = telemetry_rx.recv().await {
                        writer.write_all(frame.as_bytes()).await?;
                        writer.write_all(b"\n").await?;
                    }
                    break;
                }

                let response = answer(&request, &store, &commands);
                write_response(&mut writer, &mut codec, &response).await?;
            }
            Err(e) => {
                error!("error reading from client: {}", e);
                break;
            }
        }
    }

    Ok(())
}

fn answer(request: &Request, store: &PositionStore, commands: &Sender<Command>) -> Response {
    match request {
        Request::Queue { command } => {
            if let Err(e) = command.validate() {
                return Response::Ack {
                    accepted: false,
                    message: Some(e.to_string()),
                };
            }
            match commands.send(command.clone()) {
                Ok(()) => Response::Ack {
                    accepted: true,
                    message: None,
                },
                Err(e) => Response::Error {
                    message: format!("command queue unavailable: {}", e),
                },
            }
        }
        Request::Position => Response::Position {
            position: store.latest(),
        },
        Request::Point {
            longitude_deg,
            latitude_deg,
        } => {
            let Some(position) = store.latest() else {
                return Response::Error {
                    message: "no ground position published yet".to_owned(),
                };
            };
            let target = GroundTarget {
                longitude_deg: *longitude_deg,
                latitude_deg: *latitude_deg,
            };
            match pointing_solution(&position, &target) {
                Ok(solution) => Response::Pointing { target, solution },
                Err(GeometryError::TargetNotVisible { elevation_deg }) => {
                    Response::NotVisible { elevation_deg }
                }
                Err(e) => Response::Error {
                    message: e.to_string(),
                },
            }
        }
        Request::Subscribe => Response::Ack {
            accepted: true,
            message: None,
        },
    }
}

async fn write_response(
    writer: &mut tokio::net::tcp::OwnedWriteHalf,
    codec: &mut WireCodec,
    response: &Response,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = codec.serialize_response(response)?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    Ok(())
}
