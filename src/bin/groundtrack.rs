use clap::{App, Arg, ArgMatches, SubCommand};
use colored::*;
use groundtrack::command::Command;
use groundtrack::protocol::{Request, Response};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "8080";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("groundtrack")
        .version("0.1.0")
        .about("Ground-track simulator operator console")
        .arg(
            Arg::with_name("host")
                .short("h")
                .long("host")
                .value_name("HOST")
                .help("Simulator host address")
                .takes_value(true)
                .default_value(DEFAULT_HOST)
                .global(true),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("Simulator port")
                .takes_value(true)
                .default_value(DEFAULT_PORT)
                .global(true),
        )
        .arg(
            Arg::with_name("json")
                .long("json")
                .help("Print raw JSON responses")
                .global(true),
        )
        .subcommand(
            SubCommand::with_name("start")
                .about("Start or resume the simulation clock")
                .arg(
                    Arg::with_name("step")
                        .long("step")
                        .value_name("SECONDS")
                        .help("Simulated seconds per step")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("speed")
                        .long("speed")
                        .value_name("MULT")
                        .help("Pacing speed multiplier (0 = as fast as possible)")
                        .takes_value(true),
                ),
        )
        .subcommand(SubCommand::with_name("pause").about("Pause the simulation clock"))
        .subcommand(
            SubCommand::with_name("reset")
                .about("Reset simulated time to the origin at the end of the current step"),
        )
        .subcommand(
            SubCommand::with_name("set-step")
                .about("Change the simulated step size")
                .arg(
                    Arg::with_name("seconds")
                        .help("Simulated seconds per step")
                        .required(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("set-speed")
                .about("Change the pacing speed multiplier")
                .arg(
                    Arg::with_name("multiplier")
                        .help("Speed multiplier (0 = as fast as possible)")
                        .required(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("position").about("Show the latest published ground position"),
        )
        .subcommand(
            SubCommand::with_name("point")
                .about("Compute camera pointing parameters for a ground target")
                .arg(
                    Arg::with_name("lon")
                        .long("lon")
                        .value_name("DEG")
                        .help("Target longitude in degrees")
                        .required(true)
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("lat")
                        .long("lat")
                        .value_name("DEG")
                        .help("Target latitude in degrees")
                        .required(true)
                        .takes_value(true),
                ),
        )
        .subcommand(SubCommand::with_name("monitor").about("Stream live telemetry frames"))
        .get_matches();

    let host = matches.value_of("host").unwrap();
    let port: u16 = matches.value_of("port").unwrap().parse()?;
    let raw_json = matches.is_present("json");

    match matches.subcommand() {
        ("start", Some(sub)) => {
            let command = Command::Start {
                step_size_seconds: parse_opt(sub, "step")?,
                speed: parse_opt(sub, "speed")?,
            };
            queue_command(host, port, raw_json, command).await?;
        }
        ("pause", _) => queue_command(host, port, raw_json, Command::Pause).await?,
        ("reset", _) => queue_command(host, port, raw_json, Command::Reset).await?,
        ("set-step", Some(sub)) => {
            let step_size_seconds = sub.value_of("seconds").unwrap().parse()?;
            queue_command(host, port, raw_json, Command::SetStepSize { step_size_seconds })
                .await?;
        }
        ("set-speed", Some(sub)) => {
            let speed = sub.value_of("multiplier").unwrap().parse()?;
            queue_command(host, port, raw_json, Command::SetSpeed { speed }).await?;
        }
        ("position", _) => {
            let response = send_request(host, port, &Request::Position).await?;
            render(&response, raw_json);
        }
        ("point", Some(sub)) => {
            let request = Request::Point {
                longitude_deg: sub.value_of("lon").unwrap().parse()?,
                latitude_deg: sub.value_of("lat").unwrap().parse()?,
            };
            let response = send_request(host, port, &request).await?;
            render(&response, raw_json);
        }
        ("monitor", _) => monitor(host, port).await?,
        _ => {
            println!(
                "{}",
                "No command specified. Use --help for usage information.".yellow()
            );
            println!("{}", "Quick start:".bright_green());
            println!("  {} Start the clock", "groundtrack start".bright_cyan());
            println!(
                "  {} Show the latest position",
                "groundtrack position".bright_cyan()
            );
            println!(
                "  {} Stream telemetry",
                "groundtrack monitor".bright_cyan()
            );
        }
    }

    Ok(())
}

fn parse_opt<T: std::str::FromStr>(
    matches: &ArgMatches<'_>,
    name: &str,
) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T::Err: std::error::Error + 'static,
{
    match matches.value_of(name) {
        Some(value) => Ok(Some(value.parse()?)),
        None => Ok(None),
    }
}

async fn queue_command(
    host: &str,
    port: u16,
    raw_json: bool,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    let response = send_request(host, port, &Request::Queue { command }).await?;
    render(&response, raw_json);
    Ok(())
}

async fn send_request(
    host: &str,
    port: u16,
    request: &Request,
) -> Result<Response, Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", host, port);
    let mut stream = match TcpStream::connect(&addr).await {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!(
                "{} Failed to connect to simulator at {}",
                "error:".red(),
                addr.bright_white()
            );
            if e.kind() == std::io::ErrorKind::ConnectionRefused {
                eprintln!(
                    "Server is not running. Start it with: {}",
                    "groundtrack-simulator".bright_cyan()
                );
            }
            return Err(e.into());
        }
    };

    let line = serde_json::to_string(request)?;
    let response = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        stream.write_all(line.as_bytes()).await?;
        stream.write_all(b"\n").await?;

        let mut reader = BufReader::new(stream);
        let mut reply = String::new();
        reader.read_line(&mut reply).await?;
        Ok::<String, std::io::Error>(reply)
    })
    .await
    .map_err(|_| "request timed out after 5 seconds")??;

    Ok(serde_json::from_str(response.trim())?)
}

fn render(response: &Response, raw_json: bool) {
    if raw_json {
        match serde_json::to_string(response) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("{} {}", "error:".red(), e),
        }
        return;
    }

    match response {
        Response::Ack { accepted: true, message } => {
            match message {
                Some(message) => println!("{} {}", "ok:".green(), message),
                None => println!("{}", "ok".green()),
            }
        }
        Response::Ack {
            accepted: false,
            message,
        } => {
            let reason = message.as_deref().unwrap_or("command rejected");
            println!("{} {}", "rejected:".red(), reason.bright_red());
        }
        Response::Position { position: None } => {
            println!("{}", "no ground position published yet".yellow());
        }
        Response::Position {
            position: Some(position),
        } => {
            println!("{}", "Ground position".bright_blue().bold());
            println!("  longitude: {:>10.4} deg", position.longitude_deg);
            println!("  latitude:  {:>10.4} deg", position.latitude_deg);
            println!("  altitude:  {:>10.1} km", position.altitude_km);
            println!(
                "  sim time:  {:>10.1} s elapsed (epoch {:.0})",
                position.time.elapsed_seconds, position.time.epoch_seconds
            );
        }
        Response::Pointing { target, solution } => {
            println!("{}", "Pointing solution".bright_blue().bold());
            println!(
                "  target:    ({:.4}, {:.4})",
                target.longitude_deg, target.latitude_deg
            );
            println!("  bearing:   {:>8.2} deg", solution.bearing_deg);
            println!("  tilt:      {:>8.2} deg", solution.tilt_deg);
            println!("  zoom:      {:>8.2}", solution.zoom);
            println!("  elevation: {:>8.2} deg", solution.elevation_deg);
            println!("  range:     {:>8.1} km", solution.slant_range_km);
        }
        Response::NotVisible { elevation_deg } => {
            println!(
                "{} target below the visibility gate (elevation {:.2} deg)",
                "not visible:".yellow(),
                elevation_deg
            );
        }
        Response::Error { message } => {
            println!("{} {}", "error:".red(), message.bright_red());
        }
    }
}

async fn monitor(host: &str, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    println!(
        "{}",
        "Monitoring telemetry (Ctrl+C to stop)...".bright_blue().bold()
    );

    let mut stream = TcpStream::connect((host, port)).await?;
    let line = serde_json::to_string(&Request::Subscribe)?;
    stream.write_all(line.as_bytes()).await?;
    stream.write_all(b"\n").await?;

    let mut reader = BufReader::new(stream);
    let mut buffer = String::new();
    // First line is the subscription ack.
    reader.read_line(&mut buffer).await?;

    loop {
        buffer.clear();
        if reader.read_line(&mut buffer).await? == 0 {
            break;
        }
        let trimmed = buffer.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<serde_json::Value>(trimmed) {
            Ok(frame) => {
                let time = frame["timestamp"].as_str().unwrap_or("?");
                let lat = frame["latitude"].as_f64().unwrap_or(0.0);
                let lon = frame["longitude"].as_f64().unwrap_or(0.0);
                let alt = frame["altitude"].as_f64().unwrap_or(0.0);
                println!(
                    "[{}] lat {:>8.3}  lon {:>9.3}  alt {:>6.1} km",
                    time.bright_white(),
                    lat,
                    lon,
                    alt
                );
            }
            Err(_) => println!("{}", trimmed),
        }
    }

    Ok(())
}
