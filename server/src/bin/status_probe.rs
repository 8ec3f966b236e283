//! Queries a running server the way a client's server list does and prints
//! the status document and round-trip time.

use clap::Parser;
use protocol::packets::ServerboundPacket;
use protocol::{ClientboundPacket, ConnectionState, FrameAssembler, ServerStatus};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server host name or address
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[clap(short, long, default_value = "25565")]
    port: u16,

    /// Seconds to wait for each reply
    #[clap(short, long, default_value = "5")]
    timeout: u64,
}

// Get current timestamp in milliseconds
fn get_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as i64
}

async fn read_packet(
    stream: &mut TcpStream,
    assembler: &mut FrameAssembler,
    wait: Duration,
) -> Result<ClientboundPacket, Box<dyn std::error::Error>> {
    let mut buf = [0u8; 4096];
    loop {
        if let Some(payload) = assembler.next_frame()? {
            return Ok(ClientboundPacket::decode(ConnectionState::Status, payload)?);
        }
        let len = timeout(wait, stream.read(&mut buf)).await??;
        if len == 0 {
            return Err("server closed the connection".into());
        }
        assembler.extend(&buf[..len]);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let wait = Duration::from_secs(args.timeout);

    let mut stream = TcpStream::connect((args.host.as_str(), args.port)).await?;
    println!("Connected to {}", stream.peer_addr()?);

    let handshake = ServerboundPacket::Handshake {
        protocol_version: protocol::PROTOCOL_VERSION,
        server_address: args.host.clone(),
        server_port: args.port,
        next_state: 1,
    };
    stream.write_all(&handshake.encode()?).await?;
    stream
        .write_all(&ServerboundPacket::StatusRequest.encode()?)
        .await?;

    let mut assembler = FrameAssembler::new(protocol::MAX_OUTBOUND_FRAME_LEN);
    match read_packet(&mut stream, &mut assembler, wait).await? {
        ClientboundPacket::StatusResponse { json } => match ServerStatus::from_json(&json) {
            Ok(status) => {
                println!("Version: {} ({})", status.version.name, status.version.protocol);
                println!("Players: {}/{}", status.players.online, status.players.max);
                println!("MOTD:    {}", status.description.text);
            }
            Err(_) => println!("Status:  {}", json),
        },
        other => return Err(format!("unexpected reply {:?}", other).into()),
    }

    let payload = get_timestamp();
    let sent = Instant::now();
    stream
        .write_all(&ServerboundPacket::Ping { payload }.encode()?)
        .await?;

    match read_packet(&mut stream, &mut assembler, wait).await? {
        ClientboundPacket::Pong { payload: echoed } if echoed == payload => {
            println!("Ping:    {} ms", sent.elapsed().as_millis());
        }
        other => return Err(format!("unexpected reply {:?}", other).into()),
    }

    Ok(())
}
