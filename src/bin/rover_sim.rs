// A simulated robot client for exercising a running server by hand: it
// authenticates, obeys MOVE/TURN commands against a pretend grid with
// optional obstacles, hands over its secret and prints the whole exchange.
use clap::{Arg, ArgAction, Command};
use roverd::codec::SENTINEL;
use roverd::config::DEFAULT_KEYS;
use roverd::grid::{Coord, Side};
use roverd::session::auth::{decode_hash, encode_hash, name_hash};
use std::collections::HashSet;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

struct Wire {
    stream: TcpStream,
}

impl Wire {
    async fn send(&mut self, payload: &str) -> std::io::Result<()> {
        println!("   -> {}", payload);
        self.stream.write_all(payload.as_bytes()).await?;
        self.stream.write_all(&SENTINEL).await
    }

    async fn recv(&mut self) -> std::io::Result<String> {
        let mut record = Vec::new();
        loop {
            let byte = self.stream.read_u8().await?;
            record.push(byte);
            if record.ends_with(&SENTINEL) {
                record.truncate(record.len() - SENTINEL.len());
                let payload = String::from_utf8_lossy(&record).into_owned();
                println!("   <- {}", payload);
                return Ok(payload);
            }
        }
    }
}

struct Sim {
    at: Coord,
    facing: Side,
    obstacles: HashSet<Coord>,
    recharges_left: u32,
}

impl Sim {
    fn obey(&mut self, command: &str) -> Result<(), String> {
        match command {
            "102 MOVE" => {
                let ahead = self.at.step(self.facing);
                if self.obstacles.contains(&ahead) {
                    println!("   (bump: {} is blocked)", ahead);
                } else {
                    self.at = ahead;
                }
                Ok(())
            }
            "103 TURN LEFT" => {
                self.facing = self.facing.left();
                Ok(())
            }
            "104 TURN RIGHT" => {
                self.facing = self.facing.right();
                Ok(())
            }
            other => Err(format!("unexpected command {:?}", other)),
        }
    }
}

fn parse_obstacle(raw: &str) -> Result<Coord, String> {
    let Some((x, y)) = raw.split_once(',') else {
        return Err(format!("obstacle must be 'x,y', got {:?}", raw));
    };
    let x = x.trim().parse::<i32>().map_err(|e| e.to_string())?;
    let y = y.trim().parse::<i32>().map_err(|e| e.to_string())?;
    Ok(Coord::new(x, y))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = Command::new("rover-sim")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Plays one robot session against a running server")
        .arg(Arg::new("host").long("host").value_name("ADDR").default_value("localhost"))
        .arg(Arg::new("port").long("port").value_name("PORT").default_value("9999"))
        .arg(Arg::new("name").long("name").value_name("NAME").default_value("Mnau"))
        .arg(
            Arg::new("key")
                .long("key")
                .value_name("ID")
                .default_value("0")
                .help("Key pair id from the reference table"),
        )
        .arg(Arg::new("x").long("x").value_name("X").default_value("2"))
        .arg(Arg::new("y").long("y").value_name("Y").default_value("3"))
        .arg(
            Arg::new("facing")
                .long("facing")
                .value_name("SIDE")
                .default_value("up")
                .help("Initial heading: up, right, down or left"),
        )
        .arg(
            Arg::new("obstacle")
                .long("obstacle")
                .value_name("X,Y")
                .action(ArgAction::Append)
                .help("Blocked cell; repeat for more"),
        )
        .arg(
            Arg::new("secret")
                .long("secret")
                .value_name("TEXT")
                .default_value("Secret cargo"),
        )
        .arg(
            Arg::new("recharge")
                .long("recharge")
                .value_name("N")
                .default_value("0")
                .help("Announce RECHARGING before the first N replies"),
        )
        .get_matches();

    let host = matches.get_one::<String>("host").unwrap().clone();
    let port: u16 = matches.get_one::<String>("port").unwrap().parse()?;
    let name = matches.get_one::<String>("name").unwrap().clone();
    let key_id: usize = matches.get_one::<String>("key").unwrap().parse()?;
    let secret = matches.get_one::<String>("secret").unwrap().clone();
    let pair = *DEFAULT_KEYS
        .get(key_id)
        .ok_or_else(|| format!("key id {} outside the reference table", key_id))?;

    let mut sim = Sim {
        at: Coord::new(
            matches.get_one::<String>("x").unwrap().parse()?,
            matches.get_one::<String>("y").unwrap().parse()?,
        ),
        facing: matches.get_one::<String>("facing").unwrap().parse()?,
        obstacles: matches
            .get_many::<String>("obstacle")
            .unwrap_or_default()
            .map(|raw| parse_obstacle(raw))
            .collect::<Result<_, _>>()?,
        recharges_left: matches.get_one::<String>("recharge").unwrap().parse()?,
    };

    println!("connecting to {}:{} as {:?}", host, port, name);
    let stream = TcpStream::connect((host.as_str(), port)).await?;
    let mut wire = Wire { stream };

    // Authentication, with the server's challenge verified against the
    // key pair we picked.
    wire.send(&name).await?;
    let reply = wire.recv().await?;
    if reply != "107 KEY REQUEST" {
        return Err(format!("expected a key request, got {:?}", reply).into());
    }
    wire.send(&key_id.to_string()).await?;

    let hash = name_hash(&name);
    let challenge: u16 = wire.recv().await?.parse()?;
    if decode_hash(challenge, pair.server_key) != hash {
        return Err("server failed the challenge: wrong server key".into());
    }
    wire.send(&encode_hash(hash, pair.client_key).to_string())
        .await?;
    let reply = wire.recv().await?;
    if reply != "200 OK" {
        return Err(format!("login refused: {:?}", reply).into());
    }
    println!("authenticated; starting at {} facing {}", sim.at, sim.facing);

    // Obey the pilot until it asks for the secret.
    loop {
        let command = wire.recv().await?;
        if command == "105 GET MESSAGE" {
            wire.send(&secret).await?;
            let reply = wire.recv().await?;
            if reply != "106 LOGOUT" {
                return Err(format!("expected a logout, got {:?}", reply).into());
            }
            println!("done: secret delivered from {}", sim.at);
            return Ok(());
        }
        sim.obey(&command)?;
        if sim.recharges_left > 0 {
            sim.recharges_left -= 1;
            wire.send("RECHARGING").await?;
            wire.send("FULL POWER").await?;
        }
        wire.send(&format!("OK {} {}", sim.at.x, sim.at.y)).await?;
    }
}
