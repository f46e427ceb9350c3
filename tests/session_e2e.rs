// End-to-end sessions against a live listener: a scripted robot client
// drives the full three-phase protocol over real TCP.
use roverd::{Bundle, Server, ServerConfig};
use std::collections::HashSet;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const SENTINEL: [u8; 2] = [0x07, 0x08];

async fn start(bundle: Bundle) -> SocketAddr {
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        ..ServerConfig::default()
    };
    let server = Server::builder()
        .with_config(config)
        .with_bundle(bundle)
        .build();
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server.serve(listener));
    addr
}

struct Client {
    stream: TcpStream,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        Self {
            stream: TcpStream::connect(addr).await.unwrap(),
        }
    }

    async fn send(&mut self, payload: &str) {
        self.stream.write_all(payload.as_bytes()).await.unwrap();
        self.stream.write_all(&SENTINEL).await.unwrap();
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
    }

    async fn recv(&mut self) -> String {
        let mut record = Vec::new();
        loop {
            let byte = self.stream.read_u8().await.unwrap();
            record.push(byte);
            if record.ends_with(&SENTINEL) {
                record.truncate(record.len() - SENTINEL.len());
                return String::from_utf8(record).unwrap();
            }
        }
    }

    /// The server must close without sending another byte.
    async fn expect_silent_close(&mut self) {
        let mut rest = Vec::new();
        self.stream.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"", "expected silence, got {:?}", rest);
    }

    /// Authenticates as "Mnau" with key pair 2.
    /// name_hash("Mnau") = 7784, challenge 26573, confirmation 21387.
    async fn login(&mut self) {
        self.send("Mnau").await;
        assert_eq!(self.recv().await, "107 KEY REQUEST");
        self.send("2").await;
        assert_eq!(self.recv().await, "26573");
        self.send("21387").await;
        assert_eq!(self.recv().await, "200 OK");
    }
}

// Client-side robot model: obeys MOVE/TURN like the physical robot would,
// surrenders its secret on pickup.
struct Robot {
    x: i32,
    y: i32,
    facing: (i32, i32),
    obstacles: HashSet<(i32, i32)>,
}

impl Robot {
    fn new(x: i32, y: i32, facing: (i32, i32), obstacles: &[(i32, i32)]) -> Self {
        Self {
            x,
            y,
            facing,
            obstacles: obstacles.iter().copied().collect(),
        }
    }

    async fn obey(&mut self, client: &mut Client, secret: &str) -> String {
        loop {
            let command = client.recv().await;
            match command.as_str() {
                "102 MOVE" => {
                    let ahead = (self.x + self.facing.0, self.y + self.facing.1);
                    if !self.obstacles.contains(&ahead) {
                        (self.x, self.y) = ahead;
                    }
                }
                "103 TURN LEFT" => self.facing = (-self.facing.1, self.facing.0),
                "104 TURN RIGHT" => self.facing = (self.facing.1, -self.facing.0),
                "105 GET MESSAGE" => {
                    client.send(secret).await;
                    return client.recv().await;
                }
                other => panic!("unexpected command {:?}", other),
            }
            client.send(&format!("OK {} {}", self.x, self.y)).await;
        }
    }
}

#[tokio::test]
async fn full_session_with_robot_already_home() {
    let addr = start(Bundle::recharging()).await;
    let mut client = Client::connect(addr).await;

    client.login().await;

    // One probe move lands on the origin; the server skips straight to
    // the pickup.
    assert_eq!(client.recv().await, "102 MOVE");
    client.send("OK 0 0").await;
    assert_eq!(client.recv().await, "105 GET MESSAGE");
    client.send("Secret cargo").await;
    assert_eq!(client.recv().await, "106 LOGOUT");
    client.expect_silent_close().await;
}

#[tokio::test]
async fn full_session_with_navigation() {
    let addr = start(Bundle::recharging()).await;
    let mut client = Client::connect(addr).await;

    client.login().await;
    let mut robot = Robot::new(2, 3, (0, 1), &[(2, 4), (0, 2)]);
    let logout = robot.obey(&mut client, "Secret cargo").await;

    assert_eq!((robot.x, robot.y), (0, 0));
    assert_eq!(logout, "106 LOGOUT");
    client.expect_silent_close().await;
}

#[tokio::test]
async fn full_session_with_bfs_planner() {
    let addr = start(Bundle::extended()).await;
    let mut client = Client::connect(addr).await;

    client.login().await;
    let mut robot = Robot::new(4, 0, (-1, 0), &[(1, -1), (1, 0), (1, 1)]);
    let logout = robot.obey(&mut client, "Secret cargo").await;

    assert_eq!((robot.x, robot.y), (0, 0));
    assert_eq!(logout, "106 LOGOUT");
}

#[tokio::test]
async fn recharging_interposed_during_navigation() {
    let addr = start(Bundle::recharging()).await;
    let mut client = Client::connect(addr).await;

    client.login().await;

    assert_eq!(client.recv().await, "102 MOVE");
    client.send("RECHARGING").await;
    client.send("FULL POWER").await;
    client.send("OK 0 0").await;

    // The pause was invisible: the reply above counted as the move reply.
    assert_eq!(client.recv().await, "105 GET MESSAGE");
    client.send("Secret cargo").await;
    assert_eq!(client.recv().await, "106 LOGOUT");
}

#[tokio::test]
async fn overlong_username_is_rejected() {
    let addr = start(Bundle::recharging()).await;
    let mut client = Client::connect(addr).await;

    client.send_raw(b"nineteen__chars__19").await;
    assert_eq!(client.recv().await, "301 SYNTAX ERROR");
    client.expect_silent_close().await;
}

#[tokio::test]
async fn stray_full_power_is_a_logic_error() {
    let addr = start(Bundle::recharging()).await;
    let mut client = Client::connect(addr).await;

    client.send("FULL POWER").await;
    assert_eq!(client.recv().await, "302 LOGIC ERROR");
    client.expect_silent_close().await;
}

#[tokio::test]
async fn key_id_out_of_table_is_rejected() {
    let addr = start(Bundle::recharging()).await;
    let mut client = Client::connect(addr).await;

    client.send("Mnau").await;
    assert_eq!(client.recv().await, "107 KEY REQUEST");
    client.send("9").await;
    assert_eq!(client.recv().await, "303 KEY OUT OF RANGE");
    client.expect_silent_close().await;
}

#[tokio::test]
async fn wrong_confirmation_fails_login() {
    let addr = start(Bundle::recharging()).await;
    let mut client = Client::connect(addr).await;

    client.send("Mnau").await;
    assert_eq!(client.recv().await, "107 KEY REQUEST");
    client.send("2").await;
    assert_eq!(client.recv().await, "26573");
    client.send("12345").await;
    assert_eq!(client.recv().await, "300 LOGIN FAILED");
    client.expect_silent_close().await;
}

#[tokio::test]
async fn plain_bundle_rejects_recharging() {
    let addr = start(Bundle::plain()).await;
    let mut client = Client::connect(addr).await;

    client.send("RECHARGING").await;
    assert_eq!(client.recv().await, "302 LOGIC ERROR");
    client.expect_silent_close().await;
}

#[tokio::test]
async fn silent_client_is_dropped_without_reply() {
    let addr = start(Bundle::recharging()).await;
    let mut client = Client::connect(addr).await;

    // Say nothing. The 1 s read deadline passes and the server closes
    // without any wire reply.
    client.expect_silent_close().await;
}

#[tokio::test]
async fn sentinel_split_across_tcp_segments() {
    let addr = start(Bundle::recharging()).await;
    let mut client = Client::connect(addr).await;

    client.send_raw(b"Mnau\x07").await;
    client.stream.flush().await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    client.send_raw(b"\x08").await;
    assert_eq!(client.recv().await, "107 KEY REQUEST");
}

#[tokio::test]
async fn sessions_are_independent() {
    let addr = start(Bundle::recharging()).await;

    // A failing session must not take the listener down for the next one.
    let mut bad = Client::connect(addr).await;
    bad.send("FULL POWER").await;
    assert_eq!(bad.recv().await, "302 LOGIC ERROR");

    let mut good = Client::connect(addr).await;
    good.login().await;
}
