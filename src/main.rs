use clap::{Arg, Command};
use roverd::{Server, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let matches = Command::new("roverd")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Guides robot clients to the origin of their grid and collects the secrets they carry")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("JSON configuration file; omitted fields keep their defaults"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("ADDR")
                .help("Interface to bind, overriding the config file"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .value_name("PORT")
                .help("Port to bind, overriding the config file"),
        )
        .arg(
            Arg::new("planner")
                .long("planner")
                .value_name("PLANNER")
                .help("Navigation strategy: simple or bfs"),
        )
        .get_matches();

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(host) = matches.get_one::<String>("host") {
        config.host = host.clone();
    }
    if let Some(port) = matches.get_one::<String>("port") {
        config.port = port.parse()?;
    }
    if let Some(planner) = matches.get_one::<String>("planner") {
        config.planner = planner.parse()?;
    }

    Server::builder().with_config(config).build().run().await?;
    Ok(())
}
