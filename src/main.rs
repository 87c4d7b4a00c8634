use pingora_core::server::configuration::Opt;
use pingora_core::server::Server;

use secreg::config::Config;
use secreg::service::registry_http_service;

fn main() {
    // Initialize logging
    env_logger::init();

    // Read command-line arguments
    let opt = Opt::parse_args();

    // Load configuration with optional override
    let config = Config::load_yaml_with_opt_override(&opt).expect("Failed to load configuration");

    // Build the registry HTTP service with its listeners
    log::info!("Building registry service...");
    let registry_service = registry_http_service(&config);

    // Create Pingora server with optional configuration
    let mut secreg_server = Server::new_with_opt_and_conf(Some(opt), config.pingora);

    // Bootstrapping and server startup
    log::info!("Bootstrapping...");
    secreg_server.bootstrap();

    log::info!("Bootstrapped. Adding Services...");
    secreg_server.add_service(registry_service);

    log::info!("Starting Server...");
    secreg_server.run_forever();
}
