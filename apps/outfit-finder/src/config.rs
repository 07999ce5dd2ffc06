use core_config::{FromEnv, server::ServerConfig};
use database::mongodb::MongoConfig;
use domain_outfit::OutfitConfig;

pub use core_config::Environment;

const APP_NAME: &str = "outfit-finder";

/// Application configuration, composed from the shared config components.
///
/// Everything is read up front: a missing API key or connection string
/// stops the process before any connection is attempted.
#[derive(Clone, Debug)]
pub struct Config {
    pub mongodb: MongoConfig,
    pub outfit: OutfitConfig,
    pub server: ServerConfig,
    pub environment: Environment,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let outfit = OutfitConfig::from_env()?;
        let mut mongodb = MongoConfig::from_env()?;
        if mongodb.app_name.is_none() {
            mongodb = mongodb.with_app_name(APP_NAME);
        }
        let server = ServerConfig::from_env()?;

        Ok(Self {
            mongodb,
            outfit,
            server,
            environment,
        })
    }
}
