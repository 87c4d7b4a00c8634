use std::fs;
use std::net::SocketAddr;

use log::{debug, trace};
use pingora::server::configuration::{Opt, ServerConf};
use pingora_error::{Error, ErrorType::*, OrErr, Result};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

#[derive(Default, Debug, Serialize, Deserialize, Validate)]
pub struct Config {
    #[serde(default)]
    pub pingora: ServerConf,

    #[validate(length(min = 1))]
    #[validate(nested)]
    pub listeners: Vec<Listener>,

    #[validate(nested)]
    pub etcd: Etcd,
}

// Config file load and validation
impl Config {
    // Does not have to be async until we want runtime reload
    pub fn load_from_yaml<P>(path: P) -> Result<Self>
    where
        P: AsRef<std::path::Path> + std::fmt::Display,
    {
        let conf_str = fs::read_to_string(&path).or_err_with(ReadError, || {
            format!("Unable to read conf file from {path}")
        })?;
        debug!("Conf file read from {path}");
        Self::from_yaml(&conf_str)
    }

    // config file load entry point
    pub fn load_yaml_with_opt_override(opt: &Opt) -> Result<Self> {
        if let Some(path) = &opt.conf {
            let mut conf = Self::load_from_yaml(path)?;
            conf.merge_with_opt(opt);
            Ok(conf)
        } else {
            Error::e_explain(ReadError, "No path specified")
        }
    }

    pub fn from_yaml(conf_str: &str) -> Result<Self> {
        trace!("Read conf file: {conf_str}");
        let conf: Config = serde_yaml::from_str(conf_str).or_err_with(ReadError, || {
            format!("Unable to parse yaml conf {conf_str}")
        })?;

        trace!("Loaded conf: {conf:?}");

        // use validator to validate conf file
        conf.validate()
            .or_err_with(FileReadError, || "Conf file valid failed")?;

        Ok(conf)
    }

    #[allow(dead_code)]
    pub fn to_yaml(&self) -> String {
        serde_yaml::to_string(self).unwrap()
    }

    pub fn merge_with_opt(&mut self, opt: &Opt) {
        if opt.daemon {
            self.pingora.daemon = true;
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[validate(schema(function = "Listener::validate_tls_for_offer_h2"))]
pub struct Listener {
    pub address: SocketAddr,
    pub tls: Option<Tls>,
    #[serde(default)]
    pub offer_h2: bool,
}

impl Listener {
    fn validate_tls_for_offer_h2(&self) -> Result<(), ValidationError> {
        if self.offer_h2 && self.tls.is_none() {
            Err(ValidationError::new("tls_required_for_h2"))
        } else {
            Ok(())
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tls {
    pub cert_path: String,
    pub key_path: String,
}

#[derive(Clone, Default, Debug, Serialize, Deserialize, Validate)]
pub struct Etcd {
    #[validate(length(min = 1))]
    pub host: Vec<String>,
    #[serde(default = "Etcd::default_prefix")]
    pub prefix: String,
    pub timeout: Option<u32>,
    pub connect_timeout: Option<u32>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl Etcd {
    fn default_prefix() -> String {
        "/secreg/controls".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_log() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_load_file() {
        init_log();
        let conf_str = r#"
---
pingora:
  version: 1
  threads: 2

listeners:
  - address: 0.0.0.0:8080
  - address: "[::1]:8443"
    tls:
      cert_path: /etc/ssl/server.crt
      key_path: /etc/ssl/server.key
    offer_h2: true

etcd:
  host:
    - "http://127.0.0.1:2379"
  prefix: /secreg/controls
  timeout: 10
  connect_timeout: 5
        "#
        .to_string();
        let conf = Config::from_yaml(&conf_str).unwrap();
        assert_eq!(1, conf.pingora.version);
        assert_eq!(2, conf.listeners.len());
        assert_eq!(1, conf.etcd.host.len());
        assert_eq!("/secreg/controls", conf.etcd.prefix);
        print!("{}", conf.to_yaml());
    }

    #[test]
    fn test_etcd_prefix_default() {
        init_log();
        let conf_str = r#"
---
listeners:
  - address: 0.0.0.0:8080

etcd:
  host:
    - "http://127.0.0.1:2379"
        "#
        .to_string();
        let conf = Config::from_yaml(&conf_str).unwrap();
        assert_eq!("/secreg/controls", conf.etcd.prefix);
    }

    #[test]
    fn test_valid_listeners_length() {
        init_log();
        let conf_str = r#"
---
listeners: []

etcd:
  host:
    - "http://127.0.0.1:2379"
        "#
        .to_string();
        let conf = Config::from_yaml(&conf_str);
        match conf {
            Ok(_) => panic!("Expected error, but got a valid config"),
            Err(e) => {
                eprintln!("Error: {:?}", e);
            }
        }
    }

    #[test]
    fn test_valid_listeners_tls_for_offer_h2() {
        init_log();
        let conf_str = r#"
---
listeners:
  - address: "[::1]:8080"
    offer_h2: true

etcd:
  host:
    - "http://127.0.0.1:2379"
        "#
        .to_string();
        let conf = Config::from_yaml(&conf_str);
        match conf {
            Ok(_) => panic!("Expected error, but got a valid config"),
            Err(e) => {
                eprintln!("Error: {:?}", e);
            }
        }
    }

    #[test]
    fn test_valid_etcd_host_length() {
        init_log();
        let conf_str = r#"
---
listeners:
  - address: "[::1]:8080"

etcd:
  host: []
        "#
        .to_string();
        let conf = Config::from_yaml(&conf_str);
        match conf {
            Ok(_) => panic!("Expected error, but got a valid config"),
            Err(e) => {
                eprintln!("Error: {:?}", e);
            }
        }
    }
}
