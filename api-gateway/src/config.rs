//! API gateway configuration.
//!
//! Only the HTTP listener is configured here. Ledger, network and metrics
//! settings come from `pbtx::GatewayConfig`, flattened into the same
//! command line and read from the same environment.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use clap::Args;

/// Configuration for the API gateway HTTP server.
#[derive(Clone, Debug, Args)]
pub struct ApiConfig {
    /// TCP port of the HTTP server.
    #[arg(long, env = "PORT")]
    pub port: u16,
    /// Address to bind the HTTP server to.
    #[arg(long = "bindaddr", env = "BINDADDR")]
    pub bind_addr: IpAddr,
    /// Prefix under which the PBTX endpoints are mounted, e.g. `/pbtx`.
    /// `/` mounts them at the root.
    #[arg(long = "url-path", env = "URL_PATH", value_parser = parse_prefix)]
    pub url_path: String,
}

impl ApiConfig {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

fn parse_prefix(raw: &str) -> Result<String, Infallible> {
    Ok(normalize_prefix(raw))
}

/// `"pbtx/"` and `"/pbtx"` both become `"/pbtx"`; `"/"` becomes `""`.
fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use clap::error::ErrorKind;

    #[derive(Debug, Parser)]
    struct TestCli {
        #[command(flatten)]
        api: ApiConfig,
    }

    fn parse(args: &[&str]) -> Result<ApiConfig, clap::Error> {
        TestCli::try_parse_from(std::iter::once("api-gateway").chain(args.iter().copied()))
            .map(|cli| cli.api)
    }

    #[test]
    fn listener_and_prefix_parse() {
        let cfg = parse(&["--port", "8800", "--bindaddr", "0.0.0.0", "--url-path", "pbtx/"])
            .expect("config parses");
        assert_eq!(cfg.listen_addr(), "0.0.0.0:8800".parse().expect("addr"));
        assert_eq!(cfg.url_path, "/pbtx");
    }

    #[test]
    fn root_prefix_is_empty() {
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix("/a/b/"), "/a/b");
    }

    #[test]
    fn bad_port_is_reported() {
        let err = parse(&["--port", "99999", "--bindaddr", "127.0.0.1", "--url-path", "/"])
            .expect_err("port out of range");
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
        assert!(err.to_string().contains("--port"));
    }

    #[test]
    fn listener_options_read_the_environment() {
        let cmd = <TestCli as clap::CommandFactory>::command();
        let envs: Vec<_> = cmd
            .get_arguments()
            .filter_map(|a| a.get_env())
            .map(|e| e.to_string_lossy().into_owned())
            .collect();
        assert_eq!(envs, ["PORT", "BINDADDR", "URL_PATH"]);
    }
}
