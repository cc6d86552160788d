//! CLI surface: every option accepts its single-char short (`-s`), its
//! double-dash long (`--socket`), and a single-dash long spelling
//! (`-socket`). clap's own alias mechanism only covers the first two —
//! a bare `-socket` would otherwise be parsed as six bundled short flags
//! — so [`normalize_argv`] rewrites recognized single-dash long tokens to
//! their `--long` form before the argv ever reaches clap.

use clap::{Arg, ArgAction, Command};

/// Long flag names eligible for the single-dash spelling, e.g. `-socket`
/// alongside `-s`/`--socket`.
const LONG_FLAGS: &[&str] = &["socket", "http", "tcp", "web", "verbose", "help", "version"];

/// Rewrites recognized `-flag`/`-flag=value` tokens to `--flag`/`--flag=value`
/// so clap's long-flag parsing picks them up instead of treating them as
/// bundled short flags. Tokens that don't match a known long name (short
/// flags, `--` long flags, values, unknown flags) pass through untouched.
fn normalize_argv<I, T>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = T>,
    T: Into<String>,
{
    args.into_iter()
        .map(|arg| {
            let arg = arg.into();
            let Some(rest) = arg.strip_prefix('-') else {
                return arg;
            };
            if rest.starts_with('-') {
                return arg;
            }
            let name = rest.split('=').next().unwrap_or(rest);
            if LONG_FLAGS.contains(&name) {
                format!("-{arg}")
            } else {
                arg
            }
        })
        .collect()
}

/// Producer-facing transport selection: defaults per-OS, with a `tcp`
/// override.
#[derive(Debug, Clone)]
pub enum ProducerTransport {
    /// Default per-OS: Unix domain socket on POSIX, named pipe on Windows.
    Default { socket_path: Option<String> },
    /// `-tcp [port]`: producers connect over TCP. `0` auto-assigns a port.
    Tcp { port: u16 },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub producer_transport: ProducerTransport,
    pub http_bind: String,
    pub web_dir: Option<String>,
    pub verbose: bool,
}

fn command() -> Command {
    Command::new("jgd")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Isaac Wismer")
        .about("Broker bridging statistical-plotting producers to browser viewers")
        .arg(
            Arg::new("socket")
                .help("Unix-socket path override for producer connections")
                .short('s')
                .long("socket")
                .value_name("abs-path"),
        )
        .arg(
            Arg::new("http")
                .help("HTTP bind address for the viewer UI and /ws upgrade")
                .long("http")
                .value_name("host:port")
                .default_value("127.0.0.1:0"),
        )
        .arg(
            Arg::new("tcp")
                .help("Use TCP for producer connections instead of the per-OS default; 0 auto-assigns a port")
                .short('t')
                .long("tcp")
                .value_name("port")
                .num_args(0..=1)
                .default_missing_value("0"),
        )
        .arg(
            Arg::new("web")
                .help("Serve the viewer UI from a filesystem directory instead of the embedded bundle")
                .short('w')
                .long("web")
                .value_name("dir"),
        )
        .arg(
            Arg::new("verbose")
                .help("Log dropped/unknown messages at info instead of debug")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue),
        )
}

impl Config {
    pub fn parse() -> Self {
        let argv = normalize_argv(std::env::args());
        Self::from_matches(&command().get_matches_from(argv))
    }

    fn from_matches(matches: &clap::ArgMatches) -> Self {
        let producer_transport = match matches.get_one::<String>("tcp") {
            Some(port_str) => ProducerTransport::Tcp {
                port: port_str.parse().unwrap_or(0),
            },
            None => ProducerTransport::Default {
                socket_path: matches.get_one::<String>("socket").cloned(),
            },
        };

        Config {
            producer_transport,
            http_bind: matches
                .get_one::<String>("http")
                .cloned()
                .unwrap_or_else(|| "127.0.0.1:0".to_owned()),
            web_dir: matches.get_one::<String>("web").cloned(),
            verbose: matches.get_flag("verbose"),
        }
    }
}
