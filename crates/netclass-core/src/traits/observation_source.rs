// # Observation Source Trait
//
// Defines the interface through which the capture layer reports what it saw.
//
// ## Line format
//
// Sources that read text (stdin, pipes, replay files) use one observation
// per line:
//
// ```text
// dns <record_type> <fqdn> [<ip>[,<ip>...]]
// conn <destination ip:port> <actual destination ip:port> [<fqdn>]
// ```

use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::str::FromStr;

use tokio_stream::Stream;

use crate::addr::{parse_endpoint, parse_ip};
use crate::error::{Error, Result};
use crate::fqdn::RecordType;

/// Something the capture layer observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// A DNS answer
    Resolution {
        fqdn: String,
        record_type: RecordType,
        ips: Vec<IpAddr>,
    },

    /// An outbound connection
    Connection {
        /// Where the connection was directed
        destination: SocketAddr,
        /// Where the connection was observed to arrive
        actual_destination: SocketAddr,
        /// Hostname the destination was resolved from, when the collector knows it
        fqdn: Option<String>,
    },
}

impl FromStr for Observation {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut fields = line.split_whitespace();
        let kind = fields
            .next()
            .ok_or_else(|| Error::invalid_input("empty observation"))?;

        let observation = match kind {
            "dns" => {
                let record_type: RecordType = required(fields.next(), "record type", line)?.parse()?;
                let fqdn = required(fields.next(), "fqdn", line)?.to_string();
                let ips = match fields.next() {
                    Some(list) => list.split(',').map(parse_ip).collect::<Result<Vec<_>>>()?,
                    None => Vec::new(),
                };
                Observation::Resolution {
                    fqdn,
                    record_type,
                    ips,
                }
            }
            "conn" => Observation::Connection {
                destination: parse_endpoint(required(fields.next(), "destination", line)?)?,
                actual_destination: parse_endpoint(required(
                    fields.next(),
                    "actual destination",
                    line,
                )?)?,
                fqdn: fields.next().map(str::to_string),
            },
            other => {
                return Err(Error::invalid_input(format!(
                    "unknown observation kind '{}'",
                    other
                )));
            }
        };

        if fields.next().is_some() {
            return Err(Error::invalid_input(format!("trailing fields in '{}'", line)));
        }
        Ok(observation)
    }
}

fn required<'a>(field: Option<&'a str>, what: &str, line: &str) -> Result<&'a str> {
    field.ok_or_else(|| Error::invalid_input(format!("missing {} in '{}'", what, line)))
}

/// Trait for observation sources
///
/// Implemented by the capture layer (or by a replay/stdin adapter).
/// Implementations must be thread-safe.
pub trait ObservationSource: Send + Sync {
    /// Stream of observations
    ///
    /// The engine stops when the stream ends. Dropping the stream must
    /// release the source's resources.
    fn watch(&self) -> Pin<Box<dyn Stream<Item = Observation> + Send + 'static>>;
}
