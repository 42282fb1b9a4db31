//! Parser for `/proc/<pid>/net/dev`, the interface counters of a process'
//! network namespace.

use std::collections::BTreeMap;
use std::io::BufRead;

use serde::Serialize;

use crate::parser::{StatParseError, parse_u64};

/// Counters of one network interface, as reported in `/proc/net/dev`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct InterfaceStat {
    /// Bytes received.
    pub rx_bytes: u64,
    /// Packets received.
    pub rx_packets: u64,
    /// Receive errors.
    pub rx_errs: u64,
    /// Dropped packets while receiving.
    pub rx_drop: u64,
    /// FIFO buffer errors while receiving.
    pub rx_fifo: u64,
    /// Frame alignment errors while receiving.
    pub rx_frame: u64,
    /// Compressed packets received.
    pub rx_compressed: u64,
    /// Multicast packets received.
    pub rx_multicast: u64,

    /// Bytes transmitted.
    pub tx_bytes: u64,
    /// Packets transmitted.
    pub tx_packets: u64,
    /// Transmit errors.
    pub tx_errs: u64,
    /// Dropped packets while transmitting.
    pub tx_drop: u64,
    /// FIFO buffer errors while transmitting.
    pub tx_fifo: u64,
    /// Collisions detected while transmitting.
    pub tx_colls: u64,
    /// Carrier loss errors while transmitting.
    pub tx_carrier: u64,
    /// Compressed packets transmitted.
    pub tx_compressed: u64,
}

impl std::ops::AddAssign for InterfaceStat {
    fn add_assign(&mut self, rhs: Self) {
        self.rx_bytes += rhs.rx_bytes;
        self.rx_packets += rhs.rx_packets;
        self.rx_errs += rhs.rx_errs;
        self.rx_drop += rhs.rx_drop;
        self.rx_fifo += rhs.rx_fifo;
        self.rx_frame += rhs.rx_frame;
        self.rx_compressed += rhs.rx_compressed;
        self.rx_multicast += rhs.rx_multicast;
        self.tx_bytes += rhs.tx_bytes;
        self.tx_packets += rhs.tx_packets;
        self.tx_errs += rhs.tx_errs;
        self.tx_drop += rhs.tx_drop;
        self.tx_fifo += rhs.tx_fifo;
        self.tx_colls += rhs.tx_colls;
        self.tx_carrier += rhs.tx_carrier;
        self.tx_compressed += rhs.tx_compressed;
    }
}

const LOOPBACK: &str = "lo";
const HEADER_LINES: usize = 2;
const FIELD_COUNT: usize = 16;

/// Interface counters of a network namespace, loopback excluded.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct NetworkCounters {
    /// Sum over all non-loopback interfaces.
    pub total: InterfaceStat,
    pub interfaces: BTreeMap<String, InterfaceStat>,
}

impl NetworkCounters {
    /// Parses a `/proc/net/dev` formatted buffer.
    ///
    /// The two header lines are skipped. Each following line holds an
    /// interface name, a colon and 16 counters.
    ///
    /// # Errors
    ///
    /// - [`StatParseError::UnexpectedFormat`] if a line lacks the colon or has
    ///   fewer than 16 counters.
    /// - [`StatParseError::InvalidValue`] if a counter is not a `u64`.
    pub fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        let mut counters = NetworkCounters::default();
        let mut line = String::new();
        let mut lineno = 0;

        while buf.read_line(&mut line)? != 0 {
            lineno += 1;
            if lineno <= HEADER_LINES || line.trim().is_empty() {
                line.clear();
                continue;
            }

            let unexpected = || StatParseError::UnexpectedFormat {
                content: line.trim().to_string(),
                line: lineno,
            };
            let (iface, data) = line.trim().split_once(':').ok_or_else(unexpected)?;
            let fields = data
                .split_whitespace()
                .map(|field| parse_u64(field, lineno))
                .collect::<Result<Vec<u64>, _>>()?;
            if fields.len() < FIELD_COUNT {
                return Err(unexpected().into());
            }

            if iface != LOOPBACK {
                let stat = stats_from_fields(&fields);
                counters.total += stat;
                counters.interfaces.insert(iface.to_string(), stat);
            }
            line.clear();
        }

        Ok(counters)
    }
}

fn stats_from_fields(f: &[u64]) -> InterfaceStat {
    InterfaceStat {
        rx_bytes: f[0],
        rx_packets: f[1],
        rx_errs: f[2],
        rx_drop: f[3],
        rx_fifo: f[4],
        rx_frame: f[5],
        rx_compressed: f[6],
        rx_multicast: f[7],
        tx_bytes: f[8],
        tx_packets: f[9],
        tx_errs: f[10],
        tx_drop: f[11],
        tx_fifo: f[12],
        tx_colls: f[13],
        tx_carrier: f[14],
        tx_compressed: f[15],
    }
}
