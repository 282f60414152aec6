//! Serial decode loop between a capture device and a firewall
//!
//! Capture and blocking live outside this crate: a [`FrameSource`] hands in
//! frames, and the callback passed to [`Defender::run`] receives one
//! [`Observation`] per decoded DNS packet.

use std::collections::VecDeque;
use std::io;
use std::net::Ipv4Addr;

use log::{debug, trace, warn};

use crate::packet::Packet;
use crate::storage::{HeaderStorage, StorageConfig};
use crate::{Error, RawFrame};

pub trait FrameSource {
    /// Fills `frame` with the next frame. Returns `false` once the source is
    /// exhausted.
    fn read_frame(&mut self, frame: &mut RawFrame) -> io::Result<bool>;
}

impl FrameSource for VecDeque<Vec<u8>> {
    fn read_frame(&mut self, frame: &mut RawFrame) -> io::Result<bool> {
        match self.pop_front() {
            Some(bytes) => {
                frame
                    .load(&bytes)
                    .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub name: String,
    pub qtype: u16,
    pub qclass: u16,
}

/// What a firewall needs to know about one DNS packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub source_port: u16,
    pub id: u16,
    pub response: bool,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PumpStats {
    pub frames: u64,
    pub decoded: u64,
    /// Dropped because they were truncated or malformed
    pub malformed: u64,
    /// Dropped because some layer isn't one this crate decodes
    pub unsupported: u64,
}

impl HeaderStorage {
    /// Extracts the observation for a packet that decoded down to DNS
    pub fn observe(&self, packet: &Packet) -> Option<Observation> {
        let ip = self.ipv4(packet)?;
        let udp = self.udp(packet)?;
        let dns = self.dns(packet)?;

        let questions = self
            .questions(dns.questions)
            .map(|query| Question {
                name: self.domain_name(query.qname),
                qtype: query.qtype,
                qclass: query.qclass,
            })
            .collect();

        Some(Observation {
            source: ip.src,
            destination: ip.dest,
            source_port: udp.src_port,
            id: dns.id,
            response: dns.flags.response(),
            questions,
        })
    }
}

pub struct Defender<S: FrameSource> {
    source: S,
    storage: HeaderStorage,
    frame: Box<RawFrame>,
    stats: PumpStats,
}

impl<S: FrameSource> Defender<S> {
    pub fn new(source: S) -> Defender<S> {
        Defender::with_config(source, StorageConfig::default())
    }

    pub fn with_config(source: S, config: StorageConfig) -> Defender<S> {
        Defender {
            source,
            storage: HeaderStorage::with_config(config),
            frame: Box::new(RawFrame::new()),
            stats: PumpStats::default(),
        }
    }

    pub fn storage(&self) -> &HeaderStorage {
        &self.storage
    }

    pub fn stats(&self) -> PumpStats {
        self.stats
    }

    /// Decodes frames until the source is exhausted.
    ///
    /// Frames that don't decode are counted and dropped. A failing source or
    /// an arena that can't grow stop the loop with an error.
    pub fn run<F>(&mut self, mut callback: F) -> io::Result<PumpStats>
    where
        F: FnMut(&Observation),
    {
        loop {
            match self.source.read_frame(&mut self.frame) {
                Ok(true) => (),
                Ok(false) => return Ok(self.stats),
                Err(err) => {
                    warn!("couldn't read frame: {}", err);
                    return Err(err);
                }
            }
            self.stats.frames += 1;

            let packet = match self.storage.decode(&self.frame) {
                Ok(packet) => packet,
                Err(err @ Error::UnsupportedType { .. }) => {
                    debug!("dropping frame {}: {}", self.stats.frames, err);
                    self.stats.unsupported += 1;
                    continue;
                }
                Err(err) if err.is_malformed() => {
                    debug!("dropping frame {}: {}", self.stats.frames, err);
                    self.stats.malformed += 1;
                    continue;
                }
                Err(err) => return Err(io::Error::new(io::ErrorKind::OutOfMemory, err)),
            };
            self.stats.decoded += 1;

            if let Some(observation) = self.storage.observe(&packet) {
                trace!("observed {:?}", observation);
                callback(&observation);
            }
            self.storage.release(packet);
        }
    }
}
