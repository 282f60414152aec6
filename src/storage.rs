use crate::arena::{HeaderArena, Slot};
use crate::dns_parser::{DnsLabel, DnsMessage, DnsQuery, DnsResourceRecord};
use crate::ethernet::EthernetHeader;
use crate::ipv4::Ipv4Header;
use crate::packet::PacketRecord;
use crate::udp::UdpHeader;
use crate::Error;

/// Seed capacity of every arena, i.e. the size of its first entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageConfig {
    pub ethernet: usize,
    pub ipv4: usize,
    pub udp: usize,
    pub dns: usize,
    pub labels: usize,
    pub queries: usize,
    pub records: usize,
    pub packets: usize,
}

impl StorageConfig {
    pub fn with_seed(seed: usize) -> StorageConfig {
        StorageConfig {
            ethernet: seed,
            ipv4: seed,
            udp: seed,
            dns: seed,
            labels: seed,
            queries: seed,
            records: seed,
            packets: seed,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> StorageConfig {
        StorageConfig {
            ethernet: 8,
            ipv4: 8,
            udp: 8,
            dns: 8,
            labels: 64,
            queries: 8,
            records: 32,
            packets: 8,
        }
    }
}

/// A record type that lives in one of the arenas of `HeaderStorage`
pub trait Record: Default + Sized {
    fn arena(storage: &HeaderStorage) -> &HeaderArena<Self>;

    fn arena_mut(storage: &mut HeaderStorage) -> &mut HeaderArena<Self>;

    /// Returns the slot and everything linked from it to their arenas
    fn release(storage: &mut HeaderStorage, slot: Slot<Self>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaStats {
    pub name: &'static str,
    pub entries: usize,
    pub capacity: usize,
    pub available: usize,
}

/// The set of arenas one decode/encode pipeline allocates from.
///
/// Not synchronized: keep one storage per worker and hand it frames serially.
#[derive(Debug)]
pub struct HeaderStorage {
    pub(crate) ethernet: HeaderArena<EthernetHeader>,
    pub(crate) ipv4: HeaderArena<Ipv4Header>,
    pub(crate) udp: HeaderArena<UdpHeader>,
    pub(crate) dns: HeaderArena<DnsMessage>,
    pub(crate) labels: HeaderArena<DnsLabel>,
    pub(crate) queries: HeaderArena<DnsQuery>,
    pub(crate) records: HeaderArena<DnsResourceRecord>,
    pub(crate) packets: HeaderArena<PacketRecord>,
}

impl HeaderStorage {
    pub fn new() -> HeaderStorage {
        HeaderStorage::with_config(StorageConfig::default())
    }

    pub fn with_config(config: StorageConfig) -> HeaderStorage {
        HeaderStorage {
            ethernet: HeaderArena::new("ethernet", config.ethernet),
            ipv4: HeaderArena::new("ipv4", config.ipv4),
            udp: HeaderArena::new("udp", config.udp),
            dns: HeaderArena::new("dns", config.dns),
            labels: HeaderArena::new("label", config.labels),
            queries: HeaderArena::new("query", config.queries),
            records: HeaderArena::new("record", config.records),
            packets: HeaderArena::new("packet", config.packets),
        }
    }

    /// Allocates a `T` and lets `fill` populate it. If `fill` fails the slot
    /// and whatever `fill` already linked into it are released again.
    pub(crate) fn build<T, F>(&mut self, fill: F) -> Result<Slot<T>, Error>
    where
        T: Record,
        F: FnOnce(&mut HeaderStorage, Slot<T>) -> Result<(), Error>,
    {
        let slot = T::arena_mut(self).allocate()?;
        match fill(self, slot) {
            Ok(()) => Ok(slot),
            Err(err) => {
                T::release(self, slot);
                Err(err)
            }
        }
    }

    pub fn stats(&self) -> Vec<ArenaStats> {
        fn stats<T>(arena: &HeaderArena<T>) -> ArenaStats {
            ArenaStats {
                name: arena.name(),
                entries: arena.entries(),
                capacity: arena.capacity(),
                available: arena.available(),
            }
        }

        vec![
            stats(&self.ethernet),
            stats(&self.ipv4),
            stats(&self.udp),
            stats(&self.dns),
            stats(&self.labels),
            stats(&self.queries),
            stats(&self.records),
            stats(&self.packets),
        ]
    }

    /// Number of slots currently handed out across all arenas
    pub fn outstanding(&self) -> usize {
        self.stats().iter().map(|s| s.capacity - s.available).sum()
    }
}

impl Default for HeaderStorage {
    fn default() -> HeaderStorage {
        HeaderStorage::new()
    }
}

#[cfg(test)]
mod test {
    use super::{HeaderStorage, StorageConfig};

    #[test]
    fn arenas_start_empty() {
        let storage = HeaderStorage::with_config(StorageConfig::with_seed(2));
        assert_eq!(storage.outstanding(), 0);
        assert!(storage.stats().iter().all(|s| s.entries == 0));
        assert_eq!(storage.stats().len(), 8);
    }
}
