use std::time::{Duration, Instant};

use log::debug;
use netrep_shared::{
    BitReader, BitWriter, ConnectionId, HandleKind, MemberValue, NetHandle, ProtocolId, ReaderEvent,
    ReplicatedObjectState, ReplicationConfig, ReplicationReader, ReplicationSystem, ReplicationWriter,
    WriteResult,
};

use crate::{
    local_link::{LinkConditions, LocalLink},
    test_protocol::protocol,
    test_world::TestWorld,
};

/// Connection id the server knows the client by.
pub const CLIENT_ID: ConnectionId = 2;
/// Connection id the client knows the server by.
pub const SERVER_ID: ConnectionId = 1;

/// A sending and a receiving replication system joined by a [`LocalLink`].
pub struct TestPeers {
    pub server: ReplicationSystem,
    pub client: ReplicationSystem,
    pub world: TestWorld,
    pub link: LocalLink,
    pub now: Instant,
    pub max_packets_per_tick: usize,
}

impl Default for TestPeers {
    fn default() -> Self {
        Self::new()
    }
}

impl TestPeers {
    pub fn new() -> Self {
        Self::with(ReplicationConfig::default(), LinkConditions::perfect())
    }

    pub fn with(config: ReplicationConfig, conditions: LinkConditions) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut server = ReplicationSystem::new(1, protocol(), config.clone());
        let mut client = ReplicationSystem::new(2, protocol(), config);
        server.add_connection(CLIENT_ID).expect("fresh server");
        client.add_connection(SERVER_ID).expect("fresh client");
        Self {
            server,
            client,
            world: TestWorld::new(),
            link: LocalLink::new(conditions),
            now: Instant::now(),
            max_packets_per_tick: 16,
        }
    }

    // Server side

    pub fn create(&mut self, protocol_id: ProtocolId) -> NetHandle {
        self.server
            .create_object(protocol_id, None, HandleKind::Dynamic)
            .expect("object created")
    }

    pub fn set(&mut self, handle: NetHandle, member_index: usize, value: MemberValue) {
        self.server
            .set_member(handle, member_index, value)
            .expect("member set");
    }

    pub fn server_writer(&self) -> &ReplicationWriter {
        &self.server.connection(CLIENT_ID).expect("client connection").writer
    }

    pub fn server_state(&self, handle: NetHandle) -> ReplicatedObjectState {
        match self.server.registry().index_of(handle) {
            Some(index) => self.server_writer().object_state(index),
            None => ReplicatedObjectState::Invalid,
        }
    }

    // Client side

    pub fn remote(&self) -> &ReplicationReader {
        &self.client.connection(SERVER_ID).expect("server connection").reader
    }

    pub fn take_events(&mut self) -> Vec<ReaderEvent> {
        self.client
            .take_reader_events(SERVER_ID)
            .expect("server connection")
    }

    // Ticking

    /// Runs the server's pre-send update and writes packets onto the link
    /// until it has nothing more to say. Returns the number of packets.
    pub fn send(&mut self) -> usize {
        self.server.pre_send_update().expect("pre-send update");
        let mut written = 0;
        for _ in 0..self.max_packets_per_tick {
            let mut writer = BitWriter::new();
            let result = self
                .server
                .write_packet(CLIENT_ID, &mut writer)
                .expect("packet written");
            if result == WriteResult::NoData {
                break;
            }
            self.link.send(writer.to_bytes());
            written += 1;
            if result == WriteResult::Ok {
                break;
            }
        }
        written
    }

    /// Delivers whatever the link lets through, reports every packet's
    /// fate back to the server, then retries queued data on the client.
    pub fn deliver(&mut self) {
        let (arrived, statuses) = self.link.flush();
        for bytes in arrived {
            let mut reader = BitReader::new(&bytes);
            self.client
                .read_packet(SERVER_ID, &mut reader, &mut self.world, self.now)
                .expect("packet read");
        }
        for status in statuses {
            self.server
                .notify_packet_delivery(CLIENT_ID, status)
                .expect("delivery processed");
        }
        self.client
            .process_queued_batches(&mut self.world, self.now)
            .expect("queued batches processed");
    }

    pub fn tick(&mut self) -> usize {
        let written = self.send();
        self.deliver();
        written
    }

    pub fn tick_n(&mut self, count: usize) {
        for _ in 0..count {
            self.tick();
        }
    }

    /// Ticks until the server has nothing left to send, at most
    /// `max_ticks` times. Returns the number of ticks that wrote packets.
    pub fn settle(&mut self, max_ticks: usize) -> usize {
        let mut busy = 0;
        for _ in 0..max_ticks {
            if self.tick() == 0 && self.server_writer().in_flight_packet_count() == 0 {
                break;
            }
            busy += 1;
        }
        debug!("settled after {} busy ticks", busy);
        busy
    }

    pub fn advance(&mut self, duration: Duration) {
        self.now += duration;
    }
}
