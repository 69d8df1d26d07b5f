use openwire::{
    ConnectionId, DataStructure, EncodingMode, Error, FormatContext, SessionId, SessionInfo,
    WireFormatInfo, negotiate,
};

/// One side of a connection during the opening exchange.
struct Peer {
    advertisement: WireFormatInfo,
    bootstrap: FormatContext,
}

impl Peer {
    fn new(advertisement: WireFormatInfo) -> Self {
        Self {
            advertisement,
            bootstrap: FormatContext::bootstrap(),
        }
    }

    fn hello(&mut self) -> Vec<u8> {
        self.bootstrap
            .marshal(&DataStructure::WireFormatInfo(self.advertisement.clone()))
            .unwrap()
            .to_vec()
    }

    fn complete(&mut self, hello: &[u8]) -> Result<FormatContext, Error> {
        let DataStructure::WireFormatInfo(remote) = self.bootstrap.unmarshal(hello)? else {
            panic!("expected a WireFormatInfo frame");
        };
        negotiate(&self.advertisement, &remote)
    }
}

fn handshake(
    local: WireFormatInfo,
    remote: WireFormatInfo,
) -> (FormatContext, FormatContext) {
    let mut a = Peer::new(local);
    let mut b = Peer::new(remote);
    let hello_a = a.hello();
    let hello_b = b.hello();
    (a.complete(&hello_b).unwrap(), b.complete(&hello_a).unwrap())
}

#[test]
fn peers_agree_on_the_older_version() {
    let (a, b) = handshake(
        WireFormatInfo::advertising(12),
        WireFormatInfo::advertising(9),
    );
    assert_eq!(a.version(), 9);
    assert_eq!(b.version(), 9);
    assert_eq!(a.mode(), EncodingMode::Tight);
    assert_eq!(b.mode(), EncodingMode::Tight);
    assert!(a.cache_enabled());
}

#[test]
fn negotiated_contexts_interoperate() {
    let (mut a, mut b) = handshake(
        WireFormatInfo::advertising(12),
        WireFormatInfo::advertising(10),
    );
    let command = DataStructure::SessionInfo(SessionInfo {
        session_id: Some(SessionId::new("conn-h", 1)),
    });
    // Two frames so the second rides the negotiated identity caches.
    for _ in 0..2 {
        let frame = a.marshal(&command).unwrap();
        assert_eq!(b.unmarshal(&frame).unwrap(), command);
    }
    let reply = DataStructure::ConnectionId(ConnectionId::new("conn-h"));
    let frame = b.marshal(&reply).unwrap();
    assert_eq!(a.unmarshal(&frame).unwrap(), reply);
}

#[test]
fn tight_requires_both_sides() {
    let reluctant = WireFormatInfo {
        tight_encoding_enabled: false,
        ..WireFormatInfo::advertising(12)
    };
    let (a, b) = handshake(WireFormatInfo::advertising(12), reluctant);
    assert_eq!(a.mode(), EncodingMode::Loose);
    assert_eq!(b.mode(), EncodingMode::Loose);
}

#[test]
fn capability_bounds_take_the_smaller_side() {
    let modest = WireFormatInfo {
        cache_size: 64,
        max_frame_size: 1 << 16,
        stack_trace_enabled: false,
        ..WireFormatInfo::advertising(12)
    };
    let (a, b) = handshake(WireFormatInfo::advertising(12), modest);
    for ctx in [&a, &b] {
        assert_eq!(ctx.cache_size(), 64);
        assert_eq!(ctx.max_frame_size(), 1 << 16);
        assert!(!ctx.stack_traces());
    }
}

/// The hello frame itself validates the magic during unmarshalling, before
/// negotiation even sees it.
#[test]
fn corrupt_magic_fails_the_handshake() {
    let mut honest = Peer::new(WireFormatInfo::advertising(12));
    let mut liar = Peer::new(WireFormatInfo {
        magic: *b"ActiveMQ",
        ..WireFormatInfo::advertising(12)
    });
    let hello = liar.hello();
    assert!(matches!(
        honest.complete(&hello),
        Err(Error::InvalidMagic { found }) if &found == b"ActiveMQ"
    ));
}

/// A peer advertising a negative version is rejected with the exact value
/// it put on the wire.
#[test]
fn negative_advertised_version_is_reported_verbatim() {
    use openwire::{MAGIC, type_code};

    let mut body = vec![type_code::WIREFORMAT_INFO];
    body.extend_from_slice(&MAGIC);
    body.extend_from_slice(&(-3i32).to_be_bytes());
    body.push(0); // no capability blob
    let mut frame = (body.len() as u32).to_be_bytes().to_vec();
    frame.extend_from_slice(&body);

    let mut receiver = FormatContext::bootstrap();
    assert!(matches!(
        receiver.unmarshal(&frame),
        Err(Error::UnsupportedVersion { version: -3, .. })
    ));
}

#[test]
fn version_below_the_floor_is_unsupported() {
    let ancient = WireFormatInfo {
        version: 0,
        ..WireFormatInfo::advertising(12)
    };
    let result = negotiate(&WireFormatInfo::advertising(12), &ancient);
    assert!(matches!(
        result,
        Err(Error::UnsupportedVersion {
            version: 0,
            min: 1,
            max: 12
        })
    ));
}

/// After negotiating down, fields younger than the agreed version never
/// reach the wire, no matter what the local structures hold.
#[test]
fn fields_above_the_negotiated_version_never_encode() {
    use openwire::ConnectionInfo;

    let (mut a, mut b) = handshake(
        WireFormatInfo::advertising(12),
        WireFormatInfo::advertising(6),
    );
    // Distinct ids of equal length so neither frame rides the cache.
    let with_ip = DataStructure::ConnectionInfo(ConnectionInfo {
        connection_id: Some(ConnectionId::new("conn-v6-a")),
        client_ip: Some("10.1.2.3".into()), // introduced in version 8
        ..ConnectionInfo::default()
    });
    let without_ip = DataStructure::ConnectionInfo(ConnectionInfo {
        connection_id: Some(ConnectionId::new("conn-v6-b")),
        client_ip: None,
        ..ConnectionInfo::default()
    });

    let frame_with = a.marshal(&with_ip).unwrap();
    let frame_without = a.marshal(&without_ip).unwrap();
    assert_eq!(frame_with.len(), frame_without.len());

    let DataStructure::ConnectionInfo(decoded) = b.unmarshal(&frame_with).unwrap() else {
        panic!("wrong variant");
    };
    assert_eq!(decoded.client_ip, None);
}

/// The bootstrap context can read a hello from any peer because the
/// `WireFormatInfo` schema has been frozen since version 1.
#[test]
fn bootstrap_reads_hellos_from_every_version() {
    for version in 1..=12 {
        let mut sender = Peer::new(WireFormatInfo::advertising(version));
        let hello = sender.hello();
        let mut receiver = FormatContext::bootstrap();
        let DataStructure::WireFormatInfo(info) = receiver.unmarshal(&hello).unwrap() else {
            panic!("expected a WireFormatInfo frame");
        };
        assert_eq!(info.version, version);
        assert!(info.tight_encoding_enabled);
    }
}
