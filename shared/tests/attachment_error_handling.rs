use netrep_shared::{
    AttachmentError, HandleKind, MemberKind, NetAttachment, NetHandle, Protocol, ReplicationConfig,
    ReplicationError, ReplicationProtocol, ReplicationSystem,
};

const PEER: u32 = 2;

fn system(config: ReplicationConfig) -> ReplicationSystem {
    let _ = env_logger::builder().is_test(true).try_init();
    let protocols = Protocol::builder()
        .add_replication_protocol(
            ReplicationProtocol::builder(1, "Bell")
                .member("rung", MemberKind::Bool)
                .build(),
        )
        .build();
    let mut system = ReplicationSystem::new(1, protocols, config);
    system.add_connection(PEER).unwrap();
    system
}

#[test]
fn test_attachment_to_object_outside_scope() {
    let mut system = system(ReplicationConfig::default());
    let handle = system.create_object(1, None, HandleKind::Dynamic).unwrap();
    system.set_in_scope(PEER, handle, false).unwrap();
    system.pre_send_update().unwrap();

    let result = system.queue_attachment(PEER, handle, true, NetAttachment::from_bytes(vec![1, 2]));

    assert_eq!(
        result,
        Err(ReplicationError::Attachment(AttachmentError::ObjectNotReplicated { handle }))
    );
}

#[test]
fn test_attachment_before_scope_update() {
    let mut system = system(ReplicationConfig::default());
    let handle = system.create_object(1, None, HandleKind::Dynamic).unwrap();

    // the connection only learns about the object in pre_send_update
    let result = system.queue_attachment(PEER, handle, false, NetAttachment::from_bytes(vec![7]));

    match result {
        Err(ReplicationError::Attachment(AttachmentError::ObjectNotReplicated { handle: rejected })) => {
            assert_eq!(rejected, handle);
        }
        _ => panic!("Expected ObjectNotReplicated error"),
    }

    system.pre_send_update().unwrap();
    assert!(system
        .queue_attachment(PEER, handle, false, NetAttachment::from_bytes(vec![7]))
        .is_ok());
}

#[test]
fn test_attachment_too_large() {
    let config = ReplicationConfig {
        max_huge_object_bits: 64,
        ..ReplicationConfig::default()
    };
    let mut system = system(config);
    let handle = system.create_object(1, None, HandleKind::Dynamic).unwrap();
    system.pre_send_update().unwrap();

    let result = system.queue_attachment(PEER, handle, true, NetAttachment::from_bytes(vec![0; 9]));

    assert_eq!(
        result,
        Err(ReplicationError::Attachment(AttachmentError::AttachmentTooLarge {
            bit_length: 72,
            max_bits: 64
        }))
    );
}

#[test]
fn test_attachment_to_unknown_object() {
    let mut system = system(ReplicationConfig::default());
    let stranger = NetHandle::from_id(90);

    let result = system.queue_attachment(PEER, stranger, true, NetAttachment::from_bytes(vec![1]));

    assert!(matches!(result, Err(ReplicationError::Registry(_))));
}

#[test]
fn test_attachment_error_display() {
    assert_eq!(
        AttachmentError::ReliableQueueFull {
            handle: NetHandle::from_id(8),
            limit: 16
        }
        .to_string(),
        "Reliable attachment queue for 8 is full (16 queued)"
    );
    assert_eq!(
        AttachmentError::AttachmentTooLarge {
            bit_length: 72,
            max_bits: 64
        }
        .to_string(),
        "Attachment of 72 bits exceeds the 64 bit limit"
    );
}

#[test]
fn test_attachment_error_debug_and_clone() {
    let error = AttachmentError::ObjectNotReplicated {
        handle: NetHandle::from_id(12),
    };

    assert_eq!(error.clone(), error);
    assert!(format!("{:?}", error).contains("ObjectNotReplicated"));
}

#[test]
fn test_attachment_error_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<AttachmentError>();
}
