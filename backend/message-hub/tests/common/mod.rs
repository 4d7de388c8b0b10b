//! Shared harness for message-hub integration tests

#![allow(dead_code)]

pub mod fakes;
pub mod fixtures;
pub mod memory_repo;

use fakes::{MemoryBlobStore, RecordingNotifier, StaticFrameExtractor};
use memory_repo::MemoryMessageRepository;
use message_hub::capability::CapabilityVerifier;
use message_hub::notifications::NotificationFanout;
use message_hub::services::{AttachmentProcessor, MessageService};
use std::sync::Arc;

pub const JPEG_QUALITY: u8 = 90;

/// Service wired to in-memory collaborators, with handles for assertions
pub struct Harness {
    pub service: MessageService,
    pub repo: Arc<MemoryMessageRepository>,
    pub blobs: Arc<MemoryBlobStore>,
    pub frames: Arc<StaticFrameExtractor>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_frames(StaticFrameExtractor::returning(fixtures::jpeg(8, 8, None)))
    }

    pub fn with_frames(frames: StaticFrameExtractor) -> Self {
        let repo = Arc::new(MemoryMessageRepository::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        let frames = Arc::new(frames);
        let notifier = Arc::new(RecordingNotifier::new());

        let verifier = CapabilityVerifier::from_pem(fixtures::TEST_PUBLIC_KEY, fixtures::HUB_ADDRESS)
            .expect("test public key");
        let attachments = AttachmentProcessor::new(blobs.clone(), frames.clone(), JPEG_QUALITY);
        let service = MessageService::new(
            repo.clone(),
            attachments,
            verifier,
            NotificationFanout::new(notifier.clone()),
        );

        Self {
            service,
            repo,
            blobs,
            frames,
            notifier,
        }
    }
}
