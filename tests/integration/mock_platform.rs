//! Mock adapters for host-side integration tests.
//!
//! Every port gets a scripted double that records what the agent did
//! to it, so tests can assert on call counts and payloads rather than
//! just outcomes.

use std::collections::HashMap;

use otagent::agent::ports::{
    FlashError, FlashPort, HttpError, HttpPort, HttpResponse, ImageStream, PartitionPair,
    PartitionRef, StorageError, StoragePort,
};

// ── Storage ───────────────────────────────────────────────────

/// In-memory storage that counts mutations.
#[derive(Default)]
pub struct MockStorage {
    map: HashMap<(String, String), Vec<u8>>,
    pub write_ops: usize,
}

impl MockStorage {
    pub fn preload(&mut self, namespace: &str, key: &str, data: &[u8]) {
        self.map
            .insert((namespace.into(), key.into()), data.to_vec());
    }
}

impl StoragePort for MockStorage {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let data = self
            .map
            .get(&(namespace.into(), key.into()))
            .ok_or(StorageError::NotFound)?;
        if data.len() > buf.len() {
            return Err(StorageError::BufferTooSmall);
        }
        buf[..data.len()].copy_from_slice(data);
        Ok(data.len())
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.write_ops += 1;
        self.map
            .insert((namespace.into(), key.into()), data.to_vec());
        Ok(())
    }

    fn write_batch(
        &mut self,
        namespace: &str,
        entries: &[(&str, &[u8])],
    ) -> Result<(), StorageError> {
        self.write_ops += 1;
        for (key, data) in entries {
            self.map
                .insert((namespace.into(), (*key).into()), data.to_vec());
        }
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.write_ops += 1;
        self.map
            .remove(&(namespace.into(), key.into()))
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.map.contains_key(&(namespace.into(), key.into()))
    }
}

// ── HTTP ──────────────────────────────────────────────────────

/// Scripted HTTP double: one canned POST reply, one canned GET reply,
/// and an image body served through the streaming interface.
pub struct MockHttp {
    pub post_reply: (u16, String),
    pub get_reply: (u16, String),
    pub image: Vec<u8>,
    pub truncate_stream_at: Option<usize>,
    pub posts: usize,
    pub gets: usize,
    pub streams_opened: usize,
    pub identity: Option<(String, String)>,
    pub last_post_body: Option<Vec<u8>>,
}

impl Default for MockHttp {
    fn default() -> Self {
        Self {
            post_reply: (500, String::new()),
            get_reply: (500, String::new()),
            image: Vec::new(),
            truncate_stream_at: None,
            posts: 0,
            gets: 0,
            streams_opened: 0,
            identity: None,
            last_post_body: None,
        }
    }
}

pub struct MockStream {
    chunks: Vec<Vec<u8>>,
    pos: usize,
    advertised: usize,
    served: usize,
}

impl ImageStream for MockStream {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, HttpError> {
        if self.pos >= self.chunks.len() {
            return Ok(0);
        }
        let chunk = &self.chunks[self.pos];
        self.pos += 1;
        buf[..chunk.len()].copy_from_slice(chunk);
        self.served += chunk.len();
        Ok(chunk.len())
    }

    fn is_complete(&self) -> bool {
        self.served >= self.advertised
    }
}

impl HttpPort for MockHttp {
    type Stream = MockStream;

    fn set_client_identity(&mut self, cert_pem: &str, key_pem: &str) -> Result<(), HttpError> {
        self.identity = Some((cert_pem.to_string(), key_pem.to_string()));
        Ok(())
    }

    fn post_json(&mut self, _url: &str, body: &[u8]) -> Result<HttpResponse, HttpError> {
        self.posts += 1;
        self.last_post_body = Some(body.to_vec());
        Ok(HttpResponse {
            status: self.post_reply.0,
            body: self.post_reply.1.as_bytes().to_vec(),
        })
    }

    fn get(&mut self, _url: &str) -> Result<HttpResponse, HttpError> {
        self.gets += 1;
        Ok(HttpResponse {
            status: self.get_reply.0,
            body: self.get_reply.1.as_bytes().to_vec(),
        })
    }

    fn open_stream(&mut self, _url: &str) -> Result<Self::Stream, HttpError> {
        self.streams_opened += 1;
        let advertised = self.image.len();
        let body = match self.truncate_stream_at {
            Some(cut) => &self.image[..cut.min(self.image.len())],
            None => &self.image[..],
        };
        let chunks = body.chunks(1024).map(<[u8]>::to_vec).collect();
        Ok(MockStream {
            chunks,
            pos: 0,
            advertised,
            served: 0,
        })
    }
}

// ── Flash ─────────────────────────────────────────────────────

/// Flash double recording the full call sequence.
#[derive(Default)]
pub struct MockFlash {
    pub began: usize,
    pub written: Vec<u8>,
    pub finalized: bool,
    pub aborted: bool,
    pub armed_label: Option<String>,
}

fn partition(label: &str, offset: u32) -> PartitionRef {
    let mut l = heapless::String::new();
    l.push_str(label).unwrap();
    PartitionRef {
        label: l,
        offset,
        size: 0x1a_0000,
    }
}

impl FlashPort for MockFlash {
    fn resolve_partitions(&mut self) -> Result<PartitionPair, FlashError> {
        Ok(PartitionPair {
            running: partition("ota_0", 0x1_0000),
            update_target: partition("ota_1", 0x1b_0000),
        })
    }

    fn begin(&mut self, _target: &PartitionRef) -> Result<(), FlashError> {
        self.began += 1;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<(), FlashError> {
        self.written.extend_from_slice(data);
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), FlashError> {
        self.finalized = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.aborted = true;
    }

    fn arm_boot_target(&mut self, target: &PartitionRef) -> Result<(), FlashError> {
        self.armed_label = Some(target.label.as_str().to_string());
        Ok(())
    }
}

// ── Fixtures ──────────────────────────────────────────────────

/// A plausible ESP application image body.
pub fn fake_image(len: usize) -> Vec<u8> {
    assert!(len > 288);
    let mut img = vec![0u8; len];
    img[0] = 0xE9;
    img
}

/// A registration reply carrying a certificate.
pub fn register_success_body() -> String {
    r#"{"status":"success","certificate":"-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n"}"#
        .to_string()
}

/// A version reply for `version` at `url`.
pub fn version_body(version: &str, url: &str) -> String {
    format!(r#"{{"version":"{version}","url":"{url}"}}"#)
}
