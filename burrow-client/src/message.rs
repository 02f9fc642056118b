use bytes::Bytes;

/// A delivered message: the reassembled body, nothing else.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    body: Bytes,
}

impl Message {
    pub fn new(body: Bytes) -> Self {
        Self { body }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }
}

impl From<Vec<u8>> for Message {
    fn from(body: Vec<u8>) -> Self {
        Self { body: Bytes::from(body) }
    }
}
