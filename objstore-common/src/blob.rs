use bytes::Bytes;

/// An immutable `(data, metadata)` pair stored by value.
///
/// Either half may be absent (a pure-metadata marker object, or a
/// data-only object with no side channel). Once constructed a blob is
/// never mutated — handles share its bytes across threads with no
/// further synchronization.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Blob {
    data: Option<Bytes>,
    metadata: Option<Bytes>,
}

impl Blob {
    /// Builds a blob from optional data and metadata.
    pub fn new(data: Option<Bytes>, metadata: Option<Bytes>) -> Self {
        Self { data, metadata }
    }

    /// Builds a data-only blob.
    pub fn from_data(data: impl Into<Bytes>) -> Self {
        Self {
            data: Some(data.into()),
            metadata: None,
        }
    }

    pub fn data(&self) -> Option<&Bytes> {
        self.data.as_ref()
    }

    pub fn metadata(&self) -> Option<&Bytes> {
        self.metadata.as_ref()
    }

    /// The blob's size: the sum of the present halves.
    pub fn size(&self) -> u64 {
        let data_len = self.data.as_ref().map_or(0, |b| b.len() as u64);
        let metadata_len = self.metadata.as_ref().map_or(0, |b| b.len() as u64);
        data_len + metadata_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_sums_both_halves() {
        let blob = Blob::new(Some(Bytes::from_static(b"hello")), Some(Bytes::from_static(b"meta")));
        assert_eq!(blob.size(), 9);
    }

    #[test]
    fn size_with_absent_half() {
        let blob = Blob::from_data("hello");
        assert_eq!(blob.size(), 5);
        assert!(blob.metadata().is_none());
    }

    #[test]
    fn empty_blob_has_zero_size() {
        let blob = Blob::default();
        assert_eq!(blob.size(), 0);
    }
}
