use bytes::{BufMut, Bytes, BytesMut};

/// A single header line as it appeared on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: Bytes,
}

/// Insertion-ordered header list.
///
/// HTTP allows the same field name to repeat, so lookups are case-insensitive
/// and duplicates are kept in the order they were received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList {
    entries: Vec<Header>,
}

impl HeaderList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `Name: value` lines. Lines without a colon are skipped.
    pub fn from_lines<'a, I>(lines: I) -> Self
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut list = Self::new();
        for line in lines {
            let Some(colon) = line.iter().position(|b| *b == b':') else {
                continue;
            };
            let name = match std::str::from_utf8(&line[..colon]) {
                Ok(n) => n.trim(),
                Err(_) => continue,
            };
            if name.is_empty() {
                continue;
            }
            let value = line[colon.saturating_add(1)..].trim_ascii();
            list.push(name, Bytes::copy_from_slice(value));
        }
        list
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Bytes>) {
        self.entries.push(Header { name: name.into(), value: value.into() });
    }

    /// First value for `name`
    pub fn get(&self, name: &str) -> Option<&Bytes> {
        self.entries
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| &h.value)
    }

    /// Every value for `name`, in arrival order
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Bytes> + 'a {
        self.entries
            .iter()
            .filter(move |h| h.name.eq_ignore_ascii_case(name))
            .map(|h| &h.value)
    }

    /// Case-insensitive presence check
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Remove every occurrence of `name`, returning how many were dropped
    pub fn remove_all(&mut self, name: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|h| !h.name.eq_ignore_ascii_case(name));
        before.saturating_sub(self.entries.len())
    }

    /// Set `name` to exactly one value.
    ///
    /// The first occurrence keeps its position and spelling, later duplicates
    /// are removed. When absent the header is inserted at the front.
    pub fn set_single(&mut self, name: &str, value: impl Into<Bytes>) {
        let value = value.into();
        match self.entries.iter().position(|h| h.name.eq_ignore_ascii_case(name)) {
            Some(idx) => {
                let mut seen = 0usize;
                self.entries.retain(|h| {
                    if h.name.eq_ignore_ascii_case(name) {
                        seen = seen.saturating_add(1);
                        seen == 1
                    } else {
                        true
                    }
                });
                if let Some(entry) = self.entries.get_mut(idx) {
                    entry.value = value;
                }
            }
            None => self.entries.insert(0, Header { name: name.to_string(), value }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialise as `Name: value\r\n` lines (without the terminating blank line)
    pub fn write_to(&self, buf: &mut BytesMut) {
        for h in &self.entries {
            buf.put_slice(h.name.as_bytes());
            buf.put_slice(b": ");
            buf.put_slice(&h.value);
            buf.put_slice(b"\r\n");
        }
    }
}
