//! C2 — MIME-type registry. Interns `type` and `subtype` strings into
//! compact numeric ids through the trie in `trie.rs`, so that Accept/
//! Content-Type negotiation reduces to integer comparisons (§4.2).
//!
//! Grounded in `examples/original_source/src/request/mime_data.hpp` (the
//! `mime_data<value_type, arithmetic_type>` template: sentinel-aware
//! registration counter plus trie plus reverse map) and
//! `examples/original_source/libhutzohmd/src/request/mime_handler.cpp`
//! (locking discipline, `parse` splitting at `/` and trailing whitespace).

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::RegistrationError;
use crate::trie::Trie;

/// Process-wide seed tables, mirroring the teacher's `OnceCell`-backed
/// startup statics (`HEADER_TEMPLATES`/`FILE_CACHE` in `main.rs`) but for
/// the constant list every fresh `MimeRegistry` seeds itself from.
static SEED_TYPES: Lazy<[&str; 6]> = Lazy::new(|| ["*", "text", "application", "audio", "image", "video"]);
static SEED_SUBTYPES: Lazy<[&str; 2]> = Lazy::new(|| ["*", "plain"]);

/// Interned MIME type id. `INVALID` (0) and `NONE` (1) are reserved
/// sentinels; registered values start at 2 (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MimeType(pub(crate) u8);

impl MimeType {
    pub const INVALID: MimeType = MimeType(0);
    pub const NONE: MimeType = MimeType(1);
    /// Seeded at registry construction, bound to the literal `*` (§4.2).
    pub const WILDCARD: MimeType = MimeType(2);
    pub const TEXT: MimeType = MimeType(3);
    pub const APPLICATION: MimeType = MimeType(4);
    pub const AUDIO: MimeType = MimeType(5);
    pub const IMAGE: MimeType = MimeType(6);
    pub const VIDEO: MimeType = MimeType(7);

    const MAX_ID: u32 = u8::MAX as u32;
}

/// Interned MIME subtype id. Same sentinel convention as `MimeType`, but
/// with a 16-bit id space (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MimeSubtype(pub(crate) u16);

impl MimeSubtype {
    pub const INVALID: MimeSubtype = MimeSubtype(0);
    pub const NONE: MimeSubtype = MimeSubtype(1);
    pub const WILDCARD: MimeSubtype = MimeSubtype(2);
    pub const PLAIN: MimeSubtype = MimeSubtype(3);

    const MAX_ID: u32 = u16::MAX as u32;
}

/// A parsed `(type, subtype)` media type pair (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mime {
    pub mime_type: MimeType,
    pub mime_subtype: MimeSubtype,
}

impl Mime {
    pub const WILDCARD: Mime = Mime {
        mime_type: MimeType::WILDCARD,
        mime_subtype: MimeSubtype::WILDCARD,
    };

    pub fn new(mime_type: MimeType, mime_subtype: MimeSubtype) -> Self {
        Self {
            mime_type,
            mime_subtype,
        }
    }
}

/// Collapses a registration failure back to the `INVALID` sentinel, so
/// the public `register_type`/`register_subtype` surface matches the
/// original's sentinel-only contract while internal code still gets a
/// typed error to log (§4.2, §A.3).
impl From<RegistrationError> for MimeType {
    fn from(_: RegistrationError) -> Self {
        MimeType::INVALID
    }
}

impl From<RegistrationError> for MimeSubtype {
    fn from(_: RegistrationError) -> Self {
        MimeSubtype::INVALID
    }
}

/// `special_value_count` in the original: ids `0` and `1` are reserved,
/// registration starts at `2`.
const SPECIAL_VALUE_COUNT: u32 = 2;

/// Generic "register a string, get a compact id back" table: a trie for
/// case-insensitive lookup plus a reverse map for unregistration, same
/// shape as `mime_data<value_type, arithmetic_type>`.
struct InternTable {
    trie: Trie<u32>,
    by_id: FxHashMap<u32, String>,
    next_id: u32,
    max_id: u32,
}

impl InternTable {
    fn new(max_id: u32) -> Self {
        Self {
            trie: Trie::new(),
            by_id: FxHashMap::default(),
            next_id: SPECIAL_VALUE_COUNT,
            max_id,
        }
    }

    fn register(&mut self, s: &str) -> Result<u32, RegistrationError> {
        if s.is_empty() {
            return Err(RegistrationError::Empty);
        }
        if self.next_id > self.max_id {
            return Err(RegistrationError::IdSpaceExhausted);
        }

        let id = self.next_id;
        if self.trie.insert(s.as_bytes(), id) {
            self.next_id += 1;
            self.by_id.insert(id, s.to_owned());
            Ok(id)
        } else {
            Err(RegistrationError::AlreadyRegistered)
        }
    }

    fn unregister(&mut self, id: u32) -> bool {
        match self.by_id.remove(&id) {
            Some(s) => self.trie.erase(s.as_bytes()),
            None => false,
        }
    }

    fn parse(&self, s: &[u8]) -> Option<u32> {
        self.trie.lookup(s)
    }

    fn is_registered(&self, id: u32) -> bool {
        self.by_id.contains_key(&id)
    }
}

struct Inner {
    types: InternTable,
    subtypes: InternTable,
}

/// The MIME-type registry: two tries (type, subtype) plus two reverse
/// maps, behind a single mutex (§4.2, §5 — one mutex per subsystem).
pub struct MimeRegistry {
    inner: Mutex<Inner>,
}

impl Default for MimeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MimeRegistry {
    /// Creates a registry with the wildcard and source-compatibility seeds
    /// pre-registered (§4.2): `*`/`*` as `WILDCARD`, then
    /// `text`/`application`/`audio`/`image`/`video` as types and `plain` as
    /// a subtype, in that order so the assigned ids match the documented
    /// constants.
    pub fn new() -> Self {
        let mut types = InternTable::new(MimeType::MAX_ID);
        let mut subtypes = InternTable::new(MimeSubtype::MAX_ID);

        for seed in SEED_TYPES.iter() {
            types.register(seed).expect("seed type registration");
        }
        for seed in SEED_SUBTYPES.iter() {
            subtypes.register(seed).expect("seed subtype registration");
        }

        Self {
            inner: Mutex::new(Inner { types, subtypes }),
        }
    }

    fn try_register_type(&self, s: &str) -> Result<MimeType, RegistrationError> {
        let mut inner = self.inner.lock();
        inner.types.register(s).map(|id| MimeType(id as u8))
    }

    fn try_register_subtype(&self, s: &str) -> Result<MimeSubtype, RegistrationError> {
        let mut inner = self.inner.lock();
        inner.subtypes.register(s).map(|id| MimeSubtype(id as u16))
    }

    /// Registers `type`, returning `MimeType::INVALID` on any failure
    /// (empty, duplicate, or id space exhausted — §4.2, §7).
    pub fn register_type(&self, s: &str) -> MimeType {
        match self.try_register_type(s) {
            Ok(t) => t,
            Err(e) => {
                log::warn!("mime type registration of {s:?} failed: {e}");
                e.into()
            }
        }
    }

    /// Registers `subtype`, returning `MimeSubtype::INVALID` on any
    /// failure.
    pub fn register_subtype(&self, s: &str) -> MimeSubtype {
        match self.try_register_subtype(s) {
            Ok(t) => t,
            Err(e) => {
                log::warn!("mime subtype registration of {s:?} failed: {e}");
                e.into()
            }
        }
    }

    pub fn unregister_type(&self, t: MimeType) -> bool {
        self.inner.lock().types.unregister(t.0 as u32)
    }

    pub fn unregister_subtype(&self, t: MimeSubtype) -> bool {
        self.inner.lock().subtypes.unregister(t.0 as u32)
    }

    pub fn is_type_registered(&self, t: MimeType) -> bool {
        self.inner.lock().types.is_registered(t.0 as u32)
    }

    pub fn is_subtype_registered(&self, t: MimeSubtype) -> bool {
        self.inner.lock().subtypes.is_registered(t.0 as u32)
    }

    /// Scans up to `max_len` bytes of `data`, splits at the first `/`,
    /// trims the subtype at the first whitespace character, and looks up
    /// both halves. Either half that fails lookup becomes `INVALID`
    /// (§4.2).
    pub fn parse(&self, data: &[u8], max_len: usize) -> Mime {
        let inner = self.inner.lock();
        let window = &data[..data.len().min(max_len)];

        let slash = window.iter().position(|&b| b == b'/');
        let (type_bytes, rest) = match slash {
            Some(idx) => (&window[..idx], &window[idx + 1..]),
            None => (window, &[][..]),
        };

        let subtype_end = rest
            .iter()
            .position(|&b| crate::charmap::WHITESPACE.contains(b))
            .unwrap_or(rest.len());
        let subtype_bytes = &rest[..subtype_end];

        let mime_type = inner
            .types
            .parse(type_bytes)
            .map(|id| MimeType(id as u8))
            .unwrap_or(MimeType::INVALID);
        let mime_subtype = inner
            .subtypes
            .parse(subtype_bytes)
            .map(|id| MimeSubtype(id as u16))
            .unwrap_or(MimeSubtype::INVALID);

        Mime::new(mime_type, mime_subtype)
    }

    /// A pair is valid iff both halves are non-`INVALID` and either both
    /// are `NONE` or both are registered (§3).
    pub fn is_valid(&self, mime: Mime) -> bool {
        if mime.mime_type == MimeType::INVALID || mime.mime_subtype == MimeSubtype::INVALID {
            return false;
        }

        let both_none = mime.mime_type == MimeType::NONE && mime.mime_subtype == MimeSubtype::NONE;
        let both_set = mime.mime_type != MimeType::NONE && mime.mime_subtype != MimeSubtype::NONE;
        if !both_none && !both_set {
            return false;
        }

        if both_none {
            return true;
        }

        self.is_type_registered(mime.mime_type) && self.is_subtype_registered(mime.mime_subtype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_are_preregistered() {
        let registry = MimeRegistry::new();
        assert!(registry.is_type_registered(MimeType::WILDCARD));
        assert!(registry.is_type_registered(MimeType::TEXT));
        assert!(registry.is_subtype_registered(MimeSubtype::WILDCARD));
        assert!(registry.is_subtype_registered(MimeSubtype::PLAIN));
    }

    #[test]
    fn register_and_reparse() {
        let registry = MimeRegistry::new();
        let id = registry.register_type("abc");
        assert_eq!(id, MimeType(8));
        assert_eq!(registry.register_type("ABC"), MimeType::INVALID);

        let mime = registry.parse(b"ABC/xyz", 7);
        assert_eq!(mime.mime_type, id);
    }

    #[test]
    fn unregister_makes_parse_fail() {
        let registry = MimeRegistry::new();
        let id = registry.register_type("abc");
        assert!(registry.unregister_type(id));
        let mime = registry.parse(b"abc/xyz", 7);
        assert_eq!(mime.mime_type, MimeType::INVALID);
    }

    #[test]
    fn parse_trims_subtype_at_whitespace_and_params() {
        let registry = MimeRegistry::new();
        let mime = registry.parse(b"text/plain; charset=utf-8", 10);
        assert_eq!(mime.mime_type, MimeType::TEXT);
        assert_eq!(mime.mime_subtype, MimeSubtype::PLAIN);
    }

    #[test]
    fn is_valid_rules() {
        let registry = MimeRegistry::new();
        assert!(!registry.is_valid(Mime::new(MimeType::INVALID, MimeSubtype::NONE)));
        assert!(registry.is_valid(Mime::new(MimeType::NONE, MimeSubtype::NONE)));
        assert!(!registry.is_valid(Mime::new(MimeType::TEXT, MimeSubtype::NONE)));
        assert!(registry.is_valid(Mime::new(MimeType::TEXT, MimeSubtype::PLAIN)));
    }

    #[test]
    fn id_space_exhaustion_returns_invalid() {
        let registry = MimeRegistry::new();
        // Drain the remaining type id space (2 sentinels + 6 seeds already used).
        let mut last = MimeType::INVALID;
        for i in 0..300u32 {
            let name = format!("type{i}");
            last = registry.register_type(&name);
            if last == MimeType::INVALID {
                break;
            }
        }
        assert_eq!(last, MimeType::INVALID);
    }
}
