//! C5 — the demultiplexer: resolves `(path, method, content_type, accept)`
//! to a handler callback (§3 "Request-handler key", §4.5).
//!
//! Grounded in `examples/original_source/src/demux/demultiplexer_accept_map.cpp`
//! (the per-group `map_` + insertion-order `vector_` pair, `find` walking
//! the request's accept list) and `examples/original_source/src/demux/demultiplex_handler.cpp`
//! (disconnect-on-destruction). Handlers are grouped by `(path, method,
//! content_type)`, and within a group keyed by `accept_type` — exactly the
//! original's two-level structure, generalized from a single `mime` key to
//! the full 4-tuple this spec documents.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::RegistrationError;
use crate::handle::RequestHandle;
use crate::mime::{Mime, MimeRegistry, MimeSubtype, MimeType};
use crate::request::{MethodToken, Method, Request};

/// A handler callback: takes the parsed request and a response to fill
/// in. Invoked without any core mutex held (§5).
pub type HandlerCallback = Arc<dyn Fn(&Request, &mut crate::response::Response) + Send + Sync>;

/// The full registration key from §3: path, method, the content-type the
/// handler consumes, and the accept-type it produces.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestHandlerId {
    pub path: String,
    pub method: Method,
    pub content_type: Mime,
    pub accept_type: Mime,
}

impl RequestHandlerId {
    pub fn new(path: impl Into<String>, method: Method, content_type: Mime, accept_type: Mime) -> Self {
        Self {
            path: path.into(),
            method,
            content_type,
            accept_type,
        }
    }
}

type GroupKey = (String, Method, Mime);

struct HandlerRecord {
    callback: HandlerCallback,
    enabled: bool,
}

/// One `path+method+content_type` group: an insertion-ordered map from
/// `accept_type` to handler, mirroring `demultiplexer_accept_map`.
#[derive(Default)]
struct AcceptMap {
    by_accept_type: FxHashMap<Mime, HandlerRecord>,
    order: Vec<Mime>,
}

impl AcceptMap {
    fn insert(&mut self, accept_type: Mime, callback: HandlerCallback) -> bool {
        if self.by_accept_type.contains_key(&accept_type) {
            return false;
        }
        self.by_accept_type.insert(accept_type, HandlerRecord { callback, enabled: true });
        self.order.push(accept_type);
        true
    }

    fn erase(&mut self, accept_type: Mime) -> bool {
        if self.by_accept_type.remove(&accept_type).is_some() {
            self.order.retain(|m| *m != accept_type);
            true
        } else {
            false
        }
    }

    fn is_empty(&self) -> bool {
        self.by_accept_type.is_empty()
    }
}

/// `true` if `a`/`b` are compatible under wildcard rules: a `WILDCARD` on
/// either side matches anything on that field (§4.5 step 2).
fn mime_compatible(a: Mime, b: Mime) -> bool {
    let type_ok = a.mime_type == MimeType::WILDCARD || b.mime_type == MimeType::WILDCARD || a.mime_type == b.mime_type;
    let subtype_ok = a.mime_subtype == MimeSubtype::WILDCARD
        || b.mime_subtype == MimeSubtype::WILDCARD
        || a.mime_subtype == b.mime_subtype;
    type_ok && subtype_ok
}

struct Inner {
    groups: FxHashMap<GroupKey, AcceptMap>,
}

/// The demultiplexer (§4.5): one mutex guarding both the grouping
/// structure and the handler records, plus the shared MIME registry (its
/// own, separate mutex — never held together with this one, §5).
pub struct Demux {
    inner: Mutex<Inner>,
    mime_registry: MimeRegistry,
}

impl Default for Demux {
    fn default() -> Self {
        Self::new()
    }
}

impl Demux {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                groups: FxHashMap::default(),
            }),
            mime_registry: MimeRegistry::new(),
        }
    }

    pub fn register_mime_type(&self, s: &str) -> MimeType {
        self.mime_registry.register_type(s)
    }

    pub fn register_mime_subtype(&self, s: &str) -> MimeSubtype {
        self.mime_registry.register_subtype(s)
    }

    pub fn unregister_mime_type(&self, t: MimeType) -> bool {
        self.mime_registry.unregister_type(t)
    }

    pub fn unregister_mime_subtype(&self, t: MimeSubtype) -> bool {
        self.mime_registry.unregister_subtype(t)
    }

    pub fn mime_registry(&self) -> &MimeRegistry {
        &self.mime_registry
    }

    fn group_key(id: &RequestHandlerId) -> GroupKey {
        (id.path.clone(), id.method, id.content_type)
    }
}

/// Registers a handler, returning an owning handle. Dropping the handle
/// disconnects it (§4.8). Takes `Arc<Demux>` (not `&Demux`) so the handle
/// can hold the demultiplexer alive for its own lifetime — the Rust
/// ownership model enforces "no handle may outlive its demultiplexer"
/// structurally, in place of the original's runtime assertion.
pub fn connect(
    demux: &Arc<Demux>,
    id: RequestHandlerId,
    callback: impl Fn(&Request, &mut crate::response::Response) + Send + Sync + 'static,
) -> Result<RequestHandle, RegistrationError> {
    let key = Demux::group_key(&id);
    let mut inner = demux.inner.lock();
    let group = inner.groups.entry(key).or_default();
    if !group.insert(id.accept_type, Arc::new(callback)) {
        return Err(RegistrationError::AlreadyRegistered);
    }
    drop(inner);
    Ok(RequestHandle::new(demux.clone(), id))
}

impl Demux {
    /// Idempotent removal; never panics. Called by `RequestHandle::drop`.
    pub fn disconnect(&self, id: &RequestHandlerId) -> bool {
        let key = Self::group_key(id);
        let mut inner = self.inner.lock();
        let Some(group) = inner.groups.get_mut(&key) else {
            return false;
        };
        let removed = group.erase(id.accept_type);
        if removed && group.is_empty() {
            inner.groups.remove(&key);
        }
        removed
    }

    /// Resolves `request` to a callback following §4.5's three-step
    /// algorithm. Copies the relevant slice of the registry out while
    /// holding the lock, then matches against it lock-free (§5: "releases
    /// the lock only after a callback reference is copied out").
    pub fn determine(&self, request: &Request) -> Option<HandlerCallback> {
        let method = match request.method {
            MethodToken::Known(m) => m,
            MethodToken::Unknown(_) => return None,
        };

        let snapshot: Vec<(Mime, HandlerCallback, bool)> = {
            let inner = self.inner.lock();
            inner
                .groups
                .iter()
                .filter(|((path, m, content_type), _)| {
                    *path == request.path && *m == method && mime_compatible(*content_type, request.content_type)
                })
                .flat_map(|(_, group)| {
                    group.order.iter().map(|accept_type| {
                        let record = &group.by_accept_type[accept_type];
                        (*accept_type, record.callback.clone(), record.enabled)
                    })
                })
                .collect()
        };

        for entry in &request.accept {
            if let Some((_, callback, _)) = snapshot
                .iter()
                .find(|(accept_type, _, enabled)| *enabled && mime_compatible(*accept_type, entry.mime))
            {
                return Some(callback.clone());
            }
        }
        None
    }

    /// `true` if any handler is registered for `path`, regardless of
    /// method/content-type — used by the processor to choose `404` vs.
    /// `405`/`406` (§4.6 step 4).
    pub fn path_exists(&self, path: &str) -> bool {
        self.inner.lock().groups.keys().any(|(p, _, _)| p == path)
    }

    /// `true` if `path` has a handler registered for `method` — used to
    /// distinguish `405` (method absent) from `406` (accept mismatch).
    pub fn method_exists(&self, path: &str, method: Method) -> bool {
        self.inner
            .lock()
            .groups
            .keys()
            .any(|(p, m, _)| p == path && *m == method)
    }
}

/// Library entry point: `create_demultiplexer() -> Demux` (§6), returning
/// an `Arc` since handles need to share ownership of it.
pub fn create_demultiplexer() -> Arc<Demux> {
    Arc::new(Demux::new())
}
