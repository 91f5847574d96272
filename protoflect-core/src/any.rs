use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Erased payload carried by an [`AnyValue`].
///
/// The codec crate stores its deferred wire sub-message behind this trait
/// so the value model does not depend on the wire engine. Payloads are
/// shared: host values are freely cloneable and every clone keeps the
/// payload alive.
pub trait AnyPayload: fmt::Debug + Send + Sync {
    /// Downcast hook for the owning codec.
    fn as_any(&self) -> &dyn Any;
}

/// The polymorphic placeholder value: either empty, or holding one
/// deferred payload whose concrete interpretation is chosen later.
#[derive(Clone, Debug, Default)]
pub struct AnyValue {
    payload: Option<Arc<dyn AnyPayload>>,
}

impl AnyValue {
    /// True when no payload is held.
    pub fn is_empty(&self) -> bool {
        self.payload.is_none()
    }

    /// Stores a payload, replacing any previous one.
    pub fn set(&mut self, payload: Arc<dyn AnyPayload>) {
        self.payload = Some(payload);
    }

    /// Releases the payload, returning to the empty state.
    pub fn clear(&mut self) {
        self.payload = None;
    }

    /// The held payload, if any.
    pub fn payload(&self) -> Option<&Arc<dyn AnyPayload>> {
        self.payload.as_ref()
    }
}

/// Two placeholders are equal when both are empty or both share the same
/// payload. Payload contents are deliberately not compared; the payload
/// type is opaque at this layer.
impl PartialEq for AnyValue {
    fn eq(&self, other: &Self) -> bool {
        match (&self.payload, &other.payload) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Marker;

    impl AnyPayload for Marker {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn empty_then_set_then_clear() {
        let mut v = AnyValue::default();
        assert!(v.is_empty());
        v.set(Arc::new(Marker));
        assert!(!v.is_empty());
        let copy = v.clone();
        assert_eq!(v, copy);
        v.clear();
        assert!(v.is_empty());
        assert_ne!(v, copy);
    }
}
