//! The type registry and dispatcher, modeled on `logger.go`'s `Logger` type.
//!
//! The Go source binds a decoded parameter dictionary onto a record's
//! fields via `reflect` and `albion:"N"` struct tags. A closed, ahead-of-time
//! compiled language has no equivalent runtime facility, so this module
//! replaces it with an explicit builder: [`RecordDescriptor<T>`] is built by
//! chaining typed field-binding methods that close over a setter instead of
//! reflecting into struct fields. Registered descriptors of unrelated
//! concrete types share one registry behind the [`AnyDescriptor`] trait
//! object; dispatch hands listeners a `&dyn Any` that they downcast to their
//! concrete record type, mirroring the Go code's `interface{}` type switch.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use uuid::Uuid;

use crate::protocol::character_id::decode_character_id;
use crate::protocol::message::MessageKind;
use crate::protocol::params::{Parameters, EVENT_DISCRIMINATOR_ID, OPERATION_DISCRIMINATOR_ID};
use crate::protocol::value::TypedValue;

/// Outcome of trying to bind one candidate parameter-id to a field.
enum BindOutcome {
    /// The value matched and was assigned.
    Applied,
    /// A value was present under this id but didn't match the field's
    /// declared coercion; try the next candidate id.
    TypeMismatch { expected: &'static str, actual: String },
    /// A string value matched but was excluded by a `not-contains` filter;
    /// try the next candidate id.
    FilteredOut,
}

type Binder<T> = Box<dyn Fn(&mut T, &TypedValue) -> BindOutcome + Send + Sync>;

struct FieldBinding<T> {
    name: &'static str,
    candidate_ids: Vec<u8>,
    bind: Binder<T>,
}

/// Declares how a record type `T` is populated from a parameter dictionary.
/// Build one with chained calls, then hand it to
/// [`TypeRegistry::register_operation`] or [`TypeRegistry::register_event`].
pub struct RecordDescriptor<T> {
    fields: Vec<FieldBinding<T>>,
    raw_decoder: Option<Box<dyn Fn(&Parameters) -> T + Send + Sync>>,
}

impl<T: Default> RecordDescriptor<T> {
    /// Starts an empty descriptor for `T`.
    pub fn new() -> Self {
        RecordDescriptor {
            fields: Vec::new(),
            raw_decoder: None,
        }
    }

    /// Installs a raw decoder that receives the whole parameter dictionary
    /// and skips per-field binding entirely. Used by generic "Logger"
    /// records that passively inspect unfamiliar codes.
    pub fn raw(mut self, decoder: impl Fn(&Parameters) -> T + Send + Sync + 'static) -> Self {
        self.raw_decoder = Some(Box::new(decoder));
        self
    }

    /// Binds a field that widens any integer width to `i32`.
    pub fn integer(
        mut self,
        name: &'static str,
        ids: impl Into<Vec<u8>>,
        setter: impl Fn(&mut T, i32) + Send + Sync + 'static,
    ) -> Self {
        self.fields.push(FieldBinding {
            name,
            candidate_ids: ids.into(),
            bind: Box::new(move |record, value| match value.as_widened_integer() {
                Some(v) => {
                    setter(record, v as i32);
                    BindOutcome::Applied
                }
                None => BindOutcome::TypeMismatch {
                    expected: "integer",
                    actual: value.kind_name().to_string(),
                },
            }),
        });
        self
    }

    /// Binds a field that widens any integer width to `i64`.
    pub fn long(
        mut self,
        name: &'static str,
        ids: impl Into<Vec<u8>>,
        setter: impl Fn(&mut T, i64) + Send + Sync + 'static,
    ) -> Self {
        self.fields.push(FieldBinding {
            name,
            candidate_ids: ids.into(),
            bind: Box::new(move |record, value| match value.as_widened_integer() {
                Some(v) => {
                    setter(record, v);
                    BindOutcome::Applied
                }
                None => BindOutcome::TypeMismatch {
                    expected: "long",
                    actual: value.kind_name().to_string(),
                },
            }),
        });
        self
    }

    /// Binds a field expecting an array of integers of any width.
    pub fn integer_list(
        mut self,
        name: &'static str,
        ids: impl Into<Vec<u8>>,
        setter: impl Fn(&mut T, Vec<i64>) + Send + Sync + 'static,
    ) -> Self {
        self.fields.push(FieldBinding {
            name,
            candidate_ids: ids.into(),
            bind: Box::new(move |record, value| match value {
                TypedValue::Array(_, items) => {
                    match items.iter().map(TypedValue::as_widened_integer).collect() {
                        Some(list) => {
                            setter(record, list);
                            BindOutcome::Applied
                        }
                        None => BindOutcome::TypeMismatch {
                            expected: "integer list",
                            actual: "array with non-integer elements".to_string(),
                        },
                    }
                }
                other => BindOutcome::TypeMismatch {
                    expected: "integer list",
                    actual: other.kind_name().to_string(),
                },
            }),
        });
        self
    }

    /// Binds a field expecting a 16-byte character id.
    pub fn character_id(
        mut self,
        name: &'static str,
        ids: impl Into<Vec<u8>>,
        setter: impl Fn(&mut T, Uuid) + Send + Sync + 'static,
    ) -> Self {
        self.fields.push(FieldBinding {
            name,
            candidate_ids: ids.into(),
            bind: Box::new(move |record, value| match value {
                TypedValue::ByteSlice(bytes) => {
                    setter(record, decode_character_id(bytes));
                    BindOutcome::Applied
                }
                other => BindOutcome::TypeMismatch {
                    expected: "character id",
                    actual: other.kind_name().to_string(),
                },
            }),
        });
        self
    }

    /// Binds a field expecting an array of 16-byte character ids.
    pub fn character_id_list(
        mut self,
        name: &'static str,
        ids: impl Into<Vec<u8>>,
        setter: impl Fn(&mut T, Vec<Uuid>) + Send + Sync + 'static,
    ) -> Self {
        self.fields.push(FieldBinding {
            name,
            candidate_ids: ids.into(),
            bind: Box::new(move |record, value| match value {
                TypedValue::Array(_, items) => {
                    let mut ids = Vec::with_capacity(items.len());
                    for item in items {
                        match item {
                            TypedValue::ByteSlice(bytes) => ids.push(decode_character_id(bytes)),
                            other => {
                                return BindOutcome::TypeMismatch {
                                    expected: "character id list",
                                    actual: other.kind_name().to_string(),
                                }
                            }
                        }
                    }
                    setter(record, ids);
                    BindOutcome::Applied
                }
                other => BindOutcome::TypeMismatch {
                    expected: "character id list",
                    actual: other.kind_name().to_string(),
                },
            }),
        });
        self
    }

    /// Binds a string field. If `not_contains` is set and the decoded value
    /// contains that substring, this id is treated as a non-match and the
    /// next candidate id is tried instead.
    pub fn string(
        mut self,
        name: &'static str,
        ids: impl Into<Vec<u8>>,
        not_contains: Option<&'static str>,
        setter: impl Fn(&mut T, String) + Send + Sync + 'static,
    ) -> Self {
        self.fields.push(FieldBinding {
            name,
            candidate_ids: ids.into(),
            bind: Box::new(move |record, value| match value {
                TypedValue::String(s) => {
                    if let Some(excluded) = not_contains {
                        if s.contains(excluded) {
                            return BindOutcome::FilteredOut;
                        }
                    }
                    setter(record, s.clone());
                    BindOutcome::Applied
                }
                other => BindOutcome::TypeMismatch {
                    expected: "string",
                    actual: other.kind_name().to_string(),
                },
            }),
        });
        self
    }

    /// Binds a field via an exact-type-match coercion: a caller-supplied
    /// extractor is tried against the decoded value, and the candidate id is
    /// skipped (as a type mismatch) if it returns `None`. Used for fields
    /// like `bool`, float lists, or string lists where no widening applies.
    pub fn exact<V>(
        mut self,
        name: &'static str,
        ids: impl Into<Vec<u8>>,
        expected: &'static str,
        extract: impl Fn(&TypedValue) -> Option<V> + Send + Sync + 'static,
        setter: impl Fn(&mut T, V) + Send + Sync + 'static,
    ) -> Self {
        self.fields.push(FieldBinding {
            name,
            candidate_ids: ids.into(),
            bind: Box::new(move |record, value| match extract(value) {
                Some(v) => {
                    setter(record, v);
                    BindOutcome::Applied
                }
                None => BindOutcome::TypeMismatch {
                    expected,
                    actual: value.kind_name().to_string(),
                },
            }),
        });
        self
    }

    /// Binds `params` onto a fresh `T`, per the dispatch algorithm described above.
    fn bind(&self, params: &Parameters) -> T {
        if let Some(decoder) = &self.raw_decoder {
            return decoder(params);
        }

        let mut record = T::default();

        for field in &self.fields {
            for &id in &field.candidate_ids {
                let Some(value) = params.get(&id) else {
                    continue;
                };

                match (field.bind)(&mut record, value) {
                    BindOutcome::Applied => break,
                    BindOutcome::FilteredOut => continue,
                    BindOutcome::TypeMismatch { expected, actual } => {
                        log::warn!(
                            "type mismatch for field {}: expected {}, got {}",
                            field.name,
                            expected,
                            actual
                        );
                        continue;
                    }
                }
            }
        }

        record
    }
}

impl<T: Default> Default for RecordDescriptor<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Type-erased entry point into a [`RecordDescriptor<T>`], letting operation
/// and event descriptors of unrelated concrete types share one registry.
trait AnyDescriptor: Send + Sync {
    fn bind_any(&self, params: &Parameters) -> Box<dyn Any + Send>;
}

impl<T: Default + Send + 'static> AnyDescriptor for RecordDescriptor<T> {
    fn bind_any(&self, params: &Parameters) -> Box<dyn Any + Send> {
        Box::new(self.bind(params))
    }
}

type Listener = Box<dyn Fn(&(dyn Any + Send)) + Send + Sync>;
type DisconnectCallback = Box<dyn Fn() + Send + Sync>;

/// Maps operation/event codes to record descriptors and fans decoded
/// records out to registered listeners. Cheaply clonable; every
/// handle shares the same underlying tables.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    operations: Arc<RwLock<std::collections::HashMap<u8, Arc<dyn AnyDescriptor>>>>,
    events: Arc<RwLock<std::collections::HashMap<u8, Arc<dyn AnyDescriptor>>>>,
    listeners: Arc<RwLock<Vec<Listener>>>,
    disconnect: Arc<RwLock<Vec<DisconnectCallback>>>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a record descriptor for an operation code.
    pub fn register_operation<T: Default + Send + 'static>(
        &self,
        code: u8,
        descriptor: RecordDescriptor<T>,
    ) {
        self.operations
            .write()
            .expect("registry lock poisoned")
            .insert(code, Arc::new(descriptor));
    }

    /// Registers a record descriptor for an event code.
    pub fn register_event<T: Default + Send + 'static>(
        &self,
        code: u8,
        descriptor: RecordDescriptor<T>,
    ) {
        self.events
            .write()
            .expect("registry lock poisoned")
            .insert(code, Arc::new(descriptor));
    }

    /// Registers a listener invoked with every dispatched record, in
    /// registration order. Receives the record as `&dyn Any`; downcast to
    /// the concrete type registered for the code you care about.
    pub fn register_listener(&self, listener: impl Fn(&(dyn Any + Send)) + Send + Sync + 'static) {
        self.listeners
            .write()
            .expect("registry lock poisoned")
            .push(Box::new(listener));
    }

    /// Registers a callback invoked whenever a `Disconnect` command is observed.
    pub fn register_disconnect(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.disconnect
            .write()
            .expect("registry lock poisoned")
            .push(Box::new(callback));
    }

    /// Dispatches a reliable message's decoded parameters to the registered
    /// operation or event descriptor, then to every listener.
    ///
    /// The discriminator is read from `params[253]` for
    /// operations or `params[252]` for events; a missing discriminator is
    /// logged and dropped, and an unregistered code is silently dropped
    /// (unregistered codes are common and expected).
    pub fn dispatch(&self, kind: MessageKind, params: &Parameters) {
        match kind {
            MessageKind::OperationRequest | MessageKind::OperationResponse => {
                match Self::discriminator(params, OPERATION_DISCRIMINATOR_ID) {
                    Some(code) => self.dispatch_operation(code, params),
                    None => log::warn!("operation message missing discriminator param 253"),
                }
            }
            MessageKind::EventData => match Self::discriminator(params, EVENT_DISCRIMINATOR_ID) {
                Some(code) => self.dispatch_event(code, params),
                None => log::warn!("event message missing discriminator param 252"),
            },
        }
    }

    fn discriminator(params: &Parameters, id: u8) -> Option<u8> {
        params
            .get(&id)
            .and_then(TypedValue::as_widened_integer)
            .map(|v| v as u8)
    }

    fn dispatch_operation(&self, code: u8, params: &Parameters) {
        let descriptor = self
            .operations
            .read()
            .expect("registry lock poisoned")
            .get(&code)
            .cloned();
        if let Some(descriptor) = descriptor {
            self.notify(descriptor.bind_any(params));
        }
    }

    fn dispatch_event(&self, code: u8, params: &Parameters) {
        let descriptor = self
            .events
            .read()
            .expect("registry lock poisoned")
            .get(&code)
            .cloned();
        if let Some(descriptor) = descriptor {
            self.notify(descriptor.bind_any(params));
        }
    }

    fn notify(&self, record: Box<dyn Any + Send>) {
        let listeners = self.listeners.read().expect("registry lock poisoned");
        for listener in listeners.iter() {
            let record_ref = record.as_ref();
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| listener(record_ref)));
            if let Err(panic) = outcome {
                log::error!("listener panicked: {}", describe_panic(&panic));
            }
        }
    }

    /// Invokes every registered disconnect callback, in registration order.
    pub fn dispatch_disconnect(&self) {
        let callbacks = self.disconnect.read().expect("registry lock poisoned");
        for callback in callbacks.iter() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback()));
            if let Err(panic) = outcome {
                log::error!("disconnect callback panicked: {}", describe_panic(&panic));
            }
        }
    }
}

fn describe_panic(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
