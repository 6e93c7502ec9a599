//! Capacitors: gates that hold a chain until external code invokes them.
//!
//! A step creates capacitors through its continuation handle and hands them to whatever will
//! eventually complete (a timer, an I/O callback, a UI handler). Creation counts the capacitor
//! as outstanding immediately, so the drain that ran the step stops as soon as the step
//! returns. Each invocation records its arguments, runs the capacitor's behavior, resolves the
//! dependency on first use and asks the chain to resume.

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

use anyhow::Result;
use flux_types::{CapacitorId, CapacitorVariant, FluxError};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, trace};

use crate::chain::Chain;

/// Boxed callback run by a [`CapacitorKind::Callback`] capacitor.
pub type CapacitorCallback<C> = Box<dyn FnMut(&C, &[Value]) -> Result<()>>;

/// Behavior selected explicitly when a capacitor is created.
pub enum CapacitorKind<C: 'static> {
    /// Stores received arguments positionally under these field names.
    NamedFields(Vec<String>),
    /// Forwards received arguments to the callback together with the chain context.
    Callback(CapacitorCallback<C>),
}

impl<C: 'static> CapacitorKind<C> {
    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CapacitorKind::NamedFields(names.into_iter().map(Into::into).collect())
    }

    pub fn callback<F>(callback: F) -> Self
    where
        F: FnMut(&C, &[Value]) -> Result<()> + 'static,
    {
        CapacitorKind::Callback(Box::new(callback))
    }

    pub fn variant(&self) -> CapacitorVariant {
        match self {
            CapacitorKind::NamedFields(_) => CapacitorVariant::NamedFields,
            CapacitorKind::Callback(_) => CapacitorVariant::Callback,
        }
    }
}

impl<C: 'static> fmt::Debug for CapacitorKind<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacitorKind::NamedFields(names) => f.debug_tuple("NamedFields").field(names).finish(),
            CapacitorKind::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

enum Behavior<C: 'static> {
    NamedFields {
        names: Vec<String>,
        fields: RefCell<IndexMap<String, Value>>,
    },
    Callback(RefCell<CapacitorCallback<C>>),
}

struct CapacitorCell<C: 'static> {
    id: CapacitorId,
    chain: Chain<C>,
    behavior: Behavior<C>,
    received: RefCell<Option<Vec<Value>>>,
    invocations: Cell<u64>,
}

/// Handle to a gate created by [`Chain::capacitor`].
///
/// Clones refer to the same gate. The handle keeps its chain alive until it is dropped.
pub struct Capacitor<C: 'static> {
    cell: Rc<CapacitorCell<C>>,
}

impl<C: 'static> Chain<C> {
    /// Creates a capacitor and counts it as an outstanding dependency right away.
    ///
    /// Every capacitor created by one step must be invoked, in any order, before the next step
    /// runs.
    pub fn capacitor(&self, kind: CapacitorKind<C>) -> Capacitor<C> {
        let id = self.inner_mut().register_capacitor();
        debug!(
            chain = %self.label(),
            capacitor = %id,
            variant = ?kind.variant(),
            outstanding = self.outstanding_capacitors(),
            "capacitor created"
        );
        let behavior = match kind {
            CapacitorKind::NamedFields(names) => Behavior::NamedFields {
                names,
                fields: RefCell::new(IndexMap::new()),
            },
            CapacitorKind::Callback(callback) => Behavior::Callback(RefCell::new(callback)),
        };
        Capacitor {
            cell: Rc::new(CapacitorCell {
                id,
                chain: self.clone(),
                behavior,
                received: RefCell::new(None),
                invocations: Cell::new(0),
            }),
        }
    }

    /// Shorthand for a [`CapacitorKind::NamedFields`] capacitor.
    pub fn named<I, S>(&self, names: I) -> Capacitor<C>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capacitor(CapacitorKind::named(names))
    }

    /// Shorthand for a [`CapacitorKind::Callback`] capacitor.
    pub fn callback<F>(&self, callback: F) -> Capacitor<C>
    where
        F: FnMut(&C, &[Value]) -> Result<()> + 'static,
    {
        self.capacitor(CapacitorKind::callback(callback))
    }
}

impl<C: 'static> Capacitor<C> {
    pub fn id(&self) -> CapacitorId {
        self.cell.id
    }

    pub fn variant(&self) -> CapacitorVariant {
        match self.cell.behavior {
            Behavior::NamedFields { .. } => CapacitorVariant::NamedFields,
            Behavior::Callback(_) => CapacitorVariant::Callback,
        }
    }

    /// Invokes the gate with `received`.
    ///
    /// Once the chain is eluded this does nothing at all. Otherwise the arguments are recorded,
    /// assigned to fields or passed to the callback, the dependency is resolved if it is still
    /// outstanding, and the chain resumes draining. Invoking an already resolved capacitor
    /// repeats the side effects and the drain attempt.
    ///
    /// # Errors
    ///
    /// Returns the callback's error, or the error of any step the resumed drain runs, exactly as
    /// produced. A callback error leaves the dependency outstanding. Invoking a callback
    /// capacitor from inside its own callback fails with [`FluxError::CallbackReentered`].
    pub fn invoke<I>(&self, received: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let chain = &self.cell.chain;
        if chain.mode().is_eluded() {
            trace!(chain = %chain.label(), capacitor = %self.cell.id, "chain eluded; capacitor ignored");
            return Ok(());
        }

        let received: Vec<Value> = received.into_iter().map(Into::into).collect();
        self.cell.invocations.set(self.cell.invocations.get() + 1);
        self.cell.received.replace(Some(received.clone()));

        match &self.cell.behavior {
            Behavior::NamedFields { names, fields } => {
                let mut fields = fields.borrow_mut();
                for (index, name) in names.iter().enumerate() {
                    match received.get(index) {
                        Some(value) => {
                            fields.insert(name.clone(), value.clone());
                        }
                        None => {
                            fields.shift_remove(name);
                        }
                    }
                }
            }
            Behavior::Callback(callback) => {
                let mut callback = callback
                    .try_borrow_mut()
                    .map_err(|_| FluxError::CallbackReentered { id: self.cell.id })?;
                (*callback)(chain.context(), &received)?;
            }
        }

        if chain.inner_mut().release(self.cell.id) {
            debug!(
                chain = %chain.label(),
                capacitor = %self.cell.id,
                outstanding = chain.outstanding_capacitors(),
                "capacitor resolved"
            );
        } else {
            debug!(chain = %chain.label(), capacitor = %self.cell.id, "capacitor invoked again after resolution");
        }

        if chain.mode().accepts_capacitors() {
            chain.proceed()?;
        }
        Ok(())
    }

    /// Invokes the gate without arguments.
    pub fn resolve(&self) -> Result<()> {
        self.invoke(std::iter::empty::<Value>())
    }

    /// Value assigned to `name` by the last invocation, if any.
    pub fn field(&self, name: &str) -> Option<Value> {
        match &self.cell.behavior {
            Behavior::NamedFields { fields, .. } => fields.borrow().get(name).cloned(),
            Behavior::Callback(_) => None,
        }
    }

    /// All assigned fields in declaration order. Always empty for callback capacitors.
    pub fn fields(&self) -> IndexMap<String, Value> {
        let mut assigned = IndexMap::new();
        if let Behavior::NamedFields { names, fields } = &self.cell.behavior {
            let fields = fields.borrow();
            for name in names {
                if let Some(value) = fields.get(name) {
                    assigned.insert(name.clone(), value.clone());
                }
            }
        }
        assigned
    }

    /// Arguments received by the last invocation, including ones beyond the declared names.
    pub fn received(&self) -> Option<Vec<Value>> {
        self.cell.received.borrow().clone()
    }

    /// Number of invocations that took effect (eluded invocations are not counted).
    pub fn invocation_count(&self) -> u64 {
        self.cell.invocations.get()
    }

    /// Whether this capacitor still blocks its chain.
    pub fn is_outstanding(&self) -> bool {
        self.cell.chain.inner().dependencies.contains(&self.cell.id)
    }
}

impl<C: 'static> Clone for Capacitor<C> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<C: 'static> fmt::Debug for Capacitor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capacitor")
            .field("id", &self.cell.id)
            .field("variant", &self.variant())
            .field("invocations", &self.cell.invocations.get())
            .finish()
    }
}
