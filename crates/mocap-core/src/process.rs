//! Lazy, pull-based pipeline nodes.
//!
//! A [`ProcessObject`] wraps an [`Algorithm`] with input and output ports.
//! Outputs are created once and keep their identity for the lifetime of the
//! node; [`ProcessObject::update`] refreshes their content only when an input
//! (or the node's own configuration) carries a newer timestamp than the last
//! computation.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::data_object::{AnyDataObject, DataObject, Timestamp};
use crate::error::{Error, Result};

/// Declared input ports of an algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ports {
    Named(&'static [&'static str]),
    /// Any number of ports sharing one name.
    Variadic(&'static str),
}

impl Ports {
    fn accepts(&self, port: usize) -> bool {
        match self {
            Ports::Named(names) => port < names.len(),
            Ports::Variadic(_) => true,
        }
    }

    fn fixed_len(&self) -> usize {
        match self {
            Ports::Named(names) => names.len(),
            Ports::Variadic(_) => 0,
        }
    }

    pub fn name(&self, port: usize) -> String {
        match self {
            Ports::Named(names) => names
                .get(port)
                .map(|name| (*name).to_owned())
                .unwrap_or_else(|| format!("#{port}")),
            Ports::Variadic(name) => format!("{name}#{port}"),
        }
    }
}

/// The transform executed by a pipeline node.
pub trait Algorithm: 'static {
    fn name(&self) -> &'static str;

    fn input_ports(&self) -> Ports {
        Ports::Named(&[])
    }

    /// Creates the output objects. Called once when the node is built; the
    /// length of the returned list is the node's output arity.
    fn make_outputs(&self) -> Vec<AnyDataObject>;

    /// Computes new output values. Nothing is published unless this returns
    /// `Ok` and every output port was staged.
    fn generate(&mut self, inputs: &Inputs, outputs: &mut Outputs<'_>) -> Result<()>;
}

/// What feeds an input port.
#[derive(Clone)]
pub enum Source {
    Data(AnyDataObject),
    Port {
        node: Rc<dyn UpstreamNode>,
        port: usize,
    },
}

impl Source {
    fn data(&self) -> Option<AnyDataObject> {
        match self {
            Source::Data(data) => Some(data.clone()),
            Source::Port { node, port } => node.output(*port),
        }
    }
}

impl<T: 'static> From<DataObject<T>> for Source {
    fn from(object: DataObject<T>) -> Self {
        Source::Data(object.into())
    }
}

impl From<AnyDataObject> for Source {
    fn from(object: AnyDataObject) -> Self {
        Source::Data(object)
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Data(data) => f.debug_tuple("Data").field(data).finish(),
            Source::Port { node, port } => f
                .debug_struct("Port")
                .field("node", &node.name())
                .field("port", port)
                .finish(),
        }
    }
}

/// Object-safe view of a node, used to chain nodes without knowing their
/// algorithm type.
pub trait UpstreamNode {
    fn name(&self) -> &'static str;
    fn update(&self) -> Result<()>;
    fn output(&self, port: usize) -> Option<AnyDataObject>;
    fn upstream(&self) -> Vec<Rc<dyn UpstreamNode>>;
    fn produces(&self, data: &AnyDataObject) -> bool;
}

fn node_addr(node: &Rc<dyn UpstreamNode>) -> *const () {
    Rc::as_ptr(node) as *const ()
}

/// Depth-first search for `target` among `start` and everything upstream of it.
fn reaches(start: &Rc<dyn UpstreamNode>, target: *const ()) -> bool {
    let mut stack = vec![Rc::clone(start)];
    let mut seen: Vec<*const ()> = Vec::new();
    while let Some(node) = stack.pop() {
        let addr = node_addr(&node);
        if addr == target {
            return true;
        }
        if seen.contains(&addr) {
            continue;
        }
        seen.push(addr);
        stack.extend(node.upstream());
    }
    false
}

/// Resolved inputs handed to [`Algorithm::generate`].
pub struct Inputs {
    node: &'static str,
    ports: Ports,
    data: Vec<Option<AnyDataObject>>,
}

impl Inputs {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get<T: 'static>(&self, port: usize) -> Result<Option<DataObject<T>>> {
        match self.data.get(port).and_then(Option::as_ref) {
            None => Ok(None),
            Some(data) => data.downcast::<T>().map(Some).ok_or_else(|| {
                Error::process_object(format!(
                    "{}: input '{}' holds {} where {} is expected",
                    self.node,
                    self.ports.name(port),
                    data.type_name(),
                    std::any::type_name::<T>()
                ))
            }),
        }
    }

    pub fn required<T: 'static>(&self, port: usize) -> Result<DataObject<T>> {
        self.get(port)?.ok_or_else(|| {
            Error::process_object(format!(
                "{}: input '{}' is not connected",
                self.node,
                self.ports.name(port)
            ))
        })
    }

    /// Every connected input, in port order.
    pub fn all<T: 'static>(&self) -> Result<Vec<DataObject<T>>> {
        let mut objects = Vec::with_capacity(self.data.len());
        for port in 0..self.data.len() {
            if let Some(object) = self.get(port)? {
                objects.push(object);
            }
        }
        Ok(objects)
    }
}

type Commit = Box<dyn FnOnce()>;

/// Output values staged by [`Algorithm::generate`], published all at once.
pub struct Outputs<'a> {
    node: &'static str,
    ports: &'a [AnyDataObject],
    staged: Vec<Option<Commit>>,
}

impl<'a> Outputs<'a> {
    fn new(node: &'static str, ports: &'a [AnyDataObject]) -> Self {
        Self {
            node,
            ports,
            staged: ports.iter().map(|_| None).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn set<T: 'static>(&mut self, port: usize, value: T) -> Result<()> {
        let target = self.ports.get(port).ok_or_else(|| {
            Error::process_object(format!("{}: no output port #{port}", self.node))
        })?;
        let object = target.downcast::<T>().ok_or_else(|| {
            Error::process_object(format!(
                "{}: output #{port} holds {}, got {}",
                self.node,
                target.type_name(),
                std::any::type_name::<T>()
            ))
        })?;
        self.staged[port] = Some(Box::new(move || {
            object.replace(value);
        }));
        Ok(())
    }

    fn commit(self) -> Result<()> {
        if let Some(port) = self.staged.iter().position(Option::is_none) {
            return Err(Error::process_object(format!(
                "{}: output #{port} was not produced",
                self.node
            )));
        }
        for commit in self.staged.into_iter().flatten() {
            commit();
        }
        Ok(())
    }
}

struct NodeState<A> {
    algorithm: A,
    inputs: Vec<Option<Source>>,
    outputs: Vec<AnyDataObject>,
    modified: Timestamp,
    computed: Option<Timestamp>,
    updating: bool,
}

struct Node<A> {
    state: RefCell<NodeState<A>>,
}

impl<A: Algorithm> Node<A> {
    fn sources(&self) -> Vec<Source> {
        self.state.borrow().inputs.iter().flatten().cloned().collect()
    }

    fn run_update(&self) -> Result<()> {
        let name = self.state.borrow().algorithm.name();
        {
            let mut state = self.state.borrow_mut();
            if state.updating {
                return Err(Error::process_object(format!(
                    "{name}: update re-entered while already updating"
                )));
            }
            state.updating = true;
        }
        let result = self.update_inner(name);
        self.state.borrow_mut().updating = false;
        result
    }

    fn update_inner(&self, name: &'static str) -> Result<()> {
        for source in self.sources() {
            if let Source::Port { node, .. } = &source {
                node.update()?;
            }
        }

        let mut state = self.state.borrow_mut();
        let inputs: Vec<Option<AnyDataObject>> = state
            .inputs
            .iter()
            .map(|source| source.as_ref().and_then(Source::data))
            .collect();
        let newest = inputs
            .iter()
            .flatten()
            .map(AnyDataObject::timestamp)
            .fold(state.modified, Timestamp::max);

        if let Some(computed) = state.computed {
            if newest <= computed {
                trace!(node = name, %computed, "outputs up to date");
                return Ok(());
            }
        }

        debug!(node = name, %newest, "recomputing outputs");
        let state = &mut *state;
        let inputs = Inputs {
            node: name,
            ports: state.algorithm.input_ports(),
            data: inputs,
        };
        let mut outputs = Outputs::new(name, &state.outputs);
        state.algorithm.generate(&inputs, &mut outputs)?;
        outputs.commit()?;
        state.computed = Some(newest);
        Ok(())
    }
}

impl<A: Algorithm> UpstreamNode for Node<A> {
    fn name(&self) -> &'static str {
        self.state.borrow().algorithm.name()
    }

    fn update(&self) -> Result<()> {
        self.run_update()
    }

    fn output(&self, port: usize) -> Option<AnyDataObject> {
        self.state.borrow().outputs.get(port).cloned()
    }

    fn upstream(&self) -> Vec<Rc<dyn UpstreamNode>> {
        self.sources()
            .into_iter()
            .filter_map(|source| match source {
                Source::Port { node, .. } => Some(node),
                Source::Data(_) => None,
            })
            .collect()
    }

    fn produces(&self, data: &AnyDataObject) -> bool {
        self.state
            .borrow()
            .outputs
            .iter()
            .any(|output| output.ptr_eq(data))
    }
}

/// A pipeline node running algorithm `A`.
///
/// Cloning the handle shares the node.
pub struct ProcessObject<A: Algorithm> {
    node: Rc<Node<A>>,
}

impl<A: Algorithm> Clone for ProcessObject<A> {
    fn clone(&self) -> Self {
        Self {
            node: Rc::clone(&self.node),
        }
    }
}

impl<A: Algorithm> ProcessObject<A> {
    pub fn new(algorithm: A) -> Self {
        let outputs = algorithm.make_outputs();
        let inputs = vec![None; algorithm.input_ports().fixed_len()];
        Self {
            node: Rc::new(Node {
                state: RefCell::new(NodeState {
                    algorithm,
                    inputs,
                    outputs,
                    modified: Timestamp::next(),
                    computed: None,
                    updating: false,
                }),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.node.state.borrow().algorithm.name()
    }

    fn as_upstream(&self) -> Rc<dyn UpstreamNode> {
        let node: Rc<dyn UpstreamNode> = self.node.clone();
        node
    }

    /// Binds `source` to input `port`.
    ///
    /// Rejects ports the algorithm does not declare, output ports that do not
    /// exist, and any connection that would make the graph cyclic.
    pub fn set_input(&self, port: usize, source: impl Into<Source>) -> Result<()> {
        let source = source.into();
        let name = self.name();
        let ports = self.node.state.borrow().algorithm.input_ports();
        if !ports.accepts(port) {
            return Err(Error::process_object(format!(
                "{name}: no input port #{port}"
            )));
        }

        match &source {
            Source::Data(data) => {
                if self.node.produces(data) {
                    return Err(Error::process_object(format!(
                        "{name}: connecting one of its own outputs would create a cycle"
                    )));
                }
            }
            Source::Port { node, port: output } => {
                if node.output(*output).is_none() {
                    return Err(Error::process_object(format!(
                        "{name}: upstream node {} has no output port #{output}",
                        node.name()
                    )));
                }
                let self_addr = Rc::as_ptr(&self.node) as *const ();
                if reaches(node, self_addr) {
                    return Err(Error::process_object(format!(
                        "{name}: connecting {} would create a cycle",
                        node.name()
                    )));
                }
            }
        }

        let mut state = self.node.state.borrow_mut();
        if state.inputs.len() <= port {
            state.inputs.resize(port + 1, None);
        }
        state.inputs[port] = Some(source);
        state.modified = Timestamp::next();
        Ok(())
    }

    /// Disconnects input `port`. Returns the previous source, if any.
    pub fn clear_input(&self, port: usize) -> Option<Source> {
        let mut state = self.node.state.borrow_mut();
        let previous = state.inputs.get_mut(port).and_then(Option::take);
        if previous.is_some() {
            state.modified = Timestamp::next();
        }
        previous
    }

    pub fn input_count(&self) -> usize {
        self.node.state.borrow().inputs.len()
    }

    pub fn output_count(&self) -> usize {
        self.node.state.borrow().outputs.len()
    }

    /// Source that feeds another node from output `port` of this one.
    pub fn output_port(&self, port: usize) -> Source {
        Source::Port {
            node: self.as_upstream(),
            port,
        }
    }

    /// Handle to output `port`. Does not trigger any computation.
    pub fn output<T: 'static>(&self, port: usize) -> Result<DataObject<T>> {
        let name = self.name();
        let data = self.node.output(port).ok_or_else(|| {
            Error::process_object(format!("{name}: no output port #{port}"))
        })?;
        let type_name = data.type_name();
        data.downcast::<T>().ok_or_else(|| {
            Error::process_object(format!(
                "{name}: output #{port} holds {type_name}, not {}",
                std::any::type_name::<T>()
            ))
        })
    }

    pub fn update(&self) -> Result<()> {
        self.node.run_update()
    }

    /// Timestamp of the inputs used by the last successful computation.
    pub fn last_computed(&self) -> Option<Timestamp> {
        self.node.state.borrow().computed
    }

    pub fn with_algorithm<R>(&self, f: impl FnOnce(&A) -> R) -> R {
        f(&self.node.state.borrow().algorithm)
    }

    /// Mutates the algorithm's parameters and marks the node modified.
    pub fn configure<R>(&self, f: impl FnOnce(&mut A) -> R) -> R {
        let mut state = self.node.state.borrow_mut();
        let result = f(&mut state.algorithm);
        state.modified = Timestamp::next();
        result
    }

    /// Forces a recomputation on the next update.
    pub fn modified(&self) {
        self.node.state.borrow_mut().modified = Timestamp::next();
    }
}

impl<A: Algorithm> fmt::Debug for ProcessObject<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.node.state.borrow();
        f.debug_struct("ProcessObject")
            .field("name", &state.algorithm.name())
            .field("inputs", &state.inputs.len())
            .field("outputs", &state.outputs.len())
            .field("computed", &state.computed)
            .finish()
    }
}
