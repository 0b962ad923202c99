//! # Runtime
//!
//! Mounts markup into a [`Dom`] and wires directives to reactive effects.
//!
//! Every element carrying `x-data` is a component root with its own
//! [`Store`]. Directive expressions inside a component evaluate against its
//! [`EvalContext`], which registered [`ComponentHook`]s may extend while the
//! component initialises. Each effect is owned by the node that created it
//! and is disposed when that node leaves the tree.

use crate::config::RuntimeConfig;
use crate::dom::{Dom, NodeId};
use crate::error::{RuntimeError, RuntimeResult};
use crate::hook::{ComponentHook, ComponentInit};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use tracing::{debug, info, instrument, warn};
use xprops_parser::ast::Expression;
use xprops_parser::{parse_expression, parse_markup};
use xprops_reactive::{
    evaluate, evaluate_source, execute_source, EffectId, EvalContext, Reactor, Store, Value,
};

#[derive(Clone)]
struct Handler {
    event: String,
    source: Rc<str>,
    context: EvalContext,
}

pub(crate) struct RuntimeInner {
    pub(crate) dom: RefCell<Dom>,
    reactor: Reactor,
    config: RuntimeConfig,
    hooks: Vec<Rc<dyn ComponentHook>>,
    handlers: RefCell<HashMap<NodeId, Vec<Handler>>>,
    node_effects: RefCell<HashMap<NodeId, Vec<EffectId>>>,
    components: RefCell<HashMap<NodeId, EvalContext>>,
}

/// Handle to a mounted document and its reactive state
#[derive(Clone)]
pub struct Runtime {
    pub(crate) inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Self {
        Self::with_hooks(config, Vec::new())
    }

    pub fn with_hooks(config: RuntimeConfig, hooks: Vec<Rc<dyn ComponentHook>>) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                dom: RefCell::new(Dom::new()),
                reactor: Reactor::with_max_flush_iterations(config.max_flush_iterations),
                config,
                hooks,
                handlers: RefCell::new(HashMap::new()),
                node_effects: RefCell::new(HashMap::new()),
                components: RefCell::new(HashMap::new()),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<RuntimeInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<RuntimeInner>) -> Option<Runtime> {
        weak.upgrade().map(|inner| Runtime { inner })
    }

    pub fn reactor(&self) -> &Reactor {
        &self.inner.reactor
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Parse `markup`, append it to the body and initialise every component
    #[instrument(skip(self, markup), fields(bytes = markup.len()))]
    pub fn mount(&self, markup: &str) -> RuntimeResult<()> {
        let nodes = parse_markup(markup)?;
        let roots: Vec<NodeId> = {
            let mut dom = self.inner.dom.borrow_mut();
            let body = dom.root();
            nodes
                .iter()
                .map(|node| {
                    let id = dom.instantiate(node);
                    dom.append_child(body, id);
                    id
                })
                .collect()
        };

        self.reactor().batch(|| {
            roots
                .into_iter()
                .try_for_each(|node| self.walk(node, None))
        })?;

        info!(
            components = self.component_count(),
            effects = self.reactor().effect_count(),
            "Markup mounted"
        );
        Ok(())
    }

    pub(crate) fn walk(&self, node: NodeId, context: Option<&EvalContext>) -> RuntimeResult<()> {
        let (tag, attributes) = {
            let dom = self.inner.dom.borrow();
            match dom.tag(node) {
                Some(tag) => (tag.to_string(), dom.attributes(node)),
                None => return Ok(()),
            }
        };

        let mut context = context.cloned();
        if let Some(source) = find_attribute(&attributes, &self.config().directive("data")) {
            context = Some(self.init_component(node, source, &attributes, context.as_ref())?);
        }

        let for_directive = self.config().directive("for");
        if let Some(clause) = find_attribute(&attributes, &for_directive) {
            if tag != "template" {
                return Err(RuntimeError::InvalidDirective {
                    name: for_directive,
                    message: format!("must be used on <template>, found <{}>", tag),
                });
            }
            if let Some(context) = &context {
                self.init_for(node, clause, &attributes, context)?;
            }
            return Ok(());
        }

        if let Some(context) = &context {
            self.bind_directives(node, &attributes, context)?;
        }

        let children = self.inner.dom.borrow().children(node);
        for child in children {
            self.walk(child, context.as_ref())?;
        }
        Ok(())
    }

    #[instrument(skip_all, fields(node = %node))]
    fn init_component(
        &self,
        node: NodeId,
        source: &str,
        attributes: &[(String, String)],
        parent: Option<&EvalContext>,
    ) -> RuntimeResult<EvalContext> {
        let reactor = self.reactor();
        let data = if source.trim().is_empty() {
            Value::Object(IndexMap::new())
        } else {
            reactor.untracked(|| evaluate_source(source, &EvalContext::empty()))?
        };

        let local = match Store::wrap(reactor, data) {
            Value::Reactive(store) if !store.is_array() => store,
            other => {
                warn!(
                    value_type = other.type_name(),
                    "Component data is not an object, starting with empty state"
                );
                Store::new_object(reactor)
            }
        };

        let mut context =
            EvalContext::component(local.clone(), parent.cloned(), &self.config().props_namespace);
        let init = ComponentInit {
            runtime: self,
            node,
            attributes,
            local: &local,
            parent,
        };
        for hook in &self.inner.hooks {
            context = hook.init_component(&init, context)?;
        }

        self.inner
            .components
            .borrow_mut()
            .insert(node, context.clone());
        debug!(hooks = self.inner.hooks.len(), "Component initialised");
        Ok(context)
    }

    fn bind_directives(
        &self,
        node: NodeId,
        attributes: &[(String, String)],
        context: &EvalContext,
    ) -> RuntimeResult<()> {
        let prefix = self.config().directive_prefix.as_str();
        for (name, value) in attributes {
            if let Some(directive) = name.strip_prefix(prefix) {
                match directive.split_once(':') {
                    Some(("bind", attribute)) => {
                        self.bind_attribute(node, name, attribute, value, context)?
                    }
                    Some(("on", event)) => self.bind_handler(node, name, event, value, context)?,
                    _ if directive == "text" => self.bind_text(node, value, context),
                    // data, for and plugin attributes are consumed elsewhere
                    _ => {}
                }
            } else if let Some(attribute) = name.strip_prefix(':') {
                self.bind_attribute(node, name, attribute, value, context)?;
            } else if let Some(event) = name.strip_prefix('@') {
                self.bind_handler(node, name, event, value, context)?;
            }
        }
        Ok(())
    }

    fn bind_text(&self, node: NodeId, source: &str, context: &EvalContext) {
        let expr = compile(source, "text");
        let context = context.clone();
        let weak = self.downgrade();
        self.effect_for(node, move || {
            let Some(runtime) = Runtime::upgrade(&weak) else {
                return;
            };
            let text = render_value(expr.as_ref(), &context, "text").to_text();
            runtime.inner.dom.borrow_mut().set_text_content(node, &text);
        });
    }

    fn bind_attribute(
        &self,
        node: NodeId,
        directive: &str,
        attribute: &str,
        source: &str,
        context: &EvalContext,
    ) -> RuntimeResult<()> {
        if attribute.is_empty() {
            return Err(RuntimeError::InvalidDirective {
                name: directive.to_string(),
                message: "missing attribute name".to_string(),
            });
        }

        let expr = compile(source, attribute);
        let attribute = attribute.to_string();
        let context = context.clone();
        let weak = self.downgrade();
        self.effect_for(node, move || {
            let Some(runtime) = Runtime::upgrade(&weak) else {
                return;
            };
            let value = render_value(expr.as_ref(), &context, &attribute);
            let mut dom = runtime.inner.dom.borrow_mut();
            match value {
                Value::Boolean(false) => dom.remove_attribute(node, &attribute),
                value if value.is_nullish() => dom.remove_attribute(node, &attribute),
                Value::Boolean(true) => dom.set_attribute(node, &attribute, &attribute),
                value => dom.set_attribute(node, &attribute, &value.to_text()),
            }
        });
        Ok(())
    }

    fn bind_handler(
        &self,
        node: NodeId,
        directive: &str,
        event: &str,
        source: &str,
        context: &EvalContext,
    ) -> RuntimeResult<()> {
        // Modifiers (`@click.prevent`) carry no meaning without a browser
        let event = event.split('.').next().unwrap_or_default();
        if event.is_empty() {
            return Err(RuntimeError::InvalidDirective {
                name: directive.to_string(),
                message: "missing event name".to_string(),
            });
        }

        self.inner
            .handlers
            .borrow_mut()
            .entry(node)
            .or_default()
            .push(Handler {
                event: event.to_string(),
                source: Rc::from(source),
                context: context.clone(),
            });
        Ok(())
    }

    /// Create an effect owned by `node`
    pub(crate) fn effect_for(&self, node: NodeId, f: impl Fn() + 'static) -> EffectId {
        let id = self.reactor().effect(f);
        self.inner
            .node_effects
            .borrow_mut()
            .entry(node)
            .or_default()
            .push(id);
        id
    }

    /// Dispose everything owned by `node`'s subtree, then remove it
    pub(crate) fn destroy(&self, node: NodeId) {
        let subtree = self.inner.dom.borrow().descendants(node);
        let mut components = 0usize;
        for id in &subtree {
            let effects = self.inner.node_effects.borrow_mut().remove(id);
            for effect in effects.into_iter().flatten() {
                self.reactor().dispose(effect);
            }
            self.inner.handlers.borrow_mut().remove(id);

            let removed = self.inner.components.borrow_mut().remove(id);
            if removed.is_some() {
                components += 1;
                for hook in &self.inner.hooks {
                    hook.destroy_component(*id);
                }
            }
        }
        self.inner.dom.borrow_mut().remove(node);
        debug!(node = %node, nodes = subtree.len(), components, "Subtree destroyed");
    }

    /// Run the `event` handlers of `node` and its ancestors
    pub fn dispatch(&self, node: NodeId, event: &str) -> RuntimeResult<()> {
        let mut current = Some(node);
        while let Some(target) = current {
            let handlers: Vec<Handler> = self
                .inner
                .handlers
                .borrow()
                .get(&target)
                .map(|handlers| {
                    handlers
                        .iter()
                        .filter(|handler| handler.event == event)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();

            for handler in handlers {
                debug!(node = %target, event, "Running event handler");
                self.reactor()
                    .batch(|| execute_source(&handler.source, &handler.context))?;
            }
            current = self.inner.dom.borrow().parent(target);
        }
        Ok(())
    }

    /// Click the first element matching `selector`
    pub fn click(&self, selector: &str) -> RuntimeResult<()> {
        let node = self.query(selector)?;
        self.dispatch(node, "click")
    }

    /// Run any effects still queued
    pub fn flush(&self) {
        self.reactor().flush();
    }

    pub fn query_selector(&self, selector: &str) -> Option<NodeId> {
        self.inner.dom.borrow().query_selector(selector)
    }

    pub fn query_selector_all(&self, selector: &str) -> Vec<NodeId> {
        self.inner.dom.borrow().query_selector_all(selector)
    }

    /// Like [`Runtime::query_selector`], failing when nothing matches
    pub fn query(&self, selector: &str) -> RuntimeResult<NodeId> {
        self.query_selector(selector)
            .ok_or_else(|| RuntimeError::NodeNotFound {
                selector: selector.to_string(),
            })
    }

    pub fn inner_text(&self, node: NodeId) -> String {
        self.inner.dom.borrow().inner_text(node)
    }

    /// Text of the first element matching `selector`
    pub fn text(&self, selector: &str) -> RuntimeResult<String> {
        let node = self.query(selector)?;
        Ok(self.inner_text(node))
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.inner
            .dom
            .borrow()
            .attribute(node, name)
            .map(str::to_string)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.inner.dom.borrow().contains(node)
    }

    /// Serialise the current document body
    pub fn render(&self) -> String {
        let dom = self.inner.dom.borrow();
        dom.render(dom.root())
    }

    /// Context of the component rooted at `node`
    pub fn component_context(&self, node: NodeId) -> Option<EvalContext> {
        self.inner.components.borrow().get(&node).cloned()
    }

    pub fn component_count(&self) -> usize {
        self.inner.components.borrow().len()
    }

    /// Number of live effects owned by `node`
    pub fn effect_count(&self, node: NodeId) -> usize {
        self.inner
            .node_effects
            .borrow()
            .get(&node)
            .map(|effects| effects.len())
            .unwrap_or(0)
    }
}

pub(crate) fn find_attribute<'a>(attributes: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

/// Parse a render expression once; failures render as empty
fn compile(source: &str, target: &str) -> Option<Expression> {
    match parse_expression(source) {
        Ok(expr) => Some(expr),
        Err(err) => {
            warn!(target_name = target, error = %err, "Expression failed to parse");
            None
        }
    }
}

fn render_value(expr: Option<&Expression>, context: &EvalContext, target: &str) -> Value {
    let Some(expr) = expr else {
        return Value::Undefined;
    };
    match evaluate(expr, context) {
        Ok(value) => value,
        Err(err) => {
            warn!(target_name = target, error = %err, "Expression evaluation failed");
            Value::Undefined
        }
    }
}
