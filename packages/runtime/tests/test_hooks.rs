//! Tests for the component hook interface

use std::cell::RefCell;
use std::rc::Rc;
use xprops_reactive::{EvalContext, Store, Value};
use xprops_runtime::{
    ComponentHook, ComponentInit, NodeId, Runtime, RuntimeConfig, RuntimeError, RuntimeResult,
};

#[derive(Default)]
struct RecordingHook {
    initialised: RefCell<Vec<(NodeId, bool)>>,
    destroyed: RefCell<Vec<NodeId>>,
}

impl ComponentHook for RecordingHook {
    fn init_component(
        &self,
        init: &ComponentInit<'_>,
        context: EvalContext,
    ) -> RuntimeResult<EvalContext> {
        self.initialised
            .borrow_mut()
            .push((init.node, init.parent.is_some()));
        Ok(context)
    }

    fn destroy_component(&self, node: NodeId) {
        self.destroyed.borrow_mut().push(node);
    }
}

/// Exposes `greeting` under a `$hook` key in every component
struct GreetingHook;

impl ComponentHook for GreetingHook {
    fn init_component(
        &self,
        init: &ComponentInit<'_>,
        context: EvalContext,
    ) -> RuntimeResult<EvalContext> {
        let extra = Store::new_object(init.reactor());
        extra.set("greeting", Value::from(init.attribute("greet").unwrap_or("hello")));
        Ok(context.with_layer(extra))
    }
}

struct FailingHook;

impl ComponentHook for FailingHook {
    fn init_component(&self, _: &ComponentInit<'_>, _: EvalContext) -> RuntimeResult<EvalContext> {
        Err(RuntimeError::Hook("refused".to_string()))
    }
}

#[test]
fn test_hook_sees_every_component_with_its_parent() {
    let hook = Rc::new(RecordingHook::default());
    let runtime = Runtime::with_hooks(RuntimeConfig::default(), vec![hook.clone() as Rc<dyn ComponentHook>]);
    runtime
        .mount(r#"<div id="outer" x-data="{}"><div id="inner" x-data="{}"></div></div>"#)
        .unwrap();

    let outer = runtime.query("#outer").unwrap();
    let inner = runtime.query("#inner").unwrap();
    assert_eq!(*hook.initialised.borrow(), vec![(outer, false), (inner, true)]);

    println!("✓ Hooks run for every component in document order");
}

#[test]
fn test_hook_can_extend_context() {
    let runtime = Runtime::with_hooks(RuntimeConfig::default(), vec![Rc::new(GreetingHook) as Rc<dyn ComponentHook>]);
    runtime
        .mount(r#"<div x-data="{}" greet="hi"><span x-text="greeting"></span></div>"#)
        .unwrap();
    assert_eq!(runtime.text("span").unwrap(), "hi");
}

#[test]
fn test_hook_is_told_about_destroyed_list_components() {
    let hook = Rc::new(RecordingHook::default());
    let runtime = Runtime::with_hooks(RuntimeConfig::default(), vec![hook.clone() as Rc<dyn ComponentHook>]);
    runtime
        .mount(
            r#"<div x-data="{ items: ['a', 'b'] }">
                <button @click="items = ['b']"></button>
                <template x-for="item in items" :key="item"><p x-data="{}"></p></template>
            </div>"#,
        )
        .unwrap();
    let first = runtime.query("p").unwrap();

    runtime.click("button").unwrap();

    assert_eq!(*hook.destroyed.borrow(), vec![first]);
    assert_eq!(runtime.component_count(), 2);
}

#[test]
fn test_hook_failure_aborts_mount() {
    let runtime = Runtime::with_hooks(RuntimeConfig::default(), vec![Rc::new(FailingHook) as Rc<dyn ComponentHook>]);
    let err = runtime.mount(r#"<div x-data="{}"></div>"#).unwrap_err();
    assert!(matches!(err, RuntimeError::Hook(_)));
}

#[test]
fn test_render_serialises_live_tree() {
    let runtime = Runtime::new(RuntimeConfig::default());
    runtime
        .mount(r#"<div x-data="{ n: 'x' }"><b x-text="n"></b></div>"#)
        .unwrap();
    assert_eq!(
        runtime.render(),
        r#"<div x-data="{ n: 'x' }"><b x-text="n">x</b></div>"#
    );
}
