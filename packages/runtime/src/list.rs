//! `x-for` list rendering.
//!
//! A `<template x-for>` owns one effect that re-evaluates the collection,
//! keys every item and reconciles the rendered instances: kept instances get
//! their item scope updated in place, new ones are cloned from the template
//! content and initialised against current state, and removed ones are
//! destroyed together with every effect and component they own.

use crate::dom::NodeId;
use crate::error::RuntimeResult;
use crate::runtime::Runtime;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, error, warn};
use xprops_parser::ast::{Expression, ForClause};
use xprops_parser::{parse_expression, parse_for_clause, MarkupNode};
use xprops_reactive::{evaluate, EvalContext, Store, Value, MAX_ARRAY_LENGTH};

struct ListInstance {
    key: String,
    scope: Store,
    nodes: Vec<NodeId>,
}

struct List {
    template: NodeId,
    clause: ForClause,
    key: Option<Expression>,
    content: Rc<Vec<MarkupNode>>,
    context: EvalContext,
    instances: RefCell<Vec<ListInstance>>,
}

impl Runtime {
    pub(crate) fn init_for(
        &self,
        template: NodeId,
        clause: &str,
        attributes: &[(String, String)],
        context: &EvalContext,
    ) -> RuntimeResult<()> {
        let clause = parse_for_clause(clause)?;
        let bind_key = self.config().directive("bind:key");
        let key = attributes
            .iter()
            .find(|(name, _)| name == ":key" || *name == bind_key)
            .map(|(_, source)| parse_expression(source))
            .transpose()?;
        let content = self
            .inner
            .dom
            .borrow()
            .template_content(template)
            .unwrap_or_default();

        let list = List {
            template,
            clause,
            key,
            content,
            context: context.clone(),
            instances: RefCell::new(Vec::new()),
        };
        let weak = self.downgrade();
        self.effect_for(template, move || {
            if let Some(runtime) = Runtime::upgrade(&weak) {
                runtime.update_list(&list);
            }
        });
        Ok(())
    }

    fn update_list(&self, list: &List) {
        let items = self.list_items(list);
        let keyed: Vec<(String, Value, usize)> = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| (self.list_key(list, &item, index), item, index))
            .collect();

        self.reactor().untracked(|| self.reconcile(list, keyed));
    }

    fn list_items(&self, list: &List) -> Vec<Value> {
        let collection = match evaluate(&list.clause.collection, &list.context) {
            Ok(value) => value,
            Err(err) => {
                warn!(template = %list.template, error = %err, "x-for collection evaluation failed");
                return Vec::new();
            }
        };

        match collection {
            Value::Array(items) => items,
            Value::Reactive(store) => store.items(),
            Value::Object(map) => map.into_values().collect(),
            Value::Number(n) if n > MAX_ARRAY_LENGTH as f64 => {
                warn!(
                    template = %list.template,
                    count = n,
                    max = MAX_ARRAY_LENGTH,
                    "x-for range exceeds the supported length"
                );
                Vec::new()
            }
            Value::Number(n) if n >= 1.0 => (1..=n as usize).map(|i| Value::Number(i as f64)).collect(),
            value if value.is_nullish() => Vec::new(),
            value => {
                warn!(
                    template = %list.template,
                    value_type = value.type_name(),
                    "x-for collection is not iterable"
                );
                Vec::new()
            }
        }
    }

    fn item_scope(&self, list: &List, item: Value, index: usize) -> Store {
        let scope = Store::new_object(self.reactor());
        scope.set(&list.clause.item, item);
        if let Some(name) = &list.clause.index {
            scope.set(name, Value::Number(index as f64));
        }
        scope
    }

    fn list_key(&self, list: &List, item: &Value, index: usize) -> String {
        let Some(key) = &list.key else {
            return index.to_string();
        };
        let scope = self.item_scope(list, item.clone(), index);
        match evaluate(key, &list.context.with_layer(scope)) {
            Ok(value) => value.to_js_string(),
            Err(err) => {
                warn!(template = %list.template, error = %err, "x-for key evaluation failed, using index");
                index.to_string()
            }
        }
    }

    fn reconcile(&self, list: &List, keyed: Vec<(String, Value, usize)>) {
        let previous = std::mem::take(&mut *list.instances.borrow_mut());
        let mut stale = Vec::new();
        let mut by_key: HashMap<String, ListInstance> = HashMap::new();
        for instance in previous {
            if by_key.contains_key(&instance.key) {
                stale.push(instance);
            } else {
                by_key.insert(instance.key.clone(), instance);
            }
        }

        let mut next = Vec::with_capacity(keyed.len());
        let mut created = Vec::new();
        for (key, item, index) in keyed {
            match by_key.remove(&key) {
                Some(instance) => {
                    instance.scope.set(&list.clause.item, item);
                    if let Some(name) = &list.clause.index {
                        instance.scope.set(name, Value::Number(index as f64));
                    }
                    next.push(instance);
                }
                None => {
                    let scope = self.item_scope(list, item, index);
                    let nodes = {
                        let mut dom = self.inner.dom.borrow_mut();
                        list.content.iter().map(|markup| dom.instantiate(markup)).collect()
                    };
                    created.push(next.len());
                    next.push(ListInstance { key, scope, nodes });
                }
            }
        }
        stale.extend(by_key.into_values());

        for instance in &stale {
            for node in &instance.nodes {
                self.destroy(*node);
            }
        }

        {
            let mut dom = self.inner.dom.borrow_mut();
            let mut anchor = list.template;
            for node in next.iter().flat_map(|instance| instance.nodes.iter()) {
                dom.insert_after(anchor, *node);
                anchor = *node;
            }
        }

        if !created.is_empty() || !stale.is_empty() {
            debug!(
                template = %list.template,
                created = created.len(),
                removed = stale.len(),
                total = next.len(),
                "List reconciled"
            );
        }

        for index in created {
            let instance = &next[index];
            let context = list.context.with_layer(instance.scope.clone());
            for node in &instance.nodes {
                if let Err(err) = self.walk(*node, Some(&context)) {
                    error!(template = %list.template, error = %err, "Failed to initialise list instance");
                }
            }
        }

        *list.instances.borrow_mut() = next;
    }
}

#[cfg(test)]
mod tests {
    use crate::{Runtime, RuntimeConfig};

    fn mount(markup: &str) -> Runtime {
        let runtime = Runtime::new(RuntimeConfig::default());
        runtime.mount(markup).unwrap();
        runtime
    }

    fn texts(runtime: &Runtime) -> Vec<String> {
        runtime
            .query_selector_all("span")
            .into_iter()
            .map(|node| runtime.inner_text(node))
            .collect()
    }

    #[test]
    fn test_renders_items_with_index() {
        let runtime = mount(
            r#"<ul x-data="{ items: ['a', 'b'] }">
                <template x-for="(item, index) in items"><span x-text="index + ':' + item"></span></template>
            </ul>"#,
        );
        assert_eq!(texts(&runtime), vec!["0:a", "1:b"]);
    }

    #[test]
    fn test_keyed_instances_are_reused() {
        let runtime = mount(
            r#"<div x-data="{ items: ['a', 'b'] }">
                <button @click="items = ['b', 'c', 'a']"></button>
                <template x-for="item in items" :key="item"><span x-text="item"></span></template>
            </div>"#,
        );
        let before = runtime.query_selector_all("span");

        runtime.click("button").unwrap();

        let after = runtime.query_selector_all("span");
        assert_eq!(texts(&runtime), vec!["b", "c", "a"]);
        assert_eq!(after[0], before[1]);
        assert_eq!(after[2], before[0]);
    }

    #[test]
    fn test_removed_instances_release_effects() {
        let runtime = mount(
            r#"<div x-data="{ items: ['a', 'b'] }">
                <button @click="items = ['a']"></button>
                <template x-for="item in items" :key="item"><span x-text="item"></span></template>
            </div>"#,
        );
        let effects_before = runtime.reactor().effect_count();
        let removed = runtime.query_selector_all("span")[1];

        runtime.click("button").unwrap();

        assert_eq!(texts(&runtime), vec!["a"]);
        assert!(!runtime.contains(removed));
        assert_eq!(runtime.reactor().effect_count(), effects_before - 1);
    }

    #[test]
    fn test_unkeyed_list_updates_items_in_place() {
        let runtime = mount(
            r#"<div x-data="{ items: ['a', 'b'] }">
                <button @click="items = ['x', 'b']"></button>
                <template x-for="item in items"><span x-text="item"></span></template>
            </div>"#,
        );
        let before = runtime.query_selector_all("span");
        runtime.click("button").unwrap();
        assert_eq!(texts(&runtime), vec!["x", "b"]);
        assert_eq!(runtime.query_selector_all("span"), before);
    }

    #[test]
    fn test_numeric_range_and_nested_lists() {
        let runtime = mount(
            r#"<div x-data="{ rows: [['a', 'b'], ['c']] }">
                <template x-for="row in rows"><p><template x-for="cell in row"><span x-text="cell"></span></template></p></template>
                <template x-for="n in 2"><i x-text="n"></i></template>
            </div>"#,
        );
        assert_eq!(texts(&runtime), vec!["a", "b", "c"]);
        assert_eq!(runtime.query_selector_all("i").len(), 2);
    }

    #[test]
    fn test_oversized_range_renders_nothing() {
        let runtime = mount(
            r#"<div x-data="{ n: 100000000000000000000 }">
                <button @click="n = 2"></button>
                <template x-for="i in n"><span x-text="i"></span></template>
            </div>"#,
        );
        assert!(texts(&runtime).is_empty());

        runtime.click("button").unwrap();
        assert_eq!(texts(&runtime), vec!["1", "2"]);
    }
}
