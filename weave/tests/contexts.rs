#![allow(missing_docs)]

use std::sync::Arc;
use weave::{
    Deployment,
    catalog::{BeanDescriptor, MethodDescriptor, TypeCatalog},
    di::{ClientProxy, Container, Error, Scope, value},
    generator::MissingContextPolicy,
};

#[derive(Debug)]
struct Order {
    invoice: ClientProxy,
    number: u32,
}

struct Invoice {
    order: ClientProxy,
}

struct Clock;

fn catalog() -> TypeCatalog {
    TypeCatalog::builder()
        .bean(BeanDescriptor::new("clock", "Clock").scope("singleton"))
        .bean(BeanDescriptor::new("order", "Order")
            .scope("contextual")
            .inject("Invoice")
            .method(MethodDescriptor::new("number")))
        .bean(BeanDescriptor::new("invoice", "Invoice")
            .scope("contextual")
            .inject("Order")
            .inject("Clock")
            .method(MethodDescriptor::new("order_number")))
        .build()
}

fn container(deployment: &Deployment) -> Container {
    let mut builder = deployment.container_builder();
    builder
        .factory("clock", || Clock)
        .factory("order", |invoice: ClientProxy| Ok(Order { invoice, number: 7 }))
        .factory("invoice", |order: ClientProxy, _clock: Arc<Clock>| Ok(Invoice { order }))
        .method("order", "number", |order: &Order, _| Ok(value(order.number)))
        .method("invoice", "order_number", |invoice: &Invoice, _| invoice.order.invoke("number", ()));
    builder.build().unwrap()
}

#[test]
fn it_builds_contextual_cycle() {
    let deployment = Deployment::deploy(&catalog()).unwrap();

    assert!(deployment.graph().is_in_cycle("order"));
    assert!(deployment.graph().is_in_cycle("invoice"));
    assert!(!deployment.graph().is_in_cycle("clock"));
}

#[test]
fn it_resolves_cycle_on_first_access_in_fresh_context() {
    let deployment = Deployment::deploy(&catalog()).unwrap();
    let container = container(&deployment);
    let context = container.create_context();

    context.run(|| {
        let order = container.resolve::<Order>("order").unwrap();
        let invoice = order.invoice.get::<Invoice>().unwrap();
        let same_order = invoice.order.get::<Order>().unwrap();

        assert_eq!(order.number, 7);
        assert!(Arc::ptr_eq(&order, &same_order));
    });
}

#[test]
fn it_invokes_across_cycle() {
    let deployment = Deployment::deploy(&catalog()).unwrap();
    let container = container(&deployment);
    let context = container.create_context();

    let number = context
        .run(|| container.invoke("invoice", "order_number", ()))
        .unwrap();

    assert_eq!(*number.downcast_ref::<u32>().unwrap(), 7);
}

#[test]
fn it_isolates_contexts() {
    let deployment = Deployment::deploy(&catalog()).unwrap();
    let container = container(&deployment);
    let proxy = container.proxy("order").unwrap();

    let first = container.create_context();
    let second = container.create_context();

    let a = first.run(|| proxy.get::<Order>()).unwrap();
    let b = second.run(|| proxy.get::<Order>()).unwrap();

    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(first.len(), 1);
}

#[test]
fn it_fails_outside_of_context() {
    let deployment = Deployment::deploy(&catalog()).unwrap();
    let container = container(&deployment);

    let err = container.invoke("order", "number", ()).unwrap_err();

    assert!(err.is_resolution_at_runtime());
    assert!(matches!(err, Error::ResolutionAtRuntime { .. }));
}

#[test]
fn it_fails_after_context_ended() {
    let deployment = Deployment::deploy(&catalog()).unwrap();
    let container = container(&deployment);
    let context = container.create_context();

    context.run(|| container.resolve::<Order>("order")).unwrap();
    context.end();

    let err = context.run(|| container.resolve::<Order>("order")).unwrap_err();

    assert!(err.is_resolution_at_runtime());
    assert!(context.is_ended());
}

#[test]
fn it_records_indirection_for_contextual_beans() {
    let deployment = Deployment::deploy(&catalog()).unwrap();

    let indirection = deployment.indirection("order").unwrap();
    let proxy = deployment
        .artifact("order_ClientProxy")
        .and_then(|artifact| artifact.as_client_proxy())
        .unwrap();

    assert_eq!(indirection.lookup.scope, Scope::Contextual);
    assert_eq!(indirection.on_missing, MissingContextPolicy::Fail);
    assert_eq!(proxy.indirection, indirection);
    assert!(deployment.indirection("clock").is_none());
}
