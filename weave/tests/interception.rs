#![allow(missing_docs)]

use std::{
    fmt,
    error::Error as StdError,
    sync::{Arc, Mutex},
};
use weave::{
    Deployment,
    catalog::{BeanDescriptor, InterceptorDescriptor, MarkerDescriptor, MethodDescriptor, TypeCatalog},
    di::{Container, Error, InvocationContext, args, value},
};

#[derive(Debug)]
struct Declined;

impl fmt::Display for Declined {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("payment declined")
    }
}

impl StdError for Declined {}

struct Payments;

impl Payments {
    fn pay(&self, amount: u32) -> Result<u32, Error> {
        if amount > 100 {
            Err(Error::failure(Declined))
        } else {
            Ok(amount)
        }
    }
}

fn logged() -> MarkerDescriptor {
    MarkerDescriptor::new("Logged")
}

fn secured() -> MarkerDescriptor {
    MarkerDescriptor::new("Secured")
}

fn catalog() -> TypeCatalog {
    TypeCatalog::builder()
        .interceptor(InterceptorDescriptor::new("logging", "log").binding(logged()).priority(10))
        .interceptor(InterceptorDescriptor::new("security", "check").binding(secured()).priority(5))
        .bean(BeanDescriptor::new("payments", "Payments")
            .scope("singleton")
            .method(MethodDescriptor::new("pay").binding(logged()).binding(secured()))
            .method(MethodDescriptor::new("refund")))
        .build()
}

fn container(deployment: &Deployment, journal: Arc<Mutex<Vec<String>>>) -> Container {
    let log_journal = journal.clone();
    let check_journal = journal;

    let mut builder = deployment.container_builder();
    builder
        .factory("payments", || Payments)
        .method("payments", "pay", |payments: &Payments, args| {
            let amount = args.get::<u32>(0)?;
            payments.pay(*amount).map(value)
        })
        .method("payments", "refund", |payments: &Payments, args| {
            let amount = args.get::<u32>(0)?;
            payments.pay(*amount).map(value)
        })
        .interceptor_fn("log", move |ctx: &mut InvocationContext| {
            log_journal.lock().unwrap().push(format!("log:{}", ctx.method()));
            ctx.proceed()
        })
        .interceptor_fn("check", move |ctx: &mut InvocationContext| {
            check_journal.lock().unwrap().push(format!("check:{}", ctx.method()));
            ctx.proceed()
        });
    builder.build().unwrap()
}

#[test]
fn it_plans_lower_priority_first() {
    let deployment = Deployment::deploy(&catalog()).unwrap();
    let plan = deployment.plan("payments", "pay").unwrap();

    let chain: Vec<_> = plan.interceptor_ids().collect();

    assert_eq!(chain, ["security", "logging"]);
    assert!(deployment.plan("payments", "refund").is_none());
}

#[test]
fn it_runs_chain_in_planned_order() {
    let deployment = Deployment::deploy(&catalog()).unwrap();
    let journal = Arc::new(Mutex::new(Vec::new()));
    let container = container(&deployment, journal.clone());

    let paid = container.invoke("payments", "pay", args![40_u32]).unwrap();

    assert_eq!(*paid.downcast_ref::<u32>().unwrap(), 40);
    assert_eq!(*journal.lock().unwrap(), ["check:pay", "log:pay"]);
}

#[test]
fn it_passes_through_method_without_interceptors() {
    let deployment = Deployment::deploy(&catalog()).unwrap();
    let journal = Arc::new(Mutex::new(Vec::new()));
    let container = container(&deployment, journal.clone());

    let refunded = container.invoke("payments", "refund", args![40_u32]).unwrap();
    let direct = Payments.pay(40).unwrap();

    let failed = container.invoke("payments", "refund", args![400_u32]).unwrap_err();
    let direct_failure = Payments.pay(400).unwrap_err();

    assert_eq!(*refunded.downcast_ref::<u32>().unwrap(), direct);
    assert_eq!(failed.to_string(), direct_failure.to_string());
    assert!(journal.lock().unwrap().is_empty());
    assert!(!container.dispatch_table().is_intercepted("payments", "refund"));
}

#[test]
fn it_propagates_failure_cause_unchanged() {
    let deployment = Deployment::deploy(&catalog()).unwrap();
    let container = container(&deployment, Arc::new(Mutex::new(Vec::new())));

    let err = container.invoke("payments", "pay", args![400_u32]).unwrap_err();
    let failure = err.as_failure().unwrap();

    assert!(failure.downcast_ref::<Declined>().is_some());
    assert_eq!(err.to_string(), "payment declined");
}

#[test]
fn it_keeps_same_failure_across_links() {
    let catalog = TypeCatalog::builder()
        .interceptor(InterceptorDescriptor::new("outer", "outer").binding(logged()).priority(1))
        .interceptor(InterceptorDescriptor::new("inner", "inner").binding(logged()).priority(2))
        .bean(BeanDescriptor::new("svc", "Svc").method(MethodDescriptor::new("run").binding(logged())))
        .build();
    let deployment = Deployment::deploy(&catalog).unwrap();
    let seen = Arc::new(Mutex::new(None));
    let seen_by_inner = seen.clone();

    let mut builder = deployment.container_builder();
    builder
        .factory("svc", || ())
        .method("svc", "run", |_: &(), _| Err(Error::failure(Declined)))
        .interceptor_fn("inner", move |ctx: &mut InvocationContext| {
            let result = ctx.proceed();
            if let Err(err) = &result {
                *seen_by_inner.lock().unwrap() = err.as_failure().cloned();
            }
            result
        })
        .interceptor_fn("outer", |ctx: &mut InvocationContext| ctx.proceed());
    let container = builder.build().unwrap();

    let err = container.invoke("svc", "run", ()).unwrap_err();
    let inner = seen.lock().unwrap().clone().unwrap();

    assert!(err.as_failure().unwrap().same_cause(&inner));
}

#[test]
fn it_rejects_second_proceed() {
    let catalog = TypeCatalog::builder()
        .interceptor(InterceptorDescriptor::new("retry", "retry").binding(logged()))
        .bean(BeanDescriptor::new("counter", "Counter")
            .scope("singleton")
            .method(MethodDescriptor::new("hit").binding(logged())))
        .build();
    let deployment = Deployment::deploy(&catalog).unwrap();
    let hits = Arc::new(Mutex::new(0_u32));
    let body_hits = hits.clone();

    let mut builder = deployment.container_builder();
    builder
        .factory("counter", || ())
        .method("counter", "hit", move |_: &(), _| {
            *body_hits.lock().unwrap() += 1;
            Ok(value(()))
        })
        .interceptor_fn("retry", |ctx: &mut InvocationContext| {
            ctx.proceed()?;
            ctx.proceed()
        });
    let container = builder.build().unwrap();

    let err = container.invoke("counter", "hit", ()).unwrap_err();

    assert!(matches!(err, Error::AlreadyProceeded { .. }));
    assert_eq!(err.to_string(), "Container Error: proceed called more than once in counter::hit");
    assert_eq!(*hits.lock().unwrap(), 1);
}

#[test]
fn it_lets_interceptor_short_circuit() {
    let deployment = Deployment::deploy(&catalog()).unwrap();

    let mut builder = deployment.container_builder();
    builder
        .factory("payments", || Payments)
        .method("payments", "pay", |_: &Payments, _| Ok(value(0_u32)))
        .method("payments", "refund", |_: &Payments, _| Ok(value(0_u32)))
        .interceptor_fn("log", |ctx: &mut InvocationContext| ctx.proceed())
        .interceptor_fn("check", |ctx: &mut InvocationContext| {
            if *ctx.args().get::<u32>(0)? > 50 {
                Err(Error::failure(Declined))
            } else {
                ctx.proceed()
            }
        });
    let container = builder.build().unwrap();

    let err = container.invoke("payments", "pay", args![60_u32]).unwrap_err();

    assert!(err.as_failure().unwrap().downcast_ref::<Declined>().is_some());
}
