use weave::{
    Deployment,
    catalog::{BeanDescriptor, InterceptorDescriptor, MarkerDescriptor, MethodDescriptor, TypeCatalog},
    di::{Container, InvocationContext, args, value},
};

use std::hint::black_box;
use criterion::{criterion_group, criterion_main, Criterion};

const LAYERS: usize = 50;

fn layered() -> TypeCatalog {
    let mut builder = TypeCatalog::builder()
        .interceptor(InterceptorDescriptor::new("outer", "forward").binding(MarkerDescriptor::new("Hot")).priority(1))
        .interceptor(InterceptorDescriptor::new("inner", "forward").binding(MarkerDescriptor::new("Hot")).priority(2))
        .bean(BeanDescriptor::new("layer_0", "Layer0").scope("singleton"));

    for i in 1..LAYERS {
        builder = builder.bean(BeanDescriptor::new(format!("layer_{i}"), format!("Layer{i}"))
            .scope("singleton")
            .inject(format!("Layer{}", i - 1)));
    }

    builder
        .bean(BeanDescriptor::new("calc", "Calc")
            .scope("singleton")
            .method(MethodDescriptor::new("hot").binding(MarkerDescriptor::new("Hot")))
            .method(MethodDescriptor::new("cold")))
        .build()
}

fn container(deployment: &Deployment) -> Container {
    let mut builder = deployment.container_builder();
    builder.factory("layer_0", || Calc);
    for i in 1..LAYERS {
        builder.factory(format!("layer_{i}"), |_: std::sync::Arc<Calc>| Ok(Calc));
    }
    builder
        .factory("calc", || Calc)
        .method("calc", "hot", |_: &Calc, args| Ok(value(*args.get::<u64>(0)? + 1)))
        .method("calc", "cold", |_: &Calc, args| Ok(value(*args.get::<u64>(0)? + 1)))
        .interceptor_fn("forward", |ctx: &mut InvocationContext| ctx.proceed());
    builder.build().unwrap()
}

fn benchmark(c: &mut Criterion) {
    let catalog = layered();
    let deployment = Deployment::deploy(&catalog).unwrap();
    let container = container(&deployment);

    c.bench_function("deploy", |b| b.iter(
        || Deployment::deploy(black_box(&catalog))
    ));
    c.bench_function("pass-through", |b| b.iter(
        || container.invoke("calc", "cold", args![black_box(1_u64)])
    ));
    c.bench_function("intercepted", |b| b.iter(
        || container.invoke("calc", "hot", args![black_box(1_u64)])
    ));
}

criterion_group!(benches, benchmark);
criterion_main!(benches);

struct Calc;
