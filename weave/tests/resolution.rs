#![allow(missing_docs)]

use weave::{
    Deployment,
    DeploymentConfig,
    Resolution,
    catalog::{BeanDescriptor, InjectionPointDescriptor, InterceptorDescriptor, MarkerDescriptor, TypeCatalog},
    model::InjectionPointId,
};

#[test]
fn it_resolves_single_provider() {
    let catalog = TypeCatalog::builder()
        .bean(BeanDescriptor::new("foo", "Foo").inject("Bar"))
        .bean(BeanDescriptor::new("bar", "Bar").scope("singleton"))
        .build();

    let deployment = Deployment::deploy(&catalog).unwrap();
    let resolution = deployment.graph().resolution(&InjectionPointId::bean("foo", 0)).unwrap();

    assert_eq!(resolution, &Resolution::Resolved("bar".into()));
}

#[test]
fn it_resolves_identically_across_builds() {
    let catalog = TypeCatalog::builder()
        .bean(BeanDescriptor::new("repo", "SqlRepo").implements("Repo"))
        .bean(BeanDescriptor::new("service", "Service").inject("Repo"))
        .bean(BeanDescriptor::new("handler", "Handler").inject("Service").inject("Repo"))
        .build();

    let first = Deployment::deploy(&catalog).unwrap();
    let second = Deployment::deploy(&catalog).unwrap();

    let targets = |deployment: &Deployment| deployment
        .graph()
        .points()
        .map(|point| point.resolution().clone())
        .collect::<Vec<_>>();

    assert_eq!(targets(&first), targets(&second));
    assert_eq!(first.graph().dependencies_of("handler"), ["service", "repo"]);
}

#[test]
fn it_reports_ambiguous_providers() {
    let catalog = TypeCatalog::builder()
        .bean(BeanDescriptor::new("fast", "FastService").implements("Service"))
        .bean(BeanDescriptor::new("slow", "SlowService").implements("Service"))
        .bean(BeanDescriptor::new("client", "Client").inject("Service"))
        .build();

    let errors = Deployment::deploy(&catalog).unwrap_err();

    assert_eq!(errors.len(), 1);
    assert!(errors.errors()[0].is_ambiguous());
    assert_eq!(
        errors.errors()[0].to_string(),
        "Ambiguous Resolution: bean `client` dependency #0 of type `Service` matches [fast, slow]"
    );
}

#[test]
fn it_prefers_default_provider() {
    let catalog = TypeCatalog::builder()
        .bean(BeanDescriptor::new("fast", "FastService").implements("Service"))
        .bean(BeanDescriptor::new("slow", "SlowService").implements("Service").as_default())
        .bean(BeanDescriptor::new("client", "Client").inject("Service"))
        .build();

    let deployment = Deployment::deploy(&catalog).unwrap();

    assert_eq!(deployment.graph().dependencies_of("client"), ["slow"]);
}

#[test]
fn it_narrows_candidates_by_qualifier() {
    let primary = MarkerDescriptor::new("Named").with("value", "primary");
    let replica = MarkerDescriptor::new("Named").with("value", "replica");

    let catalog = TypeCatalog::builder()
        .bean(BeanDescriptor::new("primary_db", "Db").qualifier(primary.clone()))
        .bean(BeanDescriptor::new("replica_db", "Db").qualifier(replica))
        .bean(BeanDescriptor::new("writer", "Writer")
            .depends_on(InjectionPointDescriptor::new("Db").named("db").qualified(primary)))
        .build();

    let deployment = Deployment::deploy(&catalog).unwrap();

    assert_eq!(deployment.graph().dependencies_of("writer"), ["primary_db"]);
}

#[test]
fn it_reports_dependent_cycle_with_both_identities() {
    let catalog = TypeCatalog::builder()
        .bean(BeanDescriptor::new("a", "A").inject("B"))
        .bean(BeanDescriptor::new("b", "B").inject("A"))
        .build();

    let errors = Deployment::deploy(&catalog).unwrap_err();

    assert_eq!(errors.len(), 1);
    assert!(errors.errors()[0].is_circular());
    assert_eq!(errors.errors()[0].to_string(), "Circular Dependency: a -> b -> a");
}

#[test]
fn it_reports_mixed_scope_cycle() {
    let catalog = TypeCatalog::builder()
        .bean(BeanDescriptor::new("session", "Session").scope("contextual").inject("Audit"))
        .bean(BeanDescriptor::new("audit", "Audit").scope("singleton").inject("Session"))
        .build();

    let errors = Deployment::deploy(&catalog).unwrap_err();

    assert!(errors.iter().any(|err| err.is_circular()));
}

#[test]
fn it_permits_contextual_cycle() {
    let catalog = TypeCatalog::builder()
        .bean(BeanDescriptor::new("x", "X").scope("contextual").inject("Y"))
        .bean(BeanDescriptor::new("y", "Y").scope("contextual").inject("X"))
        .build();

    let deployment = Deployment::deploy(&catalog).unwrap();
    let cycles: Vec<_> = deployment.graph().permitted_cycles().collect();

    assert_eq!(cycles.len(), 1);
    assert!(cycles[0].contains("x") && cycles[0].contains("y"));
}

#[test]
fn it_collects_every_independent_error() {
    let catalog = TypeCatalog::builder()
        .bean(BeanDescriptor::new("one", "One").implements("Shared"))
        .bean(BeanDescriptor::new("two", "Two").implements("Shared"))
        .bean(BeanDescriptor::new("needs_shared", "NeedsShared").inject("Shared"))
        .bean(BeanDescriptor::new("needs_ghost", "NeedsGhost").inject("Ghost"))
        .bean(BeanDescriptor::new("a", "A").inject("B"))
        .bean(BeanDescriptor::new("b", "B").inject("A"))
        .interceptor(InterceptorDescriptor::new("audit", "audit")
            .binding(MarkerDescriptor::new("Audited"))
            .inject("Journal"))
        .build();

    let errors = Deployment::deploy(&catalog).unwrap_err();

    assert_eq!(errors.len(), 4);
    assert_eq!(errors.iter().filter(|err| err.is_ambiguous()).count(), 1);
    assert_eq!(errors.iter().filter(|err| err.is_unsatisfied()).count(), 2);
    assert_eq!(errors.iter().filter(|err| err.is_circular()).count(), 1);
    assert!(errors.to_string().starts_with("deployment failed with 4 error(s)"));
}

#[test]
fn it_reports_definition_errors_before_resolution() {
    let catalog = TypeCatalog::builder()
        .bean(BeanDescriptor::new("odd", "Odd").scope("request").inject("Ghost"))
        .bean(BeanDescriptor::new("odd", "Twin"))
        .build();

    let errors = Deployment::deploy(&catalog).unwrap_err();

    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|err| !err.is_unsatisfied()));
}

#[test]
fn it_never_selects_excluded_beans() {
    let catalog = TypeCatalog::builder()
        .bean(BeanDescriptor::new("legacy", "LegacyMailer").implements("Mailer"))
        .bean(BeanDescriptor::new("smtp", "SmtpMailer").implements("Mailer"))
        .bean(BeanDescriptor::new("noop", "NoopMailer").implements("Mailer").disabled())
        .bean(BeanDescriptor::new("signup", "Signup").inject("Mailer"))
        .build();

    let deployment = Deployment::builder()
        .with_config(|config| config.exclude_type("LegacyMailer"))
        .deploy(&catalog)
        .unwrap();

    assert_eq!(deployment.graph().dependencies_of("signup"), ["smtp"]);
    assert_eq!(deployment.registry().excluded(), ["legacy", "noop"]);
}

#[test]
fn it_deploys_with_deserialized_config() {
    let config: DeploymentConfig = serde_json::from_str(r#"{ "exclude": ["legacy"] }"#).unwrap();
    let catalog = TypeCatalog::builder()
        .bean(BeanDescriptor::new("legacy", "LegacyMailer").implements("Mailer"))
        .bean(BeanDescriptor::new("smtp", "SmtpMailer").implements("Mailer"))
        .bean(BeanDescriptor::new("signup", "Signup").inject("Mailer"))
        .build();

    let deployment = Deployment::builder()
        .set_config(config)
        .deploy(&catalog)
        .unwrap();

    assert_eq!(deployment.graph().dependencies_of("signup"), ["smtp"]);
}
